pub mod activity_service;
pub mod auth_service;
pub mod availability_service;
pub mod book_service;
pub mod category_service;
pub mod fine_service;
pub mod loan_service;
pub mod reservation_service;
pub mod review_service;
pub mod user_service;

mod lookup;
