pub mod activity;
pub mod auth;
pub mod books;
pub mod categories;
pub mod fines;
pub mod loans;
pub mod reservations;
pub mod reviews;
pub mod users;
