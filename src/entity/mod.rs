pub mod audit_logs;
pub mod book_categories;
pub mod books;
pub mod categories;
pub mod fines;
pub mod loans;
pub mod reservations;
pub mod reviews;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use book_categories::Entity as BookCategories;
pub use books::Entity as Books;
pub use categories::Entity as Categories;
pub use fines::Entity as Fines;
pub use loans::Entity as Loans;
pub use reservations::Entity as Reservations;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
