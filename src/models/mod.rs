//! Data models for Libris

pub mod book;
pub mod email;
pub mod isbn;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookResponse, BookSummary};
pub use email::Email;
pub use isbn::Isbn;
pub use loan::{Loan, LoanResponse, LoanSummary};
pub use user::{User, UserResponse, UserSummary};
