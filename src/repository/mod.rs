//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod users;

use std::sync::Arc;

use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

use crate::error::AppResult;

/// Main repository struct holding one handle per collection
#[derive(Clone)]
pub struct Repository {
    pub users: Arc<dyn users::UserRepository>,
    pub books: Arc<dyn books::BookRepository>,
    pub loans: Arc<dyn loans::LoanRepository>,
}

impl Repository {
    /// Create a new repository over the given database
    pub fn new(db: &Database) -> Self {
        Self {
            users: Arc::new(users::MongoUserRepository::new(db)),
            books: Arc::new(books::MongoBookRepository::new(db)),
            loans: Arc::new(loans::MongoLoanRepository::new(db)),
        }
    }

    #[cfg(test)]
    pub fn with_mocks(
        users: users::MockUserRepository,
        books: books::MockBookRepository,
        loans: loans::MockLoanRepository,
    ) -> Self {
        Self {
            users: Arc::new(users),
            books: Arc::new(books),
            loans: Arc::new(loans),
        }
    }
}

/// Create the indexes the lending rules rely on. Runs at startup and is a
/// no-op when they already exist.
pub async fn ensure_indexes(db: &Database) -> AppResult<()> {
    let users = db.collection::<Document>("users");
    users
        .create_indexes([unique_index(doc! { "email": 1 }, "email_unique")])
        .await?;

    let books = db.collection::<Document>("books");
    books
        .create_indexes([unique_index(doc! { "isbn": 1 }, "isbn_unique")])
        .await?;

    let loans = db.collection::<Document>("loans");
    loans
        .create_indexes([
            // One active loan per book, enforced by the database even under
            // concurrent inserts.
            IndexModel::builder()
                .keys(doc! { "book_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "return_date": { "$type": "null" } })
                        .name("active_loan_per_book".to_string())
                        .build(),
                )
                .build(),
            plain_index(doc! { "due_date": 1 }, "due_date_asc"),
            plain_index(doc! { "user_id": 1 }, "user_id_asc"),
            plain_index(doc! { "book_id": 1 }, "book_id_asc"),
        ])
        .await?;

    Ok(())
}

fn unique_index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .build(),
        )
        .build()
}

fn plain_index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(name.to_string()).build())
        .build()
}

/// True when the error is a unique index violation.
pub(crate) fn duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == 11000
    )
}

/// Clamp paging inputs and convert them to a skip/limit pair.
pub(crate) fn pagination(page: Option<i64>, per_page: Option<i64>) -> (u64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (((page - 1) * per_page) as u64, per_page)
}

#[cfg(test)]
mod tests {
    use super::pagination;

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(pagination(None, None), (0, 20));
        assert_eq!(pagination(Some(3), Some(10)), (20, 10));
        assert_eq!(pagination(Some(0), Some(10)), (0, 10));
        assert_eq!(pagination(Some(-5), Some(500)), (0, 100));
        assert_eq!(pagination(Some(2), Some(0)), (1, 1));
    }
}
