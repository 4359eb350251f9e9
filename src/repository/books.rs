//! Books repository for database operations

use async_trait::async_trait;
use chrono::{Months, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, RECENT_RELEASE_MONTHS},
        isbn::Isbn,
        loan::Loan,
    },
};

use super::{duplicate_key, pagination};

/// Persistence contract for books
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>>;

    /// Check if an ISBN is already cataloged, optionally ignoring one book.
    async fn isbn_taken(&self, isbn: &Isbn, exclude: Option<Uuid>) -> AppResult<bool>;

    async fn insert(&self, book: &Book) -> AppResult<()>;

    async fn update(&self, book: &Book) -> AppResult<()>;

    /// Overwrite the embedded copy of a loan on its book document.
    async fn sync_loan(&self, book_id: Uuid, loan: &Loan) -> AppResult<()>;

    /// Filtered page of books plus the total match count.
    async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, u64)>;

    async fn count_total(&self) -> AppResult<u64>;

    async fn count_available(&self) -> AppResult<u64>;

    async fn count_on_loan(&self) -> AppResult<u64>;
}

pub struct MongoBookRepository {
    collection: Collection<Book>,
}

impl MongoBookRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("books"),
        }
    }
}

#[async_trait]
impl BookRepository for MongoBookRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let book = self
            .collection
            .find_one(doc! { "_id": id.to_string() })
            .await?;
        Ok(book)
    }

    async fn isbn_taken(&self, isbn: &Isbn, exclude: Option<Uuid>) -> AppResult<bool> {
        let mut filter = doc! { "isbn": isbn.as_str() };
        if let Some(id) = exclude {
            filter.insert("_id", doc! { "$ne": id.to_string() });
        }
        let count = self.collection.count_documents(filter).await?;
        Ok(count > 0)
    }

    async fn insert(&self, book: &Book) -> AppResult<()> {
        self.collection.insert_one(book).await.map_err(|err| {
            if duplicate_key(&err) {
                AppError::Conflict(format!("A book with ISBN {} already exists", book.isbn))
            } else {
                AppError::from(err)
            }
        })?;
        Ok(())
    }

    async fn update(&self, book: &Book) -> AppResult<()> {
        let result = self
            .collection
            .replace_one(doc! { "_id": book.id.to_string() }, book)
            .await
            .map_err(|err| {
                if duplicate_key(&err) {
                    AppError::Conflict(format!("A book with ISBN {} already exists", book.isbn))
                } else {
                    AppError::from(err)
                }
            })?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", book.id)));
        }
        Ok(())
    }

    async fn sync_loan(&self, book_id: Uuid, loan: &Loan) -> AppResult<()> {
        let filter = doc! {
            "_id": book_id.to_string(),
            "loans._id": loan.id.to_string(),
        };
        let update = doc! { "$set": { "loans.$": mongodb::bson::to_document(loan)? } };
        let result = self.collection.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Loan {} not found for book {}",
                loan.id, book_id
            )));
        }
        Ok(())
    }

    async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, u64)> {
        let mut filter = Document::new();
        if let Some(title) = query.title.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.insert(
                "title",
                doc! { "$regex": regex::escape(title.trim()), "$options": "i" },
            );
        }
        if let Some(author) = query.author.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.insert(
                "author",
                doc! { "$regex": regex::escape(author.trim()), "$options": "i" },
            );
        }
        if let Some(genre) = query.genre.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.insert(
                "genre",
                doc! { "$regex": regex::escape(genre.trim()), "$options": "i" },
            );
        }
        if let Some(available) = query.available {
            filter.insert("available", available);
        }
        if query.recent.unwrap_or(false) {
            // Calendar dates are stored as ISO strings, so a lexicographic
            // range comparison is a date comparison.
            if let Some(cutoff) = Utc::now()
                .date_naive()
                .checked_sub_months(Months::new(RECENT_RELEASE_MONTHS))
            {
                filter.insert("publication_date", doc! { "$gte": cutoff.to_string() });
            }
        }

        let total = self.collection.count_documents(filter.clone()).await?;
        let (skip, limit) = pagination(query.page, query.per_page);
        let books = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok((books, total))
    }

    async fn count_total(&self) -> AppResult<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    async fn count_available(&self) -> AppResult<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "available": true })
            .await?)
    }

    async fn count_on_loan(&self) -> AppResult<u64> {
        let filter = doc! { "loans": { "$elemMatch": { "return_date": null } } };
        Ok(self.collection.count_documents(filter).await?)
    }
}
