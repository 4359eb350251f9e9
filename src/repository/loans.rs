//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, DateTime, Document};
use mongodb::{Collection, Database};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanQuery, LoanStatusFilter},
};

use super::{duplicate_key, pagination};

/// Persistence contract for loans
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Loan>>;

    /// The currently open loan of a book, if any.
    async fn find_active_for_book(&self, book_id: Uuid) -> AppResult<Option<Loan>>;

    async fn insert(&self, loan: &Loan) -> AppResult<()>;

    async fn update(&self, loan: &Loan) -> AppResult<()>;

    /// Filtered page of loans plus the total match count.
    async fn search(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, u64)>;

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>>;

    async fn list_for_book(&self, book_id: Uuid) -> AppResult<Vec<Loan>>;

    async fn count_total(&self) -> AppResult<u64>;

    async fn count_active(&self) -> AppResult<u64>;

    async fn count_overdue(&self) -> AppResult<u64>;
}

pub struct MongoLoanRepository {
    collection: Collection<Loan>,
}

impl MongoLoanRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("loans"),
        }
    }
}

#[async_trait]
impl LoanRepository for MongoLoanRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Loan>> {
        let loan = self
            .collection
            .find_one(doc! { "_id": id.to_string() })
            .await?;
        Ok(loan)
    }

    async fn find_active_for_book(&self, book_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = self
            .collection
            .find_one(doc! { "book_id": book_id.to_string(), "return_date": null })
            .await?;
        Ok(loan)
    }

    async fn insert(&self, loan: &Loan) -> AppResult<()> {
        self.collection.insert_one(loan).await.map_err(|err| {
            if duplicate_key(&err) {
                AppError::Conflict("Book already has an active loan".to_string())
            } else {
                AppError::from(err)
            }
        })?;
        Ok(())
    }

    async fn update(&self, loan: &Loan) -> AppResult<()> {
        let result = self
            .collection
            .replace_one(doc! { "_id": loan.id.to_string() }, loan)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Loan {} not found", loan.id)));
        }
        Ok(())
    }

    async fn search(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, u64)> {
        let mut filter = Document::new();
        let mut due = Document::new();
        match query.status {
            Some(LoanStatusFilter::Active) => {
                filter.insert("return_date", Bson::Null);
            }
            Some(LoanStatusFilter::Overdue) => {
                filter.insert("return_date", Bson::Null);
                due.insert("$lt", today_utc_start());
            }
            None => {}
        }
        if let Some(days) = query.due_within_days {
            filter.insert("return_date", Bson::Null);
            let horizon = Utc::now() + chrono::Duration::days(days.max(0));
            due.insert("$lte", DateTime::from_chrono(horizon));
        }
        if !due.is_empty() {
            filter.insert("due_date", due);
        }

        let total = self.collection.count_documents(filter.clone()).await?;
        let (skip, limit) = pagination(query.page, query.per_page);
        let loans = self
            .collection
            .find(filter)
            .sort(doc! { "loan_date": -1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok((loans, total))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>> {
        let loans = self
            .collection
            .find(doc! { "user_id": user_id.to_string() })
            .sort(doc! { "loan_date": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(loans)
    }

    async fn list_for_book(&self, book_id: Uuid) -> AppResult<Vec<Loan>> {
        let loans = self
            .collection
            .find(doc! { "book_id": book_id.to_string() })
            .sort(doc! { "loan_date": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(loans)
    }

    async fn count_total(&self) -> AppResult<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    async fn count_active(&self) -> AppResult<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "return_date": null })
            .await?)
    }

    async fn count_overdue(&self) -> AppResult<u64> {
        let filter = doc! {
            "return_date": null,
            "due_date": { "$lt": today_utc_start() },
        };
        Ok(self.collection.count_documents(filter).await?)
    }
}

/// Midnight UTC of the current day. Loans due strictly before this moment
/// are overdue, matching the calendar-date comparison on the model.
fn today_utc_start() -> DateTime {
    DateTime::from_chrono(Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc())
}
