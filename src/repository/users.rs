//! Users repository for database operations

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        email::Email,
        loan::Loan,
        user::{User, UserQuery},
    },
};

use super::{duplicate_key, pagination};

/// Persistence contract for users
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Check if an email is already registered, optionally ignoring one user.
    async fn email_taken(&self, email: &Email, exclude: Option<Uuid>) -> AppResult<bool>;

    async fn insert(&self, user: &User) -> AppResult<()>;

    async fn update(&self, user: &User) -> AppResult<()>;

    /// Overwrite the embedded copy of a loan on its user document.
    async fn sync_loan(&self, user_id: Uuid, loan: &Loan) -> AppResult<()>;

    /// Filtered page of users plus the total match count.
    async fn search(&self, query: &UserQuery) -> AppResult<(Vec<User>, u64)>;

    async fn count_total(&self) -> AppResult<u64>;

    async fn count_active(&self) -> AppResult<u64>;
}

pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = self
            .collection
            .find_one(doc! { "_id": id.to_string() })
            .await?;
        Ok(user)
    }

    async fn email_taken(&self, email: &Email, exclude: Option<Uuid>) -> AppResult<bool> {
        let mut filter = doc! { "email": email.as_str() };
        if let Some(id) = exclude {
            filter.insert("_id", doc! { "$ne": id.to_string() });
        }
        let count = self.collection.count_documents(filter).await?;
        Ok(count > 0)
    }

    async fn insert(&self, user: &User) -> AppResult<()> {
        self.collection.insert_one(user).await.map_err(|err| {
            if duplicate_key(&err) {
                AppError::Conflict(format!("A user with email {} already exists", user.email))
            } else {
                AppError::from(err)
            }
        })?;
        Ok(())
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let result = self
            .collection
            .replace_one(doc! { "_id": user.id.to_string() }, user)
            .await
            .map_err(|err| {
                if duplicate_key(&err) {
                    AppError::Conflict(format!("A user with email {} already exists", user.email))
                } else {
                    AppError::from(err)
                }
            })?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user.id)));
        }
        Ok(())
    }

    async fn sync_loan(&self, user_id: Uuid, loan: &Loan) -> AppResult<()> {
        let filter = doc! {
            "_id": user_id.to_string(),
            "loans._id": loan.id.to_string(),
        };
        let update = doc! { "$set": { "loans.$": mongodb::bson::to_document(loan)? } };
        let result = self.collection.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Loan {} not found for user {}",
                loan.id, user_id
            )));
        }
        Ok(())
    }

    async fn search(&self, query: &UserQuery) -> AppResult<(Vec<User>, u64)> {
        let mut filter = Document::new();
        if let Some(name) = query.name.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.insert(
                "name",
                doc! { "$regex": regex::escape(name.trim()), "$options": "i" },
            );
        }
        if let Some(email) = query.email.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.insert("email", email.trim().to_lowercase());
        }
        if let Some(active) = query.active {
            filter.insert("active", active);
        }

        let total = self.collection.count_documents(filter.clone()).await?;
        let (skip, limit) = pagination(query.page, query.per_page);
        let users = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok((users, total))
    }

    async fn count_total(&self) -> AppResult<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    async fn count_active(&self) -> AppResult<u64> {
        Ok(self.collection.count_documents(doc! { "active": true }).await?)
    }
}
