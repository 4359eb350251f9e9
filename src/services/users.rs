//! User management service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        email::Email,
        loan::LoanSummary,
        user::{CreateUser, UpdateUser, User, UserQuery, UserResponse, UserSummary},
    },
    repository::Repository,
};

/// Loan limit applied when a registration does not set one.
const DEFAULT_LOAN_LIMIT: i32 = 3;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Register a new user
    pub async fn create_user(&self, request: CreateUser) -> AppResult<UserResponse> {
        let email = Email::parse(&request.email)?;
        if self.repository.users.email_taken(&email, None).await? {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                email
            )));
        }
        let user = User::new(
            &request.name,
            email,
            request.birth_date,
            request.loan_limit.unwrap_or(DEFAULT_LOAN_LIMIT),
        )?;
        self.repository.users.insert(&user).await?;
        tracing::info!("Registered user {} ({})", user.id, user.email);
        Ok(UserResponse::from(&user))
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: Uuid) -> AppResult<UserResponse> {
        let user = self.require_user(id).await?;
        Ok(UserResponse::from(&user))
    }

    /// List users with filters and pagination
    pub async fn list_users(&self, query: &UserQuery) -> AppResult<(Vec<UserSummary>, u64)> {
        let (users, total) = self.repository.users.search(query).await?;
        Ok((users.iter().map(UserSummary::from).collect(), total))
    }

    /// Update a user's name, email or loan limit
    pub async fn update_user(&self, id: Uuid, request: UpdateUser) -> AppResult<UserResponse> {
        let mut user = self.require_user(id).await?;
        if let Some(name) = request.name.as_deref() {
            user.change_name(name)?;
        }
        if let Some(raw) = request.email.as_deref() {
            let email = Email::parse(raw)?;
            if self.repository.users.email_taken(&email, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "A user with email {} already exists",
                    email
                )));
            }
            user.change_email(email);
        }
        if let Some(limit) = request.loan_limit {
            user.change_loan_limit(limit)?;
        }
        self.repository.users.update(&user).await?;
        Ok(UserResponse::from(&user))
    }

    /// Reactivate a user account
    pub async fn activate_user(&self, id: Uuid) -> AppResult<UserResponse> {
        let mut user = self.require_user(id).await?;
        user.activate();
        self.repository.users.update(&user).await?;
        tracing::info!("Activated user {}", id);
        Ok(UserResponse::from(&user))
    }

    /// Deactivate a user account, refused while loans are open
    pub async fn deactivate_user(&self, id: Uuid) -> AppResult<UserResponse> {
        let mut user = self.require_user(id).await?;
        user.deactivate()?;
        self.repository.users.update(&user).await?;
        tracing::info!("Deactivated user {}", id);
        Ok(UserResponse::from(&user))
    }

    /// Lending history of a user, newest first
    pub async fn get_user_loans(&self, id: Uuid) -> AppResult<Vec<LoanSummary>> {
        self.require_user(id).await?;
        let loans = self.repository.loans.list_for_user(id).await?;
        Ok(loans.iter().map(LoanSummary::from).collect())
    }

    async fn require_user(&self, id: Uuid) -> AppResult<User> {
        self.repository
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loan::Loan;
    use crate::repository::{
        books::MockBookRepository, loans::MockLoanRepository, users::MockUserRepository,
    };
    use chrono::NaiveDate;

    fn request() -> CreateUser {
        CreateUser {
            name: "Ana Souza".to_string(),
            email: "Ana@Example.com".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            loan_limit: None,
        }
    }

    fn stored_user() -> User {
        User::new(
            "Ana Souza",
            Email::parse("ana@example.com").unwrap(),
            NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            3,
        )
        .unwrap()
    }

    fn service(users: MockUserRepository) -> UsersService {
        UsersService::new(Repository::with_mocks(
            users,
            MockBookRepository::new(),
            MockLoanRepository::new(),
        ))
    }

    #[tokio::test]
    async fn create_user_normalizes_email_and_defaults_limit() {
        let mut users = MockUserRepository::new();
        users.expect_email_taken().returning(|_, _| Ok(false));
        users
            .expect_insert()
            .withf(|user| user.email.as_str() == "ana@example.com" && user.loan_limit == 3)
            .times(1)
            .returning(|_| Ok(()));

        let response = service(users).create_user(request()).await.unwrap();
        assert_eq!(response.email, "ana@example.com");
        assert_eq!(response.loan_limit, 3);
        assert!(response.active);
        assert_eq!(response.active_loans, 0);
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let mut users = MockUserRepository::new();
        users.expect_email_taken().returning(|_, _| Ok(true));
        users.expect_insert().times(0);

        let err = service(users).create_user(request()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_user_maps_to_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));

        let err = service(users).get_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_user_persists_the_changes() {
        let user = stored_user();
        let id = user.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(|user| user.name == "Beatriz Lima" && user.loan_limit == 5)
            .times(1)
            .returning(|_| Ok(()));

        let response = service(users)
            .update_user(
                id,
                UpdateUser {
                    name: Some("Beatriz Lima".to_string()),
                    email: None,
                    loan_limit: Some(5),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.name, "Beatriz Lima");
        assert_eq!(response.loan_limit, 5);
    }

    #[tokio::test]
    async fn deactivation_with_open_loans_is_refused() {
        let mut user = stored_user();
        let loan = Loan::with_ids(user.id, Uuid::new_v4(), 14).unwrap();
        user.add_loan(loan).unwrap();
        let id = user.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_update().times(0);

        let err = service(users).deactivate_user(id).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }
}
