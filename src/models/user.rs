//! User model and related types

use chrono::{NaiveDate, Utc};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{email::Email, loan::Loan};

const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 100;
const MIN_LOAN_LIMIT: i32 = 1;
const MAX_LOAN_LIMIT: i32 = 10;
const MAX_AGE_YEARS: u32 = 120;

/// A registered library member.
///
/// Loans taken by the user are embedded in the document. The active subset
/// of that history drives the lending rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: Email,
    pub birth_date: NaiveDate,
    pub active: bool,
    pub loan_limit: i32,
    #[serde(default)]
    pub loans: Vec<Loan>,
    pub created_at: DateTime,
    pub updated_at: Option<DateTime>,
}

impl User {
    /// Register a user. The name is stored trimmed and the account starts
    /// active with no loans.
    pub fn new(name: &str, email: Email, birth_date: NaiveDate, loan_limit: i32) -> AppResult<Self> {
        Self::validate_name(name)?;
        Self::validate_birth_date(birth_date)?;
        Self::validate_loan_limit(loan_limit)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email,
            birth_date,
            active: true,
            loan_limit,
            loans: Vec::new(),
            created_at: DateTime::now(),
            updated_at: None,
        })
    }

    pub fn change_name(&mut self, name: &str) -> AppResult<()> {
        Self::validate_name(name)?;
        self.name = name.trim().to_string();
        self.touch();
        Ok(())
    }

    pub fn change_email(&mut self, email: Email) {
        self.email = email;
        self.touch();
    }

    /// Raise or lower the loan limit. The new limit may not undercut the
    /// loans currently out.
    pub fn change_loan_limit(&mut self, limit: i32) -> AppResult<()> {
        Self::validate_loan_limit(limit)?;
        if (limit as usize) < self.active_loan_count() {
            return Err(AppError::BusinessRule(
                "Cannot set the limit below the number of active loans".to_string(),
            ));
        }
        self.loan_limit = limit;
        self.touch();
        Ok(())
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.touch();
    }

    /// Deactivate the account. Refused while any loan is still open.
    pub fn deactivate(&mut self) -> AppResult<()> {
        if self.has_active_loans() {
            return Err(AppError::BusinessRule(
                "Cannot deactivate a user with active loans".to_string(),
            ));
        }
        self.active = false;
        self.touch();
        Ok(())
    }

    pub fn can_borrow(&self) -> bool {
        self.active && self.active_loan_count() < self.loan_limit as usize
    }

    /// Record a new loan against this user.
    pub fn add_loan(&mut self, loan: Loan) -> AppResult<()> {
        if !self.can_borrow() {
            return Err(AppError::BusinessRule(
                "User cannot take any more loans".to_string(),
            ));
        }
        self.loans.push(loan);
        self.touch();
        Ok(())
    }

    pub fn active_loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.iter().filter(|loan| loan.is_active())
    }

    pub fn active_loan_count(&self) -> usize {
        self.active_loans().count()
    }

    pub fn has_active_loans(&self) -> bool {
        self.loans.iter().any(|loan| loan.is_active())
    }

    pub fn age(&self) -> u32 {
        Utc::now()
            .date_naive()
            .years_since(self.birth_date)
            .unwrap_or(0)
    }

    fn validate_name(name: &str) -> AppResult<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if trimmed.chars().count() < MIN_NAME_CHARS {
            return Err(AppError::Validation(
                "Name must be at least 2 characters".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_NAME_CHARS {
            return Err(AppError::Validation(
                "Name cannot exceed 100 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_birth_date(birth_date: NaiveDate) -> AppResult<()> {
        let today = Utc::now().date_naive();
        if birth_date > today {
            return Err(AppError::Validation(
                "Birth date cannot be in the future".to_string(),
            ));
        }
        if today.years_since(birth_date).unwrap_or(0) > MAX_AGE_YEARS {
            return Err(AppError::Validation("Invalid birth date".to_string()));
        }
        Ok(())
    }

    fn validate_loan_limit(limit: i32) -> AppResult<()> {
        if limit < MIN_LOAN_LIMIT {
            return Err(AppError::Validation(
                "Loan limit must be at least 1".to_string(),
            ));
        }
        if limit > MAX_LOAN_LIMIT {
            return Err(AppError::Validation(
                "Loan limit cannot exceed 10".to_string(),
            ));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub birth_date: NaiveDate,
    /// Maximum number of simultaneous loans, defaulting to 3.
    #[validate(range(min = 1, max = 10, message = "Loan limit must be between 1 and 10"))]
    pub loan_limit: Option<i32>,
}

/// Update user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Loan limit must be between 1 and 10"))]
    pub loan_limit: Option<i32>,
}

/// User query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
    /// Exact match on the normalized email.
    pub email: Option<String>,
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Full user representation returned by the API
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub age: u32,
    pub active: bool,
    pub loan_limit: i32,
    pub active_loans: i64,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: Option<chrono::DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.as_str().to_string(),
            birth_date: user.birth_date,
            age: user.age(),
            active: user.active,
            loan_limit: user.loan_limit,
            active_loans: user.active_loan_count() as i64,
            created_at: user.created_at.to_chrono(),
            updated_at: user.updated_at.map(|d| d.to_chrono()),
        }
    }
}

/// Short user representation for lists
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub active_loans: i64,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.as_str().to_string(),
            active: user.active,
            active_loans: user.active_loan_count() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};

    fn sample_user(loan_limit: i32) -> User {
        User::new(
            "Ana Souza",
            Email::parse("ana@example.com").unwrap(),
            NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            loan_limit,
        )
        .unwrap()
    }

    fn open_loan(user: &User) -> Loan {
        Loan::with_ids(user.id, Uuid::new_v4(), 14).unwrap()
    }

    #[test]
    fn new_user_starts_active_with_trimmed_name() {
        let user = User::new(
            "  Ana Souza  ",
            Email::parse("ana@example.com").unwrap(),
            NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            3,
        )
        .unwrap();
        assert_eq!(user.name, "Ana Souza");
        assert!(user.active);
        assert_eq!(user.loan_limit, 3);
        assert!(user.loans.is_empty());
        assert!(user.updated_at.is_none());
    }

    #[test]
    fn rejects_invalid_names() {
        let email = Email::parse("ana@example.com").unwrap();
        let birth = NaiveDate::from_ymd_opt(1990, 5, 10).unwrap();
        assert!(User::new("", email.clone(), birth, 3).is_err());
        assert!(User::new("   ", email.clone(), birth, 3).is_err());
        assert!(User::new("A", email.clone(), birth, 3).is_err());
        assert!(User::new(&"a".repeat(101), email, birth, 3).is_err());
    }

    #[test]
    fn rejects_implausible_birth_dates() {
        let email = Email::parse("ana@example.com").unwrap();
        let future = Utc::now().date_naive() + Duration::days(1);
        let err = User::new("Ana Souza", email.clone(), future, 3).unwrap_err();
        assert!(err.to_string().contains("future"));

        let today = Utc::now().date_naive();
        let too_old = NaiveDate::from_ymd_opt(today.year() - 130, 1, 1).unwrap();
        assert!(User::new("Ana Souza", email, too_old, 3).is_err());
    }

    #[test]
    fn rejects_out_of_range_loan_limits() {
        let email = Email::parse("ana@example.com").unwrap();
        let birth = NaiveDate::from_ymd_opt(1990, 5, 10).unwrap();
        assert!(User::new("Ana Souza", email.clone(), birth, 0).is_err());
        assert!(User::new("Ana Souza", email.clone(), birth, 11).is_err());
        assert!(User::new("Ana Souza", email, birth, 10).is_ok());
    }

    #[test]
    fn age_is_derived_from_birth_date() {
        let today = Utc::now().date_naive();
        let mut user = sample_user(3);
        user.birth_date = NaiveDate::from_ymd_opt(today.year() - 30, 1, 1).unwrap();
        assert_eq!(user.age(), 30);
    }

    #[test]
    fn borrowing_stops_at_the_limit() {
        let mut user = sample_user(3);
        for _ in 0..3 {
            let loan = open_loan(&user);
            user.add_loan(loan).unwrap();
        }
        assert_eq!(user.active_loan_count(), 3);
        assert!(!user.can_borrow());

        let extra = open_loan(&user);
        let err = user.add_loan(extra).unwrap_err();
        assert!(err.to_string().contains("any more loans"));
    }

    #[test]
    fn add_loan_stamps_updated_at() {
        let mut user = sample_user(3);
        let loan = open_loan(&user);
        user.add_loan(loan).unwrap();
        assert!(user.updated_at.is_some());
    }

    #[test]
    fn returned_loans_do_not_count_against_the_limit() {
        let mut user = sample_user(1);
        let loan = open_loan(&user);
        user.add_loan(loan).unwrap();
        assert!(!user.can_borrow());

        user.loans[0].give_back(None).unwrap();
        assert_eq!(user.active_loan_count(), 0);
        assert_eq!(user.loans.len(), 1);
        assert!(user.can_borrow());
    }

    #[test]
    fn deactivation_requires_no_open_loans() {
        let mut user = sample_user(3);
        let loan = open_loan(&user);
        user.add_loan(loan).unwrap();

        let err = user.deactivate().unwrap_err();
        assert!(err.to_string().contains("active loans"));

        user.loans[0].give_back(None).unwrap();
        user.deactivate().unwrap();
        assert!(!user.active);
        assert!(!user.can_borrow());

        user.activate();
        assert!(user.active);
        assert!(user.can_borrow());
    }

    #[test]
    fn limit_cannot_undercut_open_loans() {
        let mut user = sample_user(3);
        for _ in 0..2 {
            let loan = open_loan(&user);
            user.add_loan(loan).unwrap();
        }
        let err = user.change_loan_limit(1).unwrap_err();
        assert!(err.to_string().contains("below the number of active loans"));

        user.change_loan_limit(2).unwrap();
        assert_eq!(user.loan_limit, 2);
        assert!(!user.can_borrow());
    }

    #[test]
    fn change_name_validates_and_trims() {
        let mut user = sample_user(3);
        assert!(user.change_name("B").is_err());
        user.change_name("  Beatriz Lima  ").unwrap();
        assert_eq!(user.name, "Beatriz Lima");
        assert!(user.updated_at.is_some());
    }

    #[test]
    fn change_email_replaces_the_address() {
        let mut user = sample_user(3);
        user.change_email(Email::parse("NEW@Example.com").unwrap());
        assert_eq!(user.email.as_str(), "new@example.com");
    }
}
