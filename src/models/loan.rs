//! Loan model and related types

use chrono::Utc;
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{book::Book, user::User};

const MIN_LOAN_DAYS: i64 = 1;
const MAX_LOAN_DAYS: i64 = 90;
const MAX_NOTES_CHARS: usize = 500;

/// A lending of one book to one user.
///
/// A loan stays active until `return_date` is set. Overdue status, fines
/// and remaining days are derived from the calendar date, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub loan_date: DateTime,
    pub due_date: DateTime,
    /// `None` while active. Always serialized so the partial unique index
    /// on active loans can match the null value.
    pub return_date: Option<DateTime>,
    pub renewed: bool,
    pub renewal_days: i64,
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: Option<DateTime>,
}

impl Loan {
    /// Open a loan for a user and a book, enforcing the lending rules on
    /// both parties.
    pub fn new(user: &User, book: &Book, days: i64) -> AppResult<Self> {
        if !user.active {
            return Err(AppError::BusinessRule(
                "Inactive users cannot borrow books".to_string(),
            ));
        }
        if !user.can_borrow() {
            return Err(AppError::BusinessRule(
                "User has reached the loan limit".to_string(),
            ));
        }
        if !book.is_loanable() {
            return Err(AppError::BusinessRule(
                "Book is not available for loan".to_string(),
            ));
        }
        Self::with_ids(user.id, book.id, days)
    }

    /// Open a loan from bare identifiers, without party checks. The caller
    /// is responsible for having verified the user and the book.
    pub fn with_ids(user_id: Uuid, book_id: Uuid, days: i64) -> AppResult<Self> {
        Self::validate_days(days)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            loan_date: DateTime::from_chrono(now),
            due_date: DateTime::from_chrono(now + chrono::Duration::days(days)),
            return_date: None,
            renewed: false,
            renewal_days: 0,
            notes: None,
            created_at: DateTime::now(),
            updated_at: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }

    /// Overdue compares calendar dates, so a loan due today only becomes
    /// overdue tomorrow.
    pub fn is_overdue(&self) -> bool {
        self.is_active() && Utc::now().date_naive() > self.due_date.to_chrono().date_naive()
    }

    pub fn days_overdue(&self) -> i64 {
        if !self.is_overdue() {
            return 0;
        }
        let today = Utc::now().date_naive();
        (today - self.due_date.to_chrono().date_naive()).num_days()
    }

    pub fn days_remaining(&self) -> i64 {
        if !self.is_active() {
            return 0;
        }
        let today = Utc::now().date_naive();
        (self.due_date.to_chrono().date_naive() - today)
            .num_days()
            .max(0)
    }

    pub fn can_be_renewed(&self) -> bool {
        self.is_active() && !self.renewed && !self.is_overdue()
    }

    /// Extend the due date once. Returned, already renewed and overdue
    /// loans cannot be renewed.
    pub fn renew(&mut self, extra_days: i64) -> AppResult<()> {
        if !self.is_active() {
            return Err(AppError::BusinessRule(
                "Cannot renew a returned loan".to_string(),
            ));
        }
        if self.renewed {
            return Err(AppError::BusinessRule(
                "Loan has already been renewed once".to_string(),
            ));
        }
        if self.is_overdue() {
            return Err(AppError::BusinessRule(
                "Cannot renew an overdue loan".to_string(),
            ));
        }
        Self::validate_days(extra_days)?;
        self.due_date =
            DateTime::from_chrono(self.due_date.to_chrono() + chrono::Duration::days(extra_days));
        self.renewed = true;
        self.renewal_days = extra_days;
        self.touch();
        Ok(())
    }

    /// Close the loan. Blank notes are discarded rather than stored.
    pub fn give_back(&mut self, notes: Option<String>) -> AppResult<()> {
        if !self.is_active() {
            return Err(AppError::BusinessRule(
                "Loan has already been returned".to_string(),
            ));
        }
        self.return_date = Some(DateTime::now());
        if let Some(notes) = notes {
            if !notes.trim().is_empty() {
                self.notes = Some(notes);
            }
        }
        self.touch();
        Ok(())
    }

    /// Attach or replace the free-form notes on the loan.
    pub fn add_notes(&mut self, notes: &str) -> AppResult<()> {
        let trimmed = notes.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Notes cannot be empty".to_string()));
        }
        if trimmed.chars().count() > MAX_NOTES_CHARS {
            return Err(AppError::Validation(
                "Notes cannot exceed 500 characters".to_string(),
            ));
        }
        self.notes = Some(trimmed.to_string());
        self.touch();
        Ok(())
    }

    /// Accrued fine at the given daily rate, zero unless currently overdue.
    pub fn fine(&self, daily_rate: Decimal) -> Decimal {
        if self.is_overdue() {
            Decimal::from(self.days_overdue()) * daily_rate
        } else {
            Decimal::ZERO
        }
    }

    /// Elapsed time from the loan date to the return date, or to now for
    /// an active loan.
    pub fn duration(&self) -> chrono::Duration {
        let end = self
            .return_date
            .map(|d| d.to_chrono())
            .unwrap_or_else(Utc::now);
        end - self.loan_date.to_chrono()
    }

    fn validate_days(days: i64) -> AppResult<()> {
        if days < MIN_LOAN_DAYS {
            return Err(AppError::Validation(
                "Loan period must be at least 1 day".to_string(),
            ));
        }
        if days > MAX_LOAN_DAYS {
            return Err(AppError::Validation(
                "Loan period cannot exceed 90 days".to_string(),
            ));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}

/// Create loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    pub user_id: Uuid,
    pub book_id: Uuid,
    /// Loan period in days, defaulting to the configured period.
    #[validate(range(min = 1, max = 90, message = "Loan period must be between 1 and 90 days"))]
    pub days: Option<i64>,
}

/// Renew loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenewLoan {
    /// Extra days past the current due date, defaulting to the configured
    /// renewal period.
    #[validate(range(min = 1, max = 90, message = "Loan period must be between 1 and 90 days"))]
    pub extra_days: Option<i64>,
}

/// Return loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReturnLoan {
    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

/// Add notes request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddNotes {
    #[validate(length(min = 1, max = 500, message = "Notes must be between 1 and 500 characters"))]
    pub notes: String,
}

/// Status filter for loan listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatusFilter {
    Active,
    Overdue,
}

/// Query parameters for listing loans
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub status: Option<LoanStatusFilter>,
    /// Only active loans due within this many days from now.
    pub due_within_days: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Loan with full details for display
#[derive(Debug, Serialize, ToSchema)]
pub struct LoanResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub user_name: Option<String>,
    pub book_title: Option<String>,
    pub loan_date: chrono::DateTime<Utc>,
    pub due_date: chrono::DateTime<Utc>,
    pub return_date: Option<chrono::DateTime<Utc>>,
    pub renewed: bool,
    pub renewal_days: i64,
    pub notes: Option<String>,
    pub active: bool,
    pub overdue: bool,
    pub days_overdue: i64,
    pub days_remaining: i64,
    pub fine: Decimal,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: Option<chrono::DateTime<Utc>>,
}

impl LoanResponse {
    pub fn new(loan: &Loan, fine_rate: Decimal) -> Self {
        Self::with_parties(loan, None, None, fine_rate)
    }

    pub fn with_parties(
        loan: &Loan,
        user_name: Option<String>,
        book_title: Option<String>,
        fine_rate: Decimal,
    ) -> Self {
        Self {
            id: loan.id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            user_name,
            book_title,
            loan_date: loan.loan_date.to_chrono(),
            due_date: loan.due_date.to_chrono(),
            return_date: loan.return_date.map(|d| d.to_chrono()),
            renewed: loan.renewed,
            renewal_days: loan.renewal_days,
            notes: loan.notes.clone(),
            active: loan.is_active(),
            overdue: loan.is_overdue(),
            days_overdue: loan.days_overdue(),
            days_remaining: loan.days_remaining(),
            fine: loan.fine(fine_rate),
            created_at: loan.created_at.to_chrono(),
            updated_at: loan.updated_at.map(|d| d.to_chrono()),
        }
    }
}

/// Compact loan representation for listings
#[derive(Debug, Serialize, ToSchema)]
pub struct LoanSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub loan_date: chrono::DateTime<Utc>,
    pub due_date: chrono::DateTime<Utc>,
    pub return_date: Option<chrono::DateTime<Utc>>,
    pub renewed: bool,
    pub active: bool,
    pub overdue: bool,
    pub days_overdue: i64,
    pub days_remaining: i64,
}

impl From<&Loan> for LoanSummary {
    fn from(loan: &Loan) -> Self {
        Self {
            id: loan.id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            loan_date: loan.loan_date.to_chrono(),
            due_date: loan.due_date.to_chrono(),
            return_date: loan.return_date.map(|d| d.to_chrono()),
            renewed: loan.renewed,
            active: loan.is_active(),
            overdue: loan.is_overdue(),
            days_overdue: loan.days_overdue(),
            days_remaining: loan.days_remaining(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{email::Email, isbn::Isbn};
    use chrono::{Duration, NaiveDate};

    fn sample_user(loan_limit: i32) -> User {
        User::new(
            "Ana Souza",
            Email::parse("ana@example.com").unwrap(),
            NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            loan_limit,
        )
        .unwrap()
    }

    fn sample_book() -> Book {
        Book::new(
            "Refactoring",
            "Martin Fowler",
            Isbn::parse("9780134757599").unwrap(),
            NaiveDate::from_ymd_opt(2018, 11, 19).unwrap(),
            "Addison-Wesley",
            448,
            "Software",
            None,
        )
        .unwrap()
    }

    fn loan_period(loan: &Loan) -> i64 {
        (loan.due_date.to_chrono() - loan.loan_date.to_chrono()).num_days()
    }

    #[test]
    fn due_date_is_loan_date_plus_period() {
        let loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        assert_eq!(loan_period(&loan), 14);
        assert!(loan.is_active());
        assert!(!loan.renewed);
        assert_eq!(loan.renewal_days, 0);
    }

    #[test]
    fn rejects_out_of_range_periods() {
        assert!(Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 0).is_err());
        assert!(Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 91).is_err());
        assert!(Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 1).is_ok());
        assert!(Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 90).is_ok());
    }

    #[test]
    fn renew_extends_due_date_exactly_once() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.renew(7).unwrap();
        assert_eq!(loan_period(&loan), 21);
        assert!(loan.renewed);
        assert_eq!(loan.renewal_days, 7);
        assert!(loan.updated_at.is_some());

        let err = loan.renew(7).unwrap_err();
        assert!(err.to_string().contains("already been renewed"));
    }

    #[test]
    fn cannot_renew_an_overdue_loan() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.due_date = DateTime::from_chrono(Utc::now() - Duration::days(3));
        assert!(loan.is_overdue());
        assert!(!loan.can_be_renewed());
        assert!(loan.renew(7).is_err());
    }

    #[test]
    fn cannot_renew_a_returned_loan() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.give_back(None).unwrap();
        assert!(loan.renew(7).is_err());
    }

    #[test]
    fn give_back_closes_the_loan_once() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.give_back(Some("Slight cover damage".to_string()))
            .unwrap();
        assert!(!loan.is_active());
        assert!(loan.return_date.is_some());
        assert_eq!(loan.notes.as_deref(), Some("Slight cover damage"));

        let err = loan.give_back(None).unwrap_err();
        assert!(err.to_string().contains("already been returned"));
    }

    #[test]
    fn give_back_discards_blank_notes() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.give_back(Some("   ".to_string())).unwrap();
        assert!(loan.notes.is_none());
    }

    #[test]
    fn give_back_keeps_oversized_notes() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        let long = "x".repeat(600);
        loan.give_back(Some(long.clone())).unwrap();
        assert_eq!(loan.notes.as_deref(), Some(long.as_str()));
    }

    #[test]
    fn add_notes_enforces_bounds() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        assert!(loan.add_notes("").is_err());
        assert!(loan.add_notes(&"x".repeat(501)).is_err());
        loan.add_notes("Reader asked for an extension").unwrap();
        assert_eq!(
            loan.notes.as_deref(),
            Some("Reader asked for an extension")
        );
    }

    #[test]
    fn overdue_loan_accrues_a_daily_fine() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.due_date = DateTime::from_chrono(Utc::now() - Duration::days(5));
        assert!(loan.is_overdue());
        assert_eq!(loan.days_overdue(), 5);
        assert_eq!(loan.days_remaining(), 0);
        assert_eq!(loan.fine(Decimal::new(200, 2)), Decimal::new(1000, 2));
    }

    #[test]
    fn loan_within_period_has_no_fine() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.due_date = DateTime::from_chrono(Utc::now() + Duration::days(3));
        assert!(!loan.is_overdue());
        assert_eq!(loan.days_overdue(), 0);
        assert_eq!(loan.days_remaining(), 3);
        assert_eq!(loan.fine(Decimal::new(200, 2)), Decimal::ZERO);
    }

    #[test]
    fn returned_loan_stops_accruing() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.due_date = DateTime::from_chrono(Utc::now() - Duration::days(3));
        loan.give_back(None).unwrap();
        assert!(!loan.is_overdue());
        assert_eq!(loan.fine(Decimal::new(200, 2)), Decimal::ZERO);
    }

    #[test]
    fn checks_both_parties_when_opening() {
        let user = sample_user(3);
        let book = sample_book();
        assert!(Loan::new(&user, &book, 14).is_ok());

        let mut inactive = sample_user(3);
        inactive.deactivate().unwrap();
        let err = Loan::new(&inactive, &book, 14).unwrap_err();
        assert!(err.to_string().contains("Inactive users"));

        let mut unavailable = sample_book();
        unavailable.mark_unavailable().unwrap();
        let err = Loan::new(&user, &unavailable, 14).unwrap_err();
        assert!(err.to_string().contains("not available for loan"));
    }

    #[test]
    fn limit_frees_up_after_return() {
        let mut user = sample_user(1);
        let mut book = sample_book();

        let loan = Loan::new(&user, &book, 14).unwrap();
        user.add_loan(loan.clone()).unwrap();
        book.add_loan(loan).unwrap();

        assert!(!user.can_borrow());
        assert!(!book.is_loanable());
        let err = Loan::new(&user, &book, 14).unwrap_err();
        assert!(err.to_string().contains("loan limit"));

        user.loans[0].give_back(None).unwrap();
        book.loans[0].give_back(None).unwrap();
        assert!(user.can_borrow());
        assert!(book.is_loanable());
        assert!(Loan::new(&user, &book, 14).is_ok());
    }
}
