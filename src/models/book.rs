//! Book model and related types

use chrono::{Datelike, Months, NaiveDate, Utc};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{isbn::Isbn, loan::Loan};

const MAX_TITLE_CHARS: usize = 200;
const MIN_AUTHOR_CHARS: usize = 2;
const MAX_AUTHOR_CHARS: usize = 100;
const MAX_PUBLISHER_CHARS: usize = 100;
const MIN_PAGES: i32 = 1;
const MAX_PAGES: i32 = 10_000;
const MAX_GENRE_CHARS: usize = 50;
const MIN_PUBLICATION_YEAR: i32 = 1450;

/// Window in months within which a publication counts as a recent release.
pub const RECENT_RELEASE_MONTHS: u32 = 12;

/// A book in the catalog.
///
/// The full lending history is embedded in the document. At most one of the
/// embedded loans is active at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: Isbn,
    pub publication_date: NaiveDate,
    pub publisher: String,
    pub pages: i32,
    pub genre: String,
    pub description: Option<String>,
    pub available: bool,
    #[serde(default)]
    pub loans: Vec<Loan>,
    pub created_at: DateTime,
    pub updated_at: Option<DateTime>,
}

impl Book {
    /// Catalog a book. Text fields are stored trimmed and the book starts
    /// available with no lending history.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: &str,
        author: &str,
        isbn: Isbn,
        publication_date: NaiveDate,
        publisher: &str,
        pages: i32,
        genre: &str,
        description: Option<String>,
    ) -> AppResult<Self> {
        Self::validate_title(title)?;
        Self::validate_author(author)?;
        Self::validate_publication_date(publication_date)?;
        Self::validate_publisher(publisher)?;
        Self::validate_pages(pages)?;
        Self::validate_genre(genre)?;
        Ok(Self {
            id: Uuid::new_v4(),
            title: title.trim().to_string(),
            author: author.trim().to_string(),
            isbn,
            publication_date,
            publisher: publisher.trim().to_string(),
            pages,
            genre: genre.trim().to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            available: true,
            loans: Vec::new(),
            created_at: DateTime::now(),
            updated_at: None,
        })
    }

    pub fn change_title(&mut self, title: &str) -> AppResult<()> {
        Self::validate_title(title)?;
        self.title = title.trim().to_string();
        self.touch();
        Ok(())
    }

    pub fn change_author(&mut self, author: &str) -> AppResult<()> {
        Self::validate_author(author)?;
        self.author = author.trim().to_string();
        self.touch();
        Ok(())
    }

    pub fn change_genre(&mut self, genre: &str) -> AppResult<()> {
        Self::validate_genre(genre)?;
        self.genre = genre.trim().to_string();
        self.touch();
        Ok(())
    }

    pub fn change_description(&mut self, description: Option<String>) {
        self.description = description.filter(|d| !d.trim().is_empty());
        self.touch();
    }

    pub fn mark_available(&mut self) {
        self.available = true;
        self.touch();
    }

    /// Withdraw the book from lending. Refused while it is out on loan.
    pub fn mark_unavailable(&mut self) -> AppResult<()> {
        if self.is_on_loan() {
            return Err(AppError::BusinessRule(
                "Cannot mark a borrowed book as unavailable".to_string(),
            ));
        }
        self.available = false;
        self.touch();
        Ok(())
    }

    pub fn is_loanable(&self) -> bool {
        self.available && !self.is_on_loan()
    }

    pub fn is_on_loan(&self) -> bool {
        self.active_loan().is_some()
    }

    pub fn active_loan(&self) -> Option<&Loan> {
        self.loans.iter().find(|loan| loan.is_active())
    }

    /// Record a new loan of this book.
    pub fn add_loan(&mut self, loan: Loan) -> AppResult<()> {
        if !self.is_loanable() {
            return Err(AppError::BusinessRule(
                "Book is not available for loan".to_string(),
            ));
        }
        self.loans.push(loan);
        self.touch();
        Ok(())
    }

    pub fn total_loans(&self) -> usize {
        self.loans.len()
    }

    pub fn last_loan_date(&self) -> Option<DateTime> {
        self.loans.iter().map(|loan| loan.loan_date).max()
    }

    pub fn age_in_years(&self) -> i32 {
        Utc::now().year() - self.publication_date.year()
    }

    pub fn is_recent_release(&self, months: u32) -> bool {
        match Utc::now().date_naive().checked_sub_months(Months::new(months)) {
            Some(cutoff) => self.publication_date >= cutoff,
            None => true,
        }
    }

    fn validate_title(title: &str) -> AppResult<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if trimmed.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::Validation(
                "Title cannot exceed 200 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_author(author: &str) -> AppResult<()> {
        let trimmed = author.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Author is required".to_string()));
        }
        if trimmed.chars().count() < MIN_AUTHOR_CHARS {
            return Err(AppError::Validation(
                "Author must be at least 2 characters".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_AUTHOR_CHARS {
            return Err(AppError::Validation(
                "Author cannot exceed 100 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_publication_date(date: NaiveDate) -> AppResult<()> {
        if date > Utc::now().date_naive() {
            return Err(AppError::Validation(
                "Publication date cannot be in the future".to_string(),
            ));
        }
        if date.year() < MIN_PUBLICATION_YEAR {
            return Err(AppError::Validation(
                "Publication date cannot be before 1450".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_publisher(publisher: &str) -> AppResult<()> {
        let trimmed = publisher.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Publisher is required".to_string()));
        }
        if trimmed.chars().count() > MAX_PUBLISHER_CHARS {
            return Err(AppError::Validation(
                "Publisher cannot exceed 100 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_pages(pages: i32) -> AppResult<()> {
        if pages < MIN_PAGES {
            return Err(AppError::Validation(
                "Page count must be at least 1".to_string(),
            ));
        }
        if pages > MAX_PAGES {
            return Err(AppError::Validation(
                "Page count cannot exceed 10000".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_genre(genre: &str) -> AppResult<()> {
        let trimmed = genre.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Genre is required".to_string()));
        }
        if trimmed.chars().count() > MAX_GENRE_CHARS {
            return Err(AppError::Validation(
                "Genre cannot exceed 50 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 2, max = 100, message = "Author must be between 2 and 100 characters"))]
    pub author: String,
    /// ISBN-10 or ISBN-13, with or without separators.
    pub isbn: String,
    pub publication_date: NaiveDate,
    #[validate(length(min = 1, max = 100, message = "Publisher must be between 1 and 100 characters"))]
    pub publisher: String,
    #[validate(range(min = 1, max = 10000, message = "Page count must be between 1 and 10000"))]
    pub pages: i32,
    #[validate(length(min = 1, max = 50, message = "Genre must be between 1 and 50 characters"))]
    pub genre: String,
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
}

/// Update book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 2, max = 100, message = "Author must be between 2 and 100 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Genre must be between 1 and 50 characters"))]
    pub genre: Option<String>,
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive substring match on the title.
    pub title: Option<String>,
    /// Case-insensitive substring match on the author.
    pub author: Option<String>,
    /// Case-insensitive substring match on the genre.
    pub genre: Option<String>,
    pub available: Option<bool>,
    /// Only books published within the last twelve months.
    pub recent: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Full book representation returned by the API
#[derive(Debug, Serialize, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_date: NaiveDate,
    pub publisher: String,
    pub pages: i32,
    pub genre: String,
    pub description: Option<String>,
    pub available: bool,
    pub on_loan: bool,
    pub total_loans: i64,
    pub last_loan_date: Option<chrono::DateTime<Utc>>,
    pub recent_release: bool,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: Option<chrono::DateTime<Utc>>,
}

impl From<&Book> for BookResponse {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.as_str().to_string(),
            publication_date: book.publication_date,
            publisher: book.publisher.clone(),
            pages: book.pages,
            genre: book.genre.clone(),
            description: book.description.clone(),
            available: book.available,
            on_loan: book.is_on_loan(),
            total_loans: book.total_loans() as i64,
            last_loan_date: book.last_loan_date().map(|d| d.to_chrono()),
            recent_release: book.is_recent_release(RECENT_RELEASE_MONTHS),
            created_at: book.created_at.to_chrono(),
            updated_at: book.updated_at.map(|d| d.to_chrono()),
        }
    }
}

/// Short book representation for lists
#[derive(Debug, Serialize, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: String,
    pub available: bool,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.as_str().to_string(),
            genre: book.genre.clone(),
            available: book.available,
        }
    }
}
