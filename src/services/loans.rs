//! Loan management service

use uuid::Uuid;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::loan::{
        AddNotes, CreateLoan, Loan, LoanQuery, LoanResponse, LoanSummary, RenewLoan, ReturnLoan,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    lending: LendingConfig,
}

impl LoansService {
    pub fn new(repository: Repository, lending: LendingConfig) -> Self {
        Self {
            repository,
            lending,
        }
    }

    /// Open a loan (borrow a book).
    ///
    /// The loan is written to its own collection first, where the partial
    /// unique index rejects a concurrent borrow of the same book. The user
    /// and book documents are then updated with their embedded copies.
    pub async fn create_loan(&self, request: CreateLoan) -> AppResult<LoanResponse> {
        let mut user = self
            .repository
            .users
            .find_by_id(request.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", request.user_id)))?;
        let mut book = self
            .repository
            .books
            .find_by_id(request.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", request.book_id)))?;
        if self
            .repository
            .loans
            .find_active_for_book(book.id)
            .await?
            .is_some()
        {
            return Err(AppError::BusinessRule(
                "Book already has an active loan".to_string(),
            ));
        }

        let days = request.days.unwrap_or(self.lending.default_loan_days);
        let loan = Loan::new(&user, &book, days)?;
        user.add_loan(loan.clone())?;
        book.add_loan(loan.clone())?;

        self.repository.loans.insert(&loan).await?;
        self.repository.users.update(&user).await?;
        self.repository.books.update(&book).await?;

        tracing::info!(
            "Loan {} opened: user {} borrowed book {}",
            loan.id,
            user.id,
            book.id
        );
        Ok(LoanResponse::with_parties(
            &loan,
            Some(user.name),
            Some(book.title),
            self.lending.daily_fine_rate,
        ))
    }

    /// Get a loan by ID with the parties' names
    pub async fn get_loan(&self, id: Uuid) -> AppResult<LoanResponse> {
        let loan = self.require_loan(id).await?;
        self.hydrate(loan).await
    }

    /// List loans with filters and pagination
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanSummary>, u64)> {
        let (loans, total) = self.repository.loans.search(query).await?;
        Ok((loans.iter().map(LoanSummary::from).collect(), total))
    }

    /// Renew a loan once, extending its due date
    pub async fn renew_loan(&self, id: Uuid, request: RenewLoan) -> AppResult<LoanResponse> {
        let mut loan = self.require_loan(id).await?;
        let extra_days = request
            .extra_days
            .unwrap_or(self.lending.default_renewal_days);
        loan.renew(extra_days)?;
        self.persist(&loan).await?;
        tracing::info!("Loan {} renewed for {} more days", id, extra_days);
        self.hydrate(loan).await
    }

    /// Return a borrowed book
    pub async fn return_loan(&self, id: Uuid, request: ReturnLoan) -> AppResult<LoanResponse> {
        let mut loan = self.require_loan(id).await?;
        loan.give_back(request.notes)?;
        self.persist(&loan).await?;
        tracing::info!("Loan {} returned", id);
        self.hydrate(loan).await
    }

    /// Attach notes to a loan
    pub async fn add_notes(&self, id: Uuid, request: AddNotes) -> AppResult<LoanResponse> {
        let mut loan = self.require_loan(id).await?;
        loan.add_notes(&request.notes)?;
        self.persist(&loan).await?;
        self.hydrate(loan).await
    }

    /// Write a changed loan back, keeping the embedded copies on the user
    /// and book documents in step.
    async fn persist(&self, loan: &Loan) -> AppResult<()> {
        self.repository.loans.update(loan).await?;
        self.repository.users.sync_loan(loan.user_id, loan).await?;
        self.repository.books.sync_loan(loan.book_id, loan).await?;
        Ok(())
    }

    async fn hydrate(&self, loan: Loan) -> AppResult<LoanResponse> {
        let user_name = self
            .repository
            .users
            .find_by_id(loan.user_id)
            .await?
            .map(|user| user.name);
        let book_title = self
            .repository
            .books
            .find_by_id(loan.book_id)
            .await?
            .map(|book| book.title);
        Ok(LoanResponse::with_parties(
            &loan,
            user_name,
            book_title,
            self.lending.daily_fine_rate,
        ))
    }

    async fn require_loan(&self, id: Uuid) -> AppResult<Loan> {
        self.repository
            .loans
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{book::Book, email::Email, isbn::Isbn, user::User};
    use crate::repository::{
        books::MockBookRepository, loans::MockLoanRepository, users::MockUserRepository,
    };
    use chrono::NaiveDate;

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

    fn service(
        users: MockUserRepository,
        books: MockBookRepository,
        loans: MockLoanRepository,
    ) -> LoansService {
        LoansService::new(
            Repository::with_mocks(users, books, loans),
            LendingConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_loan_persists_loan_and_both_parties() {
        let user = sample_user(3);
        let book = sample_book();
        let user_id = user.id;
        let book_id = book.id;

        let mut users = MockUserRepository::new();
        {
            let user = user.clone();
            users
                .expect_find_by_id()
                .returning(move |_| Ok(Some(user.clone())));
        }
        users
            .expect_update()
            .withf(|user| user.active_loan_count() == 1)
            .times(1)
            .returning(|_| Ok(()));

        let mut books = MockBookRepository::new();
        {
            let book = book.clone();
            books
                .expect_find_by_id()
                .returning(move |_| Ok(Some(book.clone())));
        }
        books
            .expect_update()
            .withf(|book| book.is_on_loan())
            .times(1)
            .returning(|_| Ok(()));

        let mut loans = MockLoanRepository::new();
        loans.expect_find_active_for_book().returning(|_| Ok(None));
        loans
            .expect_insert()
            .withf(move |loan| {
                loan.user_id == user_id && loan.book_id == book_id && loan.is_active()
            })
            .times(1)
            .returning(|_| Ok(()));

        let response = service(users, books, loans)
            .create_loan(CreateLoan {
                user_id,
                book_id,
                days: None,
            })
            .await
            .unwrap();
        assert!(response.active);
        assert!(!response.renewed);
        assert_eq!(response.user_name.as_deref(), Some("Ana Souza"));
        assert_eq!(response.book_title.as_deref(), Some("Refactoring"));
        assert_eq!((response.due_date - response.loan_date).num_days(), 14);
    }

    #[tokio::test]
    async fn book_with_an_active_loan_cannot_be_borrowed_again() {
        let user = sample_user(3);
        let book = sample_book();
        let user_id = user.id;
        let book_id = book.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_update().times(0);

        let mut books = MockBookRepository::new();
        books
            .expect_find_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        books.expect_update().times(0);

        let mut loans = MockLoanRepository::new();
        loans
            .expect_find_active_for_book()
            .returning(move |_| Ok(Some(Loan::with_ids(Uuid::new_v4(), book_id, 14).unwrap())));
        loans.expect_insert().times(0);

        let err = service(users, books, loans)
            .create_loan(CreateLoan {
                user_id,
                book_id,
                days: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn user_at_the_limit_cannot_borrow() {
        let mut user = sample_user(1);
        let existing = Loan::with_ids(user.id, Uuid::new_v4(), 14).unwrap();
        user.add_loan(existing).unwrap();
        let book = sample_book();
        let user_id = user.id;
        let book_id = book.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_update().times(0);

        let mut books = MockBookRepository::new();
        books
            .expect_find_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        books.expect_update().times(0);

        let mut loans = MockLoanRepository::new();
        loans.expect_find_active_for_book().returning(|_| Ok(None));
        loans.expect_insert().times(0);

        let err = service(users, books, loans)
            .create_loan(CreateLoan {
                user_id,
                book_id,
                days: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn renew_updates_the_loan_and_both_embedded_copies() {
        let user = sample_user(3);
        let book = sample_book();
        let user_id = user.id;
        let book_id = book.id;
        let loan = Loan::with_ids(user_id, book_id, 14).unwrap();
        let loan_id = loan.id;

        let mut loans = MockLoanRepository::new();
        {
            let loan = loan.clone();
            loans
                .expect_find_by_id()
                .returning(move |_| Ok(Some(loan.clone())));
        }
        loans
            .expect_update()
            .withf(|loan| loan.renewed && loan.renewal_days == 7)
            .times(1)
            .returning(|_| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_sync_loan()
            .withf(move |id, loan| *id == user_id && loan.renewed)
            .times(1)
            .returning(|_, _| Ok(()));
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let mut books = MockBookRepository::new();
        books
            .expect_sync_loan()
            .withf(move |id, loan| *id == book_id && loan.renewed)
            .times(1)
            .returning(|_, _| Ok(()));
        books
            .expect_find_by_id()
            .returning(move |_| Ok(Some(book.clone())));

        let response = service(users, books, loans)
            .renew_loan(
                loan_id,
                RenewLoan {
                    extra_days: Some(7),
                },
            )
            .await
            .unwrap();
        assert!(response.renewed);
        assert_eq!(response.renewal_days, 7);
        assert_eq!((response.due_date - response.loan_date).num_days(), 21);
    }

    #[tokio::test]
    async fn returning_twice_is_refused() {
        let mut loan = Loan::with_ids(Uuid::new_v4(), Uuid::new_v4(), 14).unwrap();
        loan.give_back(None).unwrap();
        let loan_id = loan.id;

        let mut loans = MockLoanRepository::new();
        loans
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loan.clone())));
        loans.expect_update().times(0);

        let err = service(
            MockUserRepository::new(),
            MockBookRepository::new(),
            loans,
        )
        .return_loan(loan_id, ReturnLoan { notes: None })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn missing_loan_maps_to_not_found() {
        let mut loans = MockLoanRepository::new();
        loans.expect_find_by_id().returning(|_| Ok(None));

        let err = service(
            MockUserRepository::new(),
            MockBookRepository::new(),
            loans,
        )
        .get_loan(Uuid::new_v4())
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
