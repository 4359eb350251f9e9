//! Statistics service

use crate::{
    api::stats::{BookTotals, LoanTotals, StatsResponse, UserTotals},
    error::AppResult,
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Library-wide counters for users, books and loans
    pub async fn overview(&self) -> AppResult<StatsResponse> {
        let users = UserTotals {
            total: self.repository.users.count_total().await? as i64,
            active: self.repository.users.count_active().await? as i64,
        };
        let books = BookTotals {
            total: self.repository.books.count_total().await? as i64,
            available: self.repository.books.count_available().await? as i64,
            on_loan: self.repository.books.count_on_loan().await? as i64,
        };
        let loans = LoanTotals {
            total: self.repository.loans.count_total().await? as i64,
            active: self.repository.loans.count_active().await? as i64,
            overdue: self.repository.loans.count_overdue().await? as i64,
        };
        Ok(StatsResponse {
            users,
            books,
            loans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        books::MockBookRepository, loans::MockLoanRepository, users::MockUserRepository,
    };

    #[tokio::test]
    async fn overview_collects_counts_from_all_collections() {
        let mut users = MockUserRepository::new();
        users.expect_count_total().returning(|| Ok(12));
        users.expect_count_active().returning(|| Ok(9));

        let mut books = MockBookRepository::new();
        books.expect_count_total().returning(|| Ok(40));
        books.expect_count_available().returning(|| Ok(35));
        books.expect_count_on_loan().returning(|| Ok(5));

        let mut loans = MockLoanRepository::new();
        loans.expect_count_total().returning(|| Ok(70));
        loans.expect_count_active().returning(|| Ok(5));
        loans.expect_count_overdue().returning(|| Ok(2));

        let service = StatsService::new(Repository::with_mocks(users, books, loans));
        let stats = service.overview().await.unwrap();
        assert_eq!(stats.users.total, 12);
        assert_eq!(stats.users.active, 9);
        assert_eq!(stats.books.total, 40);
        assert_eq!(stats.books.available, 35);
        assert_eq!(stats.books.on_loan, 5);
        assert_eq!(stats.loans.total, 70);
        assert_eq!(stats.loans.active, 5);
        assert_eq!(stats.loans.overdue, 2);
    }
}
