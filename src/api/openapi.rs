//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, stats, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library Lending System REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "Libris Team", email = "contact@libris.org")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::activate_user,
        users::deactivate_user,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::mark_available,
        books::mark_unavailable,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::create_loan,
        loans::renew_loan,
        loans::return_loan,
        loans::add_notes,
        loans::get_user_loans,
        loans::get_book_loans,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Users
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            crate::models::user::UserQuery,
            crate::models::user::UserResponse,
            crate::models::user::UserSummary,
            // Books
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::BookQuery,
            crate::models::book::BookResponse,
            crate::models::book::BookSummary,
            // Loans
            crate::models::loan::CreateLoan,
            crate::models::loan::RenewLoan,
            crate::models::loan::ReturnLoan,
            crate::models::loan::AddNotes,
            crate::models::loan::LoanQuery,
            crate::models::loan::LoanStatusFilter,
            crate::models::loan::LoanResponse,
            crate::models::loan::LoanSummary,
            // Stats
            stats::StatsResponse,
            stats::UserTotals,
            stats::BookTotals,
            stats::LoanTotals,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User management"),
        (name = "books", description = "Book catalog management"),
        (name = "loans", description = "Loan management"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
