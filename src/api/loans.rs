//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::{AddNotes, CreateLoan, LoanQuery, RenewLoan, ReturnLoan},
        LoanResponse, LoanSummary,
    },
};

use super::books::PaginatedResponse;

/// List loans with filters and pagination
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "List of loans", body = PaginatedResponse<LoanSummary>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanSummary>>> {
    let (loans, total) = state.services.loans.list_loans(&query).await?;

    Ok(Json(PaginatedResponse {
        items: loans,
        total: total as i64,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }))
}

/// Open a new loan (borrow a book)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "Book already borrowed, user inactive or at loan limit")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    request.validate()?;

    let loan = state.services.loans.create_loan(request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanResponse),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    request_body = RenewLoan,
    responses(
        (status = 200, description = "Loan renewed", body = LoanResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already renewed, returned or overdue")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RenewLoan>,
) -> AppResult<Json<LoanResponse>> {
    request.validate()?;

    let loan = state.services.loans.renew_loan(id, request).await?;
    Ok(Json(loan))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    request_body = ReturnLoan,
    responses(
        (status = 200, description = "Book returned", body = LoanResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReturnLoan>,
) -> AppResult<Json<LoanResponse>> {
    request.validate()?;

    let loan = state.services.loans.return_loan(id, request).await?;
    Ok(Json(loan))
}

/// Replace the notes on a loan
#[utoipa::path(
    put,
    path = "/loans/{id}/notes",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    request_body = AddNotes,
    responses(
        (status = 200, description = "Notes updated", body = LoanResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn add_notes(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddNotes>,
) -> AppResult<Json<LoanResponse>> {
    request.validate()?;

    let loan = state.services.loans.add_notes(id, request).await?;
    Ok(Json(loan))
}

/// Get the loan history for a user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's loans", body = Vec<LoanSummary>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<LoanSummary>>> {
    let loans = state.services.users.get_user_loans(user_id).await?;
    Ok(Json(loans))
}

/// Get the loan history for a book
#[utoipa::path(
    get,
    path = "/books/{id}/loans",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book's loans", body = Vec<LoanSummary>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_loans(
    State(state): State<crate::AppState>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Vec<LoanSummary>>> {
    let loans = state.services.books.get_book_loans(book_id).await?;
    Ok(Json(loans))
}
