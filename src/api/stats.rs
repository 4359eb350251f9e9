//! Statistics endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppResult;

/// Library-wide statistics response
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    /// User statistics
    pub users: UserTotals,
    /// Book statistics
    pub books: BookTotals,
    /// Loan statistics
    pub loans: LoanTotals,
}

#[derive(Serialize, ToSchema)]
pub struct UserTotals {
    /// Total number of registered users
    pub total: i64,
    /// Users currently allowed to borrow
    pub active: i64,
}

#[derive(Serialize, ToSchema)]
pub struct BookTotals {
    /// Total number of cataloged books
    pub total: i64,
    /// Books available for loan
    pub available: i64,
    /// Books currently out on loan
    pub on_loan: i64,
}

#[derive(Serialize, ToSchema)]
pub struct LoanTotals {
    /// Total number of loans ever recorded
    pub total: i64,
    /// Loans not yet returned
    pub active: i64,
    /// Active loans past their due date
    pub overdue: i64,
}

/// Get library statistics
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Library statistics", body = StatsResponse)
    )
)]
pub async fn get_stats(State(state): State<crate::AppState>) -> AppResult<Json<StatsResponse>> {
    let stats = state.services.stats.overview().await?;
    Ok(Json(stats))
}
