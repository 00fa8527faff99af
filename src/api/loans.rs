//! Loan circulation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::LoanResponse,
};

use super::AuthenticatedUser;

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct CreateLoanRequest {
    /// Book to borrow
    pub book_id: Uuid,
    /// Borrower; staff may borrow on behalf of any user, defaults to
    /// the caller
    pub user_id: Option<Uuid>,
    /// Due date (must be in the future)
    pub return_date: DateTime<Utc>,
}

/// Extension request
#[derive(Deserialize, ToSchema)]
pub struct ExtendLoanRequest {
    /// Days to add to the due date; defaults to the configured
    /// extension length
    pub days: Option<i64>,
}

/// Extension result
#[derive(Serialize, ToSchema)]
pub struct ExtendLoanResponse {
    pub message: String,
    pub return_date: DateTime<Utc>,
    pub extension_count: i16,
    pub max_extensions: i16,
}

/// Return result
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub status: String,
    pub loan: LoanResponse,
}

/// User loan list query
#[derive(Deserialize, IntoParams)]
pub struct UserLoansQuery {
    /// Only loans still out
    pub active_only: Option<bool>,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Book or user not found"),
        (status = 409, description = "No copies available or reserved for another user")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Json(request): Json<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let user_id = request.user_id.unwrap_or(actor.id);

    let loan = state
        .services
        .circulation
        .borrow(request.book_id, user_id, request.return_date, actor)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse::from_loan(&loan, Utc::now())),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 403, description = "Not the borrower or staff"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<ReturnResponse>> {
    let loan = state.services.circulation.return_loan(loan_id, actor).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        loan: LoanResponse::from_loan(&loan, Utc::now()),
    }))
}

/// Extend a loan's due date
#[utoipa::path(
    post,
    path = "/loans/{id}/extend",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    request_body = ExtendLoanRequest,
    responses(
        (status = 200, description = "Loan extended", body = ExtendLoanResponse),
        (status = 400, description = "Days out of range"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Overdue, returned or extension limit reached")
    )
)]
pub async fn extend_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<ExtendLoanRequest>,
) -> AppResult<Json<ExtendLoanResponse>> {
    let loan = state
        .services
        .circulation
        .extend_loan(loan_id, request.days, actor)
        .await?;

    Ok(Json(ExtendLoanResponse {
        message: "Loan extended successfully".to_string(),
        return_date: loan.return_date,
        extension_count: loan.extension_count,
        max_extensions: state.config.circulation.max_extensions,
    }))
}

/// Delete a loan record (staff only)
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 403, description = "Not staff"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn delete_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.circulation.delete_loan(loan_id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all loans (staff only)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All loans", body = Vec<LoanResponse>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanResponse>>> {
    if !actor.is_staff() {
        return Err(AppError::Authorization(
            "Only staff can list all loans".to_string(),
        ));
    }

    let now = Utc::now();
    let loans = state.services.circulation.list_loans().await?;
    Ok(Json(
        loans.iter().map(|l| LoanResponse::from_loan(l, now)).collect(),
    ))
}

/// List overdue loans (staff only)
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanResponse>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_overdue_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanResponse>>> {
    if !actor.is_staff() {
        return Err(AppError::Authorization(
            "Only staff can list overdue loans".to_string(),
        ));
    }

    let now = Utc::now();
    let loans = state.services.circulation.list_overdue_loans(now).await?;
    Ok(Json(
        loans.iter().map(|l| LoanResponse::from_loan(l, now)).collect(),
    ))
}

/// List a user's loans; users see only their own
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID"),
        UserLoansQuery
    ),
    responses(
        (status = 200, description = "User's loans", body = Vec<LoanResponse>),
        (status = 403, description = "Not the user or staff")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Query(query): Query<UserLoansQuery>,
) -> AppResult<Json<Vec<LoanResponse>>> {
    if !actor.can_act_for(user_id) {
        return Err(AppError::Authorization(
            "Users may only list their own loans".to_string(),
        ));
    }

    let now = Utc::now();
    let loans = state
        .services
        .circulation
        .list_user_loans(user_id, query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(
        loans.iter().map(|l| LoanResponse::from_loan(l, now)).collect(),
    ))
}
