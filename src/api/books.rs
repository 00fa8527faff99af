//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{BookQuery, BookResponse, CreateBook, UpdateBook},
    repository::books::StockRequest,
};

use super::AuthenticatedUser;

/// Paginated book list
#[derive(Serialize, ToSchema)]
pub struct BookListResponse {
    pub items: Vec<BookResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Explicit availability change request; exactly one of the two
/// fields is honored, `available_copies` taking precedence.
#[derive(Deserialize, ToSchema)]
pub struct ChangeAvailabilityRequest {
    pub available_copies: Option<i32>,
    pub available: Option<bool>,
}

/// Availability change result
#[derive(Serialize, ToSchema)]
pub struct ChangeAvailabilityResponse {
    pub book: BookResponse,
    /// Reservations auto-fulfilled by the freed copies
    pub fulfilled_reservations: u32,
}

/// List books with filters
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Books", body = BookListResponse)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_actor): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    let (books, total) = state.services.catalog.list_books(&query).await?;

    Ok(Json(BookListResponse {
        items: books.into_iter().map(BookResponse::from).collect(),
        total,
        page,
        page_size,
    }))
}

/// Get a single book
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book", body = BookResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book.into()))
}

/// Create a book (staff only)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Not staff")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Json(request): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    let book = state.services.catalog.create_book(request, actor).await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

/// Update a book (staff only)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Stock conflicts with active loans")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBook>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.catalog.update_book(id, request, actor).await?;
    Ok(Json(book.into()))
}

/// Delete a book (admin only)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book has active loans")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change a book's availability (staff only); freed copies are
/// offered to the reservation queue
#[utoipa::path(
    put,
    path = "/books/{id}/availability",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = ChangeAvailabilityRequest,
    responses(
        (status = 200, description = "Availability changed", body = ChangeAvailabilityResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Requested availability conflicts with active loans")
    )
)]
pub async fn change_availability(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ChangeAvailabilityRequest>,
) -> AppResult<Json<ChangeAvailabilityResponse>> {
    let stock_request = if let Some(copies) = request.available_copies {
        StockRequest::Copies(copies)
    } else if let Some(flag) = request.available {
        StockRequest::Available(flag)
    } else {
        return Err(AppError::BadRequest(
            "available_copies or available required".to_string(),
        ));
    };

    let (book, fulfilled) = state
        .services
        .circulation
        .change_book_availability(id, stock_request, actor)
        .await?;

    Ok(Json(ChangeAvailabilityResponse {
        book: book.into(),
        fulfilled_reservations: fulfilled,
    }))
}
