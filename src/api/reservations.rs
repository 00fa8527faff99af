//! Reservation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::reservation::{
        CreateReservationRequest, ReservationQuery, ReservationResponse, ReservationStatus,
    },
};

use super::AuthenticatedUser;

/// Cancel result
#[derive(Serialize, ToSchema)]
pub struct CancelReservationResponse {
    pub message: String,
}

/// Own-reservation list query
#[derive(Deserialize, IntoParams)]
pub struct MyReservationsQuery {
    pub status: Option<ReservationStatus>,
}

/// Reserve a fully-unavailable book
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 404, description = "Book or user not found"),
        (status = 409, description = "Copies available or duplicate pending reservation")
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Json(request): Json<CreateReservationRequest>,
) -> AppResult<(StatusCode, Json<ReservationResponse>)> {
    let reservation = state
        .services
        .circulation
        .create_reservation(request.book_id, request.user_id, actor)
        .await?;

    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// Cancel a pending reservation
#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = CancelReservationResponse),
        (status = 403, description = "Not the owner or staff"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation not pending")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(reservation_id): Path<Uuid>,
) -> AppResult<Json<CancelReservationResponse>> {
    state
        .services
        .circulation
        .cancel_reservation(reservation_id, actor)
        .await?;

    Ok(Json(CancelReservationResponse {
        message: "Reservation cancelled successfully".to_string(),
    }))
}

/// List reservations (staff only)
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationQuery),
    responses(
        (status = 200, description = "Reservations", body = Vec<ReservationResponse>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<ReservationQuery>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    if !actor.is_staff() {
        return Err(AppError::Authorization(
            "Only staff can list reservations".to_string(),
        ));
    }

    let rows = state.services.circulation.list_reservations(&query).await?;
    Ok(Json(rows.into_iter().map(ReservationResponse::from).collect()))
}

/// List the caller's own reservations
#[utoipa::path(
    get,
    path = "/reservations/me",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(MyReservationsQuery),
    responses(
        (status = 200, description = "Own reservations", body = Vec<ReservationResponse>)
    )
)]
pub async fn my_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<MyReservationsQuery>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let filter = ReservationQuery {
        book_id: None,
        user_id: Some(actor.id),
        status: query.status,
    };

    let rows = state.services.circulation.list_reservations(&filter).await?;
    Ok(Json(rows.into_iter().map(ReservationResponse::from).collect()))
}
