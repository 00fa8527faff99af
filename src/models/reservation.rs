//! Reservation model and queue states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

/// Reservation model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }
}

/// Create reservation request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    pub book_id: Uuid,
    /// Staff may reserve on behalf of another user; regular users
    /// may only reserve for themselves.
    pub user_id: Option<Uuid>,
}

/// Reservation list query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct ReservationQuery {
    pub book_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<ReservationStatus>,
}

/// Reservation for API responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            book_id: r.book_id,
            user_id: r.user_id,
            created_at: r.created_at,
            status: r.status,
            fulfilled_at: r.fulfilled_at,
            cancelled_at: r.cancelled_at,
        }
    }
}
