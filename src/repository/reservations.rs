//! Reservations repository; owns the FIFO queue per book.
//!
//! The next-in-line reservation is always selected fresh by minimum
//! `created_at` at the instant of fulfillment, never cached.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::reservation::{Reservation, ReservationQuery},
};

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get reservation by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    /// Insert a pending reservation. A concurrent duplicate loses to
    /// the partial unique index and comes back as a Conflict.
    pub async fn create(&self, book_id: Uuid, user_id: Uuid) -> AppResult<Reservation> {
        let created = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (book_id, user_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db)
                if db.constraint() == Some("reservations_one_pending_idx") =>
            {
                AppError::Conflict("Pending reservation already exists".to_string())
            }
            e => AppError::Database(e),
        })?;

        Ok(created)
    }

    /// The earliest pending reservation for a book, if any
    pub async fn next_pending(&self, book_id: Uuid) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE book_id = $1 AND status = 'pending'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    /// Whether the user already holds a pending reservation for the book
    pub async fn has_pending_for_user(&self, book_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE book_id = $1 AND user_id = $2 AND status = 'pending'
            )
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Whether the head of the queue belongs to someone other than
    /// `user_id`. Only the first in line blocks a direct borrow.
    pub async fn has_pending_for_other_user(&self, book_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .next_pending(book_id)
            .await?
            .map(|r| r.user_id != user_id)
            .unwrap_or(false))
    }

    /// The user's own pending reservation for the book, if any
    pub async fn find_pending_for_user(
        &self,
        book_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE book_id = $1 AND user_id = $2 AND status = 'pending'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    /// Move a pending reservation to fulfilled. Returns false when the
    /// row is no longer pending (raced with a cancel or another
    /// fulfillment).
    pub async fn mark_fulfilled(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'fulfilled', fulfilled_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Compensation path: put a just-fulfilled reservation back in the
    /// queue with its original created_at, so FIFO order is preserved.
    pub async fn reopen(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE reservations SET status = 'pending', fulfilled_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Move a pending reservation to cancelled. Returns false when it
    /// was not pending anymore.
    pub async fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled', cancelled_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel every pending reservation for a book (book deletion path)
    pub async fn cancel_all_pending_for_book(&self, book_id: Uuid, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled', cancelled_at = $2
            WHERE book_id = $1 AND status = 'pending'
            "#,
        )
        .bind(book_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// List reservations with optional filters, newest first
    pub async fn list(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.book_id.is_some() {
            conditions.push(format!("book_id = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("user_id = ${}", idx));
            idx += 1;
        }
        if query.status.is_some() {
            conditions.push(format!("status = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let select_q = format!(
            "SELECT * FROM reservations {} ORDER BY created_at DESC",
            where_clause
        );

        let mut builder = sqlx::query_as::<_, Reservation>(&select_q);
        if let Some(book_id) = query.book_id {
            builder = builder.bind(book_id);
        }
        if let Some(user_id) = query.user_id {
            builder = builder.bind(user_id);
        }
        if let Some(status) = query.status {
            builder = builder.bind(status);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(rows)
    }
}
