//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, NewLoan},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Insert a new loan; the matching stock decrement has already
    /// happened when this runs.
    pub async fn create(&self, loan: &NewLoan, now: DateTime<Utc>) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, user_id, loan_date, return_date, extension_count, source)
            VALUES ($1, $2, $3, $4, 0, $5)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.user_id)
        .bind(now)
        .bind(loan.return_date)
        .bind(loan.source)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Set `returned_at`, only if the loan is still out. Returns false
    /// when another request already returned it.
    pub async fn mark_returned(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE loans SET returned_at = $2 WHERE id = $1 AND returned_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Push the due date out by `days` and bump the extension count.
    /// The WHERE clause re-checks every extension precondition so a
    /// racing return or extension resolves to None instead of a
    /// double-apply.
    pub async fn extend(
        &self,
        id: Uuid,
        days: i32,
        max_extensions: i16,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Loan>> {
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET return_date = return_date + make_interval(days => $2),
                extension_count = extension_count + 1
            WHERE id = $1
              AND returned_at IS NULL
              AND extension_count < $3
              AND return_date >= $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(days)
        .bind(max_extensions)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Compensation path: undo a `mark_returned` whose follow-up steps
    /// could not complete.
    pub async fn clear_returned(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE loans SET returned_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hard delete a loan record
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }

    /// Count loans still out for a book
    pub async fn count_active_for_book(&self, book_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// List all loans, newest first
    pub async fn list(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans ORDER BY loan_date DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// List a user's loans; `active_only` drops returned ones
    pub async fn list_for_user(&self, user_id: Uuid, active_only: bool) -> AppResult<Vec<Loan>> {
        let query = if active_only {
            "SELECT * FROM loans WHERE user_id = $1 AND returned_at IS NULL ORDER BY return_date"
        } else {
            "SELECT * FROM loans WHERE user_id = $1 ORDER BY loan_date DESC"
        };

        let loans = sqlx::query_as::<_, Loan>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// List loans past their due date and not yet returned, most
    /// overdue first
    pub async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE returned_at IS NULL AND return_date < $1 ORDER BY return_date",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }
}
