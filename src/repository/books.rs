//! Books repository; owns the stock arithmetic.
//!
//! `available_copies` is only ever written through the conditional
//! updates below, so two concurrent borrowers can never both win the
//! last copy: the loser's UPDATE matches zero rows.

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, BookStock, CreateBook},
};

/// Staff request for an explicit availability change
#[derive(Debug, Clone, Copy)]
pub enum StockRequest {
    /// Set `available_copies` to an exact value
    Copies(i32),
    /// `true` frees every copy not out on loan; `false` zeroes availability
    Available(bool),
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Create a book with pre-normalized stock
    pub async fn create(&self, book: &CreateBook, stock: BookStock) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, genre, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(stock.total_copies)
        .bind(stock.available_copies)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// List books with optional filters and pagination
    pub async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * page_size;

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.q.is_some() {
            conditions.push(format!(
                "(title ILIKE ${i} OR author ILIKE ${i} OR genre ILIKE ${i})",
                i = idx
            ));
            idx += 1;
        }
        if query.genre.is_some() {
            conditions.push(format!("genre ILIKE ${}", idx));
        }
        if query.available_only.unwrap_or(false) {
            conditions.push("available_copies > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let pattern = query.q.as_ref().map(|q| format!("%{}%", q.trim()));

        let count_q = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(ref p) = pattern {
            count_builder = count_builder.bind(p);
        }
        if let Some(ref g) = query.genre {
            count_builder = count_builder.bind(g);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT * FROM books {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            where_clause, page_size, offset
        );
        let mut builder = sqlx::query_as::<_, Book>(&select_q);
        if let Some(ref p) = pattern {
            builder = builder.bind(p);
        }
        if let Some(ref g) = query.genre {
            builder = builder.bind(g);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    /// Update bibliographic fields; untouched fields keep their value
    pub async fn update_details(
        &self,
        id: Uuid,
        title: Option<&str>,
        author: Option<&str>,
        genre: Option<&str>,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = COALESCE($2, title),
                author = COALESCE($3, author),
                genre = COALESCE($4, genre),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(author)
        .bind(genre)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Overwrite both stock counters (catalog update path; the caller
    /// has already reconciled the values against active loans)
    pub async fn set_stock(&self, id: Uuid, total_copies: i32, available_copies: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET total_copies = $2, available_copies = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(total_copies)
        .bind(available_copies)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Take one copy, only if one is free. Returns false when no copy
    /// was available; a single conditional UPDATE, not a read-then-write.
    pub async fn decrement_available(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = $2
            WHERE id = $1 AND available_copies > 0
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Give one copy back. The new value is recomputed against the live
    /// active-loan count rather than blindly incremented, so it can never
    /// exceed `total_copies` minus copies still out on loan (total copies
    /// may have shrunk out of band).
    pub async fn increment_available(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books
            SET available_copies = GREATEST(
                    available_copies,
                    LEAST(
                        available_copies + 1,
                        total_copies - (
                            SELECT COUNT(*)::int FROM loans
                            WHERE loans.book_id = books.id AND loans.returned_at IS NULL
                        )
                    )
                ),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Staff recompute of availability. `max_available` is what is not
    /// currently out on loan; requests beyond it are refused.
    pub async fn set_explicit_availability(
        &self,
        id: Uuid,
        request: StockRequest,
        active_loan_count: i64,
    ) -> AppResult<Book> {
        let book = self.get_by_id(id).await?;

        let max_available = book.total_copies as i64 - active_loan_count;
        if max_available < 0 {
            return Err(AppError::Conflict(format!(
                "Book stock is inconsistent with active loans ({} copies, {} active loans)",
                book.total_copies, active_loan_count
            )));
        }

        let target = match request {
            StockRequest::Copies(n) if n < 0 => {
                return Err(AppError::Validation(
                    "available_copies must not be negative".to_string(),
                ))
            }
            StockRequest::Copies(n) => {
                if n as i64 > max_available {
                    return Err(AppError::Conflict(format!(
                        "Only {} of {} copies can be made available ({} active loans)",
                        max_available, book.total_copies, active_loan_count
                    )));
                }
                n
            }
            StockRequest::Available(true) => max_available as i32,
            StockRequest::Available(false) => 0,
        };

        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = $2, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(target)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Hard delete; callers must already have rejected books with
    /// active loans
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
