//! Catalog management service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{normalize_stock, Book, BookQuery, CreateBook, UpdateBook},
    models::user::{Actor, Role},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List books with filters and pagination
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.list(query).await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Create a book; partial stock input is canonicalized first
    pub async fn create_book(&self, book: CreateBook, actor: Actor) -> AppResult<Book> {
        if !actor.is_staff() {
            return Err(AppError::Authorization(
                "Only staff can create books".to_string(),
            ));
        }

        book.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let stock = normalize_stock(book.total_copies, book.available_copies, book.available);
        self.repository.books.create(&book, stock).await
    }

    /// Update a book. Stock changes are normalized and then reconciled
    /// against active loans so the ledger invariant holds.
    pub async fn update_book(&self, id: Uuid, update: UpdateBook, actor: Actor) -> AppResult<Book> {
        if !actor.is_staff() {
            return Err(AppError::Authorization(
                "Only staff can update books".to_string(),
            ));
        }

        update
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        // verify the book exists before touching anything
        self.repository.books.get_by_id(id).await?;

        let mut book = self
            .repository
            .books
            .update_details(
                id,
                update.title.as_deref(),
                update.author.as_deref(),
                update.genre.as_deref(),
            )
            .await?;

        if update.touches_stock() {
            let stock = normalize_stock(update.total_copies, update.available_copies, update.available);

            let active = self.repository.loans.count_active_for_book(id).await?;
            if (stock.total_copies as i64) < active {
                return Err(AppError::Conflict(format!(
                    "Cannot reduce total copies below {} active loans",
                    active
                )));
            }

            let max_available = stock.total_copies as i64 - active;
            let available = (stock.available_copies as i64).min(max_available) as i32;

            book = self
                .repository
                .books
                .set_stock(id, stock.total_copies, available)
                .await?;
        }

        Ok(book)
    }

    /// Delete a book (admin only). Refused while copies are out on
    /// loan; pending reservations are cancelled with the book.
    pub async fn delete_book(&self, id: Uuid, actor: Actor) -> AppResult<()> {
        if actor.role != Role::Admin {
            return Err(AppError::Authorization(
                "Only admins can delete books".to_string(),
            ));
        }

        self.repository.books.get_by_id(id).await?;

        let active = self.repository.loans.count_active_for_book(id).await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "Book has {} active loans and cannot be deleted",
                active
            )));
        }

        let cancelled = self
            .repository
            .reservations
            .cancel_all_pending_for_book(id, chrono::Utc::now())
            .await?;
        if cancelled > 0 {
            tracing::info!("Cancelled {} pending reservations for deleted book {}", cancelled, id);
        }

        self.repository.books.delete(id).await
    }
}
