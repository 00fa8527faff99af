//! Book model and stock normalization rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// Canonical stock values for a book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookStock {
    pub total_copies: i32,
    pub available_copies: i32,
    pub available: bool,
}

fn clamp(value: i32, min: i32, max: i32) -> i32 {
    value.max(min).min(max)
}

/// Canonicalize a partial stock description into `{total, available_copies, available}`.
///
/// Rules, in priority order:
/// - both counts given: total floored to >= 1, available clamped to [0, total]
/// - only total given: available = total, unless an explicit `available = false` zeroes it
/// - only available given: total = max(1, available)
/// - neither given, explicit `available = false`: one unavailable copy
/// - nothing given: one available copy
pub fn normalize_stock(
    total_copies: Option<i32>,
    available_copies: Option<i32>,
    available: Option<bool>,
) -> BookStock {
    if let (Some(total), Some(avail)) = (total_copies, available_copies) {
        let total = total.max(1);
        let avail = clamp(avail, 0, total);
        return BookStock {
            total_copies: total,
            available_copies: avail,
            available: avail > 0,
        };
    }

    if let Some(total) = total_copies {
        let total = total.max(1);
        let avail = if available == Some(false) { 0 } else { total };
        return BookStock {
            total_copies: total,
            available_copies: avail,
            available: avail > 0,
        };
    }

    if let Some(avail) = available_copies {
        let avail = avail.max(0);
        return BookStock {
            total_copies: avail.max(1),
            available_copies: avail,
            available: avail > 0,
        };
    }

    if available == Some(false) {
        return BookStock {
            total_copies: 1,
            available_copies: 0,
            available: false,
        };
    }

    BookStock {
        total_copies: 1,
        available_copies: 1,
        available: true,
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 512))]
    pub title: String,
    #[validate(length(min = 1, max = 256))]
    pub author: String,
    #[validate(length(min = 1, max = 128))]
    pub genre: String,
    pub total_copies: Option<i32>,
    pub available_copies: Option<i32>,
    pub available: Option<bool>,
}

/// Update book request (partial)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 512))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub genre: Option<String>,
    pub total_copies: Option<i32>,
    pub available_copies: Option<i32>,
    pub available: Option<bool>,
}

impl UpdateBook {
    pub fn touches_stock(&self) -> bool {
        self.total_copies.is_some() || self.available_copies.is_some() || self.available.is_some()
    }
}

/// Book list query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct BookQuery {
    /// Case-insensitive match against title, author or genre
    pub q: Option<String>,
    /// Exact genre filter (case-insensitive)
    pub genre: Option<String>,
    /// Only books with at least one available copy
    pub available_only: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Book with normalized stock for API responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        let available = book.is_available();
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            genre: book.genre,
            total_copies: book.total_copies,
            available_copies: book.available_copies,
            available,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_counts_clamp_available_into_range() {
        let stock = normalize_stock(Some(3), Some(5), None);
        assert_eq!(stock.total_copies, 3);
        assert_eq!(stock.available_copies, 3);
        assert!(stock.available);

        let stock = normalize_stock(Some(3), Some(-2), None);
        assert_eq!(stock.available_copies, 0);
        assert!(!stock.available);
    }

    #[test]
    fn both_counts_floor_total_to_one() {
        let stock = normalize_stock(Some(0), Some(0), None);
        assert_eq!(stock.total_copies, 1);
        assert_eq!(stock.available_copies, 0);

        let stock = normalize_stock(Some(-4), Some(1), None);
        assert_eq!(stock.total_copies, 1);
        assert_eq!(stock.available_copies, 1);
    }

    #[test]
    fn total_only_defaults_to_fully_available() {
        let stock = normalize_stock(Some(4), None, None);
        assert_eq!(stock.total_copies, 4);
        assert_eq!(stock.available_copies, 4);
        assert!(stock.available);
    }

    #[test]
    fn total_only_with_available_false_zeroes_copies() {
        let stock = normalize_stock(Some(4), None, Some(false));
        assert_eq!(stock.total_copies, 4);
        assert_eq!(stock.available_copies, 0);
        assert!(!stock.available);
    }

    #[test]
    fn available_only_sets_total_to_at_least_one() {
        let stock = normalize_stock(None, Some(6), None);
        assert_eq!(stock.total_copies, 6);
        assert_eq!(stock.available_copies, 6);

        let stock = normalize_stock(None, Some(0), None);
        assert_eq!(stock.total_copies, 1);
        assert_eq!(stock.available_copies, 0);

        let stock = normalize_stock(None, Some(-1), None);
        assert_eq!(stock.total_copies, 1);
        assert_eq!(stock.available_copies, 0);
    }

    #[test]
    fn explicit_unavailable_without_counts() {
        let stock = normalize_stock(None, None, Some(false));
        assert_eq!(
            stock,
            BookStock {
                total_copies: 1,
                available_copies: 0,
                available: false
            }
        );
    }

    #[test]
    fn empty_input_defaults_to_single_available_copy() {
        let stock = normalize_stock(None, None, None);
        assert_eq!(
            stock,
            BookStock {
                total_copies: 1,
                available_copies: 1,
                available: true
            }
        );

        // an explicit available=true behaves like the empty case
        let stock = normalize_stock(None, None, Some(true));
        assert_eq!(stock.available_copies, 1);
    }
}
