//! Loan model and lifecycle rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// How a loan came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loan_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanSource {
    Direct,
    Reservation,
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub loan_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub extension_count: i16,
    pub source: LoanSource,
}

/// Derived loan status; never stored, always computed from
/// `returned_at` and the due date against the given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

/// Reason an extension is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionDenied {
    AlreadyReturned,
    LimitReached,
    Overdue,
}

impl Loan {
    pub fn status(&self, now: DateTime<Utc>) -> LoanStatus {
        if self.returned_at.is_some() {
            LoanStatus::Returned
        } else if self.return_date < now {
            LoanStatus::Overdue
        } else {
            LoanStatus::Active
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == LoanStatus::Overdue
    }

    /// Check the state-machine side of extension eligibility.
    /// Returned loans are refused first, then the extension limit,
    /// then overdue state. Day-range validation happens at the caller.
    pub fn extension_denied(&self, now: DateTime<Utc>, max_extensions: i16) -> Option<ExtensionDenied> {
        if self.returned_at.is_some() {
            return Some(ExtensionDenied::AlreadyReturned);
        }
        if self.extension_count >= max_extensions {
            return Some(ExtensionDenied::LimitReached);
        }
        if self.return_date < now {
            return Some(ExtensionDenied::Overdue);
        }
        None
    }
}

/// Values for inserting a new loan; the stock decrement must have
/// already succeeded when this is constructed.
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub return_date: DateTime<Utc>,
    pub source: LoanSource,
}

/// Loan with derived status for API responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub loan_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub extension_count: i16,
    pub source: LoanSource,
    pub status: LoanStatus,
    pub overdue: bool,
}

impl LoanResponse {
    pub fn from_loan(loan: &Loan, now: DateTime<Utc>) -> Self {
        let status = loan.status(now);
        Self {
            id: loan.id,
            book_id: loan.book_id,
            user_id: loan.user_id,
            loan_date: loan.loan_date,
            return_date: loan.return_date,
            returned_at: loan.returned_at,
            extension_count: loan.extension_count,
            source: loan.source,
            status,
            overdue: status == LoanStatus::Overdue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(
        return_date: DateTime<Utc>,
        returned_at: Option<DateTime<Utc>>,
        extension_count: i16,
    ) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            loan_date: Utc::now() - Duration::days(7),
            return_date,
            returned_at,
            extension_count,
            source: LoanSource::Direct,
        }
    }

    #[test]
    fn status_is_active_before_due_date() {
        let now = Utc::now();
        let l = loan(now + Duration::days(5), None, 0);
        assert_eq!(l.status(now), LoanStatus::Active);
        assert!(!l.is_overdue(now));
    }

    #[test]
    fn status_is_overdue_past_due_date() {
        let now = Utc::now();
        let l = loan(now - Duration::days(1), None, 0);
        assert_eq!(l.status(now), LoanStatus::Overdue);
        assert!(l.is_overdue(now));
    }

    #[test]
    fn returned_loans_are_never_overdue() {
        let now = Utc::now();
        let l = loan(now - Duration::days(10), Some(now - Duration::days(2)), 0);
        assert_eq!(l.status(now), LoanStatus::Returned);
        assert!(!l.is_overdue(now));
    }

    #[test]
    fn extension_allowed_for_active_loan_under_limit() {
        let now = Utc::now();
        let l = loan(now + Duration::days(5), None, 1);
        assert_eq!(l.extension_denied(now, 2), None);
    }

    #[test]
    fn extension_refused_once_returned() {
        let now = Utc::now();
        let l = loan(now + Duration::days(5), Some(now), 0);
        assert_eq!(
            l.extension_denied(now, 2),
            Some(ExtensionDenied::AlreadyReturned)
        );
    }

    #[test]
    fn extension_refused_at_limit_regardless_of_overdue_state() {
        let now = Utc::now();
        let active = loan(now + Duration::days(5), None, 2);
        assert_eq!(
            active.extension_denied(now, 2),
            Some(ExtensionDenied::LimitReached)
        );

        // limit wins over overdue in the refusal ordering
        let overdue = loan(now - Duration::days(1), None, 2);
        assert_eq!(
            overdue.extension_denied(now, 2),
            Some(ExtensionDenied::LimitReached)
        );
    }

    #[test]
    fn extension_refused_for_overdue_loan() {
        let now = Utc::now();
        let l = loan(now - Duration::days(1), None, 0);
        assert_eq!(l.extension_denied(now, 2), Some(ExtensionDenied::Overdue));
    }
}
