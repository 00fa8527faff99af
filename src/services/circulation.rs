//! Circulation service: borrow, return, extend, delete-loan,
//! reservations, and explicit availability changes.
//!
//! Every operation here is the single writer allowed to touch more
//! than one entity. Stock moves only through the conditional updates
//! in the books repository; multi-step operations compensate their
//! completed steps when a later step fails, so a partial borrow or
//! fulfillment never leaves the ledger out of sync with the loans
//! table. Contention resolves by a conditional update matching zero
//! rows and the caller receiving a Conflict, never by waiting.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        audit::NewAuditEntry,
        book::Book,
        loan::{ExtensionDenied, Loan, LoanSource, NewLoan},
        reservation::{Reservation, ReservationQuery, ReservationStatus},
        user::Actor,
    },
    repository::{books::StockRequest, Repository},
    services::audit::AuditRecorder,
};

/// A reservation turned into a loan
pub struct Fulfillment {
    pub reservation: Reservation,
    pub loan: Loan,
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    audit: AuditRecorder,
    policy: CirculationConfig,
}

impl CirculationService {
    pub fn new(repository: Repository, audit: AuditRecorder, policy: CirculationConfig) -> Self {
        Self {
            repository,
            audit,
            policy,
        }
    }

    /// Borrow a book directly.
    ///
    /// Refused while someone else's reservation heads the queue. If the
    /// borrower holds a pending reservation themselves, it is consumed
    /// by the borrow.
    pub async fn borrow(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        return_date: DateTime<Utc>,
        actor: Actor,
    ) -> AppResult<Loan> {
        if !actor.can_act_for(user_id) {
            return Err(AppError::Authorization(
                "Users may only borrow for themselves".to_string(),
            ));
        }

        let now = Utc::now();
        if return_date <= now {
            return Err(AppError::Validation(
                "return_date must be in the future".to_string(),
            ));
        }

        let book = self.repository.books.get_by_id(book_id).await?;
        self.repository.users.get_by_id(user_id).await?;

        if self
            .repository
            .reservations
            .has_pending_for_other_user(book_id, user_id)
            .await?
        {
            return Err(AppError::Conflict(
                "Book is reserved for another user".to_string(),
            ));
        }

        if !self.repository.books.decrement_available(book_id).await? {
            return Err(AppError::Conflict(format!(
                "Book '{}' is not available",
                book.title
            )));
        }

        let new_loan = NewLoan {
            book_id,
            user_id,
            return_date,
            source: LoanSource::Direct,
        };

        let loan = match self.repository.loans.create(&new_loan, now).await {
            Ok(loan) => loan,
            Err(e) => {
                // the decrement must never be left unmatched
                if let Err(undo) = self.repository.books.increment_available(book_id).await {
                    tracing::error!(
                        "Failed to restore stock for book {} after loan insert failure: {}",
                        book_id,
                        undo
                    );
                }
                return Err(e);
            }
        };

        // Borrowing directly consumes the borrower's own place in the queue.
        if let Some(own) = self
            .repository
            .reservations
            .find_pending_for_user(book_id, user_id)
            .await?
        {
            if self.repository.reservations.mark_fulfilled(own.id, now).await? {
                self.audit.record(NewAuditEntry {
                    action: "reservation.fulfilled",
                    entity_type: "reservation",
                    entity_id: Some(own.id),
                    details: json!({
                        "book_id": book_id,
                        "user_id": user_id,
                        "mode": "manual-loan",
                    }),
                    actor: Some(actor),
                });
            }
        }

        self.audit.record(NewAuditEntry {
            action: "loan.created",
            entity_type: "loan",
            entity_id: Some(loan.id),
            details: json!({
                "book_id": book_id,
                "user_id": user_id,
                "source": "direct",
            }),
            actor: Some(actor),
        });

        Ok(loan)
    }

    /// Return a loan and hand the freed copy to the reservation queue.
    ///
    /// The return itself succeeds even when auto-fulfillment cannot
    /// complete; a failed fulfillment is rolled back and logged.
    pub async fn return_loan(&self, loan_id: Uuid, actor: Actor) -> AppResult<Loan> {
        let loan = self.repository.loans.get_by_id(loan_id).await?;

        if !actor.can_act_for(loan.user_id) {
            return Err(AppError::Authorization(
                "Only staff or the borrower can return a loan".to_string(),
            ));
        }

        let now = Utc::now();
        if !self.repository.loans.mark_returned(loan.id, now).await? {
            return Err(AppError::Conflict("Loan already returned".to_string()));
        }

        if let Err(e) = self.repository.books.increment_available(loan.book_id).await {
            // undo the return so the ledger stays consistent with the loan
            if let Err(undo) = self.repository.loans.clear_returned(loan.id).await {
                tracing::error!("Failed to undo return of loan {}: {}", loan.id, undo);
            }
            return Err(e);
        }

        self.audit.record(NewAuditEntry {
            action: "loan.returned",
            entity_type: "loan",
            entity_id: Some(loan.id),
            details: json!({
                "book_id": loan.book_id,
                "user_id": loan.user_id,
            }),
            actor: Some(actor),
        });

        if let Err(e) = self.fulfill_next_reservation(loan.book_id, actor).await {
            tracing::warn!(
                "Reservation auto-fulfillment failed after return of loan {}: {}",
                loan.id,
                e
            );
        }

        self.repository.loans.get_by_id(loan.id).await
    }

    /// Extend a loan's due date
    pub async fn extend_loan(
        &self,
        loan_id: Uuid,
        days: Option<i64>,
        actor: Actor,
    ) -> AppResult<Loan> {
        let loan = self.repository.loans.get_by_id(loan_id).await?;

        if !actor.can_act_for(loan.user_id) {
            return Err(AppError::Authorization(
                "Only staff or the borrower can extend a loan".to_string(),
            ));
        }

        let days = days.unwrap_or(self.policy.default_extension_days);
        if days < 1 || days > self.policy.max_extension_days {
            return Err(AppError::Validation(format!(
                "days must be between 1 and {}",
                self.policy.max_extension_days
            )));
        }

        let now = Utc::now();
        if let Some(denied) = loan.extension_denied(now, self.policy.max_extensions) {
            let message = match denied {
                ExtensionDenied::AlreadyReturned => "Returned loans cannot be extended",
                ExtensionDenied::LimitReached => "Loan reached extension limit",
                ExtensionDenied::Overdue => "Overdue loans cannot be extended",
            };
            return Err(AppError::Conflict(message.to_string()));
        }

        let updated = self
            .repository
            .loans
            .extend(loan.id, days as i32, self.policy.max_extensions, now)
            .await?
            .ok_or_else(|| AppError::Conflict("Loan extension failed".to_string()))?;

        self.audit.record(NewAuditEntry {
            action: "loan.extended",
            entity_type: "loan",
            entity_id: Some(loan.id),
            details: json!({
                "previous_return_date": loan.return_date,
                "new_return_date": updated.return_date,
                "extension_days": days,
                "previous_extension_count": loan.extension_count,
                "next_extension_count": updated.extension_count,
            }),
            actor: Some(actor),
        });

        Ok(updated)
    }

    /// Remove a loan record entirely (staff only). A still-active loan
    /// releases its stock slot and gives the queue one fulfillment
    /// round.
    pub async fn delete_loan(&self, loan_id: Uuid, actor: Actor) -> AppResult<()> {
        if !actor.is_staff() {
            return Err(AppError::Authorization(
                "Only staff can delete loans".to_string(),
            ));
        }

        let loan = self.repository.loans.get_by_id(loan_id).await?;
        let was_active = loan.returned_at.is_none();

        // Delete before releasing: the release bound is recomputed from
        // live loans and would still count this one.
        self.repository.loans.delete(loan.id).await?;

        if was_active {
            self.repository.books.increment_available(loan.book_id).await?;
            if let Err(e) = self.fulfill_next_reservation(loan.book_id, actor).await {
                tracing::warn!(
                    "Reservation auto-fulfillment failed after deleting loan {}: {}",
                    loan.id,
                    e
                );
            }
        }

        self.audit.record(NewAuditEntry {
            action: "loan.deleted",
            entity_type: "loan",
            entity_id: Some(loan.id),
            details: json!({
                "book_id": loan.book_id,
                "user_id": loan.user_id,
                "was_active": was_active,
            }),
            actor: Some(actor),
        });

        Ok(())
    }

    /// Place a reservation for a fully-unavailable book
    pub async fn create_reservation(
        &self,
        book_id: Uuid,
        requested_user_id: Option<Uuid>,
        actor: Actor,
    ) -> AppResult<Reservation> {
        let user_id = requested_user_id.unwrap_or(actor.id);
        if !actor.can_act_for(user_id) {
            return Err(AppError::Authorization(
                "Users may only reserve for themselves".to_string(),
            ));
        }

        let book = self.repository.books.get_by_id(book_id).await?;
        self.repository.users.get_by_id(user_id).await?;

        if book.available_copies > 0 {
            return Err(AppError::Conflict(
                "Book has available copies. Borrow instead of reserving.".to_string(),
            ));
        }

        if self
            .repository
            .reservations
            .has_pending_for_user(book_id, user_id)
            .await?
        {
            return Err(AppError::Conflict(
                "Pending reservation already exists".to_string(),
            ));
        }

        let reservation = self.repository.reservations.create(book_id, user_id).await?;

        self.audit.record(NewAuditEntry {
            action: "reservation.created",
            entity_type: "reservation",
            entity_id: Some(reservation.id),
            details: json!({
                "book_id": book_id,
                "user_id": user_id,
            }),
            actor: Some(actor),
        });

        Ok(reservation)
    }

    /// Cancel a pending reservation; staff may cancel any, users only
    /// their own
    pub async fn cancel_reservation(&self, reservation_id: Uuid, actor: Actor) -> AppResult<()> {
        let reservation = self.repository.reservations.get_by_id(reservation_id).await?;

        if !actor.can_act_for(reservation.user_id) {
            return Err(AppError::Authorization(
                "Only staff or the reservation owner can cancel it".to_string(),
            ));
        }

        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::Conflict(
                "Only pending reservations can be cancelled".to_string(),
            ));
        }

        let now = Utc::now();
        if !self.repository.reservations.cancel(reservation.id, now).await? {
            return Err(AppError::Conflict("Reservation cancel failed".to_string()));
        }

        self.audit.record(NewAuditEntry {
            action: "reservation.cancelled",
            entity_type: "reservation",
            entity_id: Some(reservation.id),
            details: json!({
                "book_id": reservation.book_id,
                "user_id": reservation.user_id,
            }),
            actor: Some(actor),
        });

        Ok(())
    }

    /// Staff recompute of a book's availability. Every freed copy is
    /// offered to the reservation queue; returns the updated book and
    /// how many reservations were fulfilled.
    pub async fn change_book_availability(
        &self,
        book_id: Uuid,
        request: StockRequest,
        actor: Actor,
    ) -> AppResult<(Book, u32)> {
        if !actor.is_staff() {
            return Err(AppError::Authorization(
                "Only staff can change book availability".to_string(),
            ));
        }

        let book = self.repository.books.get_by_id(book_id).await?;
        let previous_available = book.available_copies;

        let active = self
            .repository
            .loans
            .count_active_for_book(book_id)
            .await?;
        let updated = self
            .repository
            .books
            .set_explicit_availability(book_id, request, active)
            .await?;

        self.audit.record(NewAuditEntry {
            action: "book.availability_changed",
            entity_type: "book",
            entity_id: Some(book_id),
            details: json!({
                "previous_available_copies": previous_available,
                "new_available_copies": updated.available_copies,
                "active_loans": active,
            }),
            actor: Some(actor),
        });

        let mut fulfilled = 0u32;
        if updated.available_copies > previous_available {
            // one pending reservation consumed per freed copy
            loop {
                match self.fulfill_next_reservation(book_id, actor).await {
                    Ok(Some(_)) => fulfilled += 1,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(
                            "Reservation auto-fulfillment stopped for book {}: {}",
                            book_id,
                            e
                        );
                        break;
                    }
                }
            }
        }

        let book = self.repository.books.get_by_id(book_id).await?;
        Ok((book, fulfilled))
    }

    /// List every loan, newest first
    pub async fn list_loans(&self) -> AppResult<Vec<Loan>> {
        self.repository.loans.list().await
    }

    /// List a user's loans
    pub async fn list_user_loans(&self, user_id: Uuid, active_only: bool) -> AppResult<Vec<Loan>> {
        // Verify user exists
        self.repository.users.get_by_id(user_id).await?;
        self.repository.loans.list_for_user(user_id, active_only).await
    }

    /// List loans past their due date
    pub async fn list_overdue_loans(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        self.repository.loans.list_overdue(now).await
    }

    /// List reservations with optional filters
    pub async fn list_reservations(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        self.repository.reservations.list(query).await
    }

    /// One fulfillment round: take the head of the queue, claim a copy,
    /// and open the reservation loan.
    ///
    /// The head is re-selected fresh on every call. Ok(None) means the
    /// queue is empty or no copy could be claimed. Any failure after a
    /// sub-step succeeded undoes the completed sub-steps in reverse
    /// order before surfacing the error.
    async fn fulfill_next_reservation(
        &self,
        book_id: Uuid,
        actor: Actor,
    ) -> AppResult<Option<Fulfillment>> {
        let Some(next) = self.repository.reservations.next_pending(book_id).await? else {
            return Ok(None);
        };

        if !self.repository.books.decrement_available(book_id).await? {
            return Ok(None);
        }

        let now = Utc::now();
        if !self.repository.reservations.mark_fulfilled(next.id, now).await? {
            // the head changed under us; free the claimed copy
            self.repository.books.increment_available(book_id).await?;
            return Ok(None);
        }

        let new_loan = NewLoan {
            book_id,
            user_id: next.user_id,
            return_date: now + Duration::days(self.policy.reservation_loan_days),
            source: LoanSource::Reservation,
        };

        let loan = match self.repository.loans.create(&new_loan, now).await {
            Ok(loan) => loan,
            Err(e) => {
                if let Err(undo) = self.repository.reservations.reopen(next.id).await {
                    tracing::error!("Failed to reopen reservation {}: {}", next.id, undo);
                }
                if let Err(undo) = self.repository.books.increment_available(book_id).await {
                    tracing::error!(
                        "Failed to restore stock for book {} after fulfillment failure: {}",
                        book_id,
                        undo
                    );
                }
                return Err(e);
            }
        };

        self.audit.record(NewAuditEntry {
            action: "reservation.fulfilled",
            entity_type: "reservation",
            entity_id: Some(next.id),
            details: json!({
                "book_id": book_id,
                "user_id": next.user_id,
                "loan_id": loan.id,
                "mode": "auto-loan",
            }),
            actor: Some(actor),
        });

        self.audit.record(NewAuditEntry {
            action: "loan.created",
            entity_type: "loan",
            entity_id: Some(loan.id),
            details: json!({
                "book_id": book_id,
                "user_id": next.user_id,
                "source": "reservation",
            }),
            actor: Some(actor),
        });

        Ok(Some(Fulfillment {
            reservation: next,
            loan,
        }))
    }
}
