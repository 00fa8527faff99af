//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{audit, books, health, loans, reservations};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library Circulation Server REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::change_availability,
        // Loans
        loans::create_loan,
        loans::return_loan,
        loans::extend_loan,
        loans::delete_loan,
        loans::list_loans,
        loans::list_overdue_loans,
        loans::get_user_loans,
        // Reservations
        reservations::create_reservation,
        reservations::cancel_reservation,
        reservations::list_reservations,
        reservations::my_reservations,
        // Audit
        audit::list_audit_logs,
    ),
    components(
        schemas(
            // Books
            crate::models::book::BookResponse,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookListResponse,
            books::ChangeAvailabilityRequest,
            books::ChangeAvailabilityResponse,
            // Loans
            crate::models::loan::LoanResponse,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanSource,
            loans::CreateLoanRequest,
            loans::ExtendLoanRequest,
            loans::ExtendLoanResponse,
            loans::ReturnResponse,
            // Reservations
            crate::models::reservation::ReservationResponse,
            crate::models::reservation::ReservationStatus,
            crate::models::reservation::CreateReservationRequest,
            reservations::CancelReservationResponse,
            // Audit
            crate::models::audit::AuditLog,
            audit::AuditListResponse,
            // Users
            crate::models::user::Role,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog and stock management"),
        (name = "loans", description = "Loan circulation"),
        (name = "reservations", description = "Reservation queue"),
        (name = "audit", description = "Audit trail")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
