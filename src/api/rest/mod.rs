//! # REST API
//!
//! JSON endpoints over axum. Amounts travel as decimal strings with two
//! fractional digits; timestamps as RFC 3339.
//!
//! # Endpoints
//!
//! ## Ledger
//! - `GET /balances/{partyId}` - Available and pending balance
//! - `GET /transactions` - Filter by `partyId`, `type`, `status` and
//!   `dateRange` (`start/end`), paginated with `page`/`pageSize`
//! - `POST /sales` - Record a sale and its commission split
//!
//! ## Payouts
//! - `POST /payouts` - Request a payout (idempotent per party and key)
//! - `GET /payouts/{id}` - Get a payout request
//! - `POST /payouts/callbacks` - Late processor result
//! - `GET /parties/{partyId}/payouts` - Payout history of a party
//!
//! ## Moderation
//! - `POST /approvals` - Submit a party for review
//! - `GET /approvals` - Pending parties
//! - `POST /approvals/{partyId}/decide` - Approve or reject
//! - `GET /parties/{partyId}` - Get a party
//!
//! ## Commission rates
//! - `GET /commission-rates` - Preview the rate for `category` and
//!   `supportStructureId`
//! - `PUT /commission-rates/categories/{category}` - Set a category rate
//! - `POST /commission-rates/custom` - Add a negotiated rate window
//!
//! ## Health
//! - `GET /health`

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

pub use dto::{HealthResponse, PaginatedResponse, PaginationMeta};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::AppState;
pub use routes::create_router;
