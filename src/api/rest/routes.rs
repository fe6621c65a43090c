//! Router construction.

use crate::api::rest::handlers::{
    AppState, add_custom_rate, create_payout, decide, get_balance, get_party, get_payout, health,
    list_party_payouts, list_pending, list_transactions, payout_callback, preview_rate,
    record_sale, set_category_rate, submit_party,
};
use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the API router.
///
/// Every request is traced; `cors_permissive` additionally allows any
/// origin, for local front-end development.
pub fn create_router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        // Ledger
        .route("/balances/{party_id}", get(get_balance))
        .route("/transactions", get(list_transactions))
        .route("/sales", post(record_sale))
        // Payouts
        .route("/payouts", post(create_payout))
        .route("/payouts/callbacks", post(payout_callback))
        .route("/payouts/{id}", get(get_payout))
        // Moderation
        .route("/approvals", post(submit_party).get(list_pending))
        .route("/approvals/{party_id}/decide", post(decide))
        .route("/parties/{party_id}", get(get_party))
        .route("/parties/{party_id}/payouts", get(list_party_payouts))
        // Rates
        .route("/commission-rates", get(preview_rate))
        .route("/commission-rates/categories/{category}", put(set_category_rate))
        .route("/commission-rates/custom", post(add_custom_rate))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
