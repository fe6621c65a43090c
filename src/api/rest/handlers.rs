//! REST handlers.

use crate::api::rest::dto::{
    BalanceResponse, CategoryRateRequest, CreatePayoutRequest, CustomRateRequest, DecideRequest,
    HealthResponse, PaginatedResponse, RatePreviewQuery, RecordSaleRequest, SubmitPartyRequest,
    TransactionQuery,
};
use crate::api::rest::error::{ApiError, ApiResult};
use crate::application::error::ApplicationError;
use crate::application::services::{
    ApprovalQueue, PayoutWorkflow, RatePreview, Reconciler, SaleReceipt, SettlementService,
};
use crate::domain::entities::party::Party;
use crate::domain::entities::payout_request::PayoutRequest;
use crate::domain::entities::transaction::Transaction;
use crate::domain::value_objects::{PartyId, PayoutId};
use crate::infrastructure::persistence::LedgerStore;
use crate::infrastructure::processor::ProcessorCallback;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use std::sync::Arc;

/// Shared state of the REST API.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sale intake and rates.
    pub settlement: Arc<SettlementService>,
    /// Payout requests.
    pub payouts: Arc<PayoutWorkflow>,
    /// Party moderation.
    pub approvals: Arc<ApprovalQueue>,
    /// Late processor callbacks.
    pub reconciler: Arc<Reconciler>,
    /// Transaction log and balances.
    pub ledger: Arc<dyn LedgerStore>,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        currency: state.ledger.currency().to_string(),
    })
}

/// `GET /balances/{partyId}`
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let party = state.approvals.get(&PartyId::new(party_id)).await?;
    let balance = state
        .ledger
        .balance(party.id())
        .await
        .map_err(ApplicationError::from)?;
    Ok(Json(balance.into()))
}

/// `POST /payouts`
pub async fn create_payout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePayoutRequest>,
) -> ApiResult<Json<PayoutRequest>> {
    let (party_id, amount, key) = body.parse()?;
    let request = state.payouts.request_payout(party_id, amount, key).await?;
    Ok(Json(request))
}

/// `GET /payouts/{id}`
pub async fn get_payout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PayoutRequest>> {
    let id: PayoutId = id
        .parse()
        .map_err(|e| ApiError::bad_request(format!("payout id: {e}")))?;
    Ok(Json(state.payouts.get_payout(id).await?))
}

/// `POST /payouts/callbacks`
pub async fn payout_callback(
    State(state): State<Arc<AppState>>,
    Json(callback): Json<ProcessorCallback>,
) -> ApiResult<Json<PayoutRequest>> {
    Ok(Json(state.reconciler.handle_callback(callback).await?))
}

/// `GET /parties/{id}/payouts`
pub async fn list_party_payouts(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
) -> ApiResult<Json<Vec<PayoutRequest>>> {
    let party = state.approvals.get(&PartyId::new(party_id)).await?;
    Ok(Json(state.payouts.list_payouts(party.id()).await?))
}

/// `GET /transactions`
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<PaginatedResponse<Transaction>>> {
    let filter = query.filter()?;
    let (page, page_size) = query.pagination();
    let offset = u64::from(page - 1) * u64::from(page_size);

    let result = state
        .ledger
        .query(&filter, offset, u64::from(page_size))
        .await
        .map_err(ApplicationError::from)?;
    Ok(Json(PaginatedResponse::from_page(result, page, page_size)))
}

/// `POST /sales`
pub async fn record_sale(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecordSaleRequest>,
) -> ApiResult<(StatusCode, Json<SaleReceipt>)> {
    let event = body.into_event(state.ledger.currency())?;
    let receipt = state.settlement.record_sale(event).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `POST /approvals`
pub async fn submit_party(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitPartyRequest>,
) -> ApiResult<(StatusCode, Json<Party>)> {
    let (id, kind, name) = body.parse()?;
    let party = state.approvals.submit(id, kind, name).await?;
    Ok((StatusCode::CREATED, Json(party)))
}

/// `GET /approvals`
pub async fn list_pending(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Party>>> {
    Ok(Json(state.approvals.list_pending().await?))
}

/// `POST /approvals/{partyId}/decide`
pub async fn decide(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
    Json(body): Json<DecideRequest>,
) -> ApiResult<Json<Party>> {
    let (decision, moderator) = body.parse()?;
    let party = state
        .approvals
        .decide(&PartyId::new(party_id), decision, moderator)
        .await?;
    Ok(Json(party))
}

/// `GET /parties/{id}`
pub async fn get_party(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
) -> ApiResult<Json<Party>> {
    Ok(Json(state.approvals.get(&PartyId::new(party_id)).await?))
}

/// `GET /commission-rates`
pub async fn preview_rate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RatePreviewQuery>,
) -> ApiResult<Json<RatePreview>> {
    let support = query
        .support_structure_id
        .filter(|s| !s.trim().is_empty())
        .map(PartyId::new);
    let preview = state
        .settlement
        .preview_rate(support.as_ref(), query.category.as_deref())
        .await?;
    Ok(Json(preview))
}

/// `PUT /commission-rates/categories/{category}`
pub async fn set_category_rate(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Json(body): Json<CategoryRateRequest>,
) -> ApiResult<StatusCode> {
    state.settlement.set_category_rate(body.into_rate(category)?)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /commission-rates/custom`
pub async fn add_custom_rate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CustomRateRequest>,
) -> ApiResult<StatusCode> {
    state.settlement.add_custom_rate(body.into_rate()?).await?;
    Ok(StatusCode::CREATED)
}
