//! Request and response bodies.
//!
//! Amounts travel as decimal strings and ids as plain strings; parsing into
//! domain types happens here so handlers only see validated values.

use crate::api::rest::error::{ApiError, ApiResult};
use crate::domain::entities::rate_table::{CategoryRate, CustomRate, RatePair};
use crate::domain::entities::sale::{Referral, ReferralSplit, SaleEvent};
use crate::domain::services::balance::Balance;
use crate::domain::value_objects::{
    Amount, BasisPoints, Currency, Decision, IdempotencyKey, ModeratorId, ParseEnumError, PartyId,
    PartyKind, Timestamp, TransactionId, TransactionStatus, TransactionType,
};
use crate::infrastructure::persistence::{Page, TransactionFilter};
use serde::{Deserialize, Serialize};

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 200;

fn parse_amount(value: &str) -> ApiResult<Amount> {
    value
        .parse()
        .map_err(|e| ApiError::bad_request(format!("amount: {e}")))
}

fn parse_party(field: &str, value: &str) -> ApiResult<PartyId> {
    let id = PartyId::new(value.trim());
    if id.is_blank() {
        return Err(ApiError::bad_request(format!("{field} must not be blank")));
    }
    Ok(id)
}

fn parse_timestamp(field: &str, value: &str) -> ApiResult<Timestamp> {
    Timestamp::parse_rfc3339(value.trim())
        .ok_or_else(|| ApiError::bad_request(format!("{field}: '{value}' is not an RFC 3339 timestamp")))
}

fn rate_pair(support_bps: u32, platform_bps: u32) -> ApiResult<RatePair> {
    RatePair::from_bps(support_bps, platform_bps).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// One-based page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
    /// Total matching items.
    pub total: u64,
    /// Number of pages.
    pub total_pages: u64,
}

/// A page of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    /// Wraps a store page.
    #[must_use]
    pub fn from_page(page: Page<T>, page_number: u32, page_size: u32) -> Self {
        let total_pages = page.total.div_ceil(u64::from(page_size.max(1)));
        Self {
            data: page.items,
            pagination: PaginationMeta {
                page: page_number,
                page_size,
                total: page.total,
                total_pages,
            },
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `ok` when the process answers.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Settlement currency.
    pub currency: String,
}

/// `GET /balances/{partyId}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// The party.
    pub party_id: PartyId,
    /// Funds that can be paid out.
    pub available: Amount,
    /// Credits still on hold.
    pub pending: Amount,
    /// Settlement currency.
    pub currency: Currency,
    /// When the balance was derived.
    pub as_of: Timestamp,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            party_id: balance.party_id,
            available: balance.available,
            pending: balance.pending,
            currency: balance.currency,
            as_of: balance.as_of,
        }
    }
}

/// `POST /payouts` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    /// Requesting party.
    pub party_id: String,
    /// Decimal amount.
    pub amount: String,
    /// Client-chosen deduplication key.
    pub idempotency_key: String,
}

impl CreatePayoutRequest {
    /// Parses the body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` on malformed fields.
    pub fn parse(self) -> ApiResult<(PartyId, Amount, IdempotencyKey)> {
        let key = IdempotencyKey::new(self.idempotency_key.trim());
        if key.is_blank() {
            return Err(ApiError::bad_request("idempotencyKey must not be blank"));
        }
        Ok((
            parse_party("partyId", &self.party_id)?,
            parse_amount(&self.amount)?,
            key,
        ))
    }
}

/// `POST /approvals` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPartyRequest {
    /// New party id.
    pub party_id: String,
    /// `SELLER` or `SUPPORT_STRUCTURE`.
    pub kind: String,
    /// Display name.
    pub display_name: String,
}

impl SubmitPartyRequest {
    /// Parses the body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` on malformed fields.
    pub fn parse(self) -> ApiResult<(PartyId, PartyKind, String)> {
        let kind = self
            .kind
            .parse()
            .map_err(|e: ParseEnumError| ApiError::bad_request(e.to_string()))?;
        Ok((parse_party("partyId", &self.party_id)?, kind, self.display_name))
    }
}

/// `POST /approvals/{partyId}/decide` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideRequest {
    /// `APPROVE` or `REJECT`.
    pub decision: String,
    /// Deciding moderator.
    pub moderator_id: String,
}

impl DecideRequest {
    /// Parses the body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` on malformed fields.
    pub fn parse(self) -> ApiResult<(Decision, ModeratorId)> {
        let decision = self
            .decision
            .parse()
            .map_err(|e: ParseEnumError| ApiError::bad_request(e.to_string()))?;
        let moderator = ModeratorId::new(self.moderator_id.trim());
        if moderator.is_blank() {
            return Err(ApiError::bad_request("moderatorId must not be blank"));
        }
        Ok((decision, moderator))
    }
}

/// One referrer of a sale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralBody {
    /// Support structure id.
    pub party_id: String,
    /// Share of the support pool; the whole pool when omitted.
    #[serde(default)]
    pub pool_share_bps: Option<u32>,
}

/// `POST /sales` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSaleRequest {
    /// Sale id; generated when omitted.
    #[serde(default)]
    pub sale_id: Option<String>,
    /// Selling party.
    pub seller_id: String,
    /// Referrers, primary first.
    #[serde(default)]
    pub referrals: Vec<ReferralBody>,
    /// Product category.
    #[serde(default)]
    pub category: Option<String>,
    /// Decimal gross amount.
    pub amount: String,
    /// ISO currency code; the settlement currency when omitted.
    #[serde(default)]
    pub currency: Option<String>,
    /// Completion time; now when omitted.
    #[serde(default)]
    pub occurred_at: Option<String>,
}

impl RecordSaleRequest {
    /// Builds the sale event.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` on malformed fields or an invalid
    /// referral split.
    pub fn into_event(self, settlement_currency: &Currency) -> ApiResult<SaleEvent> {
        let sale_id = match self.sale_id.as_deref() {
            Some(id) => id
                .parse::<TransactionId>()
                .map_err(|e| ApiError::bad_request(format!("saleId: {e}")))?,
            None => TransactionId::new_v4(),
        };
        let referrals = self
            .referrals
            .iter()
            .map(|r| {
                let pool_share = match r.pool_share_bps {
                    Some(bps) => BasisPoints::new(bps).map_err(|e| ApiError::bad_request(e.to_string()))?,
                    None => BasisPoints::FULL,
                };
                Ok(Referral {
                    party_id: parse_party("referrals.partyId", &r.party_id)?,
                    pool_share,
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;
        let referrals = ReferralSplit::new(referrals).map_err(|e| ApiError::bad_request(e.to_string()))?;
        let currency = match self.currency.as_deref() {
            Some(code) => Currency::new(code).map_err(|e| ApiError::bad_request(e.to_string()))?,
            None => settlement_currency.clone(),
        };
        let occurred_at = match self.occurred_at.as_deref() {
            Some(at) => parse_timestamp("occurredAt", at)?,
            None => Timestamp::now(),
        };

        Ok(SaleEvent {
            sale_id,
            seller: parse_party("sellerId", &self.seller_id)?,
            referrals,
            category: self.category.filter(|c| !c.trim().is_empty()),
            amount: parse_amount(&self.amount)?,
            currency,
            occurred_at,
        })
    }
}

/// `GET /transactions` query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    /// Owning party.
    pub party_id: Option<String>,
    /// `SALE`, `COMMISSION` or `PAYOUT`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// `PENDING`, `COMPLETED` or `FAILED`.
    pub status: Option<String>,
    /// `start/end` in RFC 3339; either side may be empty.
    pub date_range: Option<String>,
    /// One-based page number.
    pub page: Option<u32>,
    /// Items per page.
    pub page_size: Option<u32>,
}

impl TransactionQuery {
    /// Returns the page number and size, clamped.
    #[must_use]
    pub fn pagination(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, size)
    }

    /// Builds the store filter.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` on malformed fields or an inverted
    /// date range.
    pub fn filter(&self) -> ApiResult<TransactionFilter> {
        let kind = self
            .kind
            .as_deref()
            .map(str::parse::<TransactionType>)
            .transpose()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let status = self
            .status
            .as_deref()
            .map(str::parse::<TransactionStatus>)
            .transpose()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let (from, to) = match self.date_range.as_deref() {
            Some(range) => parse_date_range(range)?,
            None => (None, None),
        };
        Ok(TransactionFilter {
            party_id: self
                .party_id
                .as_deref()
                .map(|p| parse_party("partyId", p))
                .transpose()?,
            kind,
            status,
            from,
            to,
        })
    }
}

fn parse_date_range(range: &str) -> ApiResult<(Option<Timestamp>, Option<Timestamp>)> {
    let Some((start, end)) = range.split_once('/') else {
        return Err(ApiError::bad_request("dateRange must look like 'start/end'"));
    };
    let bound = |value: &str| {
        let value = value.trim();
        if value.is_empty() {
            Ok(None)
        } else {
            parse_timestamp("dateRange", value).map(Some)
        }
    };
    let (from, to) = (bound(start)?, bound(end)?);
    if let (Some(from), Some(to)) = (from, to) {
        if from.is_after(&to) {
            return Err(ApiError::bad_request("dateRange starts after it ends"));
        }
    }
    Ok((from, to))
}

/// `GET /commission-rates` query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePreviewQuery {
    /// Product category.
    pub category: Option<String>,
    /// Referring support structure.
    pub support_structure_id: Option<String>,
}

/// `PUT /commission-rates/categories/{category}` body.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRateRequest {
    /// Support pool in basis points.
    pub support_bps: u32,
    /// Platform fee in basis points.
    pub platform_bps: u32,
}

impl CategoryRateRequest {
    /// Builds the category override.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` if the shares exceed 100 %.
    pub fn into_rate(self, category: String) -> ApiResult<CategoryRate> {
        Ok(CategoryRate {
            category,
            rate: rate_pair(self.support_bps, self.platform_bps)?,
        })
    }
}

/// `POST /commission-rates/custom` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRateRequest {
    /// Support structure the rate was negotiated with.
    pub support_structure_id: String,
    /// Support pool in basis points.
    pub support_bps: u32,
    /// Platform fee in basis points.
    pub platform_bps: u32,
    /// Start of the window; now when omitted.
    #[serde(default)]
    pub effective_from: Option<String>,
    /// Exclusive end of the window; open-ended when omitted.
    #[serde(default)]
    pub effective_until: Option<String>,
}

impl CustomRateRequest {
    /// Builds the custom rate.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` on malformed fields or an empty window.
    pub fn into_rate(self) -> ApiResult<CustomRate> {
        let from = match self.effective_from.as_deref() {
            Some(at) => parse_timestamp("effectiveFrom", at)?,
            None => Timestamp::now(),
        };
        let until = self
            .effective_until
            .as_deref()
            .map(|at| parse_timestamp("effectiveUntil", at))
            .transpose()?;
        CustomRate::new(
            parse_party("supportStructureId", &self.support_structure_id)?,
            rate_pair(self.support_bps, self.platform_bps)?,
            from,
            until,
        )
        .map_err(|e| ApiError::bad_request(e.to_string()))
    }
}
