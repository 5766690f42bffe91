//! API Routes
//!
//! HTTP endpoint definitions. Every route receives the caller's
//! [`ActorContext`] from [`super::middleware::actor_middleware`].

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    ActorContext, Direction, EntryState, EntryView, Fine, FineView, LedgerType, ShareQuote,
    ShareTotals, UnitPrice,
};
use crate::error::{AppError, AppResult};
use crate::handlers::{
    BuySharesCommand, ChargeFineCommand, CreateEntryCommand, DecisionCommand, DecisionResult,
    EntryCreated, FinePayment, LedgerServices, PayFineCommand, SharePurchase,
};
use crate::pagination::{Page, PageRequest};
use crate::store::{EntryFilter, FineFilter};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    /// Admins may record on behalf of a member
    #[serde(default)]
    pub member_id: Option<Uuid>,
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    pub direction: Direction,
    pub ledger_type: LedgerType,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
    pub member_id: Option<Uuid>,
    pub ledger_type: Option<LedgerType>,
    pub direction: Option<Direction>,
    pub state: Option<EntryState>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub confirmed: bool,
    #[serde(default)]
    pub ledger_type: Option<LedgerType>,
}

#[derive(Debug, Deserialize)]
pub struct MemberQuery {
    pub member_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub member_id: Uuid,
    pub ledger_type: LedgerType,
    pub balance: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationFeeRequest {
    #[serde(default)]
    pub member_id: Option<Uuid>,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnitPriceBody {
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuySharesRequest {
    #[serde(default)]
    pub member_id: Option<Uuid>,
    pub amount: i64,
    #[serde(default)]
    pub units: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ShareTotalsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<Uuid>,
    #[serde(flatten)]
    pub totals: ShareTotals,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChargeFineRequest {
    pub member_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFinesQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
    pub member_id: Option<Uuid>,
    pub paid: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayFineRequest {
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
}

fn page_request(limit: Option<i64>, cursor: Option<String>, sort: Option<String>) -> PageRequest {
    PageRequest {
        limit,
        cursor,
        sort,
    }
}

fn require_admin(actor: &ActorContext) -> AppResult<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required".to_string()))
    }
}

/// Member a write acts on: the caller's own, or any member for an admin
/// naming one explicitly.
fn target_member(actor: &ActorContext, requested: Option<Uuid>) -> AppResult<Uuid> {
    actor
        .scope_member(requested)?
        .or(actor.member_id)
        .ok_or_else(|| AppError::Validation("member_id is required".to_string()))
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<LedgerServices> {
    Router::new()
        .route("/entries", post(create_entry).get(list_entries))
        .route("/statuses/:status_id/decision", post(apply_decision))
        .route("/balances/:ledger_type", get(get_balance))
        .route("/registration-fee", post(pay_registration_fee))
        .route("/shares", post(buy_shares))
        .route("/shares/unit-price", get(get_unit_price).put(set_unit_price))
        .route("/shares/quote", get(get_quote))
        .route("/shares/total", get(member_share_totals))
        .route("/shares/total/all", get(total_shares))
        .route("/fines", post(charge_fine).get(list_fines))
        .route("/fines/:fine_id", get(get_fine))
        .route("/fines/:fine_id/payment", post(pay_fine))
}

// =========================================================================
// Entries
// =========================================================================

async fn create_entry(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<CreateEntryRequest>,
) -> AppResult<(StatusCode, Json<EntryCreated>)> {
    let member_id = target_member(&actor, request.member_id)?;

    let mut command =
        CreateEntryCommand::new(member_id, request.amount, request.direction, request.ledger_type);
    command.description = request.description;

    let created = services.entries.create_entry(command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_entries(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<ListEntriesQuery>,
) -> AppResult<Json<Page<EntryView>>> {
    let filter = EntryFilter {
        member_id: query.member_id,
        ledger_type: query.ledger_type,
        direction: query.direction,
        state: query.state,
    };
    let page = page_request(query.limit, query.cursor, query.sort);

    let entries = services.entries.list_entries(&actor, filter, &page).await?;
    Ok(Json(entries))
}

async fn apply_decision(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Path(status_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> AppResult<Json<DecisionResult>> {
    require_admin(&actor)?;

    let command = DecisionCommand {
        status_id,
        confirmed: request.confirmed,
        expected_ledger: request.ledger_type,
    };
    let result = services.decisions.apply_decision(command).await?;

    tracing::info!(
        status_id = %status_id,
        admin_id = %actor.user_id,
        correlation_id = ?actor.correlation_id,
        changed = result.changed,
        "Decision applied"
    );
    Ok(Json(result))
}

// =========================================================================
// Balances
// =========================================================================

async fn get_balance(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Path(ledger_type): Path<LedgerType>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<BalanceResponse>> {
    let member_id = target_member(&actor, query.member_id)?;
    let balance = services.balances.get_balance(member_id, ledger_type).await?;

    Ok(Json(BalanceResponse {
        member_id,
        ledger_type,
        balance,
    }))
}

async fn pay_registration_fee(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<RegistrationFeeRequest>,
) -> AppResult<(StatusCode, Json<EntryCreated>)> {
    let member_id = target_member(&actor, request.member_id)?;
    let created = services
        .entries
        .pay_registration_fee(member_id, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// =========================================================================
// Shares
// =========================================================================

async fn get_unit_price(State(services): State<LedgerServices>) -> AppResult<Json<UnitPriceBody>> {
    let unit_price = services.prices.get_unit_price().await?;
    Ok(Json(UnitPriceBody { unit_price }))
}

async fn set_unit_price(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<UnitPriceBody>,
) -> AppResult<Json<UnitPrice>> {
    require_admin(&actor)?;
    let recorded = services
        .prices
        .set_unit_price(&actor, request.unit_price)
        .await?;
    Ok(Json(recorded))
}

async fn get_quote(
    State(services): State<LedgerServices>,
    Query(query): Query<QuoteQuery>,
) -> AppResult<Json<ShareQuote>> {
    Ok(Json(services.shares.get_quote(query.amount).await?))
}

async fn buy_shares(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<BuySharesRequest>,
) -> AppResult<(StatusCode, Json<SharePurchase>)> {
    let member_id = target_member(&actor, request.member_id)?;

    let mut command = BuySharesCommand::new(member_id, request.amount);
    command.units = request.units;

    let purchase = services.shares.buy_shares(command).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

async fn member_share_totals(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<ShareTotalsResponse>> {
    let member_id = target_member(&actor, query.member_id)?;
    let totals = services.balances.member_share_totals(member_id).await?;

    Ok(Json(ShareTotalsResponse {
        member_id: Some(member_id),
        totals,
    }))
}

async fn total_shares(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
) -> AppResult<Json<ShareTotalsResponse>> {
    require_admin(&actor)?;
    let totals = services.balances.total_shares().await?;

    Ok(Json(ShareTotalsResponse {
        member_id: None,
        totals,
    }))
}

// =========================================================================
// Fines
// =========================================================================

async fn charge_fine(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<ChargeFineRequest>,
) -> AppResult<(StatusCode, Json<Fine>)> {
    require_admin(&actor)?;

    let command =
        ChargeFineCommand::new(request.member_id, request.amount, request.reason, request.deadline);
    let fine = services.fines.charge_fine(&actor, command).await?;
    Ok((StatusCode::CREATED, Json(fine)))
}

async fn list_fines(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<ListFinesQuery>,
) -> AppResult<Json<Page<FineView>>> {
    let filter = FineFilter {
        member_id: query.member_id,
        paid: query.paid,
    };
    let page = page_request(query.limit, query.cursor, query.sort);

    Ok(Json(services.fines.list_fines(&actor, filter, &page).await?))
}

async fn get_fine(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Path(fine_id): Path<Uuid>,
) -> AppResult<Json<FineView>> {
    Ok(Json(services.fines.get_fine(&actor, fine_id).await?))
}

async fn pay_fine(
    State(services): State<LedgerServices>,
    Extension(actor): Extension<ActorContext>,
    Path(fine_id): Path<Uuid>,
    Json(request): Json<PayFineRequest>,
) -> AppResult<(StatusCode, Json<FinePayment>)> {
    let mut command = PayFineCommand::new(fine_id, request.amount);
    command.description = request.description;

    let payment = services.fines.pay_fine(&actor, command).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
