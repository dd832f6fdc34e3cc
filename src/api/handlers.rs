//! Request Handlers
//!
//! Thin adapters from HTTP to `DrawEngine`. Every handler resolves the
//! request ID first so errors can be traced back to the request.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::bingo::ticker::TickOutcome;
use crate::bingo::types::{Card, Draw, NewDraw, Purchase, UserAccount, WinnerEvent};
use crate::engine::{DrawEngine, DrawProgress};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub engine: DrawEngine,
    pub version: String,
}

type ApiResult<T> = Result<T, ApiError>;

fn engine_error(request_id: &RequestId) -> impl FnOnce(crate::errors::BingoError) -> ApiError + '_ {
    move |e| ApiError::from_engine(request_id.0.clone(), e)
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.engine.metrics().render(),
    )
}

/// GET /draws?status=active
pub async fn list_draws_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DrawListQuery>,
) -> ApiResult<Json<Vec<DrawSummary>>> {
    let draws = state.engine.list_draws().map_err(engine_error(&request_id))?;

    Ok(Json(
        draws
            .iter()
            .filter(|draw| query.status.map_or(true, |status| draw.status == status))
            .map(DrawSummary::from)
            .collect(),
    ))
}

/// POST /draws
pub async fn create_draw_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewDraw>,
) -> ApiResult<(StatusCode, Json<Draw>)> {
    let draw = state
        .engine
        .create_draw(request)
        .await
        .map_err(engine_error(&request_id))?;
    Ok((StatusCode::CREATED, Json(draw)))
}

/// GET /draws/:draw_id
pub async fn get_draw_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> ApiResult<Json<Draw>> {
    state
        .engine
        .load_draw(&draw_id)
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /draws/:draw_id/start
pub async fn start_draw_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> ApiResult<Json<Draw>> {
    state
        .engine
        .start_draw(&draw_id)
        .await
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /draws/:draw_id/finish
pub async fn finish_draw_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> ApiResult<Json<Draw>> {
    state
        .engine
        .finish_draw(&draw_id)
        .await
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /draws/:draw_id/numbers
pub async fn draw_number_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
    Json(request): Json<DrawNumberRequest>,
) -> ApiResult<Json<DrawProgress>> {
    state
        .engine
        .draw_number(&draw_id, request.number)
        .await
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /draws/:draw_id/tick
pub async fn tick_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> ApiResult<Json<TickOutcome>> {
    state
        .engine
        .tick_automatic(&draw_id)
        .await
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /draws/:draw_id/settle
pub async fn settle_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> ApiResult<Json<SettleResponse>> {
    let winner = state
        .engine
        .settle(&draw_id)
        .await
        .map_err(engine_error(&request_id))?;
    Ok(Json(SettleResponse { draw_id, winner }))
}

/// GET /draws/:draw_id/cards
pub async fn cards_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> ApiResult<Json<Vec<Card>>> {
    state
        .engine
        .draw_cards(&draw_id)
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// GET /draws/:draw_id/payouts
pub async fn payouts_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> ApiResult<Json<Vec<WinnerEvent>>> {
    state
        .engine
        .load_draw(&draw_id)
        .and_then(|_| state.engine.payout_receipts(&draw_id))
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /draws/:draw_id/purchases
pub async fn purchase_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
    Json(request): Json<PurchaseRequest>,
) -> ApiResult<(StatusCode, Json<Purchase>)> {
    let purchase = state
        .engine
        .purchase_cards(&request.user_id, &draw_id, request.quantity)
        .await
        .map_err(engine_error(&request_id))?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

/// POST /accounts
pub async fn open_account_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenAccountRequest>,
) -> ApiResult<(StatusCode, Json<UserAccount>)> {
    let account = state
        .engine
        .open_account(&request.name)
        .await
        .map_err(engine_error(&request_id))?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /accounts/:user_id
pub async fn get_account_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserAccount>> {
    state
        .engine
        .load_account(&user_id)
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// GET /accounts/:user_id/purchases
pub async fn account_purchases_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Purchase>>> {
    state
        .engine
        .purchases(&user_id)
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /accounts/:user_id/deposits
pub async fn deposit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(request): Json<AmountRequest>,
) -> ApiResult<Json<UserAccount>> {
    state
        .engine
        .confirm_deposit(&user_id, request.amount)
        .await
        .map(Json)
        .map_err(engine_error(&request_id))
}

/// POST /accounts/:user_id/withdrawals
pub async fn withdrawal_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(request): Json<AmountRequest>,
) -> ApiResult<Json<UserAccount>> {
    state
        .engine
        .approve_withdrawal(&user_id, request.amount)
        .await
        .map(Json)
        .map_err(engine_error(&request_id))
}
