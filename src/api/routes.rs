//! Route Definitions

use super::{handlers::*, websocket::draw_websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints. `/metrics` is only served when
/// enabled in the monitoring config.
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route("/health", get(health_handler));
    if state.engine.config().monitoring.enable_metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        // Draws
        .route("/draws", get(list_draws_handler).post(create_draw_handler))
        .route("/draws/:draw_id", get(get_draw_handler))
        .route("/draws/:draw_id/start", post(start_draw_handler))
        .route("/draws/:draw_id/finish", post(finish_draw_handler))
        .route("/draws/:draw_id/numbers", post(draw_number_handler))
        .route("/draws/:draw_id/tick", post(tick_handler))
        .route("/draws/:draw_id/settle", post(settle_handler))
        .route("/draws/:draw_id/cards", get(cards_handler))
        .route("/draws/:draw_id/payouts", get(payouts_handler))
        .route("/draws/:draw_id/purchases", post(purchase_handler))
        // Accounts
        .route("/accounts", post(open_account_handler))
        .route("/accounts/:user_id", get(get_account_handler))
        .route("/accounts/:user_id/purchases", get(account_purchases_handler))
        .route("/accounts/:user_id/deposits", post(deposit_handler))
        .route("/accounts/:user_id/withdrawals", post(withdrawal_handler))
        // Live room updates
        .route("/ws/draws/:draw_id", get(draw_websocket_handler))
        .with_state(state)
}
