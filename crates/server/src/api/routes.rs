use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::auth_middleware, middleware::metrics_middleware, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Named ticket routes take precedence over `/tickets/{id}`.
    let ticket_routes = Router::new()
        .route("/tickets", post(tickets::issue_ticket))
        .route("/tickets/current", get(tickets::current_ticket))
        .route("/tickets/current/finalize", post(tickets::finalize_current))
        .route("/tickets/waiting", get(tickets::waiting_tickets))
        .route("/tickets/call-next", post(tickets::call_next))
        .route("/tickets/history", get(tickets::history))
        .route("/tickets/stats", get(tickets::daily_stats))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}/finalize", post(tickets::finalize_ticket))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .merge(ticket_routes)
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
