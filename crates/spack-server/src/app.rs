//! Router construction.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::upgrade;
use crate::state::AppState;

/// Create the application router.
///
/// WebSocket upgrades are intercepted on every path before routing.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/", get(handlers::api::not_found))
        .route("/api/{*rest}", get(handlers::api::not_found));

    Router::new()
        .route("/", get(handlers::pages::index))
        .merge(api_routes)
        .fallback(handlers::pages::entry_page)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    Arc::clone(&state),
                    upgrade::websocket_upgrade,
                )),
        )
        .with_state(state)
}
