//! WebSocket upgrade interception.
//!
//! Any request carrying `Connection: Upgrade` and `Upgrade: websocket` is
//! answered with `101 Switching Protocols`, whatever its path. The upgraded
//! connection is then served by the live-reload socket loop.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hyper_util::rt::TokioIo;

use crate::live_reload::{accept_key, is_upgrade_request, serve_socket};
use crate::state::AppState;

pub(crate) async fn websocket_upgrade(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if !is_upgrade_request(req.headers()) {
        return next.run(req).await;
    }

    let key = req
        .headers()
        .get(SEC_WEBSOCKET_KEY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let accept = accept_key(key);

    let on_upgrade = hyper::upgrade::on(&mut req);
    let sessions = Arc::clone(state.store.sessions());
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => serve_socket(TokioIo::new(upgraded), sessions).await,
            Err(e) => tracing::debug!(error = %e, "Connection was not upgraded"),
        }
    });

    (
        StatusCode::SWITCHING_PROTOCOLS,
        [
            (UPGRADE, "websocket".to_owned()),
            (CONNECTION, "Upgrade".to_owned()),
            (SEC_WEBSOCKET_ACCEPT, accept),
        ],
    )
        .into_response()
}
