//! Entry pages and the index listing.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;

use crate::state::AppState;

const TEXT_HTML: &str = "text/html";

/// List every configured entry.
pub(crate) async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items: String = state
        .store
        .entries()
        .iter()
        .map(|name| format!("<li><a href=\"/{name}\">{name}</a></li>"))
        .collect();

    (
        [(CONTENT_TYPE, TEXT_HTML)],
        format!(
            "<html><head><meta charset=\"utf-8\"><title>spack</title></head><body><ul>{items}</ul></body></html>"
        ),
    )
}

/// Serve the template-merged document of the entry named by the path, with
/// the live-reload client appended.
pub(crate) async fn entry_page(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    let name = path.strip_prefix('/').unwrap_or(&*path);
    let headers = [(CONTENT_TYPE, TEXT_HTML), (ACCESS_CONTROL_ALLOW_ORIGIN, "*")];

    match state.store.page(name) {
        Some(page) => {
            let script = client_script(&state.host, state.port, name);
            (headers, page + &script).into_response()
        }
        None => {
            tracing::debug!(entry = %name, "No artifact for entry");
            (StatusCode::NOT_FOUND, headers, "404").into_response()
        }
    }
}

/// Script that subscribes the page to rebuilds of `name` and reloads on
/// `update`. The subscription is repeated as a liveness signal.
fn client_script(host: &str, port: u16, name: &str) -> String {
    format!(
        r"
<script>
  const ws = new WebSocket('ws://{host}:{port}')
  ws.onopen = async ()=> {{
    console.log('ws connected')
    ws.send('watch:{name}')
    while(true){{
      await new Promise(r => setTimeout(r, 10000))
      ws.send('watch:{name}')
    }}
  }}
  ws.onmessage = ({{data}}) => {{
    console.log('ws received %s', data)
    if(data === 'update'){{
      (window.$location || window.location).reload()
    }}
  }}
</script>
"
    )
}
