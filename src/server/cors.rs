//! 跨域响应头
//!
//! 所有响应都带 `Vary: Origin` 和允许的方法/头；
//! 只有来源精确命中白名单时才回显 `Access-Control-Allow-Origin`。

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ORIGIN, VARY,
};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::server::AppState;

pub async fn apply_cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let allowed = request
        .headers()
        .get(ORIGIN)
        .filter(|origin| {
            origin
                .to_str()
                .map(|o| state.allowed_origins.contains(o))
                .unwrap_or(false)
        })
        .cloned();

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    if let Some(origin) = allowed {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );

    response
}
