//! 批改接口
//!
//! 只做 HTTP 层的事情：方法判断、请求体解析、错误转响应、兜底捕获 panic。

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::AppError;
use crate::server::AppState;
use crate::workflow::RequestCtx;

pub async fn grade(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    if method != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let ctx = RequestCtx::new(
        header_str(&headers, "x-forwarded-for"),
        header_str(&headers, ORIGIN.as_str()),
    );
    let body = parse_body(&body, &ctx);

    match AssertUnwindSafe(state.flow.run(&body, &ctx))
        .catch_unwind()
        .await
    {
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(Err(err)) => {
            if err.status_code() >= 500 {
                error!("{} ❌ {}", ctx, err);
            } else {
                warn!("{} ⚠️ {}", ctx, err);
            }
            err.into_response()
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("{} ❌ 处理过程中发生 panic: {}", ctx, message);
            AppError::Unexpected(message).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_body())).into_response()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// 请求体按 JSON 解析，空或无法解析时视为空对象
fn parse_body(body: &[u8], ctx: &RequestCtx) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        warn!("{} ⚠️ 请求体不是合法 JSON: {}", ctx, e);
        json!({})
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
