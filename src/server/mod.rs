//! HTTP 服务层
//!
//! 批改接口同时挂在 `/` 和 `/api/grade`，方法判断由处理函数自己完成，
//! 这样 405 和 OPTIONS 预检都能带上跨域头。

pub mod cors;
pub mod handler;

use std::collections::HashSet;
use std::sync::Arc;

use axum::middleware;
use axum::routing::any;
use axum::Router;

use crate::workflow::GradeFlow;

/// 所有请求共享的只读状态
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<GradeFlow>,
    pub allowed_origins: Arc<HashSet<String>>,
}

impl AppState {
    pub fn new(flow: GradeFlow, allowed_origins: &[String]) -> Self {
        Self {
            flow: Arc::new(flow),
            allowed_origins: Arc::new(allowed_origins.iter().cloned().collect()),
        }
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handler::grade))
        .route("/api/grade", any(handler::grade))
        .layer(middleware::from_fn_with_state(state.clone(), cors::apply_cors))
        .with_state(state)
}
