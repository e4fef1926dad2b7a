use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::clients::{build_http_client, build_provider, TurnstileClient};
use crate::config::Config;
use crate::server::{router, AppState};
use crate::utils::logging::log_startup;
use crate::workflow::GradeFlow;

/// 应用主结构
pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// 初始化应用
    ///
    /// 所有上游共用一个 HTTP 客户端；密钥缺失不影响启动，由每个请求自行报错
    pub fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let http = build_http_client(config.upstream_timeout_secs)?;
        let verifier = Arc::new(TurnstileClient::new(&config, http.clone()));
        let provider = build_provider(&config, http);

        let flow = GradeFlow::new(&config, verifier, provider);
        let state = AppState::new(flow, &config.allowed_origins);

        Ok(Self { config, state })
    }

    /// 运行服务，直到收到 Ctrl-C
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("无法监听地址: {}", self.config.bind_addr))?;

        info!("✓ 服务已启动: http://{}", listener.local_addr()?);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("收到退出信号，正在关闭...");
}
