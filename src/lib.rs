//! # Grade Proxy
//!
//! 一个用于 AI 批改解答题的服务端代理
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 与外部服务交互，只暴露能力
//! - `TurnstileClient` - 人机校验
//! - `GeminiClient` / `OpenAiClient` - 模型服务，统一实现 `CompletionProvider`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 纯函数，不做任何 I/O
//! - `extractor` - 从模型回复中提取 JSON
//! - `normalizer` - 按满分截断分数
//! - `prompt` - 评分提示词与输出 Schema
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一批题目"的完整处理流程
//! - `GradeFlow` - 校验 → 模型 → 提取 → 解析 → 截断
//!
//! ### ④ 服务层（Server）
//! - `server/` - HTTP 路由、跨域头、错误转响应
//! - `App` - 管理生命周期（初始化、运行、关闭）
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::{Config, ProviderKind};
pub use error::{AppError, AppResult};
pub use models::{GradeReport, GradeResult, Submission};
pub use server::{router, AppState};
pub use workflow::{GradeFlow, RequestCtx};
