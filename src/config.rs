use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

/// 可选的模型服务商
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Gemini generateContent（自由文本输出）
    Gemini,
    /// OpenAI Responses（JSON Schema 结构化输出）
    OpenAi,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            other => anyhow::bail!("未知的模型服务商: {}", other),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 监听地址
    pub bind_addr: String,
    /// 使用的模型服务商
    pub provider: ProviderKind,
    // --- Turnstile 配置 ---
    pub turnstile_secret: Option<String>,
    pub turnstile_verify_url: String,
    // --- Gemini 配置 ---
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    // --- OpenAI 配置 ---
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    // --- 生成参数 ---
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// 上游请求超时（秒）
    pub upstream_timeout_secs: u64,
    /// 允许跨域的来源（精确匹配）
    pub allowed_origins: Vec<String>,
    /// 覆盖内置评分提示词
    pub rubric_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            provider: ProviderKind::Gemini,
            turnstile_secret: None,
            turnstile_verify_url: "https://challenges.cloudflare.com/turnstile/v0/siteverify"
                .to_string(),
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4.1-mini".to_string(),
            temperature: 0.2,
            max_output_tokens: 2048,
            upstream_timeout_secs: 60,
            allowed_origins: vec![
                "https://dayhocsangtao.com".to_string(),
                "https://www.dayhocsangtao.com".to_string(),
            ],
            rubric_prompt: None,
        }
    }
}

/// TOML 配置文件内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind_addr: Option<String>,
    provider: Option<String>,
    turnstile_verify_url: Option<String>,
    gemini_base_url: Option<String>,
    gemini_model: Option<String>,
    openai_base_url: Option<String>,
    openai_model: Option<String>,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
    upstream_timeout_secs: Option<u64>,
    allowed_origins: Option<Vec<String>>,
    rubric_prompt: Option<String>,
}

impl Config {
    /// 读取配置：默认值 → `GRADE_PROXY_CONFIG` 指定的 TOML 文件 → 环境变量
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = env_var("GRADE_PROXY_CONFIG") {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("无法读取配置文件: {}", path))?;
            config.apply_toml(&content)
                .with_context(|| format!("无法解析配置文件: {}", path))?;
        }

        config.apply_env(env_var)?;
        Ok(config)
    }

    /// 用 TOML 文本覆盖当前配置
    ///
    /// 密钥不允许写在配置文件里，只从环境变量读取
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(content)?;

        if let Some(v) = file.bind_addr {
            self.bind_addr = v;
        }
        if let Some(v) = file.provider {
            self.provider = v.parse()?;
        }
        if let Some(v) = file.turnstile_verify_url {
            self.turnstile_verify_url = v;
        }
        if let Some(v) = file.gemini_base_url {
            self.gemini_base_url = v;
        }
        if let Some(v) = file.gemini_model {
            self.gemini_model = v;
        }
        if let Some(v) = file.openai_base_url {
            self.openai_base_url = v;
        }
        if let Some(v) = file.openai_model {
            self.openai_model = v;
        }
        if let Some(v) = file.temperature {
            self.temperature = v;
        }
        if let Some(v) = file.max_output_tokens {
            self.max_output_tokens = v;
        }
        if let Some(v) = file.upstream_timeout_secs {
            self.upstream_timeout_secs = v;
        }
        if let Some(v) = file.allowed_origins {
            self.allowed_origins = v;
        }
        if file.rubric_prompt.is_some() {
            self.rubric_prompt = file.rubric_prompt;
        }
        Ok(())
    }

    /// 用环境变量覆盖当前配置
    ///
    /// `lookup` 便于测试时注入变量表
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("GRADE_PROVIDER") {
            self.provider = v.parse()?;
        }
        if let Some(v) = lookup("TURNSTILE_SECRET") {
            self.turnstile_secret = Some(v);
        }
        if let Some(v) = lookup("TURNSTILE_VERIFY_URL") {
            self.turnstile_verify_url = v;
        }
        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = lookup("GEMINI_BASE_URL") {
            self.gemini_base_url = v;
        }
        if let Some(v) = lookup("GEMINI_MODEL") {
            self.gemini_model = v;
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        if let Some(v) = lookup("OPENAI_MODEL") {
            self.openai_model = v;
        }
        if let Some(v) = lookup("LLM_TEMPERATURE") {
            self.temperature = v
                .parse()
                .with_context(|| format!("LLM_TEMPERATURE 无法解析为浮点数: {}", v))?;
        }
        if let Some(v) = lookup("LLM_MAX_OUTPUT_TOKENS") {
            self.max_output_tokens = v
                .parse()
                .with_context(|| format!("LLM_MAX_OUTPUT_TOKENS 无法解析为整数: {}", v))?;
        }
        if let Some(v) = lookup("UPSTREAM_TIMEOUT_SECS") {
            self.upstream_timeout_secs = v
                .parse()
                .with_context(|| format!("UPSTREAM_TIMEOUT_SECS 无法解析为整数: {}", v))?;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("RUBRIC_PROMPT") {
            self.rubric_prompt = Some(v);
        }
        Ok(())
    }

    /// 当前服务商使用的模型名
    pub fn model_name(&self) -> &str {
        match self.provider {
            ProviderKind::Gemini => &self.gemini_model,
            ProviderKind::OpenAi => &self.openai_model,
        }
    }
}

/// 读取环境变量，空字符串视为未设置
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
