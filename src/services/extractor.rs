//! 模型回复 JSON 提取 - 业务能力层
//!
//! 模型被要求只输出 JSON，但并不保证做到。这里按固定顺序尝试：
//!
//! 1. 空输入 → 空字符串
//! 2. 去掉开头的 BOM
//! 3. 标注为 json 的代码块 → 块内内容
//! 4. 任意代码块 → 块内内容
//! 5. 第一个 `{` 到最后一个 `}`
//! 6. 原文（去除首尾空白）
//!
//! 提取结果仍然是不可信输入，必须再经过严格解析。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::clients::RawReply;

static JSON_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("valid json fence regex"));

static ANY_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("valid fence regex"));

/// 提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// 模型回复的原始文本
    pub text: String,
    /// 从中取出的候选 JSON 文本
    pub json_text: String,
}

/// 根据回复类型提取候选 JSON
pub fn extract_reply(reply: &RawReply) -> Extracted {
    match reply {
        RawReply::FreeText(text) => Extracted {
            text: text.clone(),
            json_text: extract_json_text(text),
        },
        RawReply::Structured(envelope) => {
            let text = structured_output_text(envelope);
            Extracted {
                json_text: text.trim().to_string(),
                text,
            }
        }
    }
}

/// 从自由文本中取出最可能的 JSON 片段
pub fn extract_json_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let t = text.strip_prefix('\u{FEFF}').unwrap_or(text).trim();

    if let Some(inner) = fenced(&JSON_FENCE_RE, t) {
        return inner;
    }

    if let Some(inner) = fenced(&ANY_FENCE_RE, t) {
        return inner;
    }

    if let (Some(first), Some(last)) = (t.find('{'), t.rfind('}')) {
        if last > first {
            return t[first..=last].trim().to_string();
        }
    }

    t.to_string()
}

fn fenced(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|inner| !inner.is_empty())
        .map(String::from)
}

/// 取出结构化输出中 message 条目的文本
///
/// 只认 `output` 数组里第一个 `type == "message"` 的条目，
/// 拼接其中所有 `output_text` 片段。找不到时返回空字符串。
pub fn structured_output_text(envelope: &Value) -> String {
    envelope
        .get("output")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        })
        .and_then(|message| message.get("content").and_then(Value::as_array))
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("output_text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
