//! 评分提示词
//!
//! 提示词与 JSON Schema 描述的是同一个结构，改动时需要同步。

use serde_json::{json, Value};

use crate::models::Submission;

/// 内置评分提示词
pub const DEFAULT_RUBRIC_PROMPT: &str = "\
Bạn là giám khảo Toán THPT Việt Nam.
Chấm phần LỜI GIẢI theo thang điểm tối đa = points của từng submission. KHÔNG chấm đáp số.
Dựa vào: prompt (đề), solutionKey (lời giải chuẩn), rubric (các ý).
YÊU CẦU: Chỉ trả về JSON THUẦN (không markdown, không ```).
Schema JSON bắt buộc:
{
  \"results\": [
    { \"qid\": number, \"score\": number, \"feedback\": string, \"key_points_hit\": string[] }
  ]
}
Không được thêm bất kỳ chữ nào ngoài JSON.";

/// 数据部分前的标签
pub const DATA_LABEL: &str = "\n\nDỮ LIỆU:\n";

/// 取得生效的提示词
pub fn rubric_prompt(custom: Option<&str>) -> &str {
    custom
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_RUBRIC_PROMPT)
}

/// 整批题目的 JSON 文本：`{"submissions":[...]}`
pub fn batch_payload(batch: &[Submission]) -> String {
    serde_json::to_string(&json!({ "submissions": batch })).unwrap_or_default()
}

/// 结构化输出使用的 JSON Schema
pub fn result_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["results"],
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["qid", "score", "feedback", "key_points_hit"],
                    "properties": {
                        "qid": { "type": "number" },
                        "score": { "type": "number", "minimum": 0 },
                        "feedback": { "type": "string" },
                        "key_points_hit": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    }
                }
            }
        }
    })
}
