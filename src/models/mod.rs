pub mod grade;
pub mod submission;

use serde::{Deserialize, Deserializer};

pub use grade::{GradeReport, GradeResult};
pub use submission::{coerce_number, GradeRequest, Submission};

/// 字段出现即为 `Some`，显式的 `null` 也保留为 `Some(null)`
///
/// 配合 `#[serde(default)]` 使用，缺失字段为 `None`
pub(crate) fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// 可缺失字段的数值形式，缺失时为 NaN
pub(crate) fn coerce_field(value: Option<&serde_json::Value>) -> f64 {
    value.map_or(f64::NAN, coerce_number)
}
