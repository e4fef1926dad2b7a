pub mod extractor;
pub mod normalizer;
pub mod prompt;

pub use extractor::{extract_json_text, extract_reply, Extracted};
pub use normalizer::{normalize, NormalizeStats};
