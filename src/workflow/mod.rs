pub mod grade_flow;
pub mod request_ctx;

pub use grade_flow::GradeFlow;
pub use request_ctx::RequestCtx;
