//! Content generation
//!
//! Prompt construction, deterministic fallback content, record parsing, the
//! day-by-day pipeline, batch processing and HTML rendering.

pub mod batch;
pub mod fallback;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod render;

pub use batch::{BatchReport, BatchRunner, BusinessResult, BusinessStatus};
pub use pipeline::{CalendarPipeline, CalendarRequest, Pacing, RequestError};
pub use render::render_table;
