//! HTTP handlers
//!
//! HTML form pages at the root, JSON endpoints under `/api/v1`.

pub mod calendar_api;
pub mod health;
pub mod ui;

pub use calendar_api::calendar_routes;
pub use health::health_routes;
pub use ui::ui_routes;
