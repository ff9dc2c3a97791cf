//! # B.E.L.L.A. Common Library
//!
//! Shared code for the content calendar service including:
//! - Calendar data types (entries, businesses, content sources)
//! - Configuration loading and root folder resolution
//! - Database schema initialization
//! - Error types and timestamp helpers

pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use calendar::{Business, Calendar, CalendarEntry, ContentSource};
pub use error::{Error, Result};
