//! Database access for the server
//!
//! Schema creation lives in `bella_common::db`; this module holds the queries.

pub mod calendars;
pub mod queue;
pub mod usage;
pub mod users;
