//! HTTP server for SQL generation.
//!
//! - [`api`]: Request/response types and route handlers
//! - [`interpret`]: Inference outcome to status/message mapping

pub mod api;
pub mod interpret;
