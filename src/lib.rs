//! voice-sql: natural-language to SQL over HTTP.
//!
//! A prompt posted to `/process-voice` is wrapped in a model-specific
//! template, sent to an inference backend (a hosted text-generation endpoint
//! or an in-process seq2seq model) and the reply is returned as
//! `{"status": ..., "message": "SQL: ..."}`.

pub mod config;
pub mod inference;
pub mod metrics;
pub mod prompt;
pub mod server;
