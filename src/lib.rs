//! Mock chat completion server for testing client integrations.
//!
//! Features:
//! - Fixed OpenAI-style model listing
//! - Chat completions that echo back what the client sent
//! - Diagnostic request log mirrored to a file and the console

pub mod api;
pub mod config;
pub mod error;
pub mod logger;
