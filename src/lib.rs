//! # SQL Agent Server
//!
//! Turns natural-language requests into SQL with a large language model and
//! serves the result over a small HTTP API.
//!
//! This crate provides:
//! - **LLM integration**: OpenAI-compatible chat providers behind one trait
//! - **Schema context**: cached table and relationship metadata, refreshed on a timer
//! - **Query tool**: prompt in, SQL or error out, in a fixed result shape
//! - **HTTP API**: `/`, `/health`, `/generate-sql`, `/tools` and `/schema`
//!
//! ## Architecture
//!
//! [`SqlAgentServer`] owns a [`agent::DatabaseAgent`], which composes an
//! [`llm::LlmAdapter`] with an injected [`schema::SchemaCache`]. Handlers are
//! thin wrappers over agent operations.

pub mod agent;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod schema;
pub mod server;
pub mod shutdown;
pub mod telemetry;
pub mod tools;

pub use config::Config;
pub use error::ServerError;
pub use server::SqlAgentServer;
