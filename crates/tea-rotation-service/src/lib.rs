//! Tea rotation HTTP API service.
//!
//! This crate provides the HTTP API for the tea rotation, including:
//!
//! - Users and their rotation counters
//! - Sessions and drink orders
//! - The two-phase summarize workflow that picks who makes tea
//!
//! # Authentication
//!
//! 1. **HS256 JWT tokens** - Optional. Identify who confirmed an assignee.
//! 2. **Admin API key** - Required for destructive admin endpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Health handler needs async for routing

pub mod auth;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use engine::{AssignmentEngine, EngineError, SummarizeOutcome, SummarizeRequest};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
