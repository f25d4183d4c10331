//! API Module
//!
//! HTTP handlers and routing for the cache admin REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a precomputed value
//! - `GET /get/:key` - Read a fresh value without fetching
//! - `DELETE /del/:key` - Invalidate a key
//! - `POST /commit` - Persist fresh entries to the blob store
//! - `DELETE /clear` - Drop every in-memory entry
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
