//! API Module
//!
//! HTTP handlers and routing for the persistent cache server.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `DELETE /clear` - Remove every entry
//! - `POST /dump` - Write the snapshot now
//! - `GET /snapshot` - Current snapshot
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
