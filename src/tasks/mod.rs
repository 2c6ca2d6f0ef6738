//! Background Tasks Module
//!
//! Contains background tasks that run alongside the HTTP server.

mod purge;

pub use purge::spawn_purge_task;
