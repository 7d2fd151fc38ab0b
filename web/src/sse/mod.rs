//! SSE HTTP handlers for the web layer.
//!
//! This module only adapts HTTP requests to the `sse` crate: it checks what
//! the request's transport can do, builds the response stream, and hands its
//! writing end over to the delivery core.

pub mod handler;
