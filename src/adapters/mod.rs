//! Infrastructure adapters. Implement outbound ports and expose the HTTP API.
//!
//! libsql storage, notification delivery, axum routes. Map errors to DomainError.

pub mod http;
pub mod notify;
pub mod persistence;
