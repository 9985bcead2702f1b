//! Port traits. API boundaries for the hexagon.
//!
//! Outbound only: use cases call into storage and notification delivery.
//! The HTTP adapter drives the use cases directly.

pub mod outbound;

pub use outbound::{ChatStore, NotificationSink, StoreTx};
