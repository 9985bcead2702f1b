//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod policy;

pub use entities::{
    DefaultStreamGroup, Message, NewStream, NewUser, OutgoingMessage, Realm, Recipient, Stream,
    StreamPostPolicy, Subscription, SystemGroup, TopicSummary, User, UserRole,
};
pub use errors::DomainError;
