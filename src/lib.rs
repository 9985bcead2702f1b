//! chat-streams: channel and subscription management for a team chat server,
//! laid out as ports and adapters.

pub mod adapters;
pub mod domain;
pub mod integrations;
pub mod ports;
pub mod shared;
pub mod usecases;
