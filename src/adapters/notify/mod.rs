//! Notification adapters. Implement NotificationSink.
//!
//! Provides the queue feeding the notification worker and a recording sink for testing.

pub mod queue;
pub mod recording;

pub use queue::QueueNotifier;
pub use recording::RecordingNotifier;
