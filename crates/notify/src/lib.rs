//! Operator alerting for failed fetch jobs.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - SNS topic and HTTP webhook notifier implementations
//! - Dispatcher that fans a notification out to every configured channel

pub mod dispatcher;
pub mod sns;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use sns::SnsNotifier;
pub use traits::{DispatchResult, Notification, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
