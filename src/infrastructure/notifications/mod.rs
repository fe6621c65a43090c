//! # Notifications
//!
//! Best-effort delivery of ledger events to external listeners.

pub mod log;
pub mod notifier;
pub mod traits;
pub mod webhook;

pub use log::{RecordingDispatcher, TracingDispatcher};
pub use notifier::Notifier;
pub use traits::{NotificationDispatcher, NotificationError, NotificationResult};
pub use webhook::WebhookDispatcher;
