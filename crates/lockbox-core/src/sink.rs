//! The structured activity-event collaborator.
//!
//! Components receive a sink at construction instead of touching global
//! state; one sink is built at program startup and injected everywhere.
//! Sinks are best-effort by contract — the trait cannot fail, and
//! implementations must never block the caller.

use std::sync::Arc;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Activity tags used across the toolkit.
pub mod activity {
    pub const ENCRYPT: &str = "ENCRYPT";
    pub const DECRYPT: &str = "DECRYPT";
    pub const VERIFY_HASH: &str = "VERIFY_HASH";
    pub const FSW_START: &str = "FSW_START";
    pub const FSW_STOP: &str = "FSW_STOP";
    pub const FSW_NEW_FILE: &str = "FSW_NEW_FILE";
    pub const SEND_FILE: &str = "SEND_FILE";
    pub const RECEIVE_FILE: &str = "RECEIVE_FILE";
    pub const CLIENT_CONNECT: &str = "CLIENT_CONNECT";
    pub const SERVER_START: &str = "SERVER_START";
    pub const SERVER_STOP: &str = "SERVER_STOP";
}

pub trait EventSink: Send + Sync {
    /// Record one activity event. `details` is a JSON object of
    /// operation-specific fields.
    fn log_event(&self, level: Level, activity: &str, message: &str, success: bool, details: Value);

    /// Flush and release any resources. Safe to call more than once.
    fn close(&self) {}

    fn info(&self, activity: &str, message: &str, details: Value) {
        self.log_event(Level::Info, activity, message, true, details);
    }

    fn warning(&self, activity: &str, message: &str, success: bool, details: Value) {
        self.log_event(Level::Warning, activity, message, success, details);
    }

    fn error(&self, activity: &str, message: &str, details: Value) {
        self.log_event(Level::Error, activity, message, false, details);
    }
}

pub type SharedSink = Arc<dyn EventSink>;

/// Forwards activity events to the `tracing` subscriber.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log_event(&self, level: Level, activity: &str, message: &str, success: bool, details: Value) {
        match level {
            Level::Info => {
                tracing::info!(target: "lockbox::activity", activity, success, details = %details, "{message}")
            }
            Level::Warning => {
                tracing::warn!(target: "lockbox::activity", activity, success, details = %details, "{message}")
            }
            Level::Error => {
                tracing::error!(target: "lockbox::activity", activity, success, details = %details, "{message}")
            }
        }
    }
}

/// Discards everything. Handy in tests.
pub struct NullSink;

impl EventSink for NullSink {
    fn log_event(
        &self,
        _level: Level,
        _activity: &str,
        _message: &str,
        _success: bool,
        _details: Value,
    ) {
    }
}
