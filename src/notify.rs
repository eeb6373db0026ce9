//! User facing notifications.
//!
//! The language server forwards these to `window/showMessage` and
//! `window/showMessageRequest`; without a client they only go to the log.

use async_trait::async_trait;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, level: Level, message: &str);

    /// Show a message with action buttons; returns the chosen action.
    async fn request(&self, level: Level, message: &str, actions: &[&str]) -> Option<String>;
}

/// Writes notifications to the log and never picks an action.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Info => info!("{message}"),
            Level::Warning => warn!("{message}"),
            Level::Error => error!("{message}"),
        }
    }

    async fn request(&self, level: Level, message: &str, _actions: &[&str]) -> Option<String> {
        self.notify(level, message).await;
        None
    }
}
