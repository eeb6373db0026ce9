//! Shared test utilities.
//!
//! Only compiled when running tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::AuthProvider;
use crate::config::Settings;
use crate::credentials::{MemoryStore, Secret};
use crate::notify::{Level, Notifier};
use crate::registry::{ProviderRegistry, RegistryContext};
use crate::trackers::http_client;

/// Records every notification and answers requests from a queue.
///
/// Requests are recorded like notifications. An empty queue answers `None`,
/// the same as a dismissed message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Level, String)>>,
    answers: Mutex<VecDeque<Option<String>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().unwrap().clone()
    }

    /// Queue the answer for the next request.
    pub fn answer(&self, action: Option<&str>) {
        self.answers
            .lock()
            .unwrap()
            .push_back(action.map(str::to_string));
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }

    async fn request(&self, level: Level, message: &str, _actions: &[&str]) -> Option<String> {
        self.notify(level, message).await;
        self.answers.lock().unwrap().pop_front().flatten()
    }
}

/// An auth provider with a fixed session.
#[derive(Default)]
pub struct StaticAuth {
    pub token: Option<Secret>,
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn session(&self, _create_if_none: bool) -> Option<Secret> {
        self.token.clone()
    }
}

/// The default registry over an empty in-memory store.
///
/// Nothing here performs a request; tests that hit the network build their
/// clients against a mock server instead.
pub async fn test_registry() -> ProviderRegistry {
    let context = RegistryContext {
        http: http_client(&Settings::default()).unwrap(),
        secrets: Arc::new(MemoryStore::new()),
        github_auth: Arc::new(StaticAuth::default()),
        notifier: Arc::new(RecordingNotifier::default()),
        rate_limit_threshold: 10,
    };
    ProviderRegistry::with_defaults(&context).await.unwrap()
}
