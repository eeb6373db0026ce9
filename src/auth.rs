//! GitHub sign-in.
//!
//! GitHub requests work anonymously with a low rate limit; a session token
//! raises it and gives access to private repositories. The token comes from
//! the environment (`GH_TOKEN`, `GITHUB_TOKEN`) or the `token.github` slot.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::commands::TOKEN_MANAGER_COMMAND;
use crate::credentials::{Secret, SecretStore};
use crate::notify::{Level, Notifier};

pub const GITHUB_TOKEN_KEY: &str = "token.github";

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The current session token. With `create_if_none` a missing session
    /// starts the sign-in flow; an existing one is returned unchanged.
    async fn session(&self, create_if_none: bool) -> Option<Secret>;
}

pub struct GithubSession {
    store: Arc<dyn SecretStore>,
    notifier: Arc<dyn Notifier>,
    env_vars: Vec<String>,
}

impl GithubSession {
    pub fn new(store: Arc<dyn SecretStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_env_vars(store, notifier, &["GH_TOKEN", "GITHUB_TOKEN"])
    }

    pub fn with_env_vars(
        store: Arc<dyn SecretStore>,
        notifier: Arc<dyn Notifier>,
        env_vars: &[&str],
    ) -> Self {
        GithubSession {
            store,
            notifier,
            env_vars: env_vars.iter().map(|name| name.to_string()).collect(),
        }
    }

    async fn existing(&self) -> Option<Secret> {
        let from_env = self.env_vars.iter().find_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        });
        if let Some(token) = from_env {
            return Some(Secret::new(token));
        }

        match self.store.get(GITHUB_TOKEN_KEY).await {
            Ok(token) => token.filter(|token| !token.expose().is_empty()),
            Err(err) => {
                warn!(error = %err, "could not read the GitHub token");
                None
            }
        }
    }
}

#[async_trait]
impl AuthProvider for GithubSession {
    async fn session(&self, create_if_none: bool) -> Option<Secret> {
        let existing = self.existing().await;
        if existing.is_none() && create_if_none {
            self.notifier
                .notify(
                    Level::Info,
                    &format!(
                        "Sign in to GitHub: set GITHUB_TOKEN or store a personal access token \
                         with the `{TOKEN_MANAGER_COMMAND}` command (slot `{GITHUB_TOKEN_KEY}`)."
                    ),
                )
                .await;
        }
        existing
    }
}

/// `bug-id.authenticate.github`
pub async fn request_authentication(auth: &dyn AuthProvider, notifier: &dyn Notifier) {
    if auth.session(false).await.is_some() {
        notifier
            .notify(
                Level::Info,
                "The Bug ID extension is already authenticated to GitHub.",
            )
            .await;
    } else {
        auth.session(true).await;
    }
}
