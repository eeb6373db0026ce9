//! Secret storage for tracker API tokens.
//!
//! [`SecretStore`] is the narrow interface to whatever keeps secrets (the OS
//! keyring in production, memory in tests). Trackers read their token through
//! a [`Credential`], which caches the value and reloads it when the store
//! reports a change, so a newly entered token is used without a restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, warn};

use crate::error::Result;

/// Keyring service name all tokens are stored under.
pub const KEYRING_SERVICE: &str = "bug-id";

#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// A configurable token slot shown by the token manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialSlot {
    pub key: &'static str,
    pub label: &'static str,
}

impl CredentialSlot {
    /// The label without the trailing ` (url)` part.
    pub fn name(&self) -> &'static str {
        self.label
            .find(" (")
            .map(|end| &self.label[..end])
            .unwrap_or(self.label)
    }
}

pub const CREDENTIAL_SLOTS: &[CredentialSlot] = &[
    CredentialSlot {
        key: "bugzilla.gcc.token",
        label: "GCC Bugzilla (https://gcc.gnu.org/bugzilla)",
    },
    CredentialSlot {
        key: "bugzilla.kde.token",
        label: "KDE Bugzilla (https://bugs.kde.org)",
    },
    CredentialSlot {
        key: "bugzilla.kernel.token",
        label: "Linux kernel Bugzilla (https://bugzilla.kernel.org)",
    },
    CredentialSlot {
        key: "bugzilla.mozilla.token",
        label: "Mozilla Bugzilla (https://bugzilla.mozilla.org)",
    },
    CredentialSlot {
        key: "bugzilla.redhat.token",
        label: "Red Hat Bugzilla (https://bugzilla.redhat.com)",
    },
    CredentialSlot {
        key: "token.jira.suse",
        label: "SUSE Jira (https://jira.suse.com)",
    },
    CredentialSlot {
        key: "bugzilla.suse.token",
        label: "SUSE/openSUSE Bugzilla (https://bugzilla.suse.com/https://bugzilla.opensuse.org)",
    },
    CredentialSlot {
        key: "token.github",
        label: "GitHub (https://github.com)",
    },
];

pub fn find_slot(key: &str) -> Option<&'static CredentialSlot> {
    CREDENTIAL_SLOTS.iter().find(|slot| slot.key == key)
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Secret>>;
    async fn store(&self, key: &str, value: Secret) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Keys that currently hold a value.
    async fn keys(&self) -> Result<Vec<String>>;
    /// Receives the key of every stored or deleted secret.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

/// Secrets kept in the operating system keyring.
pub struct KeyringStore {
    service: String,
    changes: broadcast::Sender<String>,
}

impl KeyringStore {
    pub fn new(service: &str) -> Self {
        let (changes, _) = broadcast::channel(32);
        KeyringStore {
            service: service.to_string(),
            changes,
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, key)?)
    }

    fn notify(&self, key: &str) {
        // no subscribers is fine
        let _ = self.changes.send(key.to_string());
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(Secret::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn store(&self, key: &str, value: Secret) -> Result<()> {
        self.entry(key)?.set_password(value.expose())?;
        self.notify(key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                self.notify(key);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    // The keyring cannot enumerate a service, so check the known slots.
    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for slot in CREDENTIAL_SLOTS {
            if self.get(slot.key).await?.is_some() {
                keys.push(slot.key.to_string());
            }
        }
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

/// Process-local secrets, lost on exit.
pub struct MemoryStore {
    secrets: RwLock<HashMap<String, Secret>>,
    changes: broadcast::Sender<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(32);
        MemoryStore {
            secrets: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>> {
        Ok(self.secrets.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, value: Secret) -> Result<()> {
        self.secrets.write().await.insert(key.to_string(), value);
        let _ = self.changes.send(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.secrets.write().await.remove(key);
        let _ = self.changes.send(key.to_string());
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.secrets.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

/// The cached secret of one slot.
///
/// The value is replaced wholesale by a background task whenever the store
/// reports a change to `key`. A request that already read the old value keeps
/// using it; the next one sees the new value.
pub struct Credential {
    key: String,
    current: watch::Receiver<Option<Secret>>,
}

impl Credential {
    pub async fn watch(store: Arc<dyn SecretStore>, key: &str) -> Credential {
        // subscribe before the first load so no change can slip in between
        let mut changes = store.subscribe();
        let (sender, current) = watch::channel(load(store.as_ref(), key).await);

        let watched = key.to_string();
        tokio::spawn(async move {
            loop {
                let reload = match changes.recv().await {
                    Ok(changed) => changed == watched,
                    Err(broadcast::error::RecvError::Lagged(_)) => true,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if sender.is_closed() {
                    break;
                }
                if reload {
                    debug!(key = %watched, "reloading credential");
                    sender.send_replace(load(store.as_ref(), &watched).await);
                }
            }
        });

        Credential {
            key: key.to_string(),
            current,
        }
    }

    /// A credential that never holds a value.
    pub fn absent(key: &str) -> Credential {
        let (_, current) = watch::channel(None);
        Credential {
            key: key.to_string(),
            current,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Option<Secret> {
        self.current.borrow().clone()
    }

    pub fn is_present(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Observe completed reloads.
    pub fn subscribe(&self) -> watch::Receiver<Option<Secret>> {
        self.current.clone()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("present", &self.is_present())
            .finish()
    }
}

async fn load(store: &dyn SecretStore, key: &str) -> Option<Secret> {
    match store.get(key).await {
        Ok(secret) => secret.filter(|secret| !secret.expose().is_empty()),
        Err(err) => {
            warn!(key, error = %err, "could not read credential");
            None
        }
    }
}
