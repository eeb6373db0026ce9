//! The ordered set of active tracker clients.
//!
//! Built once when the server initializes and passed explicitly to the
//! scanner and the hover dispatcher. Order matters for hovers: the first
//! client whose matcher covers the cursor wins.

use std::sync::Arc;

use tracing::debug;

use crate::auth::AuthProvider;
use crate::credentials::{Credential, SecretStore};
use crate::error::Result;
use crate::matcher::Match;
use crate::notify::Notifier;
use crate::trackers::bugzilla::{BugzillaClient, BugzillaInstance};
use crate::trackers::cve::{CveClient, NVD_API_URL};
use crate::trackers::github::{GithubClient, GITHUB_API_URL};
use crate::trackers::jira::{JiraClient, JIRA_TOKEN_KEY, JIRA_URL};
use crate::trackers::progress::{ProgressClient, PROGRESS_URL};
use crate::trackers::TrackerClient;

const SUSE_TOKEN: &str = "bugzilla.suse.token";

/// Bugzilla instances, in registration order. Only `GCC#` is case sensitive.
pub const BUGZILLA_INSTANCES: &[BugzillaInstance] = &[
    BugzillaInstance {
        name: "SUSE Bugzilla",
        base_url: "https://bugzilla.suse.com",
        pattern: r"(?i)\bbsc#([0-9]+)\b",
        credential_key: SUSE_TOKEN,
    },
    // the same API token works for both SUSE instances
    BugzillaInstance {
        name: "openSUSE Bugzilla",
        base_url: "https://bugzilla.opensuse.org",
        pattern: r"(?i)\bboo#([0-9]+)\b",
        credential_key: SUSE_TOKEN,
    },
    // old Novell bugzilla, its numbers still resolve at SUSE
    BugzillaInstance {
        name: "SUSE Bugzilla",
        base_url: "https://bugzilla.suse.com",
        pattern: r"(?i)\bbnc#([0-9]+)\b",
        credential_key: SUSE_TOKEN,
    },
    BugzillaInstance {
        name: "GCC Bugzilla",
        base_url: "https://gcc.gnu.org/bugzilla",
        pattern: r"\bGCC#([0-9]+)\b",
        credential_key: "bugzilla.gcc.token",
    },
    BugzillaInstance {
        name: "KDE Bugzilla",
        base_url: "https://bugs.kde.org",
        pattern: r"(?i)\bkde#([0-9]+)\b",
        credential_key: "bugzilla.kde.token",
    },
    BugzillaInstance {
        name: "Linux kernel Bugzilla",
        base_url: "https://bugzilla.kernel.org",
        pattern: r"(?i)\bbko#([0-9]+)\b",
        credential_key: "bugzilla.kernel.token",
    },
    BugzillaInstance {
        name: "Mozilla Bugzilla",
        base_url: "https://bugzilla.mozilla.org",
        pattern: r"(?i)\bbmo#([0-9]+)\b",
        credential_key: "bugzilla.mozilla.token",
    },
    BugzillaInstance {
        name: "Red Hat Bugzilla",
        base_url: "https://bugzilla.redhat.com",
        pattern: r"(?i)\brh#([0-9]+)\b",
        credential_key: "bugzilla.redhat.token",
    },
];

/// Everything the default trackers need.
#[derive(Clone)]
pub struct RegistryContext {
    pub http: reqwest::Client,
    pub secrets: Arc<dyn SecretStore>,
    pub github_auth: Arc<dyn AuthProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limit_threshold: u64,
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    clients: Vec<Arc<dyn TrackerClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// GitHub, Progress, CVE, Jira, then every Bugzilla instance.
    pub async fn with_defaults(context: &RegistryContext) -> Result<Self> {
        let mut registry = ProviderRegistry::new();

        registry.register(Arc::new(GithubClient::new(
            context.http.clone(),
            GITHUB_API_URL,
            context.github_auth.clone(),
            context.notifier.clone(),
            context.rate_limit_threshold,
        )?));
        registry.register(Arc::new(ProgressClient::new(
            context.http.clone(),
            PROGRESS_URL,
        )?));
        registry.register(Arc::new(CveClient::new(context.http.clone(), NVD_API_URL)?));
        registry.register(Arc::new(JiraClient::new(
            context.http.clone(),
            JIRA_URL,
            Credential::watch(context.secrets.clone(), JIRA_TOKEN_KEY).await,
        )?));

        for instance in BUGZILLA_INSTANCES {
            let credential =
                Credential::watch(context.secrets.clone(), instance.credential_key).await;
            registry.register(Arc::new(BugzillaClient::new(
                context.http.clone(),
                instance,
                credential,
            )?));
        }

        debug!(trackers = registry.clients.len(), "provider registry built");
        Ok(registry)
    }

    pub fn register(&mut self, client: Arc<dyn TrackerClient>) {
        self.clients.push(client);
    }

    pub fn all(&self) -> &[Arc<dyn TrackerClient>] {
        &self.clients
    }

    /// The first client whose identifier covers `offset`, with that match.
    pub fn lookup(&self, text: &str, offset: usize) -> Option<(Arc<dyn TrackerClient>, Match)> {
        self.clients.iter().find_map(|client| {
            let found = client.matcher().match_at(text, offset)?;
            Some((client.clone(), found))
        })
    }
}
