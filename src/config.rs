use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// Resolve identifiers on hover
    pub hover: bool,
    /// Report identifiers as document links
    pub document_links: bool,
    /// Quiet period after an edit before the document is rescanned
    pub debounce_ms: u64,
    /// Warn once fewer GitHub requests than this remain
    pub rate_limit_warning_threshold: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub credential_backend: CredentialBackend,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum CredentialBackend {
    Keyring,
    Memory,
}

impl Settings {
    pub fn new(root_dir: &Path) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/bug-id/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.bug-id",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("hover", true)?
            .set_default("document_links", true)?
            .set_default("debounce_ms", 500)?
            .set_default("rate_limit_warning_threshold", 10)?
            .set_default("request_timeout_secs", 30)?
            .set_default("user_agent", "bug-id-lsp")?
            .set_default("credential_backend", "Keyring")?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            hover: true,
            document_links: true,
            debounce_ms: 500,
            rate_limit_warning_threshold: 10,
            request_timeout_secs: 30,
            user_agent: "bug-id-lsp".to_string(),
            credential_backend: CredentialBackend::Keyring,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    /// Test: A workspace `.bug-id` file overrides the defaults.
    #[test]
    fn test_settings_from_workspace_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".bug-id.toml"),
            "debounce_ms = 250\nhover = false\ncredential_backend = \"Memory\"\n",
        )
        .unwrap();

        let settings = Settings::new(temp_dir.path()).unwrap();
        assert_eq!(settings.debounce_ms, 250);
        assert!(!settings.hover);
        assert_eq!(settings.credential_backend, CredentialBackend::Memory);
        assert!(settings.document_links);
        assert_eq!(settings.rate_limit_warning_threshold, 10);
    }

    #[test]
    fn test_settings_defaults_without_files() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::new(temp_dir.path()).unwrap();
        assert_eq!(settings.user_agent, "bug-id-lsp");
        assert!(settings.request_timeout_secs > 0);
    }
}
