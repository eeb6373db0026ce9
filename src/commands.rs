//! `workspace/executeCommand` handlers: the API token manager and GitHub
//! sign-in.
//!
//! | Command                      | Arguments          | Effect                               |
//! |------------------------------|--------------------|--------------------------------------|
//! | `bug-id.token.manager`       | none               | pick a slot or "delete all"          |
//! | `bug-id.token.manager`       | `[key]`            | explain how to set that slot         |
//! | `bug-id.token.manager`       | `[key, token]`     | store the token, `""` deletes it     |
//! | `bug-id.suse.token.manager`  | `[token]`?         | same, for the SUSE Bugzilla slot     |
//! | `bug-id.token.list`          | none               | returns the slots and whether set    |
//! | `bug-id.authenticate.github` | none               | confirm or start GitHub sign-in      |

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::{request_authentication, AuthProvider};
use crate::credentials::{find_slot, CredentialSlot, Secret, SecretStore, CREDENTIAL_SLOTS};
use crate::error::{Error, Result};
use crate::notify::{Level, Notifier};

pub const TOKEN_MANAGER_COMMAND: &str = "bug-id.token.manager";
pub const SUSE_TOKEN_MANAGER_COMMAND: &str = "bug-id.suse.token.manager";
pub const TOKEN_LIST_COMMAND: &str = "bug-id.token.list";
pub const GITHUB_AUTH_COMMAND: &str = "bug-id.authenticate.github";

pub const COMMANDS: &[&str] = &[
    TOKEN_MANAGER_COMMAND,
    SUSE_TOKEN_MANAGER_COMMAND,
    TOKEN_LIST_COMMAND,
    GITHUB_AUTH_COMMAND,
];

pub const DELETE_ALL_ACTION: &str = "Delete all API tokens stored by the Bug ID extension";
const CONFIRM_NO: &str = "No";
const CONFIRM_YES: &str = "Yes, delete all";

#[derive(Clone, Copy)]
pub struct CommandContext<'a> {
    pub secrets: &'a dyn SecretStore,
    pub notifier: &'a dyn Notifier,
    pub github_auth: &'a dyn AuthProvider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub key: String,
    pub label: String,
    pub stored: bool,
}

pub async fn execute(
    context: CommandContext<'_>,
    command: &str,
    arguments: &[Value],
) -> Result<Option<Value>> {
    match command {
        TOKEN_MANAGER_COMMAND => {
            token_manager(
                context,
                string_argument(arguments, 0)?,
                string_argument(arguments, 1)?,
            )
            .await?;
            Ok(None)
        }
        SUSE_TOKEN_MANAGER_COMMAND => {
            token_manager(
                context,
                Some("bugzilla.suse.token"),
                string_argument(arguments, 0)?,
            )
            .await?;
            Ok(None)
        }
        TOKEN_LIST_COMMAND => {
            let slots = list_slots(context.secrets).await?;
            Ok(Some(serde_json::to_value(slots).map_err(|err| {
                Error::Arguments(format!("cannot serialize slots: {err}"))
            })?))
        }
        GITHUB_AUTH_COMMAND => {
            request_authentication(context.github_auth, context.notifier).await;
            Ok(None)
        }
        other => Err(Error::Arguments(format!("unknown command {other}"))),
    }
}

fn string_argument(arguments: &[Value], index: usize) -> Result<Option<&str>> {
    match arguments.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(Error::Arguments(format!(
            "argument {index} must be a string, got {other}"
        ))),
    }
}

async fn token_manager(
    context: CommandContext<'_>,
    key: Option<&str>,
    value: Option<&str>,
) -> Result<()> {
    let Some(key) = key else {
        return select_token(context).await;
    };
    let slot = find_slot(key).ok_or_else(|| Error::UnknownSlot(key.to_string()))?;

    match value {
        Some(value) => set_token(context, slot, value).await,
        None => {
            context
                .notifier
                .notify(
                    Level::Info,
                    &format!(
                        "Bug ID: run `{TOKEN_MANAGER_COMMAND}` with [\"{}\", \"<token>\"] to store \
                         your {} API token, an empty token deletes the stored one.",
                        slot.key,
                        slot.name()
                    ),
                )
                .await;
            Ok(())
        }
    }
}

async fn select_token(context: CommandContext<'_>) -> Result<()> {
    let mut actions: Vec<&str> = CREDENTIAL_SLOTS.iter().map(|slot| slot.label).collect();
    actions.push(DELETE_ALL_ACTION);

    let chosen = context
        .notifier
        .request(
            Level::Info,
            "Bug ID: API token manager. Select which API token you want to configure",
            &actions,
        )
        .await;

    match chosen.as_deref() {
        Some(DELETE_ALL_ACTION) => {
            delete_all(context).await?;
            Ok(())
        }
        Some(label) => match CREDENTIAL_SLOTS.iter().find(|slot| slot.label == label) {
            Some(slot) => Box::pin(token_manager(context, Some(slot.key), None)).await,
            None => Ok(()),
        },
        None => Ok(()),
    }
}

pub async fn set_token(
    context: CommandContext<'_>,
    slot: &CredentialSlot,
    value: &str,
) -> Result<()> {
    let message = if value.is_empty() {
        context.secrets.delete(slot.key).await?;
        format!("Bug ID: API token for {} has been deleted", slot.name())
    } else {
        context.secrets.store(slot.key, Secret::new(value)).await?;
        format!("Bug ID: API token for {} has been updated", slot.name())
    };
    info!(key = slot.key, "{message}");
    context.notifier.notify(Level::Info, &message).await;
    Ok(())
}

/// Deletes every stored token after explicit confirmation.
///
/// Returns whether the deletion was confirmed.
pub async fn delete_all(context: CommandContext<'_>) -> Result<bool> {
    let confirmed = context
        .notifier
        .request(
            Level::Warning,
            "Bug ID: Confirm deleting all API tokens from the Bug ID extension",
            &[CONFIRM_NO, CONFIRM_YES],
        )
        .await;
    if confirmed.as_deref() != Some(CONFIRM_YES) {
        return Ok(false);
    }

    for key in context.secrets.keys().await? {
        // keep going, one broken entry must not block the others
        if let Err(err) = context.secrets.delete(&key).await {
            warn!(key, error = %err, "could not delete API token");
        }
    }
    context
        .notifier
        .notify(Level::Info, "Bug ID: All stored API tokens were deleted")
        .await;
    Ok(true)
}

pub async fn list_slots(secrets: &dyn SecretStore) -> Result<Vec<SlotStatus>> {
    let stored = secrets.keys().await?;
    Ok(CREDENTIAL_SLOTS
        .iter()
        .map(|slot| SlotStatus {
            key: slot.key.to_string(),
            label: slot.label.to_string(),
            stored: stored.iter().any(|key| key == slot.key),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::credentials::MemoryStore;
    use crate::test_utils::{RecordingNotifier, StaticAuth};

    struct Fixture {
        secrets: MemoryStore,
        notifier: RecordingNotifier,
        auth: StaticAuth,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                secrets: MemoryStore::new(),
                notifier: RecordingNotifier::default(),
                auth: StaticAuth::default(),
            }
        }

        fn context(&self) -> CommandContext<'_> {
            CommandContext {
                secrets: &self.secrets,
                notifier: &self.notifier,
                github_auth: &self.auth,
            }
        }
    }

    #[tokio::test]
    async fn test_store_and_delete_token() {
        let fixture = Fixture::new();
        execute(
            fixture.context(),
            TOKEN_MANAGER_COMMAND,
            &[json!("bugzilla.kde.token"), json!("secret")],
        )
        .await
        .unwrap();
        assert_eq!(
            fixture.secrets.get("bugzilla.kde.token").await.unwrap(),
            Some(Secret::new("secret"))
        );
        assert_eq!(
            fixture.notifier.messages().last().unwrap().1,
            "Bug ID: API token for KDE Bugzilla has been updated"
        );

        execute(
            fixture.context(),
            TOKEN_MANAGER_COMMAND,
            &[json!("bugzilla.kde.token"), json!("")],
        )
        .await
        .unwrap();
        assert!(fixture
            .secrets
            .get("bugzilla.kde.token")
            .await
            .unwrap()
            .is_none());
        assert!(fixture.notifier.messages().last().unwrap().1.ends_with("deleted"));
    }

    #[tokio::test]
    async fn test_unknown_slot() {
        let fixture = Fixture::new();
        let result = execute(
            fixture.context(),
            TOKEN_MANAGER_COMMAND,
            &[json!("nope"), json!("x")],
        )
        .await;
        assert!(matches!(result, Err(Error::UnknownSlot(_))));
    }

    #[tokio::test]
    async fn test_suse_shortcut() {
        let fixture = Fixture::new();
        execute(fixture.context(), SUSE_TOKEN_MANAGER_COMMAND, &[json!("t")])
            .await
            .unwrap();
        assert!(fixture
            .secrets
            .get("bugzilla.suse.token")
            .await
            .unwrap()
            .is_some());
    }

    /// Test: Delete-all without confirmation keeps every token.
    #[tokio::test]
    async fn test_delete_all_requires_confirmation() {
        let fixture = Fixture::new();
        fixture
            .secrets
            .store("token.jira.suse", Secret::new("j"))
            .await
            .unwrap();

        fixture.notifier.answer(Some(CONFIRM_NO));
        assert!(!delete_all(fixture.context()).await.unwrap());
        assert_eq!(fixture.secrets.keys().await.unwrap().len(), 1);

        fixture.notifier.answer(None);
        assert!(!delete_all(fixture.context()).await.unwrap());
        assert_eq!(fixture.secrets.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_from_picker() {
        let fixture = Fixture::new();
        fixture
            .secrets
            .store("token.jira.suse", Secret::new("j"))
            .await
            .unwrap();
        fixture
            .secrets
            .store("bugzilla.gcc.token", Secret::new("g"))
            .await
            .unwrap();

        fixture.notifier.answer(Some(DELETE_ALL_ACTION));
        fixture.notifier.answer(Some(CONFIRM_YES));
        execute(fixture.context(), TOKEN_MANAGER_COMMAND, &[])
            .await
            .unwrap();

        assert!(fixture.secrets.keys().await.unwrap().is_empty());
        assert_eq!(
            fixture.notifier.messages().last().unwrap().1,
            "Bug ID: All stored API tokens were deleted"
        );
    }

    #[tokio::test]
    async fn test_list_slots() {
        let fixture = Fixture::new();
        fixture
            .secrets
            .store("bugzilla.redhat.token", Secret::new("r"))
            .await
            .unwrap();

        let listed = execute(fixture.context(), TOKEN_LIST_COMMAND, &[])
            .await
            .unwrap()
            .unwrap();
        let slots: Vec<Value> = serde_json::from_value(listed).unwrap();
        assert_eq!(slots.len(), CREDENTIAL_SLOTS.len());
        let redhat = slots
            .iter()
            .find(|slot| slot["key"] == "bugzilla.redhat.token")
            .unwrap();
        assert_eq!(redhat["stored"], json!(true));
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let fixture = Fixture::new();
        let result = execute(fixture.context(), TOKEN_MANAGER_COMMAND, &[json!(1)]).await;
        assert!(matches!(result, Err(Error::Arguments(_))));
        let result = execute(fixture.context(), "bug-id.nope", &[]).await;
        assert!(matches!(result, Err(Error::Arguments(_))));
    }
}
