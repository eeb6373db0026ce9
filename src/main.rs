use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bugid::auth::{AuthProvider, GithubSession};
use bugid::commands::{self, CommandContext, COMMANDS};
use bugid::config::{CredentialBackend, Settings};
use bugid::credentials::{KeyringStore, MemoryStore, SecretStore, KEYRING_SERVICE};
use bugid::document::Document;
use bugid::error::Error as BugIdError;
use bugid::notify::{Level, Notifier};
use bugid::registry::{ProviderRegistry, RegistryContext};
use bugid::scanner::{document_links, DecorationStore};
use bugid::trackers::http_client;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{Error as RpcError, Result as RpcResult};
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DocumentLink, DocumentLinkOptions, DocumentLinkParams, ExecuteCommandOptions,
    ExecuteCommandParams, Hover, HoverParams, HoverProviderCapability, InitializeParams,
    InitializeResult, InitializedParams, MessageActionItem, MessageType, ServerCapabilities,
    ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, Url,
};
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bug, issue and CVE identifier language server")]
struct Cli {
    #[arg(long, short, help = "Log tracker requests and scans")]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect the API tokens stored in the keyring
    Tokens {
        #[command(subcommand)]
        action: TokensAction,
    },
}

#[derive(Debug, Subcommand)]
enum TokensAction {
    /// List the token slots and whether a token is stored
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Some(Command::Tokens {
            action: TokensAction::List,
        }) => list_tokens().await,
        None => {
            serve().await;
            Ok(())
        }
    }
}

// stdout is the LSP channel, logs go to stderr
fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("BUG_ID_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("bugid=debug,bug_id=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn list_tokens() -> Result<()> {
    let store = KeyringStore::new(KEYRING_SERVICE);
    for slot in commands::list_slots(&store).await? {
        let marker = if slot.stored { "stored" } else { "-" };
        println!("{:<24} {:<8} {}", slot.key, marker, slot.label);
    }
    Ok(())
}

async fn serve() {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

/// Forwards notifications to the editor.
struct ClientNotifier {
    client: Client,
}

fn message_type(level: Level) -> MessageType {
    match level {
        Level::Info => MessageType::INFO,
        Level::Warning => MessageType::WARNING,
        Level::Error => MessageType::ERROR,
    }
}

#[async_trait]
impl Notifier for ClientNotifier {
    async fn notify(&self, level: Level, message: &str) {
        self.client
            .show_message(message_type(level), message)
            .await;
    }

    async fn request(&self, level: Level, message: &str, actions: &[&str]) -> Option<String> {
        let actions = actions
            .iter()
            .map(|title| MessageActionItem {
                title: title.to_string(),
                properties: HashMap::new(),
            })
            .collect();
        match self
            .client
            .show_message_request(message_type(level), message, Some(actions))
            .await
        {
            Ok(chosen) => chosen.map(|item| item.title),
            Err(err) => {
                warn!(error = %err, "message request failed");
                None
            }
        }
    }
}

/// Everything built from the workspace settings in `initialize`.
struct State {
    settings: Settings,
    registry: Arc<ProviderRegistry>,
    decorations: DecorationStore,
    secrets: Arc<dyn SecretStore>,
    github_auth: Arc<dyn AuthProvider>,
}

struct Backend {
    client: Client,
    notifier: Arc<ClientNotifier>,
    state: RwLock<Option<Arc<State>>>,
    documents: RwLock<HashMap<Url, Document>>,
}

impl Backend {
    fn new(client: Client) -> Self {
        Backend {
            notifier: Arc::new(ClientNotifier {
                client: client.clone(),
            }),
            client,
            state: RwLock::new(None),
            documents: RwLock::new(HashMap::new()),
        }
    }

    async fn build_state(&self, root_dir: PathBuf) -> anyhow::Result<State> {
        let settings = match Settings::new(&root_dir) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "invalid settings, using defaults");
                Settings::default()
            }
        };

        let secrets: Arc<dyn SecretStore> = match settings.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringStore::new(KEYRING_SERVICE)),
            CredentialBackend::Memory => Arc::new(MemoryStore::new()),
        };
        let notifier: Arc<dyn Notifier> = self.notifier.clone();
        let github_auth: Arc<dyn AuthProvider> =
            Arc::new(GithubSession::new(secrets.clone(), notifier.clone()));

        let context = RegistryContext {
            http: http_client(&settings)?,
            secrets: secrets.clone(),
            github_auth: github_auth.clone(),
            notifier,
            rate_limit_threshold: settings.rate_limit_warning_threshold,
        };
        let registry = Arc::new(ProviderRegistry::with_defaults(&context).await?);
        let decorations = DecorationStore::new(
            registry.clone(),
            Duration::from_millis(settings.debounce_ms),
        );

        Ok(State {
            settings,
            registry,
            decorations,
            secrets,
            github_auth,
        })
    }

    async fn state(&self) -> RpcResult<Arc<State>> {
        self.state
            .read()
            .await
            .clone()
            .ok_or_else(RpcError::internal_error)
    }

    async fn document(&self, uri: &Url) -> Option<Document> {
        self.documents.read().await.get(uri).cloned()
    }
}

fn rpc_error(err: BugIdError) -> RpcError {
    match err {
        BugIdError::Arguments(_) | BugIdError::UnknownSlot(_) => {
            RpcError::invalid_params(err.to_string())
        }
        _ => {
            let mut rpc = RpcError::internal_error();
            rpc.message = err.to_string().into();
            rpc
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> RpcResult<InitializeResult> {
        let root_dir = params
            .root_uri
            .and_then(|uri| uri.to_file_path().ok())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();

        let state = self.build_state(root_dir).await.map_err(|err| {
            error!(error = %err, "could not initialize");
            let mut rpc = RpcError::internal_error();
            rpc.message = err.to_string().into();
            rpc
        })?;
        *self.state.write().await = Some(Arc::new(state));

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_link_provider: Some(DocumentLinkOptions {
                    resolve_provider: Some(false),
                    work_done_progress_options: Default::default(),
                }),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: COMMANDS.iter().map(|command| command.to_string()).collect(),
                    work_done_progress_options: Default::default(),
                }),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: "bug-id".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("bug-id language server initialized");
        self.client
            .log_message(MessageType::INFO, "Bug ID language server initialized")
            .await;
    }

    async fn shutdown(&self) -> RpcResult<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let document = Document::new(params.text_document.text);
        if let Ok(state) = self.state().await {
            state.decorations.refresh_now(&uri, document.text()).await;
        }
        self.documents.write().await.insert(uri, document);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // full sync: the last change carries the whole text
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        let document = Document::new(change.text);
        if let Ok(state) = self.state().await {
            state
                .decorations
                .schedule(&uri, document.text().to_string())
                .await;
        }
        self.documents.write().await.insert(uri, document);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.remove(&uri);
        if let Ok(state) = self.state().await {
            state.decorations.forget(&uri).await;
        }
    }

    async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
        let state = self.state().await?;
        let uri = &params.text_document_position_params.text_document.uri;
        let Some(document) = self.document(uri).await else {
            return Ok(None);
        };
        Ok(bugid::hover::hover(&state.registry, &document, &params, &state.settings).await)
    }

    async fn document_link(
        &self,
        params: DocumentLinkParams,
    ) -> RpcResult<Option<Vec<DocumentLink>>> {
        let state = self.state().await?;
        if !state.settings.document_links {
            return Ok(None);
        }
        let uri = params.text_document.uri;
        let Some(document) = self.document(&uri).await else {
            return Ok(None);
        };

        let decorations = state
            .decorations
            .decorations_for(&uri, document.text())
            .await;
        debug!(uri = %uri, count = decorations.len(), "document links");
        Ok(Some(document_links(&document, &decorations)))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> RpcResult<Option<Value>> {
        let state = self.state().await?;
        let context = CommandContext {
            secrets: state.secrets.as_ref(),
            notifier: self.notifier.as_ref(),
            github_auth: state.github_auth.as_ref(),
        };

        commands::execute(context, &params.command, &params.arguments)
            .await
            .map_err(|err| {
                warn!(command = %params.command, error = %err, "command failed");
                rpc_error(err)
            })
    }
}
