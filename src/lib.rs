//! bug-id: a Language Server that resolves bug, issue and CVE identifiers
//!
//! Identifiers such as `bsc#1234`, `gh#owner/repo#42`, `jsc#PROJ-1`,
//! `poo#98765` or `CVE-2023-12345` are recognised in any open document.
//!
//! - **Document links**: every identifier links to its canonical tracker page
//! - **Hover**: the tracker is queried and a rich summary is rendered
//! - **Token manager**: API tokens are kept in the OS keyring
//!
//! # Architecture
//!
//! - [`matcher`]: pattern matching and link templates
//! - [`trackers`]: one client per tracker kind, all producing a [`payload::HoverPayload`]
//! - [`registry`]: the ordered set of active clients
//! - [`render`]: hover payload to Markdown
//! - [`scanner`]: debounced document decoration
//! - [`credentials`] and [`commands`]: secret storage and the token manager
//!
//! ```ignore
//! use bugid::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_defaults(&context).await?;
//! let payload = bugid::hover::dispatch(&registry, "see bsc#1234", 6).await;
//! ```

// Identifier recognition and tracker access
pub mod matcher;
pub mod registry;
pub mod trackers;

// LSP feature modules
pub mod commands;
pub mod document;
pub mod hover;
pub mod scanner;

// Presentation
pub mod html;
pub mod payload;
pub mod render;
pub mod time;

// Secrets, sign-in and user messages
pub mod auth;
pub mod credentials;
pub mod notify;

// Configuration and errors
pub mod config;
pub mod error;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
