//! Tracker clients.
//!
//! Each tracker family implements [`TrackerClient`]: it owns the matcher for
//! its identifier syntax and resolves a [`Match`] into a [`HoverPayload`] with
//! one (or, for Bugzilla, two concurrent) REST requests.
//!
//! | Tracker  | Identifier        | Request                                   | Auth            |
//! |----------|-------------------|-------------------------------------------|-----------------|
//! | Bugzilla | `bsc#1`, `GCC#1`… | `{base}/rest/bug/{id}` + `/comment`       | `api_key` query |
//! | GitHub   | `gh#o/r#1`        | `{api}/repos/{o/r}/issues/{n}`            | bearer, optional|
//! | Jira     | `jsc#PROJ-1`      | `{base}/rest/api/2/issue/{key}`           | bearer, required|
//! | Progress | `poo#1`           | `{base}/issues/{id}.json`                 | none            |
//! | CVE      | `CVE-2023-1`      | `{api}?cveId=CVE-…`                       | none            |
//!
//! Failures never escape as errors: HTTP statuses and transport problems are
//! classified into the failure payloads by [`failure_payload`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::matcher::{IdentifierMatcher, Match};
use crate::payload::{AuthPrompt, HoverPayload};

pub mod bugzilla;
pub mod cve;
pub mod github;
pub mod jira;
pub mod progress;

#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Human readable tracker name used in messages.
    fn name(&self) -> &str;

    fn matcher(&self) -> &IdentifierMatcher;

    async fn resolve(&self, found: &Match) -> HoverPayload;
}

/// Build the shared HTTP client.
pub fn http_client(settings: &Settings) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()?)
}

/// Why a request did not produce usable JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// `None` for transport and decoding failures.
    pub status: Option<StatusCode>,
    pub detail: String,
}

impl FetchFailure {
    fn from_status(status: StatusCode) -> Self {
        FetchFailure {
            status: Some(status),
            detail: status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Error {}", status.as_u16())),
        }
    }

    fn transport(err: reqwest::Error) -> Self {
        FetchFailure {
            status: None,
            detail: err.to_string(),
        }
    }

    /// True when no HTTP response was received at all.
    pub fn is_transport(&self) -> bool {
        self.status.is_none()
    }
}

/// Send a request; only a transport failure is an error here.
pub(crate) async fn send(request: RequestBuilder) -> std::result::Result<Response, FetchFailure> {
    request.send().await.map_err(|err| {
        warn!(error = %err, "tracker request failed");
        FetchFailure::transport(err)
    })
}

/// Decode a successful response, turning non-2xx statuses into failures.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, FetchFailure> {
    let status = response.status();
    debug!(url = %response.url(), %status, "tracker response");
    if !status.is_success() {
        return Err(FetchFailure::from_status(status));
    }
    response.json::<T>().await.map_err(|err| {
        warn!(error = %err, "could not decode tracker response");
        FetchFailure::transport(err)
    })
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> std::result::Result<(HeaderMap, T), FetchFailure> {
    let response = send(request).await?;
    let headers = response.headers().clone();
    Ok((headers, read_json(response).await?))
}

/// How a tracker authenticates, for classifying HTTP 401.
#[derive(Debug, Clone)]
pub(crate) enum AuthScheme {
    /// No credential is involved.
    Anonymous { tracker: String },
    /// A token from the given slot; `present` tells whether one was sent.
    Token {
        tracker: String,
        key: String,
        token_url: Option<String>,
        present: bool,
    },
}

impl AuthScheme {
    pub(crate) fn prompt(&self) -> AuthPrompt {
        match self {
            AuthScheme::Anonymous { tracker } => AuthPrompt {
                tracker: tracker.clone(),
                credential_key: None,
                token_url: None,
            },
            AuthScheme::Token {
                tracker,
                key,
                token_url,
                ..
            } => AuthPrompt {
                tracker: tracker.clone(),
                credential_key: Some(key.clone()),
                token_url: token_url.clone(),
            },
        }
    }
}

pub(crate) fn failure_payload(failure: FetchFailure, auth: &AuthScheme) -> HoverPayload {
    match failure.status {
        Some(StatusCode::UNAUTHORIZED) => match auth {
            AuthScheme::Token { present: true, .. } => HoverPayload::Unauthorized,
            _ => HoverPayload::Unauthenticated(auth.prompt()),
        },
        Some(StatusCode::FORBIDDEN) => HoverPayload::Forbidden,
        _ => HoverPayload::error(failure.detail),
    }
}

/// Field value as a string; absent or `null` becomes `""`.
pub(crate) fn string_field(value: &serde_json::Value, pointer: &str) -> String {
    match value.pointer(pointer) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
