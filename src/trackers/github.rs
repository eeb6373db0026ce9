//! GitHub issues and pull requests.
//!
//! The issues endpoint answers for pull requests too, so one request covers
//! both. Anonymous requests are allowed but heavily rate limited; every
//! response is checked and the user is offered to sign in when the remaining
//! quota runs low.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::auth::{AuthProvider, GITHUB_TOKEN_KEY};
use crate::error::Result;
use crate::matcher::{IdentifierMatcher, Match};
use crate::notify::{Level, Notifier};
use crate::payload::{Cell, Description, HoverPayload, IssueSummary};
use crate::time::parse_timestamp;

use super::{failure_payload, read_json, send, string_field, AuthScheme, TrackerClient};

pub const GITHUB_PATTERN: &str = r"(?i)\bgh#(\S+)#([0-9]+)\b";
pub const GITHUB_URL: &str = "https://github.com";
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Button offered with rate limit warnings.
pub const SIGN_IN_ACTION: &str = "Sign in to GitHub";

/// Images in issue bodies are scaled to fit this box.
const MAX_IMAGE_SIZE: u32 = 500;

pub struct GithubClient {
    http: reqwest::Client,
    matcher: IdentifierMatcher,
    api_url: String,
    auth: Arc<dyn AuthProvider>,
    notifier: Arc<dyn Notifier>,
    rate_limit_threshold: u64,
}

impl GithubClient {
    pub fn new(
        http: reqwest::Client,
        api_url: &str,
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
        rate_limit_threshold: u64,
    ) -> Result<Self> {
        Ok(GithubClient {
            http,
            matcher: IdentifierMatcher::new(GITHUB_PATTERN, GITHUB_URL, "{base}/{1}/issues/{2}")?,
            api_url: api_url.trim_end_matches('/').to_string(),
            auth,
            notifier,
            rate_limit_threshold,
        })
    }

    fn warn_rate_limit(&self, warning: RateLimitWarning) {
        let notifier = self.notifier.clone();
        let auth = self.auth.clone();
        tokio::spawn(async move {
            let (level, message) = match warning.remaining {
                0 => (Level::Error, "GitHub API rate limit reached!".to_string()),
                remaining => (
                    Level::Warning,
                    format!("Reaching GitHub API rate limit: {remaining} requests remaining."),
                ),
            };
            // the warning goes out first, the reset note must not wait for its answer
            let reset_note = async {
                if let Some(minutes) = warning.reset_minutes {
                    notifier
                        .notify(
                            Level::Info,
                            &format!("GitHub rate limit will reset after {minutes} minutes."),
                        )
                        .await;
                }
            };
            let (chosen, ()) = tokio::join!(
                notifier.request(level, &message, &[SIGN_IN_ACTION]),
                reset_note
            );
            if chosen.as_deref() == Some(SIGN_IN_ACTION) {
                auth.session(true).await;
            }
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWarning {
    pub remaining: u64,
    pub reset_minutes: Option<i64>,
}

impl RateLimitWarning {
    /// An exhausted quota gets a blocking error instead of a warning.
    pub fn is_blocking(&self) -> bool {
        self.remaining == 0
    }
}

/// Inspect `X-RateLimit-Remaining`/`X-RateLimit-Reset`.
///
/// Returns `None` when the header is missing or the quota is above
/// `threshold`.
pub fn check_rate_limit(
    headers: &HeaderMap,
    threshold: u64,
    now: DateTime<Utc>,
) -> Option<RateLimitWarning> {
    let header = |name: &str| -> Option<i64> { headers.get(name)?.to_str().ok()?.trim().parse().ok() };

    let remaining = u64::try_from(header("x-ratelimit-remaining")?).ok()?;
    if remaining > threshold {
        return None;
    }

    // the header is untrusted input, an absurd value just drops the note
    let reset_minutes = header("x-ratelimit-reset")
        .and_then(|reset| reset.checked_sub(now.timestamp()))
        .map(|seconds| (seconds as f64 / 60.0).round() as i64);

    Some(RateLimitWarning {
        remaining,
        reset_minutes,
    })
}

/// Scale `<img width=".." height="..">` down to fit [`MAX_IMAGE_SIZE`].
pub fn scale_images(body: &str) -> String {
    static IMG_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"<img\s+width="([0-9]+)"\s+height="([0-9]+)""#).unwrap());

    IMG_RE
        .replace_all(body, |captures: &Captures| {
            let original = captures[0].to_string();
            let (Ok(width), Ok(height)) = (captures[1].parse::<u32>(), captures[2].parse::<u32>())
            else {
                return original;
            };
            if width <= MAX_IMAGE_SIZE && height <= MAX_IMAGE_SIZE {
                return original;
            }

            let (width, height) = if width > height {
                let ratio = f64::from(width) / f64::from(MAX_IMAGE_SIZE);
                (MAX_IMAGE_SIZE, (f64::from(height) / ratio).round() as u32)
            } else {
                let ratio = f64::from(height) / f64::from(MAX_IMAGE_SIZE);
                ((f64::from(width) / ratio).round() as u32, MAX_IMAGE_SIZE)
            };
            format!(r#"<img width="{width}" height="{height}""#)
        })
        .into_owned()
}

fn summary(data: &Value) -> IssueSummary {
    let kind = if data.get("pull_request").is_some_and(|pr| !pr.is_null()) {
        "PR"
    } else {
        "Issue"
    };

    let mut people = vec![vec![
        Cell::label("Created by:"),
        Cell::text(string_field(data, "/user/login")),
        Cell::label("Created:"),
        Cell::Time(parse_timestamp(&string_field(data, "/created_at"))),
    ]];
    if data.get("assignee").is_some_and(|assignee| !assignee.is_null()) {
        people.push(vec![
            Cell::label("Assigned to:"),
            Cell::text(string_field(data, "/assignee/login")),
        ]);
    }
    let closed_at = string_field(data, "/closed_at");
    if !closed_at.is_empty() {
        people.push(vec![
            Cell::label("Closed by:"),
            Cell::text(string_field(data, "/closed_by/login")),
            Cell::label("Closed:"),
            Cell::Time(parse_timestamp(&closed_at)),
        ]);
    }

    IssueSummary {
        summary: Some(string_field(data, "/title")),
        people,
        description: Description::Markdown(scale_images(&string_field(data, "/body"))),
        ..IssueSummary::new(
            format!("{kind}#{}", string_field(data, "/number")),
            string_field(data, "/html_url"),
        )
    }
}

#[async_trait]
impl TrackerClient for GithubClient {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn matcher(&self) -> &IdentifierMatcher {
        &self.matcher
    }

    async fn resolve(&self, found: &Match) -> HoverPayload {
        let token = self.auth.session(false).await;

        let mut request = self
            .http
            .get(format!(
                "{}/repos/{}/issues/{}",
                self.api_url,
                found.capture(1),
                found.capture(2)
            ))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &token {
            request = request.bearer_auth(token.expose());
        }

        let response = match send(request).await {
            Ok(response) => response,
            Err(failure) => return HoverPayload::error(failure.detail),
        };

        if let Some(warning) =
            check_rate_limit(response.headers(), self.rate_limit_threshold, Utc::now())
        {
            self.warn_rate_limit(warning);
        }

        let auth = AuthScheme::Token {
            tracker: "GitHub".to_string(),
            key: GITHUB_TOKEN_KEY.to_string(),
            token_url: Some(format!("{GITHUB_URL}/settings/tokens")),
            present: token.is_some(),
        };
        match read_json::<Value>(response).await {
            Ok(data) => HoverPayload::Success(Box::new(summary(&data))),
            Err(failure) => failure_payload(failure, &auth),
        }
    }
}
