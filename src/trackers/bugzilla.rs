//! Bugzilla REST API (`/rest/bug/{id}` and `/rest/bug/{id}/comment`).

use async_trait::async_trait;
use serde_json::Value;

use crate::credentials::{Credential, Secret};
use crate::error::Result;
use crate::matcher::{IdentifierMatcher, Match};
use crate::payload::{Cell, Description, HoverPayload, IssueSummary};
use crate::time::parse_timestamp;

use super::{failure_payload, read_json, send, string_field, AuthScheme, TrackerClient};

/// Static description of one Bugzilla instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BugzillaInstance {
    pub name: &'static str,
    pub base_url: &'static str,
    pub pattern: &'static str,
    pub credential_key: &'static str,
}

pub struct BugzillaClient {
    http: reqwest::Client,
    name: String,
    matcher: IdentifierMatcher,
    credential: Credential,
}

impl BugzillaClient {
    pub fn new(
        http: reqwest::Client,
        instance: &BugzillaInstance,
        credential: Credential,
    ) -> Result<Self> {
        Self::with_base_url(http, instance, instance.base_url, credential)
    }

    /// Same instance served from another host (mirrors, tests).
    pub fn with_base_url(
        http: reqwest::Client,
        instance: &BugzillaInstance,
        base_url: &str,
        credential: Credential,
    ) -> Result<Self> {
        Ok(BugzillaClient {
            http,
            name: instance.name.to_string(),
            matcher: IdentifierMatcher::new(
                instance.pattern,
                base_url,
                "{base}/show_bug.cgi?id={1}",
            )?,
            credential,
        })
    }

    fn base_url(&self) -> &str {
        self.matcher.base_url()
    }

    fn request(&self, endpoint: &str, token: Option<&Secret>) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(format!("{}/rest/{endpoint}", self.base_url()));
        match token {
            Some(token) => request.query(&[("api_key", token.expose())]),
            None => request,
        }
    }

    fn auth_scheme(&self, present: bool) -> AuthScheme {
        AuthScheme::Token {
            tracker: "Bugzilla".to_string(),
            key: self.credential.key().to_string(),
            token_url: Some(format!("{}/userprefs.cgi?tab=apikey", self.base_url())),
            present,
        }
    }

    fn summary(&self, id: &str, bug: &Value, comments: &Value) -> Option<IssueSummary> {
        let bug = bug.pointer("/bugs/0")?;
        let bug_id = match bug.get("id") {
            Some(Value::Number(number)) => number.to_string(),
            _ => id.to_string(),
        };

        let attributes = [
            ("Status", string_field(bug, "/status")),
            ("Resolution", string_field(bug, "/resolution")),
            ("Severity", string_field(bug, "/severity")),
            ("Priority", string_field(bug, "/priority")),
            ("Component", component(bug)),
            ("Product", string_field(bug, "/product")),
        ]
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect();

        let people = vec![
            vec![Cell::label("Reported by: "), person(bug, "creator_detail")],
            vec![
                Cell::label("Reported: "),
                Cell::Time(parse_timestamp(&string_field(bug, "/creation_time"))),
            ],
            vec![Cell::label("Assigned to: "), person(bug, "assigned_to_detail")],
            vec![
                Cell::label("Last change: "),
                Cell::Time(parse_timestamp(&string_field(bug, "/last_change_time"))),
            ],
        ];

        // comments are keyed by the numeric bug id as a string
        let description = comments
            .pointer(&format!("/bugs/{bug_id}/comments/0/text"))
            .and_then(Value::as_str)
            .map(|text| Description::Text(text.to_string()))
            .unwrap_or(Description::None);

        Some(IssueSummary {
            summary: Some(string_field(bug, "/summary")),
            attributes,
            people,
            description,
            ..IssueSummary::new(
                format!("Bug#{bug_id}"),
                format!("{}/show_bug.cgi?id={bug_id}", self.base_url()),
            )
        })
    }
}

/// Depending on the Bugzilla version the component is a string or a list.
fn component(bug: &Value) -> String {
    match bug.get("component") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
            .collect::<Vec<_>>()
            .join(","),
        _ => string_field(bug, "/component"),
    }
}

fn person(bug: &Value, field: &str) -> Cell {
    Cell::text(format!(
        "{} ({})",
        string_field(bug, &format!("/{field}/real_name")),
        string_field(bug, &format!("/{field}/email"))
    ))
}

#[async_trait]
impl TrackerClient for BugzillaClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn matcher(&self) -> &IdentifierMatcher {
        &self.matcher
    }

    async fn resolve(&self, found: &Match) -> HoverPayload {
        let id = found.capture(1);
        let token = self.credential.get();

        let (bug, comments) = tokio::join!(
            send(self.request(&format!("bug/{id}"), token.as_ref())),
            send(self.request(&format!("bug/{id}/comment"), token.as_ref())),
        );
        let (bug, comments) = match (bug, comments) {
            (Ok(bug), Ok(comments)) => (bug, comments),
            (Err(failure), _) | (_, Err(failure)) => return HoverPayload::error(failure.detail),
        };

        let auth = self.auth_scheme(token.is_some());
        let bug: Value = match read_json(bug).await {
            Ok(bug) => bug,
            Err(failure) => return failure_payload(failure, &auth),
        };
        let comments: Value = match read_json(comments).await {
            Ok(comments) => comments,
            Err(failure) => return failure_payload(failure, &auth),
        };

        match self.summary(id, &bug, &comments) {
            Some(summary) => HoverPayload::Success(Box::new(summary)),
            None => HoverPayload::error(format!("Bug {id} not found in the response")),
        }
    }
}
