//! SUSE Jira (`/rest/api/2/issue/{key}`), bearer token required.

use async_trait::async_trait;
use serde_json::Value;

use crate::credentials::Credential;
use crate::error::Result;
use crate::matcher::{IdentifierMatcher, Match};
use crate::payload::{Cell, Description, HoverPayload, IssueSummary};
use crate::time::parse_timestamp;

use super::{failure_payload, fetch_json, string_field, AuthScheme, TrackerClient};

pub const JIRA_PATTERN: &str = r"(?i)\bjsc#(\S+)\b";
pub const JIRA_URL: &str = "https://jira.suse.com";
pub const JIRA_TOKEN_KEY: &str = "token.jira.suse";
const TOKEN_PAGE: &str = "/secure/ViewProfile.jspa?selectedTab=com.atlassian.pats.pats-plugin:jira-user-personal-access-tokens";

pub struct JiraClient {
    http: reqwest::Client,
    matcher: IdentifierMatcher,
    credential: Credential,
}

impl JiraClient {
    pub fn new(http: reqwest::Client, base_url: &str, credential: Credential) -> Result<Self> {
        Ok(JiraClient {
            http,
            matcher: IdentifierMatcher::new(JIRA_PATTERN, base_url, "{base}/browse/{1}")?,
            credential,
        })
    }

    fn base_url(&self) -> &str {
        self.matcher.base_url()
    }

    fn auth_scheme(&self, present: bool) -> AuthScheme {
        AuthScheme::Token {
            tracker: "Jira".to_string(),
            key: self.credential.key().to_string(),
            token_url: Some(format!("{}{TOKEN_PAGE}", self.base_url())),
            present,
        }
    }

    fn summary(&self, data: &Value) -> IssueSummary {
        let key = string_field(data, "/key");
        let issue = data.get("fields").unwrap_or(&Value::Null);

        let attributes = [
            ("Priority", string_field(issue, "/priority/name")),
            ("Resolution", string_field(issue, "/resolution/name")),
            ("Status", string_field(issue, "/status/name")),
            ("Target version", string_field(issue, "/customfield_24300/0/value")),
        ]
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect();

        let mut people = vec![
            vec![Cell::label("Reported by:"), person(issue, "reporter")],
            vec![
                Cell::label("Reported:"),
                Cell::Time(parse_timestamp(&string_field(issue, "/created"))),
            ],
        ];
        if issue.get("assignee").is_some_and(|assignee| !assignee.is_null()) {
            people.push(vec![Cell::label("Assigned to:"), person(issue, "assignee")]);
        }
        let resolved = string_field(issue, "/resolutiondate");
        if !resolved.is_empty() {
            people.push(vec![
                Cell::label("Resolved:"),
                Cell::Time(parse_timestamp(&resolved)),
            ]);
        }
        people.push(vec![
            Cell::label("Updated:"),
            Cell::Time(parse_timestamp(&string_field(issue, "/updated"))),
        ]);

        IssueSummary {
            summary: Some(string_field(issue, "/summary")),
            attributes,
            people,
            description: Description::Text(string_field(issue, "/description")),
            ..IssueSummary::new(key.clone(), format!("{}/browse/{key}", self.base_url()))
        }
    }
}

/// Jira obfuscates addresses as `jane at suse dot com`.
pub fn format_email(email: &str) -> String {
    email.replace(" at ", "@").replace(" dot ", ".")
}

fn person(issue: &Value, field: &str) -> Cell {
    Cell::text(format!(
        "{} ({})",
        string_field(issue, &format!("/{field}/displayName")),
        format_email(&string_field(issue, &format!("/{field}/emailAddress")))
    ))
}

#[async_trait]
impl TrackerClient for JiraClient {
    fn name(&self) -> &str {
        "Jira"
    }

    fn matcher(&self) -> &IdentifierMatcher {
        &self.matcher
    }

    async fn resolve(&self, found: &Match) -> HoverPayload {
        let Some(token) = self.credential.get() else {
            return HoverPayload::Unauthenticated(self.auth_scheme(false).prompt());
        };

        let request = self
            .http
            .get(format!(
                "{}/rest/api/2/issue/{}",
                self.base_url(),
                found.capture(1)
            ))
            .bearer_auth(token.expose());

        match fetch_json::<Value>(request).await {
            Ok((_, data)) => HoverPayload::Success(Box::new(self.summary(&data))),
            Err(failure) => failure_payload(failure, &self.auth_scheme(true)),
        }
    }
}
