//! openSUSE Progress (Redmine), `/issues/{id}.json`, anonymous.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::matcher::{IdentifierMatcher, Match};
use crate::payload::{Cell, Description, HoverPayload, IssueSummary};
use crate::time::parse_timestamp;

use super::{failure_payload, fetch_json, string_field, AuthScheme, TrackerClient};

pub const PROGRESS_PATTERN: &str = r"(?i)\bpoo#([0-9]+)\b";
pub const PROGRESS_URL: &str = "https://progress.opensuse.org";

pub struct ProgressClient {
    http: reqwest::Client,
    matcher: IdentifierMatcher,
}

impl ProgressClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self> {
        Ok(ProgressClient {
            http,
            matcher: IdentifierMatcher::new(PROGRESS_PATTERN, base_url, "{base}/issues/{1}")?,
        })
    }

    fn summary(&self, data: &Value) -> IssueSummary {
        let issue = data.get("issue").unwrap_or(&Value::Null);
        let id = string_field(issue, "/id");

        let attributes = [
            ("Priority", string_field(issue, "/priority/name")),
            ("Status", string_field(issue, "/status/name")),
            ("Project", string_field(issue, "/project/name")),
        ]
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect();

        let mut people = vec![
            vec![
                Cell::label("Created by:"),
                Cell::text(string_field(issue, "/author/name")),
            ],
            vec![
                Cell::label("Created:"),
                Cell::Time(parse_timestamp(&string_field(issue, "/created_on"))),
            ],
        ];
        if issue.get("assigned_to").is_some_and(|assignee| !assignee.is_null()) {
            people.push(vec![
                Cell::label("Assigned to:"),
                Cell::text(string_field(issue, "/assigned_to/name")),
            ]);
        }
        let closed = string_field(issue, "/closed_on");
        if !closed.is_empty() {
            people.push(vec![
                Cell::label("Closed:"),
                Cell::Time(parse_timestamp(&closed)),
            ]);
        }
        people.push(vec![
            Cell::label("Updated:"),
            Cell::Time(parse_timestamp(&string_field(issue, "/updated_on"))),
        ]);

        let description = match string_field(issue, "/description") {
            text if text.is_empty() => Description::Empty,
            text => Description::Text(text),
        };

        IssueSummary {
            summary: Some(string_field(issue, "/subject")),
            attributes,
            people,
            description,
            ..IssueSummary::new(
                format!("#{id}"),
                format!("{}/issues/{id}", self.matcher.base_url()),
            )
        }
    }
}

#[async_trait]
impl TrackerClient for ProgressClient {
    fn name(&self) -> &str {
        "Progress"
    }

    fn matcher(&self) -> &IdentifierMatcher {
        &self.matcher
    }

    async fn resolve(&self, found: &Match) -> HoverPayload {
        let request = self.http.get(format!(
            "{}/issues/{}.json",
            self.matcher.base_url(),
            found.capture(1)
        ));

        match fetch_json::<Value>(request).await {
            Ok((_, data)) => HoverPayload::Success(Box::new(self.summary(&data))),
            Err(failure) => failure_payload(
                failure,
                &AuthScheme::Anonymous {
                    tracker: "Progress".to_string(),
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_summary_empty_description() {
        let client = ProgressClient::new(reqwest::Client::new(), PROGRESS_URL).unwrap();
        let data = json!({"issue": {
            "id": 98765,
            "subject": "Flaky test",
            "priority": {"name": "Normal"},
            "status": {"name": "New"},
            "project": {"name": "openQA"},
            "author": {"name": "Jane"},
            "created_on": "2023-01-01T10:00:00Z",
            "updated_on": "2023-01-02T10:00:00Z",
            "description": ""
        }});
        let summary = client.summary(&data);
        assert_eq!(summary.label, "#98765");
        assert_eq!(summary.url, "https://progress.opensuse.org/issues/98765");
        assert_eq!(summary.attribute("Project"), Some("openQA"));
        assert_eq!(summary.description, Description::Empty);
        assert_eq!(summary.people.len(), 3);
    }
}
