//! CVE details from the NVD 2.0 API.

use async_trait::async_trait;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::matcher::{IdentifierMatcher, Match};
use crate::payload::{Cell, Description, HoverPayload, IssueSummary, ListItem, ListSection};
use crate::time::parse_timestamp;

use super::{failure_payload, fetch_json, string_field, AuthScheme, TrackerClient};

pub const CVE_PATTERN: &str = r"(?i)\bCVE-([12][0-9]{3}-[0-9]+)\b";
pub const NVD_URL: &str = "https://nvd.nist.gov";
pub const NVD_API_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

pub struct CveClient {
    http: reqwest::Client,
    matcher: IdentifierMatcher,
    api_url: String,
}

impl CveClient {
    pub fn new(http: reqwest::Client, api_url: &str) -> Result<Self> {
        Ok(CveClient {
            http,
            matcher: IdentifierMatcher::new(CVE_PATTERN, NVD_URL, "{base}/vuln/detail/CVE-{1}")?,
            api_url: api_url.to_string(),
        })
    }
}

fn english<'a>(entries: Option<&'a Value>) -> impl Iterator<Item = String> + 'a {
    entries
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|entry| entry.get("lang").and_then(Value::as_str) == Some("en"))
        .map(|entry| string_field(entry, "/value"))
}

/// Link to the MITRE page when the weakness names a numbered CWE.
fn weakness_url(weakness: &str) -> Option<String> {
    static CWE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bCWE-([0-9]+)\b").unwrap());
    let id = CWE_RE.captures(weakness)?.get(1)?.as_str().to_string();
    Some(format!("https://cwe.mitre.org/data/definitions/{id}.html"))
}

fn summary(cve: &Value) -> IssueSummary {
    let id = string_field(cve, "/id");

    let people = vec![
        vec![
            Cell::label("Status:"),
            Cell::text(string_field(cve, "/vulnStatus")),
        ],
        vec![
            Cell::label("Published:"),
            Cell::Time(parse_timestamp(&string_field(cve, "/published"))),
        ],
        vec![
            Cell::label("Modified:"),
            Cell::Time(parse_timestamp(&string_field(cve, "/lastModified"))),
        ],
    ];

    // rendered as plain text, each line break becomes a paragraph
    let description = english(cve.get("descriptions")).join("\n");

    let mut sections = Vec::new();

    let references = cve
        .get("references")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|reference| string_field(reference, "/url"))
        .filter(|url| !url.is_empty())
        .unique()
        .map(|url| ListItem {
            text: url.clone(),
            url: Some(url),
        })
        .collect_vec();
    if !references.is_empty() {
        sections.push(ListSection {
            heading: "References".to_string(),
            items: references,
        });
    }

    let weaknesses = cve
        .get("weaknesses")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .flat_map(|weakness| english(weakness.get("description")).collect_vec())
        .unique()
        .map(|weakness| ListItem {
            url: weakness_url(&weakness),
            text: weakness,
        })
        .collect_vec();
    if !weaknesses.is_empty() {
        sections.push(ListSection {
            heading: "Weaknesses".to_string(),
            items: weaknesses,
        });
    }

    IssueSummary {
        people,
        description: Description::Text(description),
        sections,
        ..IssueSummary::new(id.clone(), format!("{NVD_URL}/vuln/detail/{id}"))
    }
}

#[async_trait]
impl TrackerClient for CveClient {
    fn name(&self) -> &str {
        "NVD"
    }

    fn matcher(&self) -> &IdentifierMatcher {
        &self.matcher
    }

    async fn resolve(&self, found: &Match) -> HoverPayload {
        let cve_id = format!("CVE-{}", found.capture(1));
        let request = self
            .http
            .get(&self.api_url)
            .query(&[("cveId", cve_id.as_str())]);

        match fetch_json::<Value>(request).await {
            Ok((_, data)) => match data.pointer("/vulnerabilities/0/cve") {
                Some(cve) => HoverPayload::Success(Box::new(summary(cve))),
                None => HoverPayload::error(format!("{cve_id} was not found")),
            },
            Err(failure) => failure_payload(
                failure,
                &AuthScheme::Anonymous {
                    tracker: "NVD".to_string(),
                },
            ),
        }
    }
}
