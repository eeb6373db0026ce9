//! Turns a [`HoverPayload`] into hover markup.
//!
//! The output is Markdown with a small HTML subset (tables, `<b>`). Every
//! value that comes from a tracker goes through [`html::escape`] or
//! [`html::text`]; only GitHub issue bodies, which are Markdown already, are
//! passed through.

use chrono::{DateTime, Utc};

use crate::commands::TOKEN_MANAGER_COMMAND;
use crate::html;
use crate::payload::{AuthPrompt, Cell, Description, HoverPayload, IssueSummary};
use crate::time::format_timestamp;

const RULE: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    pub value: String,
    /// Command links in `value` may be executed by the client.
    pub trusted: bool,
}

pub fn render(payload: &HoverPayload, now: DateTime<Utc>) -> Markup {
    match payload {
        HoverPayload::Success(summary) => Markup {
            value: render_summary(summary, now),
            trusted: false,
        },
        HoverPayload::Unauthenticated(prompt) => render_auth_prompt(prompt),
        HoverPayload::Unauthorized => Markup {
            value: "Cannot read the data, the API token is probably not valid.".to_string(),
            trusted: true,
        },
        HoverPayload::Forbidden => Markup {
            value: "You do not have permissions to see the details.".to_string(),
            trusted: false,
        },
        HoverPayload::Error { detail } => Markup {
            value: format!("Could not fetch data: {}", html::text(detail)),
            trusted: false,
        },
    }
}

fn render_summary(summary: &IssueSummary, now: DateTime<Utc>) -> String {
    let mut out = format!("### [{}]({})", html::escape(&summary.label), summary.url);
    if let Some(title) = &summary.summary {
        out.push_str(" - ");
        out.push_str(&html::text(title));
    }
    out.push_str(RULE);

    if !summary.attributes.is_empty() {
        let labels = summary
            .attributes
            .iter()
            .map(|(label, _)| format!("<b>{}</b>", html::escape(label)));
        let values = summary
            .attributes
            .iter()
            .map(|(_, value)| html::escape(value));
        out.push_str(&html::table([
            labels.collect::<Vec<_>>(),
            values.collect::<Vec<_>>(),
        ]));
        out.push_str(RULE);
    }

    if !summary.people.is_empty() {
        out.push_str(&html::table(summary.people.iter().map(|row| {
            row.iter()
                .map(|cell| render_cell(cell, now))
                .collect::<Vec<_>>()
        })));
        out.push_str(RULE);
    }

    out.push_str("#### Description\n\n");
    match &summary.description {
        Description::None => {}
        Description::Markdown(body) => out.push_str(body),
        Description::Text(body) => out.push_str(&html::text(body)),
        Description::Empty => out.push_str("*Empty*"),
    }
    out.push_str("\n\n");

    for section in &summary.sections {
        out.push_str(&format!("#### {}\n\n", section.heading));
        for item in &section.items {
            match &item.url {
                Some(url) => out.push_str(&format!("- [{}]({})\n", html::escape(&item.text), url)),
                None => out.push_str(&format!("- {}\n", html::escape(&item.text))),
            }
        }
        out.push('\n');
    }

    out
}

fn render_cell(cell: &Cell, now: DateTime<Utc>) -> String {
    match cell {
        Cell::Label(label) => label.clone(),
        Cell::Text(value) => html::escape(value),
        Cell::Time(Some(timestamp)) => format_timestamp(*timestamp, now),
        Cell::Time(None) => String::new(),
    }
}

fn render_auth_prompt(prompt: &AuthPrompt) -> Markup {
    let Some(key) = &prompt.credential_key else {
        return Markup {
            value: "You need to authenticate to see the data.".to_string(),
            trusted: false,
        };
    };

    let argument = serde_json::Value::String(key.clone()).to_string();
    let command = format!(
        "command:{TOKEN_MANAGER_COMMAND}?{}",
        urlencoding::encode(&argument)
    );

    let mut value = format!("You need to authenticate to the {}.  \n", prompt.tracker);
    match &prompt.token_url {
        Some(url) => value.push_str(&format!(
            "Create a new [API access token]({url}) and add it to the [Bug ID extension]({command})."
        )),
        None => value.push_str(&format!(
            "Add an API access token to the [Bug ID extension]({command})."
        )),
    }

    Markup {
        value,
        trusted: true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::payload::{ListItem, ListSection};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn sample() -> IssueSummary {
        IssueSummary {
            summary: Some("Crash <on> start".to_string()),
            attributes: vec![
                ("Status".to_string(), "NEW".to_string()),
                ("Product".to_string(), "R&D".to_string()),
            ],
            people: vec![
                vec![Cell::label("Reported by: "), Cell::text("Jane (j@x.org)")],
                vec![
                    Cell::label("Reported: "),
                    Cell::Time(Some(now() - Duration::days(2))),
                ],
                vec![Cell::label("Closed: "), Cell::Time(None)],
            ],
            description: Description::Text("see *logs*".to_string()),
            ..IssueSummary::new("Bug#1", "https://bugzilla.suse.com/show_bug.cgi?id=1")
        }
    }

    /// Test: Success markup keeps the documented section order.
    #[test]
    fn test_render_success_order() {
        let markup = render(&HoverPayload::Success(Box::new(sample())), now());
        assert!(!markup.trusted);

        let value = &markup.value;
        let title = value
            .find("### [Bug#1](https://bugzilla.suse.com/show_bug.cgi?id=1) - Crash &lt;on&gt; start")
            .unwrap();
        let attributes = value.find("<b>Status</b>").unwrap();
        let people = value.find("Reported by: ").unwrap();
        let description = value.find("#### Description").unwrap();
        assert!(title < attributes && attributes < people && people < description);
        assert_eq!(value.matches("---").count(), 3);

        assert!(value.contains("R&amp;D"));
        assert!(value.contains("Jane (j@x.org)"));
        assert!(value.contains("2 days ago"));
        assert!(value.contains(r"see \*logs\*"));
        assert!(!value.contains("undefined"));
        assert!(!value.contains("null"));
    }

    #[test]
    fn test_render_markdown_description_is_raw() {
        let summary = IssueSummary {
            description: Description::Markdown("**bold** <img src=\"x\">".to_string()),
            ..IssueSummary::new("Issue#2", "https://github.com/o/r/issues/2")
        };
        let markup = render(&HoverPayload::Success(Box::new(summary)), now());
        assert!(markup.value.contains("**bold** <img src=\"x\">"));
    }

    /// Test: Plain-text descriptions keep one paragraph per line.
    #[test]
    fn test_render_multiline_text_description() {
        let summary = IssueSummary {
            description: Description::Text("line one\nline two".to_string()),
            ..IssueSummary::new("Bug#4", "https://bugzilla.suse.com/show_bug.cgi?id=4")
        };
        let markup = render(&HoverPayload::Success(Box::new(summary)), now());
        assert!(markup
            .value
            .contains("#### Description\n\nline one\n\nline two\n\n"));
    }

    #[test]
    fn test_render_empty_description() {
        let summary = IssueSummary {
            description: Description::Empty,
            ..IssueSummary::new("#3", "https://progress.opensuse.org/issues/3")
        };
        let markup = render(&HoverPayload::Success(Box::new(summary)), now());
        assert!(markup.value.contains("#### Description\n\n*Empty*"));
    }

    #[test]
    fn test_render_sections() {
        let summary = IssueSummary {
            sections: vec![ListSection {
                heading: "Weaknesses".to_string(),
                items: vec![
                    ListItem {
                        text: "CWE-79".to_string(),
                        url: Some("https://cwe.mitre.org/data/definitions/79.html".to_string()),
                    },
                    ListItem {
                        text: "NVD-CWE-Other".to_string(),
                        url: None,
                    },
                ],
            }],
            ..IssueSummary::new("CVE-2023-1", "https://nvd.nist.gov/vuln/detail/CVE-2023-1")
        };
        let value = render(&HoverPayload::Success(Box::new(summary)), now()).value;
        assert!(value
            .contains("#### Weaknesses\n\n- [CWE-79](https://cwe.mitre.org/data/definitions/79.html)\n- NVD-CWE-Other\n"));
    }

    /// Test: The unauthenticated prompt links to the token manager for its slot.
    #[test]
    fn test_render_unauthenticated_is_actionable() {
        let payload = HoverPayload::Unauthenticated(AuthPrompt {
            tracker: "Jira".to_string(),
            credential_key: Some("token.jira.suse".to_string()),
            token_url: Some("https://jira.suse.com/tokens".to_string()),
        });
        let markup = render(&payload, now());
        assert!(markup.trusted);
        assert!(markup
            .value
            .contains("(command:bug-id.token.manager?%22token.jira.suse%22)"));
        assert!(markup.value.contains("[API access token](https://jira.suse.com/tokens)"));
    }

    #[test]
    fn test_render_unauthenticated_without_slot() {
        let payload = HoverPayload::Unauthenticated(AuthPrompt {
            tracker: "NVD".to_string(),
            credential_key: None,
            token_url: None,
        });
        let markup = render(&payload, now());
        assert!(!markup.trusted);
        assert!(!markup.value.contains("command:"));
    }

    #[test]
    fn test_render_failures() {
        let unauthorized = render(&HoverPayload::Unauthorized, now());
        assert!(unauthorized.value.contains("probably not valid"));
        assert!(!unauthorized.value.contains("command:"));

        let forbidden = render(&HoverPayload::Forbidden, now());
        assert!(!forbidden.trusted);
        assert!(forbidden.value.contains("permissions"));

        let error = render(&HoverPayload::error("Not Found"), now());
        assert!(!error.trusted);
        assert_eq!(error.value, "Could not fetch data: Not Found");
    }
}
