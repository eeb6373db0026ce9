//! Structured hover results produced by the tracker clients.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum HoverPayload {
    Success(Box<IssueSummary>),
    /// The request needs a credential that is not stored.
    Unauthenticated(AuthPrompt),
    /// A credential is stored but the tracker rejected it (HTTP 401).
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// Any other HTTP status or a transport failure.
    Error { detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Success,
    Unauthenticated,
    Unauthorized,
    Forbidden,
    Error,
}

impl HoverPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            HoverPayload::Success(_) => PayloadKind::Success,
            HoverPayload::Unauthenticated(_) => PayloadKind::Unauthenticated,
            HoverPayload::Unauthorized => PayloadKind::Unauthorized,
            HoverPayload::Forbidden => PayloadKind::Forbidden,
            HoverPayload::Error { .. } => PayloadKind::Error,
        }
    }

    pub fn error(detail: impl Into<String>) -> HoverPayload {
        HoverPayload::Error {
            detail: detail.into(),
        }
    }

    pub fn summary(&self) -> Option<&IssueSummary> {
        match self {
            HoverPayload::Success(summary) => Some(summary),
            _ => None,
        }
    }
}

/// What the user has to do to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPrompt {
    /// Human readable tracker name, e.g. "Jira".
    pub tracker: String,
    /// Slot in the secret store, when the tracker takes a stored token.
    pub credential_key: Option<String>,
    /// Where a new API token can be created.
    pub token_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueSummary {
    /// Link text, e.g. `Bug#123` or `PR#42`.
    pub label: String,
    pub url: String,
    /// Issue title, rendered as plain text after the link.
    pub summary: Option<String>,
    /// Rendered as a two row table: bold labels above values.
    pub attributes: Vec<(String, String)>,
    pub people: Vec<Vec<Cell>>,
    pub description: Description,
    pub sections: Vec<ListSection>,
}

impl IssueSummary {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        IssueSummary {
            label: label.into(),
            url: url.into(),
            summary: None,
            attributes: Vec::new(),
            people: Vec::new(),
            description: Description::None,
            sections: Vec::new(),
        }
    }

    pub fn attribute(&self, label: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value.as_str())
    }
}

/// One cell of the people/time table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Fixed label text, rendered verbatim.
    Label(String),
    /// User supplied value, escaped when rendered.
    Text(String),
    /// `None` when the tracker sent no (or an unparseable) timestamp.
    Time(Option<DateTime<Utc>>),
}

impl Cell {
    pub fn label(text: &str) -> Cell {
        Cell::Label(text.to_string())
    }

    pub fn text(text: impl Into<String>) -> Cell {
        Cell::Text(text.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    None,
    /// Tracker supplied Markdown/HTML, rendered as is.
    Markdown(String),
    /// Plain text, escaped when rendered.
    Text(String),
    /// The tracker has an empty description.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSection {
    pub heading: String,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub text: String,
    pub url: Option<String>,
}
