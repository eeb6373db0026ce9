//! Hover provider for bug, issue and CVE identifiers.
//!
//! This module implements the LSP `textDocument/hover` capability. The
//! identifier under the cursor is located with the registered matchers and
//! resolved against its tracker on every request; nothing is cached, so
//! changed tracker data and rotated tokens show up on the next hover.
//!
//! # Configuration
//!
//! Hover can be disabled via [`Settings::hover`]:
//!
//! ```toml
//! hover = false
//! ```

use chrono::Utc;
use tower_lsp::lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use tracing::debug;

use crate::config::Settings;
use crate::document::Document;
use crate::matcher::Match;
use crate::payload::HoverPayload;
use crate::registry::ProviderRegistry;
use crate::render::render;

/// Resolve the identifier covering `offset`, if any.
///
/// Returns `None` when no registered matcher covers the position; that is
/// not an error, the client simply shows no hover.
pub async fn dispatch(
    registry: &ProviderRegistry,
    text: &str,
    offset: usize,
) -> Option<HoverPayload> {
    let (client, word) = registry.lookup(text, offset)?;
    // re-run the pattern on the identifier alone
    let found = client
        .matcher()
        .captures(&word.full_text)
        .map(|found| Match {
            offset: word.offset,
            ..found
        })
        .unwrap_or(word);

    debug!(tracker = client.name(), identifier = %found.full_text, "resolving hover");
    Some(client.resolve(&found).await)
}

/// Generate hover content for the identifier at the cursor position.
///
/// # Returns
///
/// `Some(Hover)` with Markdown content, or `None` if:
/// - Hover is disabled in settings
/// - The position is outside the document
/// - No identifier is under the cursor
pub async fn hover(
    registry: &ProviderRegistry,
    document: &Document,
    params: &HoverParams,
    settings: &Settings,
) -> Option<Hover> {
    if !settings.hover {
        return None;
    }

    let position = params.text_document_position_params.position;
    let offset = document.offset_at(position)?;
    let payload = dispatch(registry, document.text(), offset).await?;
    let markup = render(&payload, Utc::now());

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: markup.value,
        }),
        range: None,
    })
}
