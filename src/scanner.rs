//! Eager, cheap identifier decoration.
//!
//! Scanning only runs the matchers and builds canonical links; trackers are
//! queried lazily on hover. A document's decoration set is always replaced
//! as a whole.
//!
//! Scans run immediately when a document is opened and after a quiet period
//! following edits. A newer edit aborts the pending scan, and a per-document
//! generation counter makes sure a scan that already started cannot store
//! stale results.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::{DocumentLink, Url};
use tracing::debug;

use crate::document::Document;
use crate::registry::ProviderRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    /// Byte range in the scanned text.
    pub range: Range<usize>,
    pub tooltip: String,
}

/// Every match of every registered matcher, in registration order.
///
/// Overlapping matches of different trackers are all kept.
pub fn scan(registry: &ProviderRegistry, text: &str) -> Vec<Decoration> {
    registry
        .all()
        .par_iter()
        .flat_map_iter(|client| {
            let matcher = client.matcher();
            matcher
                .find_iter(text)
                .map(|found| Decoration {
                    range: found.range(),
                    tooltip: matcher.link(&found),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Decorations that no longer fit the document (a rescan is pending) are
/// skipped.
pub fn document_links(document: &Document, decorations: &[Decoration]) -> Vec<DocumentLink> {
    decorations
        .iter()
        .filter(|decoration| document.text().get(decoration.range.clone()).is_some())
        .map(|decoration| DocumentLink {
            range: document.range(decoration.range.clone()),
            target: Url::parse(&decoration.tooltip).ok(),
            tooltip: Some(decoration.tooltip.clone()),
            data: None,
        })
        .collect()
}

#[derive(Default)]
struct Entry {
    generation: u64,
    /// The text `decorations` were scanned from.
    text: String,
    decorations: Arc<Vec<Decoration>>,
    pending: Option<JoinHandle<()>>,
}

impl Entry {
    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

pub struct DecorationStore {
    registry: Arc<ProviderRegistry>,
    debounce: Duration,
    entries: Arc<Mutex<HashMap<Url, Entry>>>,
}

impl DecorationStore {
    pub fn new(registry: Arc<ProviderRegistry>, debounce: Duration) -> Self {
        DecorationStore {
            registry,
            debounce,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Scan right away, e.g. when a document becomes active.
    pub async fn refresh_now(&self, uri: &Url, text: &str) -> Arc<Vec<Decoration>> {
        let decorations = Arc::new(scan(&self.registry, text));

        let mut entries = self.entries.lock().await;
        let entry = entries.entry(uri.clone()).or_default();
        entry.cancel_pending();
        entry.generation += 1;
        entry.text = text.to_string();
        entry.decorations = decorations.clone();
        decorations
    }

    /// Scan after the quiet period unless another edit arrives first.
    pub async fn schedule(&self, uri: &Url, text: String) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(uri.clone()).or_default();
        entry.cancel_pending();
        entry.generation += 1;
        let generation = entry.generation;

        let registry = self.registry.clone();
        let store = self.entries.clone();
        let debounce = self.debounce;
        let task_uri = uri.clone();
        entry.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let decorations = Arc::new(scan(&registry, &text));

            let mut entries = store.lock().await;
            match entries.get_mut(&task_uri) {
                Some(entry) if entry.generation == generation => {
                    debug!(uri = %task_uri, count = decorations.len(), "document rescanned");
                    entry.text = text;
                    entry.decorations = decorations;
                    entry.pending = None;
                }
                _ => debug!(uri = %task_uri, "discarding outdated scan"),
            }
        }));
    }

    /// Decorations matching `text` exactly.
    ///
    /// While a rescan is pending the stored set belongs to an older text; the
    /// current text is then scanned directly and the store is left to the
    /// pending rescan.
    pub async fn decorations_for(&self, uri: &Url, text: &str) -> Arc<Vec<Decoration>> {
        if let Some(entry) = self.entries.lock().await.get(uri) {
            if entry.text == text {
                return entry.decorations.clone();
            }
        }
        debug!(uri = %uri, "stored decorations are outdated, scanning directly");
        Arc::new(scan(&self.registry, text))
    }

    pub async fn get(&self, uri: &Url) -> Option<Arc<Vec<Decoration>>> {
        self.entries
            .lock()
            .await
            .get(uri)
            .map(|entry| entry.decorations.clone())
    }

    pub async fn forget(&self, uri: &Url) {
        if let Some(mut entry) = self.entries.lock().await.remove(uri) {
            entry.cancel_pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_registry;

    const SAMPLE: &str = "bsc#123456 gh#owner/repo#42\nCVE-2023-12345 jsc#PROJ-1 poo#98765\n";

    #[tokio::test]
    async fn test_scan_empty() {
        let registry = test_registry().await;
        assert!(scan(&registry, "").is_empty());
    }

    /// Test: One decoration per identifier, at the right offsets.
    #[tokio::test]
    async fn test_scan_one_per_identifier() {
        let registry = test_registry().await;
        let mut decorations = scan(&registry, SAMPLE);
        decorations.sort_by_key(|decoration| decoration.range.start);

        let expected = [
            ("bsc#123456", "https://bugzilla.suse.com/show_bug.cgi?id=123456"),
            ("gh#owner/repo#42", "https://github.com/owner/repo/issues/42"),
            ("CVE-2023-12345", "https://nvd.nist.gov/vuln/detail/CVE-2023-12345"),
            ("jsc#PROJ-1", "https://jira.suse.com/browse/PROJ-1"),
            ("poo#98765", "https://progress.opensuse.org/issues/98765"),
        ];
        assert_eq!(decorations.len(), expected.len());
        for (decoration, (identifier, link)) in decorations.iter().zip(expected) {
            let start = SAMPLE.find(identifier).unwrap();
            assert_eq!(decoration.range, start..start + identifier.len());
            assert_eq!(decoration.tooltip, link);
        }
    }

    #[tokio::test]
    async fn test_scan_idempotent() {
        let registry = test_registry().await;
        assert_eq!(scan(&registry, SAMPLE), scan(&registry, SAMPLE));
    }

    #[tokio::test]
    async fn test_document_links() {
        let registry = test_registry().await;
        let document = Document::new("x\n  bsc#1");
        let links = document_links(&document, &scan(&registry, document.text()));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].range.start.line, 1);
        assert_eq!(links[0].range.start.character, 2);
        assert_eq!(
            links[0].target.as_ref().map(Url::as_str),
            Some("https://bugzilla.suse.com/show_bug.cgi?id=1")
        );
    }

    #[test]
    fn test_document_links_skip_outdated() {
        let document = Document::new("bsc#1");
        let decorations = [Decoration {
            range: 0..40,
            tooltip: "https://bugzilla.suse.com/show_bug.cgi?id=1".to_string(),
        }];
        assert!(document_links(&document, &decorations).is_empty());
    }

    /// Test: Only the last of several quick edits is scanned and stored.
    #[tokio::test(start_paused = true)]
    async fn test_schedule_debounces() {
        let store = DecorationStore::new(
            Arc::new(test_registry().await),
            Duration::from_millis(500),
        );
        let uri = Url::parse("file:///tmp/notes.txt").unwrap();

        store.refresh_now(&uri, "bsc#1").await;
        store.schedule(&uri, "bsc#1 bsc#2".to_string()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        store.schedule(&uri, "bsc#1 bsc#2 bsc#3".to_string()).await;

        // the first timer would have fired by now, the second not yet
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.get(&uri).await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.get(&uri).await.unwrap().len(), 3);
    }

    /// Test: Links requested right after an edit cover the edited text.
    #[tokio::test]
    async fn test_links_after_edit_follow_new_text() {
        let store = DecorationStore::new(
            Arc::new(test_registry().await),
            Duration::from_secs(60),
        );
        let uri = Url::parse("file:///tmp/notes.txt").unwrap();
        store.refresh_now(&uri, "bsc#1").await;

        let document = Document::new("xxxxxxx bsc#1");
        store.schedule(&uri, document.text().to_string()).await;

        let decorations = store.decorations_for(&uri, document.text()).await;
        let links = document_links(&document, &decorations);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].range.start.character, 8);
        assert_eq!(links[0].range.end.character, 13);
    }

    #[tokio::test]
    async fn test_decorations_for_reuses_current_scan() {
        let store = DecorationStore::new(Arc::new(test_registry().await), Duration::from_millis(1));
        let uri = Url::parse("file:///tmp/a.txt").unwrap();
        let stored = store.refresh_now(&uri, "boo#1").await;
        let served = store.decorations_for(&uri, "boo#1").await;
        assert!(Arc::ptr_eq(&stored, &served));
    }

    #[tokio::test]
    async fn test_forget() {
        let store = DecorationStore::new(Arc::new(test_registry().await), Duration::from_millis(1));
        let uri = Url::parse("file:///tmp/a.txt").unwrap();
        store.refresh_now(&uri, "boo#1").await;
        assert!(store.get(&uri).await.is_some());
        store.forget(&uri).await;
        assert!(store.get(&uri).await.is_none());
    }
}
