//! Identifier recognition.
//!
//! Every tracker owns an [`IdentifierMatcher`]: a regular expression for its
//! identifier syntax plus a link template for the canonical browser URL.
//! Matching goes through `regex`'s stateless iterators, so a matcher can be
//! shared between the document scanner and concurrent hover requests.

use std::ops::Range;

use regex::{Captures, Regex};

/// One occurrence of an identifier in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub full_text: String,
    /// Capture groups in order, without the implicit whole-match group.
    pub captures: Vec<String>,
    /// Byte offset of `full_text` in the scanned text.
    pub offset: usize,
}

impl Match {
    fn from_captures(captures: &Captures, base: usize) -> Option<Match> {
        let whole = captures.get(0)?;
        Some(Match {
            full_text: whole.as_str().to_string(),
            captures: captures
                .iter()
                .skip(1)
                .map(|group| group.map(|g| g.as_str().to_string()).unwrap_or_default())
                .collect(),
            offset: base + whole.start(),
        })
    }

    /// Capture group `index` (1-based like the regex), or `""` when absent.
    pub fn capture(&self, index: usize) -> &str {
        index
            .checked_sub(1)
            .and_then(|i| self.captures.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.full_text.len()
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierMatcher {
    regex: Regex,
    /// URL template; `{1}`, `{2}` are replaced by the capture groups and
    /// `{base}` by the tracker base URL.
    link_template: String,
    base_url: String,
}

impl IdentifierMatcher {
    pub fn new(pattern: &str, base_url: &str, link_template: &str) -> Result<Self, regex::Error> {
        Ok(IdentifierMatcher {
            regex: Regex::new(pattern)?,
            link_template: link_template.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn link(&self, found: &Match) -> String {
        let mut link = self.link_template.replace("{base}", &self.base_url);
        for index in 1..=self.regex.captures_len().saturating_sub(1) {
            link = link.replace(&format!("{{{index}}}"), found.capture(index));
        }
        link
    }

    pub fn find_iter<'a>(&'a self, text: &'a str) -> impl Iterator<Item = Match> + 'a {
        self.regex
            .captures_iter(text)
            .filter_map(|captures| Match::from_captures(&captures, 0))
    }

    /// The match on the line containing `offset` whose span covers it.
    ///
    /// Both ends are inclusive so a cursor placed right after an identifier
    /// still selects it.
    pub fn match_at(&self, text: &str, offset: usize) -> Option<Match> {
        if !text.is_char_boundary(offset) {
            return None;
        }
        let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = text[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(text.len());
        let line = &text[line_start..line_end];

        self.regex
            .captures_iter(line)
            .filter_map(|captures| Match::from_captures(&captures, line_start))
            .find(|found| found.offset <= offset && offset <= found.offset + found.full_text.len())
    }

    /// Re-run the pattern against a single identifier to extract captures.
    pub fn captures(&self, word: &str) -> Option<Match> {
        self.regex
            .captures(word)
            .and_then(|captures| Match::from_captures(&captures, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bsc() -> IdentifierMatcher {
        IdentifierMatcher::new(
            r"(?i)\bbsc#([0-9]+)\b",
            "https://bugzilla.suse.com",
            "{base}/show_bug.cgi?id={1}",
        )
        .unwrap()
    }

    fn gh() -> IdentifierMatcher {
        IdentifierMatcher::new(
            r"\bgh#(\S+)#([0-9]+)\b",
            "https://github.com",
            "{base}/{1}/issues/{2}",
        )
        .unwrap()
    }

    #[test]
    fn test_link_uses_captures() {
        let matcher = bsc();
        let found = matcher.find_iter("see bsc#123456").next().unwrap();
        assert_eq!(found.offset, 4);
        assert_eq!(
            matcher.link(&found),
            "https://bugzilla.suse.com/show_bug.cgi?id=123456"
        );
    }

    #[test]
    fn test_link_two_captures() {
        let matcher = gh();
        let found = matcher.find_iter("fixed in gh#owner/repo#42.").next().unwrap();
        assert_eq!(found.captures, vec!["owner/repo", "42"]);
        assert_eq!(matcher.link(&found), "https://github.com/owner/repo/issues/42");
    }

    /// Test: A missing capture is substituted with an empty string.
    #[test]
    fn test_link_missing_capture() {
        let matcher = IdentifierMatcher::new(
            r"\bx#([0-9]+)(?:/([a-z]+))?",
            "https://example.org/",
            "{base}/{1}/{2}",
        )
        .unwrap();
        let found = matcher.find_iter("x#7").next().unwrap();
        assert_eq!(matcher.link(&found), "https://example.org/7/");
    }

    #[test]
    fn test_case_insensitive_prefix() {
        assert_eq!(bsc().find_iter("BSC#123456").count(), 1);
    }

    #[test]
    fn test_match_at_covers_cursor() {
        let text = "first line\nfix bsc#42 and bsc#43\n";
        let matcher = bsc();

        let second = text.find("bsc#43").unwrap();
        let found = matcher.match_at(text, second + 2).unwrap();
        assert_eq!(found.capture(1), "43");
        assert_eq!(found.offset, second);

        // end of the identifier is inclusive
        let first_end = text.find("bsc#42").unwrap() + "bsc#42".len();
        assert_eq!(matcher.match_at(text, first_end).unwrap().capture(1), "42");

        assert!(matcher.match_at(text, 2).is_none());
        assert!(matcher.match_at(text, text.len() + 1).is_none());
    }

    #[test]
    fn test_captures_on_word() {
        let found = gh().captures("gh#a/b#1").unwrap();
        assert_eq!(found.capture(1), "a/b");
        assert_eq!(found.capture(2), "1");
        assert_eq!(found.capture(3), "");
    }
}
