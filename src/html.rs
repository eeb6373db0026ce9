//! Small HTML/Markdown helpers for hover content.
//!
//! Hover markup is Markdown with a trusted subset of HTML; tables are built
//! with `<table>` tags because most clients render them inside hovers.

/// Extra spacing appended to every table cell.
const SPACING: &str = " &nbsp;&nbsp; ";

/// Escape the HTML reserved characters `& < > " '`.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Plain text that must not be interpreted as Markdown or HTML.
///
/// Markdown punctuation is backslash-escaped first so the entities produced
/// by [`escape`] stay intact. Every line break becomes a paragraph break,
/// Markdown would otherwise join the lines.
pub fn text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\r' => continue,
            '\n' => {
                escaped.push_str("\n\n");
                continue;
            }
            _ => {}
        }
        if matches!(
            ch,
            '\\' | '`' | '*' | '_' | '{' | '}' | '[' | ']' | '(' | ')' | '#' | '+' | '-' | '.'
                | '!' | '|'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escape(&escaped)
}

/// Build an HTML table from rows of already escaped cells.
pub fn table<R, C>(rows: R) -> String
where
    R: IntoIterator<Item = C>,
    C: IntoIterator<Item = String>,
{
    let mut table = String::from("<table>");
    for row in rows {
        table.push_str("<tr>");
        for cell in row {
            table.push_str("<td>");
            table.push_str(&cell);
            table.push_str(SPACING);
            table.push_str("</td>");
        }
        table.push_str("</tr>");
    }
    table.push_str("</table>");
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_reserved_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_empty() {
        assert_eq!(escape(""), "");
    }

    /// Test: Markdown punctuation is neutralised without breaking entities.
    #[test]
    fn test_text_escapes_markdown_then_html() {
        assert_eq!(text("**bold** <x>"), r"\*\*bold\*\* &lt;x&gt;");
        assert_eq!(text("it's"), "it&#039;s");
    }

    #[test]
    fn test_text_keeps_line_structure() {
        assert_eq!(text("line one\nline two"), "line one\n\nline two");
        assert_eq!(text("a\r\nb"), "a\n\nb");
    }

    #[test]
    fn test_table_layout() {
        let rendered = table(vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
        ]);
        assert_eq!(
            rendered,
            "<table><tr><td>a &nbsp;&nbsp; </td><td>b &nbsp;&nbsp; </td></tr>\
             <tr><td>c &nbsp;&nbsp; </td></tr></table>"
        );
    }
}
