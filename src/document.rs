//! Open document text with LSP position conversion.

use std::ops::Range;

use ropey::Rope;
use tower_lsp::lsp_types::Position;

#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    rope: Rope,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let rope = Rope::from_str(&text);
        Document { text, rope }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset of an LSP position; `None` when it lies outside the text.
    ///
    /// Columns are UTF-16 code units, the protocol's default encoding.
    pub fn offset_at(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return None;
        }
        let line_start = self.rope.line_to_char(line);
        let line_end = line_start + self.rope.line(line).len_chars();

        let first_unit = self.rope.char_to_utf16_cu(line_start);
        let last_unit = self.rope.char_to_utf16_cu(line_end);
        let unit = (first_unit + position.character as usize).min(last_unit);
        Some(self.rope.char_to_byte(self.rope.utf16_cu_to_char(unit)))
    }

    /// Converts a byte range into an LSP range.
    pub fn range(&self, range: Range<usize>) -> tower_lsp::lsp_types::Range {
        tower_lsp::lsp_types::Range {
            start: self.position(range.start),
            end: self.position(range.end),
        }
    }

    fn position(&self, offset: usize) -> Position {
        let char_idx = self.rope.byte_to_char(offset);
        let line = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line);
        let character =
            self.rope.char_to_utf16_cu(char_idx) - self.rope.char_to_utf16_cu(line_start);
        Position {
            line: line as u32,
            character: character as u32,
        }
    }
}
