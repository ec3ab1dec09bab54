//! Line-offset index for translating LSP positions to byte offsets

use lsp_types::Position;

use crate::document::error::PositionError;

/// Byte offsets of every line start and line end in a text.
///
/// `\n`, `\r\n` and a lone `\r` all terminate a line. Columns are counted
/// in UTF-16 code units, as LSP positions are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    /// End of each line's content, before its terminator
    line_ends: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = vec![0];
        let mut line_ends = Vec::new();

        let mut offset = 0;
        while offset < bytes.len() {
            match bytes[offset] {
                b'\r' if bytes.get(offset + 1) == Some(&b'\n') => {
                    line_ends.push(offset);
                    offset += 2;
                    line_starts.push(offset);
                }
                b'\r' | b'\n' => {
                    line_ends.push(offset);
                    offset += 1;
                    line_starts.push(offset);
                }
                _ => offset += 1,
            }
        }
        line_ends.push(text.len());

        Self {
            line_starts,
            line_ends,
            len: text.len(),
        }
    }

    /// Number of lines, counting the (possibly empty) line after a final newline
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte span of a line, excluding its line terminator
    pub fn line_span(&self, line: usize) -> Option<(usize, usize)> {
        Some((*self.line_starts.get(line)?, *self.line_ends.get(line)?))
    }

    /// Resolves a position to a byte offset in `text`.
    ///
    /// `text` must be the text this index was built from. Positions past the
    /// end of a line or splitting a surrogate pair are rejected, not clamped.
    pub fn offset(&self, text: &str, position: Position) -> Result<usize, PositionError> {
        let (start, end) =
            self.line_span(position.line as usize)
                .ok_or(PositionError::LineOutOfRange {
                    line: position.line,
                    line_count: self.line_count(),
                })?;

        let target = position.character as usize;
        let mut units = 0usize;
        for (idx, ch) in text[start..end].char_indices() {
            if units == target {
                return Ok(start + idx);
            }
            units += ch.len_utf16();
            if units > target {
                return Err(PositionError::SplitsCharacter {
                    line: position.line,
                    character: position.character,
                });
            }
        }

        if units == target {
            Ok(end)
        } else {
            Err(PositionError::ColumnOutOfRange {
                line: position.line,
                character: position.character,
                line_length: units,
            })
        }
    }

    /// Converts a byte offset back to a position. Offsets past the end are
    /// clamped to the end of the text; offsets inside a character snap back
    /// to its first byte.
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let mut offset = offset.min(self.len);
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self
            .line_starts
            .partition_point(|start| *start <= offset)
            .saturating_sub(1);
        // offsets inside a terminator belong to the end of the line
        let (start, end) = (self.line_starts[line], self.line_ends[line]);
        let character = text[start..offset.min(end)].encode_utf16().count();
        Position::new(line as u32, character as u32)
    }
}
