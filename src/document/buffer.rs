//! Live text of one open document

use lsp_types::{Position, TextDocumentContentChangeEvent};

use crate::document::error::{DocumentError, PositionError};
use crate::document::line_index::LineIndex;

/// Current text, version and line index of an open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    version: i32,
    index: LineIndex,
}

impl Document {
    pub fn new(text: String, version: i32) -> Self {
        let index = LineIndex::new(&text);
        Self {
            text,
            version,
            index,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn offset_at(&self, position: Position) -> Result<usize, PositionError> {
        self.index.offset(&self.text, position)
    }

    /// Applies a batch of changes in order, each against the result of the
    /// previous one. Either every change applies or the document is left
    /// untouched.
    pub(crate) fn apply_changes(
        &mut self,
        version: i32,
        changes: &[TextDocumentContentChangeEvent],
    ) -> Result<(), DocumentError> {
        let mut scratch = self.clone();
        for (index, change) in changes.iter().enumerate() {
            scratch.apply_change(index, change)?;
        }
        scratch.version = version;
        *self = scratch;
        Ok(())
    }

    fn apply_change(
        &mut self,
        index: usize,
        change: &TextDocumentContentChangeEvent,
    ) -> Result<(), DocumentError> {
        match change.range {
            None => self.text.clone_from(&change.text),
            Some(range) => {
                let start = self
                    .offset_at(range.start)
                    .map_err(|source| DocumentError::InvalidPosition { index, source })?;
                let end = self
                    .offset_at(range.end)
                    .map_err(|source| DocumentError::InvalidPosition { index, source })?;
                if start > end {
                    return Err(DocumentError::InvertedRange {
                        index,
                        start: range.start,
                        end: range.end,
                    });
                }
                self.text.replace_range(start..end, &change.text);
            }
        }
        self.index = LineIndex::new(&self.text);
        Ok(())
    }
}
