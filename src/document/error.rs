use lsp_types::{Position, Url};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("line {line} is out of range (document has {line_count} lines)")]
    LineOutOfRange { line: u32, line_count: usize },

    #[error("column {character} on line {line} is out of range (line is {line_length} units long)")]
    ColumnOutOfRange {
        line: u32,
        character: u32,
        line_length: usize,
    },

    #[error("column {character} on line {line} splits a character")]
    SplitsCharacter { line: u32, character: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("document {0} is already open")]
    AlreadyOpen(Url),

    #[error("document {0} is not open")]
    NotFound(Url),

    #[error("version {received} of {uri} does not follow version {current}")]
    StaleVersion {
        uri: Url,
        current: i32,
        received: i32,
    },

    #[error("edit #{index} has an invalid position: {source}")]
    InvalidPosition {
        index: usize,
        #[source]
        source: PositionError,
    },

    #[error("edit #{index} has a start {start:?} after its end {end:?}")]
    InvertedRange {
        index: usize,
        start: Position,
        end: Position,
    },
}
