//! Document synchronization layer
//! - line_index.rs: (line, column) <-> byte offset translation
//! - buffer.rs: a single open document and edit application
//! - store.rs: URI-keyed collection driven by didOpen/didChange/didClose
//! - error.rs: document-state and position errors

pub mod buffer;
pub mod error;
pub mod line_index;
pub mod store;

pub use buffer::Document;
pub use error::{DocumentError, PositionError};
pub use line_index::LineIndex;
pub use store::{DocumentListener, DocumentStore};
