//! Analysis layer
//! - mod.rs: analyzer contract (Analyzer/Analysis traits, Finding)
//! - cache.rs: latest analysis result per open document
//! - basic.rs: built-in line-oriented SystemVerilog analyzer
//! - error.rs: analyzer errors

pub mod basic;
pub mod cache;
pub mod error;

use std::fmt::Debug;

use lsp_types::{Diagnostic, DocumentSymbol, FormattingOptions, Position, Range, TextEdit, Url};

pub use basic::BasicAnalyzer;
pub use cache::{AnalysisCache, AnalysisListener, AnalysisResult};
pub use error::AnalyzerError;

/// A suggested edit that resolves a finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    pub title: String,
    pub edits: Vec<TextEdit>,
}

/// A diagnostic together with the autofixes the analyzer offers for it
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub diagnostic: Diagnostic,
    pub fixes: Vec<Fix>,
}

impl Finding {
    pub fn new(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostic,
            fixes: Vec::new(),
        }
    }

    pub fn with_fix(mut self, title: impl Into<String>, edits: Vec<TextEdit>) -> Self {
        self.fixes.push(Fix {
            title: title.into(),
            edits,
        });
        self
    }
}

/// Immutable result of analyzing one version of a document.
///
/// Every method is a pure function of the analyzed text.
pub trait Analysis: Debug {
    fn findings(&self) -> &[Finding];

    fn symbols(&self) -> Vec<DocumentSymbol>;

    /// Ranges referring to the same symbol as the one at `position`
    fn highlights(&self, position: Position) -> Vec<Range>;

    /// Edits formatting `range`, or the whole text when `range` is `None`
    fn format(
        &self,
        range: Option<Range>,
        options: &FormattingOptions,
    ) -> Result<Vec<TextEdit>, AnalyzerError>;
}

/// Turns document text into an [`Analysis`]
#[cfg_attr(test, mockall::automock)]
pub trait Analyzer {
    fn analyze(&self, uri: &Url, text: &str) -> Result<Box<dyn Analysis>, AnalyzerError>;
}

#[cfg(test)]
pub(crate) mod test_support;
