//! Latest analysis result per open document

use std::collections::HashMap;

use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range, Url};
use tracing::{debug, warn};

use crate::analysis::{Analysis, Analyzer, AnalyzerError, Finding};
use crate::document::{Document, DocumentListener};

/// Source tag on diagnostics produced by this server
pub const DIAGNOSTIC_SOURCE: &str = "verilog-lsp";

/// Receives every freshly cached result
pub trait AnalysisListener {
    fn analysis_updated(&mut self, uri: &Url, result: &AnalysisResult);

    fn analysis_removed(&mut self, uri: &Url);
}

/// Analysis of one document version, or the reason it could not be produced
#[derive(Debug)]
pub struct AnalysisResult {
    version: i32,
    outcome: Result<Box<dyn Analysis>, AnalyzerError>,
}

impl AnalysisResult {
    pub fn new(version: i32, outcome: Result<Box<dyn Analysis>, AnalyzerError>) -> Self {
        Self { version, outcome }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn analysis(&self) -> Option<&dyn Analysis> {
        self.outcome.as_deref().ok()
    }

    pub fn findings(&self) -> &[Finding] {
        self.analysis().map(|a| a.findings()).unwrap_or(&[])
    }

    /// All diagnostics of this result. A failed analysis yields a single
    /// synthetic error at the top of the document.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match &self.outcome {
            Ok(analysis) => analysis
                .findings()
                .iter()
                .map(|finding| finding.diagnostic.clone())
                .collect(),
            Err(err) => vec![Diagnostic {
                range: Range::new(Position::new(0, 0), Position::new(0, 0)),
                severity: Some(DiagnosticSeverity::ERROR),
                source: Some(DIAGNOSTIC_SOURCE.to_string()),
                message: err.to_string(),
                ..Default::default()
            }],
        }
    }
}

/// Holds the newest [`AnalysisResult`] for every open document.
///
/// Entries are keyed by URI and never outlive the document they describe.
pub struct AnalysisCache {
    analyzer: Box<dyn Analyzer>,
    results: HashMap<Url, AnalysisResult>,
}

impl AnalysisCache {
    pub fn new(analyzer: Box<dyn Analyzer>) -> Self {
        Self {
            analyzer,
            results: HashMap::new(),
        }
    }

    /// Latest cached result; never triggers analysis
    pub fn find(&self, uri: &Url) -> Option<&AnalysisResult> {
        self.results.get(uri)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Analyzes `document` and caches the result, then tells `listener`.
    pub fn update(
        &mut self,
        uri: &Url,
        document: &Document,
        listener: &mut dyn AnalysisListener,
    ) {
        let outcome = self.analyzer.analyze(uri, document.text());
        if let Err(err) = &outcome {
            warn!("Analyzer failed on {} v{}: {}", uri, document.version(), err);
        }

        if let Some(result) = self.store(uri, AnalysisResult::new(document.version(), outcome)) {
            listener.analysis_updated(uri, result);
        }
    }

    /// Caches `result` unless a newer version is already cached.
    ///
    /// Returns the cached entry, or `None` when `result` was stale and dropped.
    pub fn store(&mut self, uri: &Url, result: AnalysisResult) -> Option<&AnalysisResult> {
        if let Some(current) = self.results.get(uri) {
            if current.version() > result.version() {
                debug!(
                    "Discarding stale analysis of {} v{} (have v{})",
                    uri,
                    result.version(),
                    current.version()
                );
                return None;
            }
        }
        self.results.insert(uri.clone(), result);
        self.results.get(uri)
    }

    pub fn remove(&mut self, uri: &Url, listener: &mut dyn AnalysisListener) {
        if self.results.remove(uri).is_some() {
            listener.analysis_removed(uri);
        }
    }

    /// Adapter that feeds document store events into this cache
    pub fn subscriber<'a>(
        &'a mut self,
        listener: &'a mut dyn AnalysisListener,
    ) -> CacheSubscriber<'a> {
        CacheSubscriber {
            cache: self,
            listener,
        }
    }
}

pub struct CacheSubscriber<'a> {
    cache: &'a mut AnalysisCache,
    listener: &'a mut dyn AnalysisListener,
}

impl DocumentListener for CacheSubscriber<'_> {
    fn document_changed(&mut self, uri: &Url, document: &Document) {
        self.cache.update(uri, document, self.listener);
    }

    fn document_closed(&mut self, uri: &Url) {
        self.cache.remove(uri, self.listener);
    }
}
