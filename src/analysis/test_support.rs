use lsp_types::{
    Diagnostic, DiagnosticSeverity, DocumentSymbol, FormattingOptions, Position, Range, TextEdit,
};

use crate::analysis::{Analysis, AnalyzerError, Finding};

/// Analysis with canned findings, for exercising consumers of the cache
#[derive(Debug, Default)]
pub(crate) struct FixedAnalysis {
    pub findings: Vec<Finding>,
}

impl FixedAnalysis {
    pub fn with_warnings(count: usize) -> Self {
        let findings = (0..count)
            .map(|line| Finding::new(warning(line as u32, &format!("finding {}", line))))
            .collect();
        Self { findings }
    }
}

impl Analysis for FixedAnalysis {
    fn findings(&self) -> &[Finding] {
        &self.findings
    }

    fn symbols(&self) -> Vec<DocumentSymbol> {
        Vec::new()
    }

    fn highlights(&self, _position: Position) -> Vec<Range> {
        Vec::new()
    }

    fn format(
        &self,
        _range: Option<Range>,
        _options: &FormattingOptions,
    ) -> Result<Vec<TextEdit>, AnalyzerError> {
        Ok(Vec::new())
    }
}

pub(crate) fn warning(line: u32, message: &str) -> Diagnostic {
    Diagnostic {
        range: Range::new(Position::new(line, 0), Position::new(line, 1)),
        severity: Some(DiagnosticSeverity::WARNING),
        message: message.to_string(),
        ..Default::default()
    }
}
