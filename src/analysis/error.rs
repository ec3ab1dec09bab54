use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    #[error("analysis failed: {0}")]
    Failed(String),

    #[error("formatting failed: {0}")]
    Formatting(String),
}
