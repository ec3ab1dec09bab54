//! Push of analysis results as publishDiagnostics notifications

use std::collections::HashMap;

use lsp_types::{Diagnostic, Url};
use tracing::debug;

use crate::analysis::{AnalysisListener, AnalysisResult};
use crate::lsp::client::Client;

/// Turns fresh analysis results into size-capped diagnostics notifications.
///
/// Remembers what was last sent per URI and skips identical republishes.
#[derive(Debug)]
pub struct DiagnosticsPublisher {
    limit: usize,
    last_published: HashMap<Url, Vec<Diagnostic>>,
}

impl DiagnosticsPublisher {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            last_published: HashMap::new(),
        }
    }

    /// Listener publishing through `client` for the duration of one message
    pub fn bind<'a>(&'a mut self, client: &'a mut Client) -> BoundPublisher<'a> {
        BoundPublisher {
            publisher: self,
            client,
        }
    }
}

pub struct BoundPublisher<'a> {
    publisher: &'a mut DiagnosticsPublisher,
    client: &'a mut Client,
}

impl AnalysisListener for BoundPublisher<'_> {
    fn analysis_updated(&mut self, uri: &Url, result: &AnalysisResult) {
        let mut diagnostics = result.diagnostics();
        if diagnostics.len() > self.publisher.limit {
            debug!(
                "Capping {} diagnostics for {} at {}",
                diagnostics.len(),
                uri,
                self.publisher.limit
            );
            diagnostics.truncate(self.publisher.limit);
        }

        if self.publisher.last_published.get(uri) == Some(&diagnostics) {
            debug!("Diagnostics for {} unchanged, not republishing", uri);
            return;
        }

        self.client
            .publish_diagnostics(uri.clone(), diagnostics.clone(), Some(result.version()));
        self.publisher.last_published.insert(uri.clone(), diagnostics);
    }

    fn analysis_removed(&mut self, uri: &Url) {
        self.publisher.last_published.remove(uri);
        self.client.publish_diagnostics(uri.clone(), Vec::new(), None);
    }
}
