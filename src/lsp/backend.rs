use std::collections::HashMap;

use lsp_types::notification::{
    DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, Exit, Initialized,
};
use lsp_types::request::{
    CodeActionRequest, DocumentDiagnosticRequest, DocumentHighlightRequest, DocumentSymbolRequest,
    Formatting, Initialize, RangeFormatting, Shutdown,
};
use lsp_types::*;
use tracing::{debug, info};

use crate::analysis::{AnalysisCache, AnalysisResult, Analyzer};
use crate::document::{DocumentError, DocumentListener, DocumentStore};
use crate::lsp::client::Client;
use crate::lsp::diagnostics::DiagnosticsPublisher;
use crate::lsp::dispatcher::{Dispatcher, RegistrationError};
use crate::lsp::message::ResponseError;
use crate::lsp::server::{ExitReason, SessionState};

/// Session state shared by all method handlers
pub struct Backend {
    state: SessionState,
    exit_reason: Option<ExitReason>,
    documents: DocumentStore,
    analysis: AnalysisCache,
    publisher: DiagnosticsPublisher,
}

impl Backend {
    pub fn new(analyzer: Box<dyn Analyzer>, diagnostic_limit: usize) -> Self {
        Self {
            state: SessionState::Initializing,
            exit_reason: None,
            documents: DocumentStore::new(),
            analysis: AnalysisCache::new(analyzer),
            publisher: DiagnosticsPublisher::new(diagnostic_limit),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        self.exit_reason.as_ref()
    }

    /// Moves to ShuttingDown. The first recorded reason wins.
    pub fn begin_shutdown(&mut self, reason: ExitReason) {
        if self.exit_reason.is_none() {
            self.exit_reason = Some(reason);
        }
        self.state = SessionState::ShuttingDown;
    }

    pub(crate) fn terminate(&mut self) {
        self.state = SessionState::Terminated;
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn analysis(&self) -> &AnalysisCache {
        &self.analysis
    }

    pub fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    ..Default::default()
                },
            )),
            code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
            document_symbol_provider: Some(OneOf::Left(true)),
            document_formatting_provider: Some(OneOf::Left(true)),
            document_range_formatting_provider: Some(OneOf::Left(true)),
            document_highlight_provider: Some(OneOf::Left(true)),
            diagnostic_provider: Some(DiagnosticServerCapabilities::Options(DiagnosticOptions {
                inter_file_dependencies: false,
                workspace_diagnostics: false,
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    /// Installs every handler this server implements
    pub fn register(dispatcher: &mut Dispatcher<Backend>) -> Result<(), RegistrationError> {
        dispatcher.add_request_handler::<Initialize, _>(Backend::initialize)?;
        dispatcher.add_request_handler::<Shutdown, _>(Backend::shutdown)?;
        dispatcher.add_notification_handler::<Initialized, _>(Backend::initialized)?;
        dispatcher.add_notification_handler::<Exit, _>(Backend::exit)?;

        dispatcher.add_notification_handler::<DidOpenTextDocument, _>(Backend::did_open)?;
        dispatcher.add_notification_handler::<DidChangeTextDocument, _>(Backend::did_change)?;
        dispatcher.add_notification_handler::<DidCloseTextDocument, _>(Backend::did_close)?;

        dispatcher.add_request_handler::<DocumentDiagnosticRequest, _>(Backend::diagnostic)?;
        dispatcher.add_request_handler::<CodeActionRequest, _>(Backend::code_action)?;
        dispatcher.add_request_handler::<DocumentSymbolRequest, _>(Backend::document_symbol)?;
        dispatcher.add_request_handler::<DocumentHighlightRequest, _>(Backend::document_highlight)?;
        dispatcher.add_request_handler::<Formatting, _>(Backend::formatting)?;
        dispatcher.add_request_handler::<RangeFormatting, _>(Backend::range_formatting)?;
        Ok(())
    }

    fn initialize(
        &mut self,
        client: &mut Client,
        params: InitializeParams,
    ) -> Result<InitializeResult, ResponseError> {
        if self.state != SessionState::Initializing {
            return Err(ResponseError::request_failed("server is already initialized"));
        }

        match params.client_info {
            Some(info) => info!(
                "Initializing for {} {}",
                info.name,
                info.version.as_deref().unwrap_or("")
            ),
            None => info!("Initializing for unnamed client"),
        }
        self.state = SessionState::Running;
        client.log_message(MessageType::INFO, "LSP server initializing");

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    fn initialized(
        &mut self,
        client: &mut Client,
        _params: InitializedParams,
    ) -> Result<(), ResponseError> {
        info!("Client finished initialization");
        client.log_message(MessageType::INFO, "LSP server initialized");
        Ok(())
    }

    fn shutdown(&mut self, client: &mut Client, _params: ()) -> Result<(), ResponseError> {
        info!("Shutdown requested");
        client.log_message(MessageType::INFO, "LSP server shutting down");
        self.begin_shutdown(ExitReason::Shutdown);
        Ok(())
    }

    fn exit(&mut self, _client: &mut Client, _params: ()) -> Result<(), ResponseError> {
        info!("Exit requested");
        self.begin_shutdown(ExitReason::ExitBeforeShutdown);
        Ok(())
    }

    fn did_open(
        &mut self,
        client: &mut Client,
        params: DidOpenTextDocumentParams,
    ) -> Result<(), ResponseError> {
        self.sync_documents(client, |documents, listener| {
            documents.open(params.text_document, listener)
        })
    }

    fn did_change(
        &mut self,
        client: &mut Client,
        params: DidChangeTextDocumentParams,
    ) -> Result<(), ResponseError> {
        self.sync_documents(client, |documents, listener| {
            documents.change(&params.text_document, &params.content_changes, listener)
        })
    }

    fn did_close(
        &mut self,
        client: &mut Client,
        params: DidCloseTextDocumentParams,
    ) -> Result<(), ResponseError> {
        self.sync_documents(client, |documents, listener| {
            documents.close(&params.text_document.uri, listener)
        })
    }

    /// Runs one store mutation with re-analysis and publishing chained behind it
    fn sync_documents<F>(&mut self, client: &mut Client, mutate: F) -> Result<(), ResponseError>
    where
        F: FnOnce(&mut DocumentStore, &mut dyn DocumentListener) -> Result<(), DocumentError>,
    {
        let mut publisher = self.publisher.bind(client);
        let mut subscriber = self.analysis.subscriber(&mut publisher);
        mutate(&mut self.documents, &mut subscriber)?;
        Ok(())
    }

    fn diagnostic(
        &mut self,
        _client: &mut Client,
        params: DocumentDiagnosticParams,
    ) -> Result<DocumentDiagnosticReportResult, ResponseError> {
        let items = self
            .analysis
            .find(&params.text_document.uri)
            .map(AnalysisResult::diagnostics)
            .unwrap_or_default();
        debug!(
            "Pulled {} diagnostics for {}",
            items.len(),
            params.text_document.uri
        );

        Ok(DocumentDiagnosticReportResult::Report(
            DocumentDiagnosticReport::Full(RelatedFullDocumentDiagnosticReport {
                related_documents: None,
                full_document_diagnostic_report: FullDocumentDiagnosticReport {
                    result_id: None,
                    items,
                },
            }),
        ))
    }

    fn code_action(
        &mut self,
        _client: &mut Client,
        params: CodeActionParams,
    ) -> Result<Option<CodeActionResponse>, ResponseError> {
        let uri = params.text_document.uri;
        let Some(result) = self.analysis.find(&uri) else {
            return Ok(Some(Vec::new()));
        };

        let mut actions = Vec::new();
        for finding in result.findings() {
            if !overlaps(&finding.diagnostic.range, &params.range) {
                continue;
            }
            for (i, fix) in finding.fixes.iter().enumerate() {
                let changes = HashMap::from([(uri.clone(), fix.edits.clone())]);
                actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                    title: fix.title.clone(),
                    kind: Some(CodeActionKind::QUICKFIX),
                    diagnostics: Some(vec![finding.diagnostic.clone()]),
                    edit: Some(WorkspaceEdit {
                        changes: Some(changes),
                        ..Default::default()
                    }),
                    is_preferred: Some(i == 0),
                    ..Default::default()
                }));
            }
        }

        Ok(Some(actions))
    }

    fn document_symbol(
        &mut self,
        _client: &mut Client,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>, ResponseError> {
        let symbols = self
            .analysis
            .find(&params.text_document.uri)
            .and_then(AnalysisResult::analysis)
            .map(|analysis| analysis.symbols())
            .unwrap_or_default();
        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }

    fn document_highlight(
        &mut self,
        _client: &mut Client,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>, ResponseError> {
        let position = params.text_document_position_params;
        let highlights = self
            .analysis
            .find(&position.text_document.uri)
            .and_then(AnalysisResult::analysis)
            .map(|analysis| analysis.highlights(position.position))
            .unwrap_or_default()
            .into_iter()
            .map(|range| DocumentHighlight {
                range,
                kind: Some(DocumentHighlightKind::TEXT),
            })
            .collect();
        Ok(Some(highlights))
    }

    fn formatting(
        &mut self,
        _client: &mut Client,
        params: DocumentFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>, ResponseError> {
        self.format(&params.text_document.uri, None, &params.options)
    }

    fn range_formatting(
        &mut self,
        _client: &mut Client,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>, ResponseError> {
        self.format(&params.text_document.uri, Some(params.range), &params.options)
    }

    fn format(
        &self,
        uri: &Url,
        range: Option<Range>,
        options: &FormattingOptions,
    ) -> Result<Option<Vec<TextEdit>>, ResponseError> {
        let Some(analysis) = self.analysis.find(uri).and_then(AnalysisResult::analysis) else {
            return Ok(Some(Vec::new()));
        };
        Ok(Some(analysis.format(range, options)?))
    }
}

fn overlaps(a: &Range, b: &Range) -> bool {
    a.start <= b.end && b.start <= a.end
}
