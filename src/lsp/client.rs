//! Outbound half of the connection

use std::io::{self, Write};

use lsp_types::notification::{LogMessage, Notification, PublishDiagnostics};
use lsp_types::{Diagnostic, LogMessageParams, MessageType, PublishDiagnosticsParams, Url};
use serde::Serialize;
use tracing::{debug, error};

use crate::lsp::framing::write_frame;
use crate::lsp::message::{OutgoingNotification, Response};

/// Writes framed messages to the client.
///
/// The first write failure is recorded and every later send is skipped; the
/// session polls [`Client::take_failure`] after each message.
pub struct Client {
    output: Box<dyn Write>,
    failure: Option<io::Error>,
    broken: bool,
    messages_sent: u64,
}

impl Client {
    pub fn new(output: impl Write + 'static) -> Self {
        Self {
            output: Box::new(output),
            failure: None,
            broken: false,
            messages_sent: 0,
        }
    }

    pub fn send_notification<N>(&mut self, params: N::Params)
    where
        N: Notification,
    {
        self.write_message(&OutgoingNotification::new(N::METHOD, params));
    }

    pub fn publish_diagnostics(
        &mut self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        debug!("Publishing {} diagnostics for {}", diagnostics.len(), uri);
        self.send_notification::<PublishDiagnostics>(PublishDiagnosticsParams {
            uri,
            diagnostics,
            version,
        });
    }

    pub fn log_message(&mut self, typ: MessageType, message: impl Into<String>) {
        self.send_notification::<LogMessage>(LogMessageParams {
            typ,
            message: message.into(),
        });
    }

    pub fn send_response(&mut self, response: &Response) {
        self.write_message(response);
    }

    /// Returns the recorded write failure, if any. The client stays broken.
    pub fn take_failure(&mut self) -> Option<io::Error> {
        self.failure.take()
    }

    /// Messages written successfully so far
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    fn write_message<T: Serialize + ?Sized>(&mut self, message: &T) {
        if self.broken {
            return;
        }

        let body = match serde_json::to_vec(message) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialize outbound message: {}", e);
                return;
            }
        };

        match write_frame(&mut self.output, &body) {
            Ok(()) => self.messages_sent += 1,
            Err(e) => {
                error!("Failed to write to client: {}", e);
                self.broken = true;
                self.failure = Some(e);
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("broken", &self.broken)
            .field("messages_sent", &self.messages_sent)
            .finish_non_exhaustive()
    }
}
