use std::fmt::{self, Display, Write as _};
use std::io::{self, Write};

use indexmap::IndexMap;
use tracing::{debug, error, info};

use crate::analysis::Analyzer;
use crate::config::ServerConfig;
use crate::lsp::backend::Backend;
use crate::lsp::client::Client;
use crate::lsp::dispatcher::{Dispatcher, RegistrationError};
use crate::lsp::framing::{ByteSource, FramingError, MessageStreamSplitter, ReaderSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

/// Why the read loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The client sent `shutdown`
    Shutdown,
    /// The client sent `exit` without a prior `shutdown`
    ExitBeforeShutdown,
    /// The input ended before a shutdown
    InputClosed,
    /// Reading or framing the input failed
    Transport(String),
    /// Writing to the client failed
    Output(String),
}

impl ExitReason {
    /// Whether the client ended the session with `shutdown`. Anything else,
    /// including a bare `exit`, ends the process with a failure status.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown requested"),
            Self::ExitBeforeShutdown => write!(f, "exit without shutdown"),
            Self::InputClosed => write!(f, "input closed"),
            Self::Transport(message) => write!(f, "transport error: {}", message),
            Self::Output(message) => write!(f, "output error: {}", message),
        }
    }
}

/// Statistics of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub exit_reason: ExitReason,
    /// Largest message body received, in bytes
    pub largest_message: usize,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub counters: IndexMap<String, u64>,
}

impl SessionReport {
    /// Human-readable statistics: message totals, then a method/count table
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Largest message seen: {} kiB", self.largest_message / 1024);
        let _ = writeln!(
            out,
            "Messages received: {}, sent: {}",
            self.messages_received, self.messages_sent
        );

        let width = self
            .counters
            .keys()
            .map(String::len)
            .chain(["method".len()])
            .max()
            .unwrap_or_default();
        let _ = writeln!(out, "{:>width$} {:>7}", "method", "count");
        for (method, count) in &self.counters {
            let _ = writeln!(out, "{:>width$} {:>7}", method, count);
        }
        out
    }
}

/// One client connection: the read loop and everything it drives
pub struct Session {
    splitter: MessageStreamSplitter,
    dispatcher: Dispatcher<Backend>,
    backend: Backend,
    client: Client,
}

impl Session {
    pub fn new(
        config: &ServerConfig,
        analyzer: Box<dyn Analyzer>,
        output: impl Write + 'static,
    ) -> Result<Self, RegistrationError> {
        let mut dispatcher = Dispatcher::new();
        Backend::register(&mut dispatcher)?;

        Ok(Self {
            splitter: MessageStreamSplitter::new(config.read_chunk_bytes, config.max_message_bytes),
            dispatcher,
            backend: Backend::new(analyzer, config.diagnostic_limit),
            client: Client::new(output),
        })
    }

    pub fn state(&self) -> SessionState {
        self.backend.state()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Processes input until shutdown or an I/O failure. No read is
    /// attempted once the session is shutting down.
    pub fn run<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> SessionReport {
        while !matches!(
            self.backend.state(),
            SessionState::ShuttingDown | SessionState::Terminated
        ) {
            let Self {
                splitter,
                dispatcher,
                backend,
                client,
            } = self;

            let pulled = splitter.pull_from(source, |frame| {
                if backend.state() == SessionState::ShuttingDown {
                    debug!("Ignoring {} byte message after shutdown", frame.body.len());
                    return;
                }
                dispatcher.dispatch_message(backend, client, frame.body);
                if let Some(err) = client.take_failure() {
                    backend.begin_shutdown(ExitReason::Output(err.to_string()));
                }
            });

            match pulled {
                Ok(_) => {}
                Err(FramingError::EndOfStream) => {
                    info!("Input closed");
                    self.backend.begin_shutdown(ExitReason::InputClosed);
                }
                Err(err) => {
                    error!("Stopping session: {}", err);
                    self.backend
                        .begin_shutdown(ExitReason::Transport(err.to_string()));
                }
            }
        }

        self.backend.terminate();
        let exit_reason = self
            .backend
            .exit_reason()
            .cloned()
            .unwrap_or(ExitReason::InputClosed);
        info!("Session ended: {}", exit_reason);

        SessionReport {
            exit_reason,
            largest_message: self.splitter.largest_body_seen(),
            messages_received: self.splitter.frames_seen(),
            messages_sent: self.client.messages_sent(),
            counters: self.dispatcher.stat_counters().clone(),
        }
    }
}

/// Serves one client over standard input and output
pub fn run_stdio(
    config: &ServerConfig,
    analyzer: Box<dyn Analyzer>,
) -> Result<SessionReport, RegistrationError> {
    info!("Starting verilog-lsp server");

    let mut session = Session::new(config, analyzer, io::stdout())?;
    let mut source = ReaderSource::new(io::stdin().lock());
    let report = session.run(&mut source);

    info!("verilog-lsp server stopped");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BasicAnalyzer;
    use crate::lsp::framing::ReadStatus;
    use crate::lsp::test_support::Capture;
    use rstest::rstest;
    use serde_json::json;

    fn frame(value: serde_json::Value) -> Vec<u8> {
        let body = value.to_string();
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    /// Source handing out one prepared chunk per read, counting reads
    struct Script {
        chunks: Vec<Vec<u8>>,
        reads: usize,
    }

    impl Script {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self { chunks, reads: 0 }
        }
    }

    impl ByteSource for Script {
        fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus> {
            self.reads += 1;
            if self.reads > self.chunks.len() {
                return Ok(ReadStatus::Closed);
            }
            let chunk = &self.chunks[self.reads - 1];
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(ReadStatus::Read(chunk.len()))
        }
    }

    fn session(capture: &Capture) -> Session {
        Session::new(
            &ServerConfig::default(),
            Box::new(BasicAnalyzer::default()),
            capture.clone(),
        )
        .unwrap()
    }

    #[test]
    fn shutdown_stops_reading() {
        let capture = Capture::default();
        let mut session = session(&capture);
        let mut script = Script::new(vec![
            frame(json!({"jsonrpc": "2.0", "id": 1, "method": "shutdown"})),
            frame(json!({"jsonrpc": "2.0", "method": "exit"})),
        ]);

        let report = session.run(&mut script);

        assert_eq!(script.reads, 1);
        assert_eq!(report.exit_reason, ExitReason::Shutdown);
        assert!(report.exit_reason.is_clean());
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(report.counters.get("shutdown"), Some(&1));
        assert_eq!(report.counters.get("exit"), None);
        assert_eq!(report.messages_received, 1);
        // shutdown logs a window/logMessage before its response
        assert_eq!(report.messages_sent, 2);
    }

    #[test]
    fn end_of_input_is_not_a_clean_exit() {
        let capture = Capture::default();
        let mut session = session(&capture);
        let mut script = Script::new(Vec::new());

        let report = session.run(&mut script);

        assert_eq!(report.exit_reason, ExitReason::InputClosed);
        assert!(!report.exit_reason.is_clean());
    }

    #[test]
    fn malformed_header_ends_session() {
        let capture = Capture::default();
        let mut session = session(&capture);
        let mut script = Script::new(vec![b"Content-Length: lots\r\n\r\n{}".to_vec()]);

        let report = session.run(&mut script);

        assert!(matches!(report.exit_reason, ExitReason::Transport(_)));
        assert!(capture.messages().is_empty());
    }

    #[rstest]
    #[case(ExitReason::Shutdown, true)]
    #[case(ExitReason::ExitBeforeShutdown, false)]
    #[case(ExitReason::InputClosed, false)]
    #[case(ExitReason::Transport("bad header".to_string()), false)]
    #[case(ExitReason::Output("broken pipe".to_string()), false)]
    fn only_shutdown_is_a_clean_exit(#[case] reason: ExitReason, #[case] clean: bool) {
        assert_eq!(reason.is_clean(), clean);
    }

    #[test]
    fn exit_before_shutdown_is_not_clean() {
        let capture = Capture::default();
        let mut session = session(&capture);
        let mut script = Script::new(vec![frame(json!({"jsonrpc": "2.0", "method": "exit"}))]);

        let report = session.run(&mut script);

        assert_eq!(report.exit_reason, ExitReason::ExitBeforeShutdown);
        assert!(!report.exit_reason.is_clean());
    }

    #[test]
    fn summary_lists_largest_message_and_counts() {
        let report = SessionReport {
            exit_reason: ExitReason::Shutdown,
            largest_message: 4096,
            messages_received: 14,
            messages_sent: 9,
            counters: IndexMap::from([
                ("initialize".to_string(), 1),
                ("textDocument/didChange".to_string(), 12),
            ]),
        };

        let summary = report.summary();

        assert_eq!(
            summary,
            concat!(
                "Largest message seen: 4 kiB\n",
                "Messages received: 14, sent: 9\n",
                "                method   count\n",
                "            initialize       1\n",
                "textDocument/didChange      12\n",
            )
        );
    }
}
