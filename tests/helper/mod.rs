#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use lsp_types::{
    Diagnostic, DiagnosticSeverity, DocumentSymbol, FormattingOptions, Position, Range, TextEdit,
    Url,
};
use serde_json::{Value, json};

use verilog_lsp::analysis::{Analysis, Analyzer, AnalyzerError, Finding};
use verilog_lsp::lsp::{ByteSource, ReadStatus};

/// Output sink that stays readable after being moved into a session
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn messages(&self) -> Vec<Value> {
        decode_messages(&self.0.borrow())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Input handing out prepared chunks one read at a time, then closing
#[derive(Debug, Default)]
pub struct ScriptedInput {
    chunks: Vec<Vec<u8>>,
    pub reads: usize,
}

impl ScriptedInput {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks, reads: 0 }
    }

    /// Every message in its own read
    pub fn per_message(messages: &[Value]) -> Self {
        Self::new(messages.iter().map(frame).collect())
    }

    /// The concatenated stream cut into reads of `size` bytes
    pub fn chunked(messages: &[Value], size: usize) -> Self {
        let stream: Vec<u8> = messages.iter().flat_map(frame).collect();
        Self::new(stream.chunks(size).map(<[u8]>::to_vec).collect())
    }
}

impl ByteSource for ScriptedInput {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus> {
        let Some(chunk) = self.chunks.get(self.reads) else {
            self.reads += 1;
            return Ok(ReadStatus::Closed);
        };
        self.reads += 1;
        assert!(chunk.len() <= buf.len(), "chunk larger than read buffer");
        buf[..chunk.len()].copy_from_slice(chunk);
        Ok(ReadStatus::Read(chunk.len()))
    }
}

/// Analyzer reporting one warning per line of input
#[derive(Debug, Default)]
pub struct LineAnalyzer;

#[derive(Debug)]
struct LineAnalysis {
    findings: Vec<Finding>,
}

impl Analyzer for LineAnalyzer {
    fn analyze(&self, _uri: &Url, text: &str) -> Result<Box<dyn Analysis>, AnalyzerError> {
        let findings = text
            .lines()
            .enumerate()
            .map(|(line, content)| {
                Finding::new(Diagnostic {
                    range: Range::new(
                        Position::new(line as u32, 0),
                        Position::new(line as u32, content.len() as u32),
                    ),
                    severity: Some(DiagnosticSeverity::WARNING),
                    message: format!("line {}", line),
                    ..Default::default()
                })
            })
            .collect();
        Ok(Box::new(LineAnalysis { findings }))
    }
}

impl Analysis for LineAnalysis {
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

pub fn frame(message: &Value) -> Vec<u8> {
    let body = message.to_string();
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
}

pub fn decode_messages(mut bytes: &[u8]) -> Vec<Value> {
    let mut messages = Vec::new();
    while !bytes.is_empty() {
        let header_end = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("unterminated header");
        let header = std::str::from_utf8(&bytes[..header_end]).unwrap();
        let length: usize = header
            .strip_prefix("Content-Length: ")
            .expect("missing Content-Length")
            .parse()
            .unwrap();
        let start = header_end + 4;
        messages.push(serde_json::from_slice(&bytes[start..start + length]).unwrap());
        bytes = &bytes[start + length..];
    }
    messages
}

pub fn find_response(messages: &[Value], id: i64) -> &Value {
    messages
        .iter()
        .find(|m| m["id"] == json!(id) && m.get("method").is_none())
        .unwrap_or_else(|| panic!("no response with id {}", id))
}

pub fn notifications<'a>(messages: &'a [Value], method: &str) -> Vec<&'a Value> {
    messages
        .iter()
        .filter(|m| m["method"] == json!(method) && m.get("id").is_none())
        .collect()
}

pub fn create_initialize_request(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {"processId": null, "rootUri": null, "capabilities": {}}
    })
}

pub fn create_initialized_notification() -> Value {
    json!({"jsonrpc": "2.0", "method": "initialized", "params": {}})
}

pub fn create_did_open_notification(uri: &str, text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didOpen",
        "params": {
            "textDocument": {
                "uri": uri,
                "languageId": "systemverilog",
                "version": 1,
                "text": text
            }
        }
    })
}

pub fn create_did_change_notification(uri: &str, version: i32, changes: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didChange",
        "params": {
            "textDocument": {"uri": uri, "version": version},
            "contentChanges": changes
        }
    })
}

pub fn create_did_close_notification(uri: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didClose",
        "params": {"textDocument": {"uri": uri}}
    })
}

pub fn create_request(id: i64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

pub fn create_shutdown_request(id: i64) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": "shutdown"})
}

pub fn create_exit_notification() -> Value {
    json!({"jsonrpc": "2.0", "method": "exit"})
}

/// Incremental edit replacing `[start, end)` with `text`
pub fn range_change(start: (u32, u32), end: (u32, u32), text: &str) -> Value {
    json!({
        "range": {
            "start": {"line": start.0, "character": start.1},
            "end": {"line": end.0, "character": end.1}
        },
        "text": text
    })
}
