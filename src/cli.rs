use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    DEFAULT_DIAGNOSTIC_LIMIT, DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_MESSAGE_BYTES,
    DEFAULT_READ_CHUNK_BYTES, ServerConfig, log_path,
};
use crate::log::LogTarget;

#[derive(Parser, Debug)]
#[command(name = "verilog-lsp", version)]
#[command(about = "SystemVerilog language server speaking LSP over stdin/stdout", long_about = None)]
pub struct Cli {
    /// Maximum diagnostics pushed per publishDiagnostics notification
    #[arg(long, env = "VERILOG_LSP_DIAGNOSTIC_LIMIT", default_value_t = DEFAULT_DIAGNOSTIC_LIMIT)]
    pub diagnostic_limit: usize,

    /// Largest accepted message body in bytes
    #[arg(long = "max-message-size", env = "VERILOG_LSP_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Line length above which a warning is reported
    #[arg(long, env = "VERILOG_LSP_MAX_LINE_LENGTH", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,

    /// Write JSON logs to this file instead of stderr
    #[arg(long, env = "VERILOG_LSP_LOG_FILE", conflicts_with = "default_log_file")]
    pub log_file: Option<PathBuf>,

    /// Write JSON logs to the default log file in the data directory
    #[arg(long)]
    pub default_log_file: bool,
}

impl Cli {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn log_target(&self) -> LogTarget {
        match (&self.log_file, self.default_log_file) {
            (Some(path), _) => LogTarget::File(path.clone()),
            (None, true) => LogTarget::File(log_path()),
            (None, false) => LogTarget::Stderr,
        }
    }

    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            diagnostic_limit: self.diagnostic_limit,
            max_message_bytes: self.max_message_bytes,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            max_line_length: self.max_line_length,
        }
    }
}
