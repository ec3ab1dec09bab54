use std::path::PathBuf;

/// Maximum diagnostics pushed per publishDiagnostics notification
pub const DEFAULT_DIAGNOSTIC_LIMIT: usize = 500;

/// Largest message body accepted from the client (32 MiB)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 32 * 1024 * 1024;

/// Largest header block accepted before its terminating blank line
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Bytes requested from the input per read call
pub const DEFAULT_READ_CHUNK_BYTES: usize = 64 * 1024;

/// Line length above which the built-in analyzer warns
pub const DEFAULT_MAX_LINE_LENGTH: usize = 100;

/// Tunables of a server session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub diagnostic_limit: usize,
    pub max_message_bytes: usize,
    pub read_chunk_bytes: usize,
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            diagnostic_limit: DEFAULT_DIAGNOSTIC_LIMIT,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Returns the path to the data directory for verilog-lsp.
/// Uses $XDG_DATA_HOME/verilog-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/verilog-lsp,
/// or ./verilog-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the default log file.
pub fn log_path() -> PathBuf {
    data_dir().join("verilog-lsp.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("verilog-lsp")
}
