pub mod analysis;
pub mod cli;
pub mod config;
pub mod document;
pub mod log;
pub mod lsp;
