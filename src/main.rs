use std::process::ExitCode;

use anyhow::Context;
use tracing::info;

use verilog_lsp::analysis::BasicAnalyzer;
use verilog_lsp::cli::Cli;
use verilog_lsp::log;
use verilog_lsp::lsp::run_stdio;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::from_args();
    log::init(&cli.log_target())?;

    let config = cli.into_config();
    info!("Configuration: {:?}", config);

    let analyzer = BasicAnalyzer::new(config.max_line_length);
    let report = run_stdio(&config, Box::new(analyzer)).context("failed to start server")?;

    // stdout carries the protocol, statistics go to stderr
    eprint!("{}", report.summary());

    Ok(if report.exit_reason.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
