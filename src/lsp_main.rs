//! Standalone BSL Language Server entry point (stdio)
//!
//! Запуск: `bsl-intellisense-lsp`; уровень логов задаётся переменной
//! `BSL_INTELLISENSE_LOG`.

use anyhow::Result;
use bsl_intellisense::{cli_common, lsp};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout занят протоколом, логи только в stderr
    cli_common::init_lsp_logging()?;

    tracing::info!("Starting BSL Language Server via stdio...");

    lsp::start_stdio_server().await
}
