/*!
# Language Server Protocol (LSP) implementation

Provides completion, navigation and outline for BSL and OneScript modules
through LSP over stdio.
*/

use anyhow::Result;
use tower_lsp::{LspService, Server};

pub mod convert;
mod diagnostics;
mod server;

pub use diagnostics::{convert_parse_issues, convert_to_lsp_diagnostic};
pub use server::BslLanguageServer;

/// Starts LSP server in stdio mode
pub async fn start_stdio_server() -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(BslLanguageServer::new);

    tracing::info!("BSL LSP Server starting...");

    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
