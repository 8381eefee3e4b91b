/*!
# BSL Language Server

LSP сервер поверх языкового движка.

Сервер переводит уведомления редактора в команды обработчика кэша
(`CacheCommand`) и отвечает на запросы через `LanguageEngine`. Тексты
открытых документов хранятся в сервере: запрос всегда видит последний текст
буфера, даже если обработчик кэша ещё не успел его разобрать.

## Возможности
- Автодополнение (локальные имена, модуль, рабочая область, каталог)
- Hover документация и подсказка параметров
- Переход к определению и поиск ссылок
- Структура документа и поиск символов по рабочей области
- Диагностика структурных проблем разбора
- Форматирование отступов документа, диапазона и при вводе
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use super::convert;
use super::diagnostics::convert_parse_issues;
use crate::config::EngineConfig;
use crate::core::LineIndex;
use crate::parser::BslParser;
use crate::query::LanguageEngine;
use crate::workspace::{spawn_cache_worker, CacheCommand, CacheWorkerHandle};

/// Upper bound of workspace symbol results sent to the client
const MAX_WORKSPACE_SYMBOLS: usize = 256;

/// Last letters of `КонецЕсли`, `Иначе`, `EndDo` and other closers
const ON_TYPE_TRIGGERS: &[&str] = &["и", "ы", "е", "а", "e", "n", "f", "o", "y", "t"];

/// Движок и обработчик кэша, создаются при инициализации
struct ServerState {
    engine: Arc<LanguageEngine>,
    worker: CacheWorkerHandle,
}

/// BSL Language Server
pub struct BslLanguageServer {
    client: Client,
    state: RwLock<Option<ServerState>>,
    /// Тексты открытых документов
    documents: RwLock<HashMap<Url, String>>,
}

impl BslLanguageServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: RwLock::new(None),
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
        if let Some(folder) = params.workspace_folders.as_ref().and_then(|f| f.first()) {
            return folder.uri.to_file_path().ok();
        }
        #[allow(deprecated)]
        let root_uri = params.root_uri.as_ref();
        root_uri.and_then(|uri| uri.to_file_path().ok())
    }

    async fn engine(&self) -> Option<Arc<LanguageEngine>> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|state| Arc::clone(&state.engine))
    }

    async fn send(&self, command: CacheCommand) {
        if let Some(state) = self.state.read().await.as_ref() {
            if !state.worker.send(command) {
                tracing::error!("Cache worker is not running");
            }
        }
    }

    /// Engine, path and current text of an open document
    async fn document(&self, uri: &Url) -> Option<(Arc<LanguageEngine>, PathBuf, String)> {
        let engine = self.engine().await?;
        let path = convert::file_path(uri)?;
        let text = self.documents.read().await.get(uri).cloned()?;
        Some((engine, path, text))
    }

    /// Runs `f` over an open document on the blocking pool; parsing and
    /// workspace scans must not stall the protocol loop
    async fn query_document<T, F>(&self, uri: &Url, f: F) -> jsonrpc::Result<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(&LanguageEngine, &Path, &str) -> Option<T> + Send + 'static,
    {
        let Some((engine, path, text)) = self.document(uri).await else {
            return Ok(None);
        };
        join_query(
            tokio::task::spawn_blocking(move || f(&engine, path.as_path(), text.as_str())).await,
        )
    }

    async fn publish_parse_issues(&self, uri: Url, path: &Path, text: &str, version: Option<i32>) {
        let Some(engine) = self.engine().await else {
            return;
        };
        let dialect = engine.cache().dialect_of(path);
        let table = BslParser::new().parse_file(path.to_path_buf(), text, dialect);
        let diagnostics = convert_parse_issues(&table.issues, &table.text);
        self.client.publish_diagnostics(uri, diagnostics, version).await;
    }
}

fn join_query<T>(result: Result<Option<T>, tokio::task::JoinError>) -> jsonrpc::Result<Option<T>> {
    result.map_err(|e| {
        tracing::error!("Query task failed: {}", e);
        jsonrpc::Error::internal_error()
    })
}

#[tower_lsp::async_trait]
impl LanguageServer for BslLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        tracing::info!("Initializing BSL Language Server");

        let root = Self::workspace_root(&params);
        let config = match &root {
            Some(root) => EngineConfig::discover(root).unwrap_or_else(|e| {
                tracing::warn!("{}; using default configuration", e);
                EngineConfig::default()
            }),
            None => EngineConfig::default(),
        };

        let engine = match LanguageEngine::new(config) {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                tracing::error!("Engine start failed: {}", e);
                return Err(jsonrpc::Error {
                    code: jsonrpc::ErrorCode::InternalError,
                    message: e.to_string().into(),
                    data: None,
                });
            }
        };

        let worker = spawn_cache_worker(Arc::clone(engine.cache()));
        if let Some(root) = root {
            worker.send(CacheCommand::Rebuild { root: Some(root) });
        }
        *self.state.write().await = Some(ServerState { engine, worker });

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![".".to_string(), " ".to_string()]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
                    retrigger_characters: None,
                    work_done_progress_options: Default::default(),
                }),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_range_formatting_provider: Some(OneOf::Left(true)),
                document_on_type_formatting_provider: Some(DocumentOnTypeFormattingOptions {
                    first_trigger_character: "\n".to_string(),
                    more_trigger_character: Some(
                        ON_TYPE_TRIGGERS.iter().map(|c| c.to_string()).collect(),
                    ),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "bsl-intellisense".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        tracing::info!("BSL Language Server initialized");

        let watchers = vec![FileSystemWatcher {
            glob_pattern: GlobPattern::String("**/*.{bsl,os}".to_string()),
            kind: None,
        }];
        let registration = Registration {
            id: "bsl-intellisense-watcher".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(DidChangeWatchedFilesRegistrationOptions {
                watchers,
            })
            .ok(),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            tracing::debug!("File watcher registration rejected: {}", e);
        }

        self.client
            .log_message(MessageType::INFO, "BSL Language Server ready")
            .await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        tracing::info!("BSL Language Server shutting down");
        let state = self.state.write().await.take();
        if let Some(state) = state {
            state.worker.shutdown().await;
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        tracing::debug!("Document opened: {}", document.uri);
        let Some(path) = convert::file_path(&document.uri) else {
            return;
        };

        self.documents
            .write()
            .await
            .insert(document.uri.clone(), document.text.clone());
        self.send(CacheCommand::Opened {
            path: path.clone(),
            text: document.text.clone(),
        })
        .await;
        self.publish_parse_issues(document.uri, &path, &document.text, Some(document.version))
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // FULL sync: the last change carries the whole text
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        let uri = params.text_document.uri;
        let Some(path) = convert::file_path(&uri) else {
            return;
        };
        self.documents.write().await.insert(uri, change.text.clone());
        self.send(CacheCommand::Changed {
            path,
            text: change.text,
        })
        .await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(path) = convert::file_path(&uri) else {
            return;
        };
        if let Some(text) = &params.text {
            self.documents.write().await.insert(uri.clone(), text.clone());
        }
        self.send(CacheCommand::Saved {
            path: path.clone(),
            text: params.text,
        })
        .await;

        let text = self.documents.read().await.get(&uri).cloned();
        if let Some(text) = text {
            self.publish_parse_issues(uri, &path, &text, None).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);
        self.documents.write().await.remove(&uri);
        if let Some(path) = convert::file_path(&uri) {
            self.send(CacheCommand::Closed { path }).await;
        }
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in params.changes {
            let Some(path) = convert::file_path(&change.uri) else {
                continue;
            };
            if !convert::is_source_file(&path) {
                continue;
            }
            let is_open = self.documents.read().await.contains_key(&change.uri);
            match change.typ {
                FileChangeType::DELETED => self.send(CacheCommand::Deleted { path }).await,
                _ if is_open => {}
                _ => self.send(CacheCommand::Saved { path, text: None }).await,
            }
        }
    }

    async fn completion(&self, params: CompletionParams) -> jsonrpc::Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let cursor = convert::to_position(position.position);
        self.query_document(&position.text_document.uri, move |engine, path, text| {
            let candidates = engine.completions_at(path, text, cursor);
            Some(CompletionResponse::Array(convert::to_completion_items(candidates)))
        })
        .await
    }

    async fn hover(&self, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let cursor = convert::to_position(position.position);
        self.query_document(&position.text_document.uri, move |engine, path, text| {
            engine.hover_at(path, text, cursor).map(|hover| Hover {
                contents: HoverContents::Markup(convert::markdown(hover.contents)),
                range: None,
            })
        })
        .await
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> jsonrpc::Result<Option<SignatureHelp>> {
        let position = params.text_document_position_params;
        let cursor = convert::to_position(position.position);
        self.query_document(&position.text_document.uri, move |engine, path, text| {
            engine
                .signature_of(path, text, cursor)
                .map(convert::to_signature_help)
        })
        .await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let cursor = convert::to_position(position.position);
        self.query_document(&position.text_document.uri, move |engine, path, text| {
            let resolution = engine.resolve_at(path, text, cursor)?;
            let len = resolution.name().chars().count();
            resolution
                .location()
                .and_then(|location| convert::to_location(&location, len))
                .map(GotoDefinitionResponse::Scalar)
        })
        .await
    }

    async fn references(&self, params: ReferenceParams) -> jsonrpc::Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        let cursor = convert::to_position(position.position);
        let include_declaration = params.context.include_declaration;
        self.query_document(&position.text_document.uri, move |engine, path, text| {
            let resolution = engine.resolve_at(path, text, cursor)?;
            let len = resolution.name().chars().count();
            let mut locations: Vec<Location> = engine
                .references_to(path, text, cursor)
                .iter()
                .filter_map(|location| convert::to_location(location, len))
                .collect();

            if !include_declaration {
                if let Some(declaration) = resolution.location() {
                    if let Some(declaration) = convert::to_location(&declaration, len) {
                        locations.retain(|l| *l != declaration);
                    }
                }
            }
            Some(locations)
        })
        .await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        self.query_document(&params.text_document.uri, |engine, path, text| {
            let lines = LineIndex::new(text);
            let symbols: Vec<SymbolInformation> = engine
                .document_symbols(path, text)
                .iter()
                .filter_map(|symbol| convert::to_symbol_information(symbol, Some(&lines)))
                .collect();
            Some(DocumentSymbolResponse::Flat(symbols))
        })
        .await
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> jsonrpc::Result<Option<Vec<SymbolInformation>>> {
        let Some(engine) = self.engine().await else {
            return Ok(None);
        };
        join_query(
            tokio::task::spawn_blocking(move || {
                let symbols: Vec<SymbolInformation> = engine
                    .workspace_symbols(&params.query)
                    .iter()
                    .take(MAX_WORKSPACE_SYMBOLS)
                    .filter_map(|m| convert::to_symbol_information(&m.symbol, None))
                    .collect();
                Some(symbols)
            })
            .await,
        )
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> jsonrpc::Result<Option<Vec<TextEdit>>> {
        let options = convert::to_format_options(&params.options);
        self.query_document(&params.text_document.uri, move |engine, _, text| {
            Some(convert::to_text_edits(engine.format_edits(text, None, options)))
        })
        .await
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> jsonrpc::Result<Option<Vec<TextEdit>>> {
        let options = convert::to_format_options(&params.options);
        let lines = (
            params.range.start.line as usize,
            params.range.end.line as usize,
        );
        self.query_document(&params.text_document.uri, move |engine, _, text| {
            Some(convert::to_text_edits(engine.format_edits(text, Some(lines), options)))
        })
        .await
    }

    /// Re-indents the line being typed and the one above it
    async fn on_type_formatting(
        &self,
        params: DocumentOnTypeFormattingParams,
    ) -> jsonrpc::Result<Option<Vec<TextEdit>>> {
        let position = params.text_document_position;
        let options = convert::to_format_options(&params.options);
        let line = position.position.line as usize;
        let lines = (line.saturating_sub(1), line);
        self.query_document(&position.text_document.uri, move |engine, _, text| {
            Some(convert::to_text_edits(engine.format_edits(text, Some(lines), options)))
        })
        .await
    }
}
