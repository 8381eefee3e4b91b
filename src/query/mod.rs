/*!
# Query Façade

Точка входа для всех запросов редактора: автодополнение, переход к
определению, поиск ссылок, структура документа, поиск символов по рабочей
области, подсказка параметров, всплывающая документация, синтакс-помощник
и форматирование отступов.

Каждый запрос только читает данные. Он берёт текущий снимок рабочей области
и таблицу запрошенного файла. Если таблица в кэше построена по другому
тексту (редактор опередил обработчик кэша), текст разбирается на месте, и
ответ всегда соответствует тексту, который видит пользователь.

## Использование

```rust,no_run
use bsl_intellisense::config::EngineConfig;
use bsl_intellisense::core::Position;
use bsl_intellisense::query::LanguageEngine;
use std::path::Path;

let engine = LanguageEngine::new(EngineConfig::default())?;
engine.cache().full_rebuild(Path::new("./src"))?;

let text = "Процедура Тест()\n    Сооб\nКонецПроцедуры";
let items = engine.completions_at(Path::new("./src/Модуль.bsl"), text, Position::new(1, 8));
assert_eq!(items[0].label, "Сообщить");
# Ok::<(), bsl_intellisense::core::EngineError>(())
```
*/

pub mod format;
pub mod search;
pub mod signature;

pub use format::{FormatOptions, IndentEdit};
pub use search::{match_rank, MatchRank, WorkspaceSymbolMatch};
pub use signature::{ParameterInfo, SignatureInfo};

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{Catalog, Catalogs, Locale, SyntaxHelperItem};
use crate::config::EngineConfig;
use crate::core::fs_utils::strip_bom;
use crate::core::{normalize_path, EngineResult, FileLocation, LineIndex, Position};
use crate::parser::{BslParser, Dialect, LineLexer, ModuleTable, Symbol, TokenKind};
use crate::resolver::{same_name, CompletionCandidate, CompletionSource, Resolution, Resolver};
use crate::workspace::{WorkspaceCache, WorkspaceSnapshot};

/// Всплывающая подсказка
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoverInfo {
    /// Markdown
    pub contents: String,
    pub source: CompletionSource,
}

/// Table and snapshot a single query runs against
struct Document {
    table: Arc<ModuleTable>,
    snapshot: Arc<WorkspaceSnapshot>,
}

/// Языковой движок: кэш рабочей области плюс каталоги
pub struct LanguageEngine {
    catalogs: Arc<Catalogs>,
    cache: Arc<WorkspaceCache>,
}

impl LanguageEngine {
    /// Loads catalogs (embedded or from `catalog_dir`) and creates an empty cache.
    /// A catalog that fails to load is fatal.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let catalogs = match &config.catalog_dir {
            Some(dir) => Arc::new(Catalogs::load_from_dir(dir)?),
            None => Catalogs::shared()?,
        };
        Ok(Self::with_catalogs(config, catalogs))
    }

    pub fn with_catalogs(config: EngineConfig, catalogs: Arc<Catalogs>) -> Self {
        Self {
            catalogs,
            cache: Arc::new(WorkspaceCache::new(config)),
        }
    }

    pub fn cache(&self) -> &Arc<WorkspaceCache> {
        &self.cache
    }

    pub fn catalogs(&self) -> &Arc<Catalogs> {
        &self.catalogs
    }

    pub fn config(&self) -> &EngineConfig {
        self.cache.config()
    }

    /// Locale of catalog names in completion and signatures
    pub fn locale(&self) -> Locale {
        self.config().autocomplete_language
    }

    pub fn catalog(&self, dialect: Dialect) -> &Catalog {
        self.catalogs.for_dialect(dialect)
    }

    fn document(&self, path: &Path, text: &str) -> Document {
        let path = normalize_path(path);
        let snapshot = self.cache.snapshot();
        let text = strip_bom(text);
        let table = match snapshot.get(&path) {
            Some(table) if &*table.text == text => Arc::clone(table),
            _ => {
                let dialect = self.cache.dialect_of(&path);
                Arc::new(BslParser::new().parse_file(path, text, dialect))
            }
        };
        Document { table, snapshot }
    }

    fn with_resolver<R>(&self, path: &Path, text: &str, f: impl FnOnce(&Resolver<'_>) -> R) -> R {
        let document = self.document(path, text);
        let catalog = self.catalog(document.table.dialect);
        let resolver = Resolver::new(
            &document.table,
            &document.table.text,
            document.snapshot.as_ref(),
            catalog,
        );
        f(&resolver)
    }

    /// What the identifier at `position` refers to
    pub fn resolve_at(&self, path: &Path, text: &str, position: Position) -> Option<Resolution> {
        self.with_resolver(path, text, |resolver| resolver.resolve_at(position))
    }

    pub fn completions_at(&self, path: &Path, text: &str, position: Position) -> Vec<CompletionCandidate> {
        let locale = self.locale();
        self.with_resolver(path, text, |resolver| resolver.completions(position, locale))
    }

    /// Declaration site; `None` for catalog entries and unresolved names
    pub fn definition_of(&self, path: &Path, text: &str, position: Position) -> Option<FileLocation> {
        self.resolve_at(path, text, position)?.location()
    }

    pub fn hover_at(&self, path: &Path, text: &str, position: Position) -> Option<HoverInfo> {
        let locale = self.locale();
        let resolution = self.resolve_at(path, text, position)?;
        let contents = match &resolution {
            Resolution::Catalog(entry) => entry.documentation(locale),
            other => symbol_hover(other.symbol()?, other.source()),
        };
        Some(HoverInfo {
            contents,
            source: resolution.source(),
        })
    }

    /// Whole-word occurrences of the resolved name, sorted by file, line, column.
    ///
    /// Locals are searched inside their method only. Other names are searched
    /// in every file without regard to scope, so a same-named symbol of an
    /// unrelated module is reported too.
    pub fn references_to(&self, path: &Path, text: &str, position: Position) -> Vec<FileLocation> {
        let document = self.document(path, text);
        let catalog = self.catalog(document.table.dialect);
        let resolver = Resolver::new(
            &document.table,
            &document.table.text,
            document.snapshot.as_ref(),
            catalog,
        );
        let Some(resolution) = resolver.resolve_at(position) else {
            return Vec::new();
        };

        let names: Vec<String> = match &resolution {
            Resolution::Catalog(entry) => entry.names().map(str::to_string).collect(),
            other => vec![other.name().to_string()],
        };
        let current = &document.table;

        if let Resolution::Local(_) = resolution {
            let lines = current
                .scope_at(position.line)
                .map(|scope| (scope.start_line, scope.end_line));
            let mut found = scan_identifiers(&current.file, &current.text, &names, lines);
            found.sort();
            return found;
        }

        let others: Vec<(&PathBuf, &Arc<ModuleTable>)> = document
            .snapshot
            .tables()
            .filter(|(file, _)| **file != current.file)
            .collect();
        let mut found: Vec<FileLocation> = others
            .par_iter()
            .flat_map_iter(|(file, table)| scan_identifiers(file, &table.text, &names, None))
            .collect();
        found.extend(scan_identifiers(&current.file, &current.text, &names, None));
        found.sort();
        found
    }

    /// Module-scope symbols of the file in source order
    pub fn document_symbols(&self, path: &Path, text: &str) -> Vec<Symbol> {
        self.document(path, text).table.symbols.clone()
    }

    pub fn workspace_symbols(&self, query: &str) -> Vec<WorkspaceSymbolMatch> {
        search::search_symbols(&self.cache.snapshot(), query)
    }

    pub fn signature_of(&self, path: &Path, text: &str, position: Position) -> Option<SignatureInfo> {
        let locale = self.locale();
        self.with_resolver(path, text, |resolver| {
            signature::signature_at(resolver, position, locale)
        })
    }

    pub fn syntax_helper_items(&self, dialect: Dialect, filter: &str) -> Vec<SyntaxHelperItem> {
        self.catalog(dialect).syntax_helper_items(filter, self.locale())
    }

    /// Re-indentation of the whole text, or of an inclusive line range
    pub fn format_edits(
        &self,
        text: &str,
        lines: Option<(usize, usize)>,
        options: FormatOptions,
    ) -> Vec<IndentEdit> {
        let edits = format::indent_edits(text, lines, options);
        tracing::debug!("Formatting produced {} edits", edits.len());
        edits
    }
}

fn symbol_hover(symbol: &Symbol, source: CompletionSource) -> String {
    let mut header = symbol.signature_label();
    if symbol.is_exported {
        header.push_str(" Экспорт");
    }
    let mut contents = format!("```bsl\n{}\n```", header);
    if let Some(directive) = &symbol.compilation_directive {
        contents.push_str(&format!("\n\n`{}`", directive));
    }
    if let Some(doc) = symbol.documentation_text() {
        contents.push_str("\n\n");
        contents.push_str(&doc);
    }
    if source == CompletionSource::Workspace {
        if let Some(file) = symbol.file().file_name() {
            contents.push_str(&format!("\n\n_{}_", file.to_string_lossy()));
        }
    }
    contents
}

/// Identifier tokens equal to one of `names`; strings and comments are skipped
fn scan_identifiers(
    file: &Path,
    text: &str,
    names: &[String],
    lines: Option<(usize, usize)>,
) -> Vec<FileLocation> {
    let lower = text.to_lowercase();
    if !names.iter().any(|n| lower.contains(&n.to_lowercase())) {
        return Vec::new();
    }

    let mut lexer = LineLexer::new();
    let mut found = Vec::new();
    for (idx, line) in LineIndex::new(text).lines().iter().enumerate() {
        let tokens = lexer.tokenize(line);
        if let Some((start, end)) = lines {
            if idx < start || idx > end {
                continue;
            }
        }
        found.extend(
            tokens
                .iter()
                .filter(|t| t.kind == TokenKind::Identifier)
                .filter(|t| names.iter().any(|n| same_name(n, t.text)))
                .map(|t| FileLocation::new(file, idx, t.column)),
        );
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> LanguageEngine {
        LanguageEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_stale_cached_table_is_not_used() {
        let engine = engine();
        let path = Path::new("/w/Модуль.bsl");
        engine.cache().update_file(path, "Процедура Старая()\nКонецПроцедуры");
        let symbols = engine.document_symbols(path, "Процедура Новая()\nКонецПроцедуры");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "Новая");
    }

    #[test]
    fn test_hover_for_local_method() {
        let engine = engine();
        let text = "// Делает работу\nПроцедура Работа(А) Экспорт\nКонецПроцедуры\nРабота(1);";
        let hover = engine
            .hover_at(Path::new("/w/М.bsl"), text, Position::new(3, 2))
            .unwrap();
        assert_eq!(hover.source, CompletionSource::Module);
        assert!(hover.contents.contains("Работа(А) Экспорт"));
        assert!(hover.contents.contains("Делает работу"));
    }

    #[test]
    fn test_local_references_stay_in_method() {
        let engine = engine();
        let text = "Процедура А()\n  Х = 1;\n  Х = Х + 1;\nКонецПроцедуры\nПроцедура Б()\n  Х = 2;\nКонецПроцедуры";
        let refs = engine.references_to(Path::new("/w/М.bsl"), text, Position::new(1, 2));
        let lines: Vec<usize> = refs.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 2]);
    }

    #[test]
    fn test_references_skip_strings_and_comments() {
        let engine = engine();
        let text = "Процедура Цель()\nКонецПроцедуры\nЦель(); // Цель\nС = \"Цель\";";
        let refs = engine.references_to(Path::new("/w/М.bsl"), text, Position::new(0, 12));
        assert_eq!(
            refs,
            vec![
                FileLocation::new("/w/М.bsl", 0, 10),
                FileLocation::new("/w/М.bsl", 2, 0),
            ]
        );
    }

    #[test]
    fn test_signature_of_catalog_constructor() {
        let engine = engine();
        let text = "М = Новый Массив(";
        let signature = engine
            .signature_of(Path::new("/w/М.bsl"), text, Position::new(0, 17))
            .unwrap();
        assert!(signature.label.starts_with("Массив("));
        assert_eq!(signature.active_parameter, 0);
    }
}
