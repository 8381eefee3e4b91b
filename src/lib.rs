/*!
# BSL Intellisense

Language intelligence for 1C:Enterprise BSL and OneScript modules: symbol
extraction, name resolution against the module, the workspace and the
standard-library catalogs, and an LSP front end for editors.

## Architecture

```text
bsl-intellisense
├── Catalog     - Embedded standard-library descriptors per dialect
├── Parser      - Line-oriented lexer and declaration scanner -> ModuleTable
├── Resolver    - Name resolution, receiver chains, completion buckets
├── Workspace   - Snapshot cache, reverse index, debounced update worker
├── Query       - Completion, definition, references, symbols, signatures
├── LSP         - tower-lsp server over stdio
└── CLI         - lsp / index / symbols / search / catalog
```

## Usage

### CLI
```bash
# Index a workspace
bsl-intellisense index ./src

# Outline of a module
bsl-intellisense symbols ./src/CommonModules/Общий/Ext/Module.bsl --format table

# Workspace symbol search
bsl-intellisense search ./src ПолучитьДанные

# Syntax helper
bsl-intellisense catalog --dialect oscript Массив

# Language server for editors
bsl-intellisense lsp
```

### Library
```rust,no_run
use bsl_intellisense::{EngineConfig, LanguageEngine, Position};
use std::path::Path;

let engine = LanguageEngine::new(EngineConfig::default())?;
engine.cache().full_rebuild(Path::new("./src"))?;

let path = Path::new("./src/Module.bsl");
let text = "Процедура Тест()\n    Сооб\nКонецПроцедуры\n";
for item in engine.completions_at(path, text, Position::new(1, 8)) {
    println!("{}", item.label);
}
# Ok::<(), bsl_intellisense::EngineError>(())
```
*/

pub mod catalog;
pub mod cli_common;
pub mod config;
pub mod core;
pub mod lsp;
pub mod parser;
pub mod query;
pub mod resolver;
pub mod workspace;

pub use catalog::{Catalog, CatalogEntry, Catalogs, Locale};
pub use config::EngineConfig;
pub use crate::core::{EngineError, EngineResult, FileLocation, ParseIssue, Position};
pub use parser::{BslParser, Dialect, ModuleTable, Symbol, SymbolKind};
pub use query::{HoverInfo, LanguageEngine, SignatureInfo, WorkspaceSymbolMatch};
pub use resolver::{CompletionCandidate, CompletionKind, Resolution};
pub use workspace::{RebuildOutcome, WorkspaceCache, WorkspaceSnapshot};

use std::path::Path;

/// Parses a single source file; the dialect follows the file extension
pub fn parse_file<P: AsRef<Path>>(file_path: P) -> EngineResult<ModuleTable> {
    let path = file_path.as_ref();
    let text = crate::core::read_source_file(path)?;
    let dialect = Dialect::from_path(path).unwrap_or_default();
    Ok(BslParser::new().parse_file(path, &text, dialect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_file_uses_extension_dialect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Главный.os");
        fs::write(&path, "Функция Версия() Экспорт\n    Возврат 1;\nКонецФункции\n").unwrap();

        let table = parse_file(&path).unwrap();
        assert_eq!(table.dialect, Dialect::OneScript);
        assert_eq!(table.symbols.len(), 1);
        assert!(table.symbols[0].is_exported);
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file("/definitely/missing.bsl").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
