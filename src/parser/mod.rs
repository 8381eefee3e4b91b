/*!
# BSL Parser

Structural parser for BSL (1C:Enterprise) and OneScript modules.

The parser does not build a full AST. It recognises method declarations,
parameters, module and local variables, regions and directives, and produces
an immutable [`ModuleTable`] for the file. Parsing never fails: malformed
input yields a partial table plus [`ParseIssue`](crate::core::ParseIssue)s.

## Usage

```rust
use bsl_intellisense::parser::{BslParser, Dialect};

let table = BslParser::new().parse(r#"
    Процедура ТестоваяПроцедура() Экспорт
        Сообщить("Тест");
    КонецПроцедуры
"#, Dialect::Bsl);
assert!(table.method("ТестоваяПроцедура").is_some());
```
*/

pub mod declarations;
pub mod keywords;
pub mod lexer;
mod scanner;
pub mod symbols;

pub use keywords::{is_keyword, keyword, Keyword};
pub use lexer::{is_ident_char, LineLexer, Token, TokenKind};
pub use symbols::{
    module_name_from_path, Assignment, Directive, DirectiveKind, MethodScope, ModuleTable,
    ParamDescriptor, Region, SourceRange, Symbol, SymbolKind, ValueLink,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::fs_utils::strip_bom;

/// Диалект исходного кода
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Dialect {
    /// 1C:Enterprise (`.bsl`)
    #[default]
    Bsl,
    /// OneScript (`.os`)
    OneScript,
}

impl Dialect {
    /// Dialect by file extension; `None` for files the engine does not index
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "bsl" => Some(Dialect::Bsl),
            "os" => Some(Dialect::OneScript),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Bsl => write!(f, "bsl"),
            Dialect::OneScript => write!(f, "oscript"),
        }
    }
}

/// Main BSL parser
#[derive(Debug, Clone, Default)]
pub struct BslParser;

impl BslParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses module text that does not belong to a file
    pub fn parse(&self, text: &str, dialect: Dialect) -> ModuleTable {
        self.parse_file(PathBuf::new(), text, dialect)
    }

    /// Parses module text; `path` is recorded in every source range
    pub fn parse_file(&self, path: impl Into<PathBuf>, text: &str, dialect: Dialect) -> ModuleTable {
        let path = path.into();
        let text: Arc<str> = Arc::from(strip_bom(text));
        let source = Arc::clone(&text);
        let table = scanner::ModuleScanner::new(path, dialect, text, &source).run();
        if !table.issues.is_empty() {
            tracing::debug!(
                "{}: parsed with {} issue(s)",
                table.file.display(),
                table.issues.len()
            );
        }
        table
    }
}

/// Shorthand for `BslParser::new().parse(text, dialect)`
pub fn parse(text: &str, dialect: Dialect) -> ModuleTable {
    BslParser::new().parse(text, dialect)
}
