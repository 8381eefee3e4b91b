/*!
# Error System for BSL Intellisense

Typed error taxonomy of the engine.

- `EngineError` covers failures that callers can observe: unreadable files,
  broken catalogs, invalid configuration, disk-cache problems.
- `ParseIssue` records recoverable parser problems. They are stored inside the
  module table and never returned as `Err`.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Результат операций движка
pub type EngineResult<T> = Result<T, EngineError>;

/// Ошибки движка
#[derive(Error, Debug)]
pub enum EngineError {
    /// Файл не читается или удалён. Затрагивает только этот файл.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Каталог стандартной библиотеки не загружен. Движок не может работать.
    #[error("Failed to load standard library catalog '{name}': {reason}")]
    CatalogLoad { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Ошибка дискового кэша таблиц модулей (не влияет на корректность)
    #[error("Module cache error: {0}")]
    Cache(String),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn catalog(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CatalogLoad {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors stop engine activation; everything else is isolated
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::CatalogLoad { .. })
    }
}

/// Вид восстановимой проблемы разбора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParseIssueKind {
    /// Заголовок метода без закрывающей скобки списка параметров
    MalformedHeader,
    /// Метод не закрыт до конца файла или до следующего заголовка
    UnterminatedMethod,
    /// Терминатор метода вне метода
    UnexpectedTerminator,
    /// Терминатор другого вида (КонецФункции у процедуры)
    MismatchedTerminator,
    /// Незакрытый блок (Если/Цикл/Попытка) внутри метода
    UnclosedBlock,
    /// Незакрытая область или условная компиляция
    UnclosedRegion,
    /// Лишний #КонецОбласти / #КонецЕсли
    UnexpectedRegionEnd,
}

impl fmt::Display for ParseIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseIssueKind::MalformedHeader => "malformed declaration header",
            ParseIssueKind::UnterminatedMethod => "unterminated method",
            ParseIssueKind::UnexpectedTerminator => "terminator outside of a method",
            ParseIssueKind::MismatchedTerminator => "terminator does not match declaration",
            ParseIssueKind::UnclosedBlock => "unclosed block",
            ParseIssueKind::UnclosedRegion => "unclosed region",
            ParseIssueKind::UnexpectedRegionEnd => "region end without region",
        };
        f.write_str(text)
    }
}

/// Recoverable parse problem at a 0-based line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    pub line: usize,
    pub kind: ParseIssueKind,
}

impl ParseIssue {
    pub fn new(line: usize, kind: ParseIssueKind) -> Self {
        Self { line, kind }
    }
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_is_fatal() {
        let err = EngineError::catalog("bsl", "unexpected end of input");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("bsl"));
    }

    #[test]
    fn test_io_error_is_isolated() {
        let err = EngineError::io(
            "Module.bsl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Module.bsl"));
    }

    #[test]
    fn test_issue_display_is_one_based() {
        let issue = ParseIssue::new(0, ParseIssueKind::UnterminatedMethod);
        assert_eq!(issue.to_string(), "line 1: unterminated method");
    }
}
