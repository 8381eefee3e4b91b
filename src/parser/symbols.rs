/*!
# Module symbol table

Data model produced by the source parser: symbols, parameters, per-method
scopes, regions and directives of a single module.
*/

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::ParseIssue;

use super::Dialect;

/// Вид символа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Procedure,
    Function,
    Variable,
    Parameter,
}

impl SymbolKind {
    pub fn is_method(self) -> bool {
        matches!(self, SymbolKind::Procedure | SymbolKind::Function)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Procedure => write!(f, "procedure"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::Parameter => write!(f, "parameter"),
        }
    }
}

/// Параметр метода
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    /// `Знач` / `Val`
    pub is_by_value: bool,
    /// Literal text after `=`, verbatim
    pub default_value: Option<String>,
}

impl ParamDescriptor {
    pub fn is_optional(&self) -> bool {
        self.default_value.is_some()
    }
}

impl fmt::Display for ParamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_by_value {
            write!(f, "Знач ")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(default) = &self.default_value {
            write!(f, " = {}", default)?;
        }
        Ok(())
    }
}

/// Положение объявления в файле (строки 0-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub file: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    /// Char column of the declared name on `start_line`
    pub name_column: usize,
}

impl SourceRange {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// Объявленный символ модуля
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub is_exported: bool,
    pub params: Vec<ParamDescriptor>,
    pub source_range: SourceRange,
    /// Contiguous `//` block right above the declaration, verbatim
    pub documentation: Option<String>,
    /// `&НаСервере` and friends
    pub compilation_directive: Option<String>,
    /// Innermost enclosing `#Область`
    pub region: Option<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, source_range: SourceRange) -> Self {
        Self {
            name: name.into(),
            kind,
            is_exported: false,
            params: Vec::new(),
            source_range,
            documentation: None,
            compilation_directive: None,
            region: None,
        }
    }

    pub fn lower_name(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn file(&self) -> &Path {
        &self.source_range.file
    }

    /// `Имя(Знач А, Б = 1)` for methods, the bare name otherwise
    pub fn signature_label(&self) -> String {
        if !self.kind.is_method() {
            return self.name.clone();
        }
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// Documentation text with comment markers removed
    pub fn documentation_text(&self) -> Option<String> {
        self.documentation.as_ref().map(|doc| strip_comment_markers(doc))
    }
}

/// Removes leading `//` (and one following space) from every line
pub fn strip_comment_markers(doc: &str) -> String {
    doc.lines()
        .map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix("//").unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Звено цепочки вызовов в правой части присваивания
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLink {
    pub name: String,
    pub is_call: bool,
}

/// Присваивание: `Имя = Новый Тип(...)` или `Имя = Объект.Метод()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub line: usize,
    /// Type name of a `Новый` expression on the right-hand side
    pub value_type: Option<String>,
    /// `Запрос.Выполнить()` on the right-hand side, leftmost link first;
    /// empty unless the whole expression is such a chain
    pub value_chain: Vec<ValueLink>,
}

impl Assignment {
    /// True when the right-hand side says something about the value's type
    pub fn is_typed(&self) -> bool {
        self.value_type.is_some() || !self.value_chain.is_empty()
    }
}

/// Область видимости одного метода
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodScope {
    /// Index of the method in `ModuleTable::symbols`
    pub method_index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub params: Vec<Symbol>,
    /// `Перем` declarations and first assignments, in source order
    pub locals: Vec<Symbol>,
    pub assignments: Vec<Assignment>,
}

impl MethodScope {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// `#Область Имя` ... `#КонецОбласти`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    /// `&НаКлиенте`, `&НаСервере`, annotations
    Compilation,
    /// `#Если Сервер Тогда`, `#Область`
    Preprocessor,
    /// OneScript `#Использовать библиотека`
    Import,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub line: usize,
    pub text: String,
}

/// Таблица символов одного модуля.
///
/// Создаётся целиком при каждом разборе файла и никогда не редактируется.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTable {
    pub file: PathBuf,
    pub dialect: Dialect,
    /// Module-scope symbols in source order; duplicates are kept
    pub symbols: Vec<Symbol>,
    /// Lower-cased method name -> index into `symbols` (last declaration wins)
    pub methods_by_name: HashMap<String, usize>,
    pub module_variables: Vec<String>,
    pub method_scopes: Vec<MethodScope>,
    /// Assignments in the module body, outside every method
    pub module_assignments: Vec<Assignment>,
    pub regions: Vec<Region>,
    pub directives: Vec<Directive>,
    pub issues: Vec<ParseIssue>,
    pub content_hash: u64,
    /// Text this table was parsed from
    pub text: Arc<str>,
}

impl ModuleTable {
    pub fn empty(file: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            file: file.into(),
            dialect,
            symbols: Vec::new(),
            methods_by_name: HashMap::new(),
            module_variables: Vec::new(),
            method_scopes: Vec::new(),
            module_assignments: Vec::new(),
            regions: Vec::new(),
            directives: Vec::new(),
            issues: Vec::new(),
            content_hash: crate::core::content_hash(""),
            text: Arc::from(""),
        }
    }

    /// Case-insensitive method lookup
    pub fn method(&self, name: &str) -> Option<&Symbol> {
        self.methods_by_name
            .get(&name.to_lowercase())
            .and_then(|idx| self.symbols.get(*idx))
    }

    /// Case-insensitive module variable lookup (last declaration wins)
    pub fn module_variable(&self, name: &str) -> Option<&Symbol> {
        let lower = name.to_lowercase();
        self.symbols
            .iter()
            .rev()
            .find(|s| s.kind == SymbolKind::Variable && s.lower_name() == lower)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.kind.is_method())
    }

    pub fn exported_methods(&self) -> impl Iterator<Item = &Symbol> {
        self.methods().filter(|s| s.is_exported)
    }

    /// Scope of the method whose body contains `line`
    pub fn scope_at(&self, line: usize) -> Option<&MethodScope> {
        self.method_scopes.iter().find(|scope| scope.contains_line(line))
    }

    /// Имя модуля для обращений вида `ОбщийМодуль.Метод()`.
    ///
    /// `CommonModules/<Имя>/Ext/Module.bsl` даёт `<Имя>`, иначе имя файла без расширения.
    pub fn module_name(&self) -> Option<String> {
        module_name_from_path(&self.file)
    }
}

pub fn module_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().to_string();
    if stem.eq_ignore_ascii_case("module") || stem.eq_ignore_ascii_case("managermodule") || stem.eq_ignore_ascii_case("objectmodule") {
        let ext_dir = path.parent()?;
        if ext_dir.file_name()?.to_string_lossy().eq_ignore_ascii_case("ext") {
            let name = ext_dir.parent()?.file_name()?.to_string_lossy().to_string();
            return Some(name);
        }
    }
    Some(stem)
}
