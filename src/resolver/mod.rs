/*!
# Reference Resolver

Сопоставляет идентификатор под курсором с объявлением.

Порядок поиска (первое совпадение побеждает, внутренние области затеняют
внешние):

1. параметры и локальные переменные охватывающего метода, объявленные не
   позже строки курсора;
2. переменные модуля и методы текущего файла;
3. экспортные методы других файлов рабочей области;
4. каталог стандартной библиотеки диалекта.

Для обращений через точку тип получателя определяется по имени класса или
перечисления каталога, имени модуля рабочей области или ближайшему
предшествующему присваиванию `Х = Новый Тип` либо `Х = Запрос.Выполнить()`
(в методе или в теле модуля). Следующие звенья цепочки берут тип из
`return_type` каталога.
*/

pub mod completion;
pub mod word;

pub use completion::{CompletionCandidate, CompletionKind, CompletionSource};
pub use word::{call_context, receiver_chain, word_at, CallContext, ChainLink, WordAt};

use std::path::Path;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogEntry};
use crate::core::{FileLocation, LineIndex, Position};
use crate::parser::{keyword, Assignment, ModuleTable, Symbol};

use word::{follows_new_keyword, member_dot_before};

/// Bound on `А = Б.Метод()` links followed while typing a receiver
const MAX_ASSIGNMENT_HOPS: usize = 8;

/// Доступ резолвера к символам других файлов рабочей области
pub trait WorkspaceSymbols {
    /// Exported methods named `name` declared outside `exclude`, ordered by file
    fn exported_methods_named(&self, name: &str, exclude: &Path) -> Vec<Symbol>;

    /// Every exported method declared outside `exclude`
    fn exported_symbols(&self, exclude: &Path) -> Vec<Symbol>;

    /// Module addressed by name in `Модуль.Метод()` calls
    fn module_named(&self, name: &str) -> Option<Arc<ModuleTable>>;
}

/// Рабочая область без файлов: разрешение только в пределах модуля и каталога
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWorkspace;

impl WorkspaceSymbols for EmptyWorkspace {
    fn exported_methods_named(&self, _name: &str, _exclude: &Path) -> Vec<Symbol> {
        Vec::new()
    }

    fn exported_symbols(&self, _exclude: &Path) -> Vec<Symbol> {
        Vec::new()
    }

    fn module_named(&self, _name: &str) -> Option<Arc<ModuleTable>> {
        None
    }
}

/// Результат разрешения ссылки
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Parameter or local variable of the enclosing method
    Local(Symbol),
    /// Module variable or method of the same file
    Module(Symbol),
    /// Exported method of another workspace file
    Workspace(Symbol),
    Catalog(Arc<CatalogEntry>),
}

impl Resolution {
    pub fn name(&self) -> &str {
        match self {
            Resolution::Local(s) | Resolution::Module(s) | Resolution::Workspace(s) => &s.name,
            Resolution::Catalog(entry) => &entry.name,
        }
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Resolution::Local(s) | Resolution::Module(s) | Resolution::Workspace(s) => Some(s),
            Resolution::Catalog(_) => None,
        }
    }

    pub fn catalog_entry(&self) -> Option<&Arc<CatalogEntry>> {
        match self {
            Resolution::Catalog(entry) => Some(entry),
            _ => None,
        }
    }

    /// Declaration site; catalog entries have none
    pub fn location(&self) -> Option<FileLocation> {
        self.symbol().map(|s| {
            FileLocation::new(
                s.source_range.file.clone(),
                s.source_range.start_line,
                s.source_range.name_column,
            )
        })
    }

    pub fn source(&self) -> CompletionSource {
        match self {
            Resolution::Local(_) => CompletionSource::Local,
            Resolution::Module(_) => CompletionSource::Module,
            Resolution::Workspace(_) => CompletionSource::Workspace,
            Resolution::Catalog(_) => CompletionSource::Catalog,
        }
    }
}

/// Тип получателя обращения через точку
#[derive(Debug, Clone)]
pub enum ReceiverType {
    /// Catalog class or enum name
    Catalog(String),
    /// Workspace module
    Module(Arc<ModuleTable>),
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Резолвер одного файла.
///
/// `text` is the text positions refer to; `table` must be parsed from it.
pub struct Resolver<'a> {
    table: &'a ModuleTable,
    lines: LineIndex<'a>,
    workspace: &'a dyn WorkspaceSymbols,
    catalog: &'a Catalog,
}

impl<'a> Resolver<'a> {
    pub fn new(
        table: &'a ModuleTable,
        text: &'a str,
        workspace: &'a dyn WorkspaceSymbols,
        catalog: &'a Catalog,
    ) -> Self {
        Self {
            table,
            lines: LineIndex::new(text),
            workspace,
            catalog,
        }
    }

    pub fn table(&self) -> &ModuleTable {
        self.table
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn line(&self, line: usize) -> Option<&'a str> {
        self.lines.line(line)
    }

    /// Declaration of the identifier touching `position`
    pub fn resolve_at(&self, position: Position) -> Option<Resolution> {
        let line = self.lines.line(position.line)?;
        let word = word_at(line, position.column)?;
        if word.text.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        if let Some(dot) = member_dot_before(line, word.start) {
            let chain = receiver_chain(line, dot)?;
            let receiver = self.receiver_type(&chain, position.line)?;
            return self.resolve_member(&receiver, &word.text);
        }

        if keyword(&word.text).is_some() {
            return None;
        }

        if follows_new_keyword(line, word.start) {
            return self
                .catalog
                .class(&word.text)
                .map(|t| Resolution::Catalog(Arc::clone(&t.entry)));
        }

        self.resolve_name(&word.text, position.line)
    }

    /// Resolves a bare name as seen from `line`
    pub fn resolve_name(&self, name: &str, line: usize) -> Option<Resolution> {
        if let Some(scope) = self.table.scope_at(line) {
            if let Some(param) = scope.params.iter().find(|p| same_name(&p.name, name)) {
                return Some(Resolution::Local(param.clone()));
            }
            if let Some(local) = scope
                .locals
                .iter()
                .find(|l| l.source_range.start_line <= line && same_name(&l.name, name))
            {
                return Some(Resolution::Local(local.clone()));
            }
        }

        if let Some(variable) = self.table.module_variable(name) {
            return Some(Resolution::Module(variable.clone()));
        }
        if let Some(method) = self.table.method(name) {
            return Some(Resolution::Module(method.clone()));
        }

        if let Some(symbol) = self
            .workspace
            .exported_methods_named(name, &self.table.file)
            .into_iter()
            .next()
        {
            return Some(Resolution::Workspace(symbol));
        }

        self.catalog.lookup(name).cloned().map(Resolution::Catalog)
    }

    /// Type of a receiver chain, `None` when it cannot be inferred
    pub fn receiver_type(&self, chain: &[ChainLink], line: usize) -> Option<ReceiverType> {
        self.chain_type(chain, line, MAX_ASSIGNMENT_HOPS)
    }

    fn chain_type(&self, chain: &[ChainLink], line: usize, hops: usize) -> Option<ReceiverType> {
        let (head, rest) = chain.split_first()?;
        let mut current = self.head_type(head, line, hops)?;
        for link in rest {
            current = match current {
                ReceiverType::Catalog(type_name) => {
                    let member = self.catalog.member(&type_name, &link.name)?;
                    ReceiverType::Catalog(member.return_type.clone()?)
                }
                ReceiverType::Module(_) => return None,
            };
        }
        Some(current)
    }

    fn head_type(&self, head: &ChainLink, line: usize, hops: usize) -> Option<ReceiverType> {
        if head.is_call {
            if self.table.method(&head.name).is_some() {
                return None;
            }
            let entry = self.catalog.global(&head.name)?;
            return entry.return_type.clone().map(ReceiverType::Catalog);
        }

        if let Some(assignment) = self.last_typed_assignment(&head.name, line) {
            if let Some(type_name) = &assignment.value_type {
                return Some(ReceiverType::Catalog(type_name.clone()));
            }
            let chain: Vec<ChainLink> = assignment
                .value_chain
                .iter()
                .map(|link| ChainLink {
                    name: link.name.clone(),
                    is_call: link.is_call,
                })
                .collect();
            return self.chain_type(&chain, assignment.line, hops.checked_sub(1)?);
        }
        if self.declared_locally(&head.name, line) {
            return None;
        }
        if let Some(catalog_type) = self.catalog.type_named(&head.name) {
            return Some(ReceiverType::Catalog(catalog_type.entry.name.clone()));
        }
        if let Some(module) = self.workspace.module_named(&head.name) {
            return Some(ReceiverType::Module(module));
        }
        let property = self.catalog.global(&head.name)?;
        property.return_type.clone().map(ReceiverType::Catalog)
    }

    /// Nearest preceding assignment to `name` with a `Новый` or call-chain
    /// right-hand side, in the enclosing method or else in the module body
    fn last_typed_assignment(&self, name: &str, line: usize) -> Option<&'a Assignment> {
        let assignments = match self.table.scope_at(line) {
            Some(scope) => &scope.assignments,
            None => &self.table.module_assignments,
        };
        assignments
            .iter()
            .filter(|a| a.line <= line && a.is_typed() && same_name(&a.name, name))
            .last()
    }

    fn declared_locally(&self, name: &str, line: usize) -> bool {
        self.table
            .scope_at(line)
            .map(|scope| {
                scope.params.iter().any(|p| same_name(&p.name, name))
                    || scope
                        .locals
                        .iter()
                        .any(|l| l.source_range.start_line <= line && same_name(&l.name, name))
            })
            .unwrap_or(false)
    }

    /// Member `name` of a typed receiver
    pub fn resolve_member(&self, receiver: &ReceiverType, name: &str) -> Option<Resolution> {
        match receiver {
            ReceiverType::Catalog(type_name) => self
                .catalog
                .member(type_name, name)
                .cloned()
                .map(Resolution::Catalog),
            ReceiverType::Module(module) => module
                .method(name)
                .filter(|s| s.is_exported)
                .or_else(|| module.module_variable(name).filter(|s| s.is_exported))
                .cloned()
                .map(Resolution::Workspace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntryKind, Catalogs, Locale};
    use crate::parser::{BslParser, Dialect};
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Рабочая область из набора разобранных модулей
    struct FakeWorkspace {
        modules: HashMap<String, Arc<ModuleTable>>,
    }

    impl FakeWorkspace {
        fn new(files: &[(&str, &str)]) -> Self {
            let modules = files
                .iter()
                .map(|(path, text)| {
                    let table = BslParser::new().parse_file(*path, text, Dialect::Bsl);
                    (
                        table.module_name().unwrap_or_default().to_lowercase(),
                        Arc::new(table),
                    )
                })
                .collect();
            Self { modules }
        }
    }

    impl WorkspaceSymbols for FakeWorkspace {
        fn exported_methods_named(&self, name: &str, exclude: &Path) -> Vec<Symbol> {
            self.exported_symbols(exclude)
                .into_iter()
                .filter(|s| same_name(&s.name, name))
                .collect()
        }

        fn exported_symbols(&self, exclude: &Path) -> Vec<Symbol> {
            let mut symbols: Vec<Symbol> = self
                .modules
                .values()
                .filter(|t| t.file != exclude)
                .flat_map(|t| t.exported_methods().cloned().collect::<Vec<_>>())
                .collect();
            symbols.sort_by(|a, b| a.file().cmp(b.file()));
            symbols
        }

        fn module_named(&self, name: &str) -> Option<Arc<ModuleTable>> {
            self.modules.get(&name.to_lowercase()).cloned()
        }
    }

    const SOURCE: &str = "Перем Счетчик;

Процедура Обработать(Параметр) Экспорт
    Массив = Новый Массив;
    Массив.Добавить(Параметр);
    Счетчик = Счетчик + 1;
    Запрос = Новый Запрос;
    Выборка = Запрос.Выполнить().Выбрать();
    Общий.Помощник();
    Сообщить(Параметр);
КонецПроцедуры

Процедура Параметр()
КонецПроцедуры
";

    fn with_resolver<R>(f: impl FnOnce(&Resolver<'_>) -> R) -> R {
        with_source(SOURCE, f)
    }

    fn with_source<R>(source: &str, f: impl FnOnce(&Resolver<'_>) -> R) -> R {
        let catalogs = Catalogs::load_builtin().unwrap();
        let table = BslParser::new().parse_file("/w/Модуль.bsl", source, Dialect::Bsl);
        let workspace = FakeWorkspace::new(&[(
            "/w/Общий.bsl",
            "Процедура Помощник() Экспорт\nКонецПроцедуры\nПроцедура Скрытая()\nКонецПроцедуры",
        )]);
        let resolver = Resolver::new(
            &table,
            source,
            &workspace,
            catalogs.for_dialect(Dialect::Bsl),
        );
        f(&resolver)
    }

    #[test]
    fn test_parameter_shadows_module_method() {
        with_resolver(|r| {
            let res = r.resolve_at(Position::new(9, 15)).unwrap();
            assert!(matches!(res, Resolution::Local(ref s) if s.name == "Параметр"));
        });
    }

    #[test]
    fn test_module_variable_resolves_in_method() {
        with_resolver(|r| {
            let res = r.resolve_at(Position::new(5, 6)).unwrap();
            assert!(matches!(res, Resolution::Module(ref s) if s.name == "Счетчик"));
            assert_eq!(res.location(), Some(FileLocation::new("/w/Модуль.bsl", 0, 6)));
        });
    }

    #[test]
    fn test_catalog_global_and_member() {
        with_resolver(|r| {
            let message = r.resolve_at(Position::new(9, 6)).unwrap();
            assert_eq!(message.name(), "Сообщить");
            assert_eq!(message.source(), CompletionSource::Catalog);

            let add = r.resolve_at(Position::new(4, 12)).unwrap();
            let entry = add.catalog_entry().unwrap();
            assert_eq!(entry.name, "Добавить");
            assert_eq!(entry.owner.as_deref(), Some("Массив"));
        });
    }

    #[test]
    fn test_chained_call_follows_return_types() {
        with_resolver(|r| {
            let select = r.resolve_at(Position::new(7, 33)).unwrap();
            let entry = select.catalog_entry().unwrap();
            assert_eq!(entry.name, "Выбрать");
            assert_eq!(entry.owner.as_deref(), Some("РезультатЗапроса"));
        });
    }

    #[test]
    fn test_workspace_module_member() {
        with_resolver(|r| {
            let res = r.resolve_at(Position::new(8, 12)).unwrap();
            assert!(matches!(res, Resolution::Workspace(ref s) if s.name == "Помощник"));
            assert_eq!(res.location().unwrap().file, PathBuf::from("/w/Общий.bsl"));
        });
    }

    #[test]
    fn test_class_after_new_keyword() {
        with_resolver(|r| {
            let res = r.resolve_at(Position::new(3, 20)).unwrap();
            assert_eq!(res.catalog_entry().unwrap().kind, CatalogEntryKind::Class);
        });
    }

    #[test]
    fn test_keywords_and_unknown_names_do_not_resolve() {
        with_resolver(|r| {
            assert!(r.resolve_at(Position::new(3, 14)).is_none());
            assert!(r.resolve_name("НетТакогоИмени", 3).is_none());
        });
    }

    #[test]
    fn test_receiver_typed_by_assigned_call() {
        let source = "Процедура П()\n    Запрос = Новый Запрос;\n    Результат = Запрос.Выполнить();\n    Выборка = Результат.Выбрать();\n    Выборка.Следующий();\nКонецПроцедуры\n";
        with_source(source, |r| {
            let select = r.resolve_at(Position::new(3, 25)).unwrap();
            assert_eq!(
                select.catalog_entry().unwrap().owner.as_deref(),
                Some("РезультатЗапроса")
            );
            let next = r.resolve_at(Position::new(4, 14)).unwrap();
            assert_eq!(next.name(), "Следующий");

            let labels: Vec<String> = r
                .completions(Position::new(3, 24), Locale::Ru)
                .into_iter()
                .map(|c| c.label)
                .collect();
            assert!(labels.contains(&"Выгрузить".to_string()), "{:?}", labels);
        });
    }

    #[test]
    fn test_self_referencing_assignment_terminates() {
        let source = "Процедура П()\n    Х = Х.Получить();\n    Х.Что();\nКонецПроцедуры\n";
        with_source(source, |r| {
            assert!(r.resolve_at(Position::new(2, 7)).is_none());
        });
    }

    #[test]
    fn test_module_body_assignment_types_receiver() {
        let source = "Процедура П()\nКонецПроцедуры\n\nСписок = Новый Массив;\nСписок.Добавить(1);\n";
        with_source(source, |r| {
            let add = r.resolve_at(Position::new(4, 9)).unwrap();
            assert_eq!(add.catalog_entry().unwrap().owner.as_deref(), Some("Массив"));
        });
    }
}
