//! Автодополнение: кандидаты из четырёх корзин (локальные, модуль, рабочая
//! область, каталог) с сохранением порядка корзин и удалением дублей.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::{CatalogEntry, CatalogEntryKind, Locale};
use crate::core::Position;
use crate::parser::{Symbol, SymbolKind};

use super::word::{completion_context, CompletionTrigger};
use super::{ReceiverType, Resolver};

/// Откуда взят кандидат; порядок вариантов задаёт порядок корзин
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CompletionSource {
    Local,
    Module,
    Workspace,
    Catalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompletionKind {
    Procedure,
    Function,
    Variable,
    Parameter,
    Method,
    Property,
    Class,
    Enum,
    EnumValue,
}

/// Элемент автодополнения
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionCandidate {
    pub label: String,
    pub kind: CompletionKind,
    pub source: CompletionSource,
    pub detail: Option<String>,
    pub documentation: Option<String>,
}

impl CompletionCandidate {
    pub fn from_symbol(symbol: &Symbol, source: CompletionSource) -> Self {
        let (kind, detail) = match symbol.kind {
            SymbolKind::Procedure => (CompletionKind::Procedure, symbol.signature_label()),
            SymbolKind::Function => (CompletionKind::Function, symbol.signature_label()),
            SymbolKind::Parameter => (CompletionKind::Parameter, "Параметр".to_string()),
            SymbolKind::Variable if source == CompletionSource::Local => {
                (CompletionKind::Variable, "Локальная переменная".to_string())
            }
            SymbolKind::Variable => (CompletionKind::Variable, "Переменная модуля".to_string()),
        };
        let detail = match source {
            CompletionSource::Workspace => format!(
                "{} ({})",
                detail,
                symbol
                    .file()
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            ),
            _ => detail,
        };
        Self {
            label: symbol.name.clone(),
            kind,
            source,
            detail: Some(detail),
            documentation: symbol.documentation_text(),
        }
    }

    pub fn from_catalog(entry: &Arc<CatalogEntry>, label: String, locale: Locale) -> Self {
        let kind = match entry.kind {
            CatalogEntryKind::Method | CatalogEntryKind::Constructor => CompletionKind::Method,
            CatalogEntryKind::Property => CompletionKind::Property,
            CatalogEntryKind::Class => CompletionKind::Class,
            CatalogEntryKind::Enum => CompletionKind::Enum,
            CatalogEntryKind::EnumValue => CompletionKind::EnumValue,
        };
        Self {
            label,
            kind,
            source: CompletionSource::Catalog,
            detail: Some(entry.signature_label(locale)),
            documentation: Some(entry.documentation(locale)),
        }
    }
}

/// Label for a catalog entry whose name in some locale starts with `prefix`.
/// The configured locale wins when both match.
fn matching_label(entry: &CatalogEntry, prefix: &str, locale: Locale) -> Option<String> {
    let preferred = entry.display_name(locale);
    if preferred.to_lowercase().starts_with(prefix) {
        return Some(preferred.to_string());
    }
    entry
        .names()
        .find(|name| name.to_lowercase().starts_with(prefix))
        .map(str::to_string)
}

fn symbol_matches(symbol: &Symbol, prefix: &str) -> bool {
    symbol.lower_name().starts_with(prefix)
}

/// Appends candidates bucket by bucket; each bucket is sorted alphabetically
/// and a name already offered by an earlier bucket is skipped
#[derive(Default)]
struct Buckets {
    seen: HashSet<String>,
    items: Vec<CompletionCandidate>,
}

impl Buckets {
    fn push(&mut self, mut bucket: Vec<CompletionCandidate>) {
        bucket.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.label.cmp(&b.label))
        });
        for candidate in bucket {
            if self.seen.insert(candidate.label.to_lowercase()) {
                self.items.push(candidate);
            }
        }
    }
}

impl<'a> Resolver<'a> {
    /// Candidates for the identifier being typed at `position`
    pub fn completions(&self, position: Position, locale: Locale) -> Vec<CompletionCandidate> {
        let line_text = self.line(position.line).unwrap_or("");
        let prefix_end = crate::core::position::char_to_byte(line_text, position.column);
        let context = completion_context(&line_text[..prefix_end]);
        let prefix = context.prefix.to_lowercase();

        let mut buckets = Buckets::default();
        match context.trigger {
            CompletionTrigger::NewExpression => {
                buckets.push(self.class_candidates(&prefix, locale));
            }
            CompletionTrigger::Member(chain) => {
                if let Some(receiver) = chain.and_then(|c| self.receiver_type(&c, position.line)) {
                    buckets.push(self.member_candidates(&receiver, &prefix, locale));
                }
            }
            CompletionTrigger::Name => {
                buckets.push(self.local_candidates(position.line, &prefix));
                buckets.push(self.module_candidates(&prefix));
                buckets.push(self.workspace_candidates(&prefix));
                buckets.push(self.catalog_candidates(&prefix, locale));
            }
        }
        buckets.items
    }

    fn local_candidates(&self, line: usize, prefix: &str) -> Vec<CompletionCandidate> {
        let Some(scope) = self.table().scope_at(line) else {
            return Vec::new();
        };
        scope
            .params
            .iter()
            .chain(scope.locals.iter().filter(|l| l.source_range.start_line <= line))
            .filter(|s| symbol_matches(s, prefix))
            .map(|s| CompletionCandidate::from_symbol(s, CompletionSource::Local))
            .collect()
    }

    fn module_candidates(&self, prefix: &str) -> Vec<CompletionCandidate> {
        self.table()
            .symbols
            .iter()
            .filter(|s| symbol_matches(s, prefix))
            .map(|s| CompletionCandidate::from_symbol(s, CompletionSource::Module))
            .collect()
    }

    fn workspace_candidates(&self, prefix: &str) -> Vec<CompletionCandidate> {
        self.workspace
            .exported_symbols(&self.table().file)
            .iter()
            .filter(|s| symbol_matches(s, prefix))
            .map(|s| CompletionCandidate::from_symbol(s, CompletionSource::Workspace))
            .collect()
    }

    fn catalog_candidates(&self, prefix: &str, locale: Locale) -> Vec<CompletionCandidate> {
        let catalog = self.catalog();
        let globals = catalog.globals().iter();
        let types = catalog.types().iter().map(|t| &t.entry);
        globals
            .chain(types)
            .filter_map(|entry| {
                matching_label(entry, prefix, locale)
                    .map(|label| CompletionCandidate::from_catalog(entry, label, locale))
            })
            .collect()
    }

    fn class_candidates(&self, prefix: &str, locale: Locale) -> Vec<CompletionCandidate> {
        self.catalog()
            .classes()
            .filter_map(|t| {
                matching_label(&t.entry, prefix, locale)
                    .map(|label| CompletionCandidate::from_catalog(&t.entry, label, locale))
            })
            .collect()
    }

    fn member_candidates(
        &self,
        receiver: &ReceiverType,
        prefix: &str,
        locale: Locale,
    ) -> Vec<CompletionCandidate> {
        match receiver {
            ReceiverType::Catalog(type_name) => self
                .catalog()
                .type_named(type_name)
                .map(|t| {
                    t.members
                        .iter()
                        .filter_map(|member| {
                            matching_label(member, prefix, locale).map(|label| {
                                CompletionCandidate::from_catalog(member, label, locale)
                            })
                        })
                        .collect()
                })
                .unwrap_or_default(),
            ReceiverType::Module(module) => module
                .symbols
                .iter()
                .filter(|s| s.is_exported && symbol_matches(s, prefix))
                .map(|s| CompletionCandidate::from_symbol(s, CompletionSource::Workspace))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalogs;
    use crate::parser::{BslParser, Dialect};
    use crate::resolver::EmptyWorkspace;
    use pretty_assertions::assert_eq;

    fn complete(text: &str, position: Position, locale: Locale) -> Vec<CompletionCandidate> {
        let catalogs = Catalogs::load_builtin().unwrap();
        let table = BslParser::new().parse(text, Dialect::Bsl);
        let resolver = Resolver::new(&table, text, &EmptyWorkspace, catalogs.for_dialect(Dialect::Bsl));
        resolver.completions(position, locale)
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        let items = complete("Процедура П()\n  сооб\nКонецПроцедуры", Position::new(1, 6), Locale::Ru);
        assert!(items.iter().any(|c| c.label == "Сообщить"));
        assert!(items.iter().all(|c| c.label.to_lowercase().starts_with("сооб")));
    }

    #[test]
    fn test_buckets_ordered_local_module_catalog() {
        let text = "Перем СтрМодуль;\nПроцедура П(СтрПарам)\n  Стр\nКонецПроцедуры";
        let items = complete(text, Position::new(2, 5), Locale::Ru);
        let sources: Vec<CompletionSource> = items.iter().map(|c| c.source).collect();
        let mut sorted = sources.clone();
        sorted.sort();
        assert_eq!(sources, sorted);
        assert_eq!(items[0].label, "СтрПарам");
        assert_eq!(items[1].label, "СтрМодуль");
        assert!(items.iter().any(|c| c.label == "СтрДлина"));
    }

    #[test]
    fn test_duplicates_keep_earliest_bucket() {
        let text = "Процедура П()\n  Сообщить = 1;\n  Сооб\nКонецПроцедуры";
        let items = complete(text, Position::new(2, 6), Locale::Ru);
        let matching: Vec<&CompletionCandidate> =
            items.iter().filter(|c| c.label == "Сообщить").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].source, CompletionSource::Local);
    }

    #[test]
    fn test_english_locale_labels() {
        let items = complete("Mess", Position::new(0, 4), Locale::En);
        assert_eq!(items[0].label, "Message");

        let items = complete("Сооб", Position::new(0, 4), Locale::En);
        assert!(items.iter().any(|c| c.label == "Сообщить"));
    }

    #[test]
    fn test_after_new_only_classes() {
        let items = complete("Т = Новый Табл", Position::new(0, 14), Locale::Ru);
        assert!(!items.is_empty());
        assert!(items.iter().all(|c| c.kind == CompletionKind::Class));
        assert!(items.iter().any(|c| c.label == "ТаблицаЗначений"));
    }

    #[test]
    fn test_member_completion_of_typed_local() {
        let text = "Процедура П()\n  Т = Новый ТаблицаЗначений;\n  Т.Колонки.\nКонецПроцедуры";
        let items = complete(text, Position::new(2, 12), Locale::Ru);
        let labels: Vec<&str> = items.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Добавить", "Количество", "Найти", "Удалить"]);
    }

    #[test]
    fn test_unknown_receiver_has_no_members() {
        let items = complete("Неизвестно.", Position::new(0, 11), Locale::Ru);
        assert!(items.is_empty());
    }
}
