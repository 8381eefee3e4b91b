/*!
# Standard library catalogs

Статические описания встроенных элементов языка для обоих диалектов:
глобальные методы и свойства, классы (методы, свойства, конструкторы) и
системные перечисления.

Каталоги встраиваются в бинарник как JSON (`data/bsl.json`,
`data/oscript.json`), загружаются один раз и разделяются через `Arc`.
Каталог можно переопределить файлами из каталога на диске. Ошибка загрузки
каталога фатальна: движок без каталога не создаётся.

## Использование

```rust
use bsl_intellisense::catalog::Catalogs;
use bsl_intellisense::parser::Dialect;

let catalogs = Catalogs::shared()?;
let message = catalogs.for_dialect(Dialect::Bsl).global("Message");
assert!(message.is_some());
# Ok::<(), bsl_intellisense::core::EngineError>(())
```
*/

pub mod entry;
pub mod loader;

pub use entry::{CatalogEntry, CatalogEntryKind, CatalogParameter, CatalogSection, Locale};
pub use loader::CATALOG_FORMAT_VERSION;

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::core::{EngineError, EngineResult};
use crate::parser::Dialect;

use loader::RawCatalog;

const BUILTIN_BSL: &str = include_str!("data/bsl.json");
const BUILTIN_OSCRIPT: &str = include_str!("data/oscript.json");

static SHARED: OnceCell<Arc<Catalogs>> = OnceCell::new();

/// Класс или системное перечисление со списком членов
#[derive(Debug, Clone)]
pub struct CatalogType {
    pub entry: Arc<CatalogEntry>,
    /// Methods and properties of a class, values of an enum
    pub members: Vec<Arc<CatalogEntry>>,
    pub constructors: Vec<Arc<CatalogEntry>>,
    member_index: HashMap<String, usize>,
}

impl CatalogType {
    fn new(entry: CatalogEntry) -> Self {
        Self {
            entry: Arc::new(entry),
            members: Vec::new(),
            constructors: Vec::new(),
            member_index: HashMap::new(),
        }
    }

    fn push_member(&mut self, member: CatalogEntry) {
        let idx = self.members.len();
        for name in member.names() {
            self.member_index.entry(name.to_lowercase()).or_insert(idx);
        }
        self.members.push(Arc::new(member));
    }

    /// Case-insensitive member lookup in either locale
    pub fn member(&self, name: &str) -> Option<&Arc<CatalogEntry>> {
        self.member_index
            .get(&name.to_lowercase())
            .and_then(|idx| self.members.get(*idx))
    }
}

/// Элемент списка синтакс-помощника
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxHelperItem {
    /// `Сообщить`, `Массив`, `Массив.Добавить`
    pub label: String,
    /// `1С/Глобальный контекст/...`, `OneScript/Классы/Массив`
    pub path: String,
    pub entry: Arc<CatalogEntry>,
}

/// Каталог одного диалекта
#[derive(Debug, Clone)]
pub struct Catalog {
    dialect: Dialect,
    version: u32,
    globals: Vec<Arc<CatalogEntry>>,
    global_index: HashMap<String, usize>,
    types: Vec<CatalogType>,
    type_index: HashMap<String, usize>,
}

impl Catalog {
    /// Builds a catalog from its JSON text
    pub fn from_json(dialect: Dialect, json: &str) -> EngineResult<Self> {
        let raw: RawCatalog =
            serde_json::from_str(json).map_err(|e| EngineError::catalog(dialect.to_string(), e))?;
        if raw.version > CATALOG_FORMAT_VERSION {
            return Err(EngineError::catalog(
                dialect.to_string(),
                format!(
                    "unsupported catalog version {} (expected <= {})",
                    raw.version, CATALOG_FORMAT_VERSION
                ),
            ));
        }
        Ok(Self::from_raw(dialect, raw))
    }

    fn from_raw(dialect: Dialect, raw: RawCatalog) -> Self {
        let mut catalog = Self {
            dialect,
            version: raw.version,
            globals: Vec::new(),
            global_index: HashMap::new(),
            types: Vec::new(),
            type_index: HashMap::new(),
        };

        for (key, member) in raw.global_methods {
            catalog.push_global(member.into_entry(
                &key,
                CatalogSection::GlobalContext,
                CatalogEntryKind::Method,
                None,
            ));
        }
        for (key, member) in raw.global_properties {
            catalog.push_global(member.into_entry(
                &key,
                CatalogSection::GlobalContext,
                CatalogEntryKind::Property,
                None,
            ));
        }

        for (key, class) in raw.classes {
            let mut class_type = CatalogType::new(class.header_entry(&key));
            let owner = class_type.entry.name.clone();
            for (name, member) in class.methods {
                class_type.push_member(member.into_entry(
                    &name,
                    CatalogSection::Classes,
                    CatalogEntryKind::Method,
                    Some(&owner),
                ));
            }
            for (name, member) in class.properties {
                class_type.push_member(member.into_entry(
                    &name,
                    CatalogSection::Classes,
                    CatalogEntryKind::Property,
                    Some(&owner),
                ));
            }
            for (name, member) in class.constructors {
                let mut constructor = member.into_entry(
                    &name,
                    CatalogSection::Classes,
                    CatalogEntryKind::Constructor,
                    Some(&owner),
                );
                // Конструктор вызывается по имени класса
                constructor.name = owner.clone();
                constructor.name_alternate = class_type.entry.name_alternate.clone();
                constructor.return_type = Some(owner.clone());
                if constructor.description.is_none() {
                    constructor.description = Some(name);
                }
                class_type.constructors.push(Arc::new(constructor));
            }
            catalog.push_type(class_type);
        }

        for (key, system_enum) in raw.system_enums {
            let mut enum_type = CatalogType::new(system_enum.header_entry(&key));
            let owner = enum_type.entry.name.clone();
            for (name, value) in system_enum.values {
                enum_type.push_member(value.into_entry(
                    &name,
                    CatalogSection::SystemEnums,
                    CatalogEntryKind::EnumValue,
                    Some(&owner),
                ));
            }
            catalog.push_type(enum_type);
        }

        catalog
    }

    fn push_global(&mut self, entry: CatalogEntry) {
        let idx = self.globals.len();
        for name in entry.names() {
            self.global_index.entry(name.to_lowercase()).or_insert(idx);
        }
        self.globals.push(Arc::new(entry));
    }

    fn push_type(&mut self, catalog_type: CatalogType) {
        let idx = self.types.len();
        for name in catalog_type.entry.names() {
            self.type_index.entry(name.to_lowercase()).or_insert(idx);
        }
        self.types.push(catalog_type);
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Global methods and properties
    pub fn globals(&self) -> &[Arc<CatalogEntry>] {
        &self.globals
    }

    /// Classes and system enumerations
    pub fn types(&self) -> &[CatalogType] {
        &self.types
    }

    pub fn classes(&self) -> impl Iterator<Item = &CatalogType> {
        self.types
            .iter()
            .filter(|t| t.entry.kind == CatalogEntryKind::Class)
    }

    /// Global method or property by name in either locale
    pub fn global(&self, name: &str) -> Option<&Arc<CatalogEntry>> {
        self.global_index
            .get(&name.to_lowercase())
            .and_then(|idx| self.globals.get(*idx))
    }

    /// Class or enum by name in either locale
    pub fn type_named(&self, name: &str) -> Option<&CatalogType> {
        self.type_index
            .get(&name.to_lowercase())
            .and_then(|idx| self.types.get(*idx))
    }

    pub fn class(&self, name: &str) -> Option<&CatalogType> {
        self.type_named(name)
            .filter(|t| t.entry.kind == CatalogEntryKind::Class)
    }

    /// Member of a class or enum
    pub fn member(&self, type_name: &str, member: &str) -> Option<&Arc<CatalogEntry>> {
        self.type_named(type_name)?.member(member)
    }

    /// Top-level lookup: global context first, then type names
    pub fn lookup(&self, name: &str) -> Option<&Arc<CatalogEntry>> {
        self.global(name)
            .or_else(|| self.type_named(name).map(|t| &t.entry))
    }

    /// Flat listing for the syntax helper, filtered by case-insensitive substring
    pub fn syntax_helper_items(&self, filter: &str, locale: Locale) -> Vec<SyntaxHelperItem> {
        let root = match self.dialect {
            Dialect::Bsl => "1С",
            Dialect::OneScript => "OneScript",
        };
        let needle = filter.to_lowercase();
        let mut items = Vec::new();
        let mut push = |label: String, path: String, entry: &Arc<CatalogEntry>| {
            if needle.is_empty() || label.to_lowercase().contains(&needle) {
                items.push(SyntaxHelperItem {
                    label,
                    path,
                    entry: Arc::clone(entry),
                });
            }
        };

        for entry in &self.globals {
            let segment = entry.segment.as_deref().unwrap_or(match entry.kind {
                CatalogEntryKind::Property => "Свойства",
                _ => "Функции",
            });
            push(
                entry.display_name(locale).to_string(),
                format!("{}/Глобальный контекст/{}", root, segment),
                entry,
            );
        }

        for catalog_type in &self.types {
            let type_name = catalog_type.entry.display_name(locale);
            let section = match catalog_type.entry.kind {
                CatalogEntryKind::Enum => "Системные перечисления",
                _ => "Классы",
            };
            let path = format!("{}/{}/{}", root, section, catalog_type.entry.name);
            push(type_name.to_string(), path.clone(), &catalog_type.entry);
            for member in &catalog_type.members {
                push(
                    format!("{}.{}", type_name, member.display_name(locale)),
                    path.clone(),
                    member,
                );
            }
        }

        items
    }
}

/// Каталоги обоих диалектов
#[derive(Debug, Clone)]
pub struct Catalogs {
    bsl: Catalog,
    oscript: Catalog,
}

impl Catalogs {
    /// Loads the catalogs embedded into the binary
    pub fn load_builtin() -> EngineResult<Self> {
        let catalogs = Self {
            bsl: Catalog::from_json(Dialect::Bsl, BUILTIN_BSL)?,
            oscript: Catalog::from_json(Dialect::OneScript, BUILTIN_OSCRIPT)?,
        };
        tracing::info!(
            "Catalogs loaded: bsl {} globals / {} types, oscript {} globals / {} types",
            catalogs.bsl.globals.len(),
            catalogs.bsl.types.len(),
            catalogs.oscript.globals.len(),
            catalogs.oscript.types.len()
        );
        Ok(catalogs)
    }

    /// Loads `bsl.json` / `oscript.json` from `dir`; a missing file keeps the
    /// embedded catalog, an unreadable or invalid one is an error
    pub fn load_from_dir(dir: &Path) -> EngineResult<Self> {
        let load = |dialect: Dialect, file_name: &str, builtin: &str| -> EngineResult<Catalog> {
            let path = dir.join(file_name);
            if !path.exists() {
                return Catalog::from_json(dialect, builtin);
            }
            tracing::info!("Loading catalog override from: {}", path.display());
            let json = std::fs::read_to_string(&path).map_err(|e| EngineError::io(&path, e))?;
            Catalog::from_json(dialect, &json)
        };

        Ok(Self {
            bsl: load(Dialect::Bsl, "bsl.json", BUILTIN_BSL)?,
            oscript: load(Dialect::OneScript, "oscript.json", BUILTIN_OSCRIPT)?,
        })
    }

    /// Process-wide embedded catalogs, loaded on first use
    pub fn shared() -> EngineResult<Arc<Self>> {
        SHARED
            .get_or_try_init(|| Self::load_builtin().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn for_dialect(&self, dialect: Dialect) -> &Catalog {
        match dialect {
            Dialect::Bsl => &self.bsl,
            Dialect::OneScript => &self.oscript,
        }
    }
}
