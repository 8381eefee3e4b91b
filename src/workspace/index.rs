/*!
# Workspace snapshot

Неизменяемый снимок рабочей области: таблицы модулей по нормализованному
пути и производный обратный индекс «имя → объявления».

Обратный индекс строится лениво при первом обращении и живёт столько же,
сколько снимок. Любое изменение создаёт новый снимок с пустой ячейкой
индекса, поэтому индекс никогда не расходится с таблицами.
*/

use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::parser::{ModuleTable, Symbol};
use crate::resolver::WorkspaceSymbols;

/// Объявление в обратном индексе
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSymbol {
    pub file: PathBuf,
    pub symbol: Symbol,
}

/// Обратный индекс имён, производный от таблиц снимка
#[derive(Debug, Default)]
pub struct ReverseIndex {
    by_name: HashMap<String, Vec<IndexedSymbol>>,
    modules: HashMap<String, Vec<PathBuf>>,
}

impl ReverseIndex {
    fn build(tables: &BTreeMap<PathBuf, Arc<ModuleTable>>) -> Self {
        let mut index = Self::default();
        for (path, table) in tables {
            for symbol in &table.symbols {
                index
                    .by_name
                    .entry(symbol.lower_name())
                    .or_default()
                    .push(IndexedSymbol {
                        file: path.clone(),
                        symbol: symbol.clone(),
                    });
            }
            if let Some(name) = table.module_name() {
                index
                    .modules
                    .entry(name.to_lowercase())
                    .or_default()
                    .push(path.clone());
            }
        }
        tracing::debug!(
            "Reverse index built: {} names, {} modules",
            index.by_name.len(),
            index.modules.len()
        );
        index
    }

    /// Declarations with this name (case-insensitive), ordered by file
    pub fn lookup(&self, name: &str) -> &[IndexedSymbol] {
        self.by_name
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.by_name.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexedSymbol> {
        self.by_name.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn module_files(&self, name: &str) -> &[PathBuf] {
        self.modules
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Снимок рабочей области
#[derive(Debug, Default)]
pub struct WorkspaceSnapshot {
    tables: BTreeMap<PathBuf, Arc<ModuleTable>>,
    generation: u64,
    reverse: OnceCell<ReverseIndex>,
}

impl WorkspaceSnapshot {
    pub fn new(tables: BTreeMap<PathBuf, Arc<ModuleTable>>, generation: u64) -> Self {
        Self {
            tables,
            generation,
            reverse: OnceCell::new(),
        }
    }

    /// Rebuild generation this snapshot descends from
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<ModuleTable>> {
        self.tables.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.tables.contains_key(path)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&PathBuf, &Arc<ModuleTable>)> {
        self.tables.iter()
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Copy with one table replaced or added
    pub fn with_table(&self, path: PathBuf, table: Arc<ModuleTable>) -> Self {
        let mut tables = self.tables.clone();
        tables.insert(path, table);
        Self::new(tables, self.generation)
    }

    /// Copy without `path`
    pub fn without(&self, path: &Path) -> Self {
        let mut tables = self.tables.clone();
        tables.remove(path);
        Self::new(tables, self.generation)
    }

    /// Reverse name index, built on first use
    pub fn reverse_index(&self) -> &ReverseIndex {
        self.reverse.get_or_init(|| ReverseIndex::build(&self.tables))
    }

    pub fn is_reverse_index_built(&self) -> bool {
        self.reverse.get().is_some()
    }

    /// Total number of module-scope symbols
    pub fn symbol_count(&self) -> usize {
        self.tables.values().map(|t| t.symbols.len()).sum()
    }
}

impl WorkspaceSymbols for WorkspaceSnapshot {
    fn exported_methods_named(&self, name: &str, exclude: &Path) -> Vec<Symbol> {
        self.reverse_index()
            .lookup(name)
            .iter()
            .filter(|s| s.file != exclude && s.symbol.kind.is_method() && s.symbol.is_exported)
            .map(|s| s.symbol.clone())
            .collect()
    }

    fn exported_symbols(&self, exclude: &Path) -> Vec<Symbol> {
        self.tables
            .iter()
            .filter(|(path, _)| path.as_path() != exclude)
            .flat_map(|(_, table)| table.exported_methods().cloned())
            .collect()
    }

    fn module_named(&self, name: &str) -> Option<Arc<ModuleTable>> {
        self.reverse_index()
            .module_files(name)
            .first()
            .and_then(|path| self.tables.get(path))
            .cloned()
    }
}
