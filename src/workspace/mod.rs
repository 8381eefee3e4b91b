/*!
# Workspace Cache

Кэш таблиц модулей всей рабочей области.

Читатели получают `Arc<WorkspaceSnapshot>` и работают с ним без блокировок;
писатели собирают новый снимок и подменяют указатель под коротким
эксклюзивным замком. Так запрос никогда не видит наполовину обновлённое
состояние.

Правила согласованности:

- полная пересборка помечается поколением; результат пересборки, которую
  обогнала более поздняя, отбрасывается;
- правки файлов, сделанные после старта пересборки, не затираются её
  результатом;
- текст открытого в редакторе буфера важнее текста на диске.
*/

pub mod disk_cache;
pub mod index;
pub mod scan;
pub mod worker;

pub use disk_cache::DiskCache;
pub use index::{IndexedSymbol, ReverseIndex, WorkspaceSnapshot};
pub use scan::enumerate_sources;
pub use worker::{spawn_cache_worker, CacheCommand, CacheWorkerHandle};

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::core::{normalize_path, read_source_file, EngineError, EngineResult};
use crate::parser::{BslParser, Dialect, ModuleTable};

/// Итог полной пересборки
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    Completed {
        generation: u64,
        files: usize,
        failed: usize,
        elapsed: Duration,
    },
    /// A later rebuild started before this one finished
    Superseded { generation: u64 },
}

impl RebuildOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RebuildOutcome::Completed { .. })
    }
}

/// Generation and edit counter captured when a rebuild starts
#[derive(Debug, Clone, Copy)]
struct RebuildTicket {
    generation: u64,
    start_seq: u64,
}

/// Кэш рабочей области
pub struct WorkspaceCache {
    config: EngineConfig,
    parser: BslParser,
    snapshot: RwLock<Arc<WorkspaceSnapshot>>,
    root: RwLock<Option<PathBuf>>,
    /// Generation of the most recently started rebuild
    generation: AtomicU64,
    /// Monotonic counter of single-file edits
    edit_seq: AtomicU64,
    /// Path -> `edit_seq` of its last update or eviction
    last_edits: Mutex<HashMap<PathBuf, u64>>,
    open_buffers: RwLock<HashMap<PathBuf, String>>,
    disk_cache: Option<DiskCache>,
}

impl std::fmt::Debug for WorkspaceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceCache")
            .field("files", &self.snapshot().len())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl WorkspaceCache {
    pub fn new(config: EngineConfig) -> Self {
        let disk_cache = DiskCache::from_config(&config.disk_cache);
        Self {
            config,
            parser: BslParser::new(),
            snapshot: RwLock::new(Arc::new(WorkspaceSnapshot::default())),
            root: RwLock::new(None),
            generation: AtomicU64::new(0),
            edit_seq: AtomicU64::new(0),
            last_edits: Mutex::new(HashMap::new()),
            open_buffers: RwLock::new(HashMap::new()),
            disk_cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// On-disk table cache, when enabled in the configuration
    pub fn disk_cache(&self) -> Option<&DiskCache> {
        self.disk_cache.as_ref()
    }

    /// Root of the last full rebuild
    pub fn root(&self) -> Option<PathBuf> {
        self.root.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Current snapshot; stays valid however long the caller holds it
    pub fn snapshot(&self) -> Arc<WorkspaceSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn get_module_table(&self, path: &Path) -> Option<Arc<ModuleTable>> {
        self.snapshot().get(&normalize_path(path)).cloned()
    }

    pub fn dialect_of(&self, path: &Path) -> Dialect {
        self.config
            .dialect_for(path)
            .or_else(|| Dialect::from_path(path))
            .unwrap_or_default()
    }

    /// Parses `text` and publishes it as the table of `path`
    pub fn update_file(&self, path: &Path, text: &str) -> Arc<ModuleTable> {
        let path = normalize_path(path);
        let table = Arc::new(self.parser.parse_file(path.clone(), text, self.dialect_of(&path)));
        self.publish(
            |snapshot| Some(snapshot.with_table(path.clone(), Arc::clone(&table))),
            &path,
        );
        tracing::debug!(
            "Updated {} ({} symbols)",
            path.display(),
            table.symbols.len()
        );
        table
    }

    /// Forgets a file.
    ///
    /// The eviction is recorded even when the published snapshot does not hold
    /// the path: a rebuild in flight may still carry it and must drop it.
    pub fn evict_file(&self, path: &Path) {
        let path = normalize_path(path);
        self.publish(
            |snapshot| snapshot.contains(&path).then(|| snapshot.without(&path)),
            &path,
        );
        if let Some(cache) = &self.disk_cache {
            if let Err(e) = cache.remove(&path) {
                tracing::debug!("{}", e);
            }
        }
        tracing::debug!("Evicted {}", path.display());
    }

    /// Remembers editor text for `path`; it overrides the disk during rebuilds
    pub fn open_buffer(&self, path: &Path, text: String) {
        self.open_buffers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(normalize_path(path), text);
    }

    pub fn close_buffer(&self, path: &Path) -> Option<String> {
        self.open_buffers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&normalize_path(path))
    }

    pub fn buffer_text(&self, path: &Path) -> Option<String> {
        self.open_buffers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&normalize_path(path))
            .cloned()
    }

    /// Re-reads a file from disk; evicts it when it is gone
    pub fn reload_from_disk(&self, path: &Path) -> Option<Arc<ModuleTable>> {
        match read_source_file(path) {
            Ok(text) => Some(self.update_file(path, &text)),
            Err(e) => {
                tracing::debug!("{}; evicting", e);
                self.evict_file(path);
                None
            }
        }
    }

    /// Records an edit of `path` and swaps in the snapshot built by `change`,
    /// if any, under the snapshot lock
    fn publish(
        &self,
        change: impl FnOnce(&WorkspaceSnapshot) -> Option<WorkspaceSnapshot>,
        path: &Path,
    ) {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        let seq = self.edit_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(next) = change(&guard) {
            *guard = Arc::new(next);
        }
        self.last_edits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf(), seq);
    }

    /// Enumerates and parses every source file under `root`, then swaps the
    /// snapshot in one step
    pub fn full_rebuild(&self, root: &Path) -> EngineResult<RebuildOutcome> {
        let started = Instant::now();
        let root = normalize_path(root);
        if !root.is_dir() {
            return Err(EngineError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "workspace root is not a directory"),
            ));
        }
        let ticket = self.begin_rebuild(&root);
        tracing::info!(
            "Rebuilding workspace index for {} (generation {})",
            root.display(),
            ticket.generation
        );

        let (tables, failed) = self.collect_tables(&root);
        let Some(snapshot) = self.commit_rebuild(&ticket, tables) else {
            return Ok(RebuildOutcome::Superseded {
                generation: ticket.generation,
            });
        };

        let elapsed = started.elapsed();
        tracing::info!(
            "Indexed {} files ({} failed) in {:.2?}",
            snapshot.len(),
            failed,
            elapsed
        );
        Ok(RebuildOutcome::Completed {
            generation: ticket.generation,
            files: snapshot.len(),
            failed,
            elapsed,
        })
    }

    fn begin_rebuild(&self, root: &Path) -> RebuildTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let start_seq = self.edit_seq.load(Ordering::SeqCst);
        *self.root.write().unwrap_or_else(|e| e.into_inner()) = Some(root.to_path_buf());
        RebuildTicket {
            generation,
            start_seq,
        }
    }

    /// Parses the sources under `root`; returns the tables and the number of
    /// unreadable files
    fn collect_tables(&self, root: &Path) -> (BTreeMap<PathBuf, Arc<ModuleTable>>, usize) {
        let files = enumerate_sources(root, &self.config);
        let buffers = self
            .open_buffers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let results: Vec<(PathBuf, Option<ModuleTable>)> = files
            .par_iter()
            .map(|path| (path.clone(), self.load_table(path, buffers.get(path))))
            .collect();

        let failed = results.iter().filter(|(_, t)| t.is_none()).count();
        let mut tables: BTreeMap<PathBuf, Arc<ModuleTable>> = results
            .into_iter()
            .filter_map(|(path, table)| table.map(|t| (path, Arc::new(t))))
            .collect();

        // Open buffers under the root that are not on disk yet
        for (path, text) in &buffers {
            if path.starts_with(root)
                && !tables.contains_key(path)
                && self.config.dialect_for(path).is_some()
            {
                let table = self.parser.parse_file(path.clone(), text, self.dialect_of(path));
                tables.insert(path.clone(), Arc::new(table));
            }
        }
        (tables, failed)
    }

    /// Publishes the rebuilt tables unless a later rebuild has started.
    ///
    /// Files updated or evicted after the rebuild began keep their current
    /// state; edit records the new snapshot already accounts for are dropped.
    fn commit_rebuild(
        &self,
        ticket: &RebuildTicket,
        mut tables: BTreeMap<PathBuf, Arc<ModuleTable>>,
    ) -> Option<Arc<WorkspaceSnapshot>> {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) != ticket.generation {
            tracing::info!(
                "Rebuild generation {} superseded, result discarded",
                ticket.generation
            );
            return None;
        }

        let mut edits = self.last_edits.lock().unwrap_or_else(|e| e.into_inner());
        for (path, seq) in edits.iter() {
            if *seq <= ticket.start_seq {
                continue;
            }
            match guard.get(path) {
                Some(current) => {
                    tables.insert(path.clone(), Arc::clone(current));
                }
                None => {
                    tables.remove(path);
                }
            }
        }
        edits.retain(|_, seq| *seq > ticket.start_seq);

        let snapshot = Arc::new(WorkspaceSnapshot::new(tables, ticket.generation));
        *guard = Arc::clone(&snapshot);
        Some(snapshot)
    }

    /// Table for one file of a rebuild. Unreadable files are skipped
    fn load_table(&self, path: &Path, buffer: Option<&String>) -> Option<ModuleTable> {
        let dialect = self.dialect_of(path);
        if let Some(text) = buffer {
            return Some(self.parser.parse_file(path.to_path_buf(), text, dialect));
        }

        let text = match read_source_file(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("{}", e);
                return None;
            }
        };

        if let Some(cache) = &self.disk_cache {
            match cache.load(path, &text) {
                Ok(Some(table)) => return Some(table),
                Ok(None) => {}
                Err(e) => tracing::debug!("{}", e),
            }
        }

        let table = self.parser.parse_file(path.to_path_buf(), &text, dialect);
        if let Some(cache) = &self.disk_cache {
            if let Err(e) = cache.store(&table) {
                tracing::debug!("{}", e);
            }
        }
        Some(table)
    }
}
