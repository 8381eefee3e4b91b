/*!
# Disk cache of module tables

Персистентный кэш таблиц модулей между запусками. Запись хранится в
отдельном файле на каждый исходник, имя файла получается из хэша пути.

Запись принимается только если совпадают версия формата, версия движка и
текст модуля. Любая ошибка кэша логируется и трактуется как промах:
кэш ускоряет полную пересборку, но не влияет на её результат.
*/

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::DiskCacheConfig;
use crate::core::{EngineError, EngineResult};
use crate::parser::ModuleTable;

/// Bumped whenever `ModuleTable` changes shape
pub const CACHE_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct CachedTable {
    format_version: u32,
    engine_version: String,
    table: ModuleTable,
}

/// Файловый кэш таблиц модулей
#[derive(Debug, Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
    compression_enabled: bool,
}

impl DiskCache {
    pub fn new(cache_dir: impl Into<PathBuf>, compression_enabled: bool) -> EngineResult<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| {
            EngineError::Cache(format!(
                "Failed to create cache directory {}: {}",
                cache_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            cache_dir,
            compression_enabled,
        })
    }

    /// Cache for the given settings, `None` when disabled or unusable
    pub fn from_config(config: &DiskCacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match Self::new(config.resolved_dir().join("tables"), config.compression) {
            Ok(cache) => {
                tracing::info!("Module table cache at {}", cache.cache_dir.display());
                Some(cache)
            }
            Err(e) => {
                tracing::warn!("Disk cache disabled: {}", e);
                None
            }
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, source: &Path) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        self.cache_dir.join(format!("table_{:x}.bin", hasher.finish()))
    }

    /// Cached table for `source`, if it was parsed from exactly `text`
    pub fn load(&self, source: &Path, text: &str) -> EngineResult<Option<ModuleTable>> {
        let entry_path = self.entry_path(source);
        if !entry_path.exists() {
            return Ok(None);
        }
        let entry = self.read_entry(&entry_path)?;
        let valid = entry.format_version == CACHE_FORMAT_VERSION
            && entry.engine_version == env!("CARGO_PKG_VERSION")
            && entry.table.file == source
            && &*entry.table.text == text;
        if valid {
            Ok(Some(entry.table))
        } else {
            tracing::trace!("Stale cache entry for {}", source.display());
            Ok(None)
        }
    }

    pub fn store(&self, table: &ModuleTable) -> EngineResult<()> {
        let entry = CachedTable {
            format_version: CACHE_FORMAT_VERSION,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            table: table.clone(),
        };
        self.write_entry(&self.entry_path(&table.file), &entry)
    }

    pub fn remove(&self, source: &Path) -> EngineResult<()> {
        let entry_path = self.entry_path(source);
        if entry_path.exists() {
            fs::remove_file(&entry_path).map_err(|e| {
                EngineError::Cache(format!("Failed to remove {}: {}", entry_path.display(), e))
            })?;
        }
        Ok(())
    }

    /// Removes every cache entry
    pub fn clear(&self) -> EngineResult<usize> {
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| EngineError::Cache(format!("Failed to list cache directory: {}", e)))?;
        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().map(|e| e == "bin").unwrap_or(false)
                && fs::remove_file(&path).is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn read_entry(&self, entry_path: &Path) -> EngineResult<CachedTable> {
        let mut file = fs::File::open(entry_path).map_err(|e| {
            EngineError::Cache(format!("Failed to open {}: {}", entry_path.display(), e))
        })?;
        let mut content = Vec::new();
        let read = if self.compression_enabled {
            GzDecoder::new(file).read_to_end(&mut content)
        } else {
            file.read_to_end(&mut content)
        };
        read.map_err(|e| {
            EngineError::Cache(format!("Failed to read {}: {}", entry_path.display(), e))
        })?;
        bincode::deserialize(&content).map_err(|e| {
            EngineError::Cache(format!(
                "Failed to deserialize {}: {}",
                entry_path.display(),
                e
            ))
        })
    }

    fn write_entry(&self, entry_path: &Path, entry: &CachedTable) -> EngineResult<()> {
        let serialized = bincode::serialize(entry)
            .map_err(|e| EngineError::Cache(format!("Failed to serialize cache entry: {}", e)))?;
        let write_error = |e: std::io::Error| {
            EngineError::Cache(format!("Failed to write {}: {}", entry_path.display(), e))
        };

        if self.compression_enabled {
            let file = fs::File::create(entry_path).map_err(write_error)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&serialized).map_err(write_error)?;
            encoder.finish().map_err(write_error)?;
        } else {
            fs::write(entry_path, &serialized).map_err(write_error)?;
        }
        Ok(())
    }
}
