/*!
# Engine Configuration

Configuration of the intellisense engine, loaded from `bsl-intellisense.toml`
in the workspace root or built from defaults.

```toml
extensions = ["bsl", "os"]
exclude_dirs = [".git", "node_modules"]
debounce_ms = 300
autocomplete_language = "ru"
max_file_size = 5242880

[disk_cache]
enabled = true
```
*/

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::Locale;
use crate::core::{EngineError, EngineResult};
use crate::parser::Dialect;

/// Имя файла настроек в корне рабочей области
pub const CONFIG_FILE_NAME: &str = "bsl-intellisense.toml";

/// Настройки дискового кэша таблиц модулей
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Cache directory; defaults to the user cache dir
    pub dir: Option<PathBuf>,

    /// gzip compression of cache files
    #[serde(default = "default_true")]
    pub compression: bool,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            compression: true,
        }
    }
}

impl DiskCacheConfig {
    /// Effective cache directory
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("bsl-intellisense")
        })
    }
}

/// Настройки движка
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Indexed file extensions, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names skipped during workspace enumeration
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Quiet period before a changed buffer is re-parsed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Locale of catalog names offered by completion
    #[serde(default)]
    pub autocomplete_language: Locale,

    /// Files larger than this are not indexed
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Directory with `bsl.json` / `oscript.json` overriding the embedded catalogs
    pub catalog_dir: Option<PathBuf>,

    #[serde(default)]
    pub disk_cache: DiskCacheConfig,
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["bsl".to_string(), "os".to_string()]
}

fn default_exclude_dirs() -> Vec<String> {
    [".git", ".svn", "node_modules", "target", "oscript_modules"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            debounce_ms: default_debounce_ms(),
            autocomplete_language: Locale::default(),
            max_file_size: default_max_file_size(),
            catalog_dir: None,
            disk_cache: DiskCacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let config = Self::from_toml(&content)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `bsl-intellisense.toml` in `root` if present, defaults otherwise
    pub fn discover(root: &Path) -> EngineResult<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.extensions.is_empty() {
            return Err(EngineError::Config("extensions must not be empty".into()));
        }
        if let Some(ext) = self.extensions.iter().find(|e| e.starts_with('.')) {
            return Err(EngineError::Config(format!(
                "extension '{}' must be given without the leading dot",
                ext
            )));
        }
        Ok(())
    }

    /// Dialect of an indexed file; `None` for extensions outside the config
    pub fn dialect_for(&self, path: &Path) -> Option<Dialect> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
            return None;
        }
        Some(Dialect::from_path(path).unwrap_or_default())
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }

    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }
}
