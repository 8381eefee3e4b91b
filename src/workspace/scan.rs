//! Перечисление исходных файлов рабочей области.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::EngineConfig;
use crate::core::normalize_path;

fn is_excluded(entry: &DirEntry, config: &EngineConfig) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| config.is_excluded_dir(name))
            .unwrap_or(false)
}

/// Source files under `root` with an indexed extension, sorted by path.
/// Excluded directories are not descended into; oversized files are skipped.
pub fn enumerate_sources(root: &Path, config: &EngineConfig) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, config))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| config.dialect_for(entry.path()).is_some())
        .filter(|entry| match entry.metadata() {
            Ok(meta) if meta.len() > config.max_file_size => {
                tracing::debug!(
                    "Skipping {} ({} bytes exceeds max_file_size)",
                    entry.path().display(),
                    meta.len()
                );
                false
            }
            _ => true,
        })
        .map(|entry| normalize_path(entry.path()))
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_enumerate_filters_extensions_and_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/sub")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/А.bsl"), "").unwrap();
        fs::write(root.join("src/sub/Б.os"), "").unwrap();
        fs::write(root.join("src/readme.md"), "").unwrap();
        fs::write(root.join("node_modules/pkg/В.os"), "").unwrap();

        let root = normalize_path(root);
        let files = enumerate_sources(&root, &EngineConfig::default());
        let relative: Vec<PathBuf> = files
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().to_path_buf())
            .collect();
        // component order: "sub" sorts before the Cyrillic file name
        assert_eq!(
            relative,
            vec![PathBuf::from("src/sub/Б.os"), PathBuf::from("src/А.bsl")]
        );
    }

    #[test]
    fn test_enumerate_skips_oversized_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.bsl"), "x".repeat(64)).unwrap();
        fs::write(dir.path().join("small.bsl"), "x").unwrap();
        let config = EngineConfig {
            max_file_size: 16,
            ..EngineConfig::default()
        };
        let files = enumerate_sources(dir.path(), &config);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.bsl"));
    }
}
