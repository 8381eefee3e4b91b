//! File system utility helpers (encoding-aware readers, path normalisation, hashing)

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use super::errors::{EngineError, EngineResult};

/// Reads a source file with encoding detection and BOM handling.
/// Returns the content as UTF-8 string with BOM removed.
pub fn read_source_file(path: &Path) -> EngineResult<String> {
    let bytes = std::fs::read(path).map_err(|e| EngineError::io(path, e))?;
    Ok(decode_source(&bytes))
}

/// Decodes raw bytes of a module: UTF-16 by BOM, UTF-8, then Windows-1251
pub fn decode_source(bytes: &[u8]) -> String {
    let content = match bytes {
        // UTF-16LE BOM: FF FE
        [0xFF, 0xFE, ..] => {
            let (decoded, _, had_errors) = encoding_rs::UTF_16LE.decode(bytes);
            if had_errors {
                tracing::warn!("Errors detected while decoding UTF-16LE file");
            }
            decoded.into_owned()
        }
        // UTF-16BE BOM: FE FF
        [0xFE, 0xFF, ..] => {
            let (decoded, _, had_errors) = encoding_rs::UTF_16BE.decode(bytes);
            if had_errors {
                tracing::warn!("Errors detected while decoding UTF-16BE file");
            }
            decoded.into_owned()
        }
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                // Старые выгрузки 1С бывают в Windows-1251
                tracing::debug!("UTF-8 decoding failed, trying Windows-1251");
                let (decoded, _, had_errors) = encoding_rs::WINDOWS_1251.decode(bytes);
                if had_errors {
                    tracing::warn!("Errors detected while decoding Windows-1251 file");
                }
                decoded.into_owned()
            }
        },
    };

    strip_bom(&content).to_string()
}

/// Removes a leading U+FEFF if present
pub fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{FEFF}').unwrap_or(input)
}

/// Lexical path normalisation: removes `.` and resolves `..` without touching the disk.
/// Keys of the workspace index always go through this function.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Stable-within-process hash of a module text
pub fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
