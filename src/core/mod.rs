/*!
# Core Module

Error types, source positions and file helpers shared by every component.
*/

pub mod errors;
pub mod fs_utils;
pub mod position;

pub use errors::{EngineError, EngineResult, ParseIssue, ParseIssueKind};
pub use fs_utils::{content_hash, normalize_path, read_source_file};
pub use position::{FileLocation, LineIndex, Position};
