/*!
# Source position types

Line/column positions used by queries and a line index for char-based column
arithmetic. Lines and columns are 0-based; columns count Unicode scalar values,
which coincides with UTF-16 units for Cyrillic and Latin text.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn zero() -> Self {
        Self::new(0, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A position inside a particular file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl FileLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line + 1, self.column + 1)
    }
}

/// Line index for fast line lookup and char-column slicing.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    lines: Vec<&'a str>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        Self { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line: usize) -> Option<&'a str> {
        self.lines.get(line).copied()
    }

    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    /// Text of the line up to (not including) the char column
    pub fn line_prefix(&self, position: Position) -> Option<&'a str> {
        let line = self.line(position.line)?;
        let byte = char_to_byte(line, position.column);
        Some(&line[..byte])
    }
}

/// Converts a char column to a byte offset, clamped to the string length
pub fn char_to_byte(text: &str, column: usize) -> usize {
    text.char_indices()
        .nth(column)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
