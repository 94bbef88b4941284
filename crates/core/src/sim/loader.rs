//! Program file loading and JSON output writing.
//!
//! Input programs are JSON arrays of assembly strings; outputs are written
//! pretty-printed with a trailing newline.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Error loading a program file.
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "i/o error: {}", e),
            LoadError::Json(e) => write!(f, "malformed JSON: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}

/// Reads a JSON array of assembly strings.
pub fn load_program(path: impl AsRef<Path>) -> Result<Vec<String>, LoadError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Writes a JSON value pretty-printed.
pub fn write_json(path: impl AsRef<Path>, value: &serde_json::Value) -> Result<(), LoadError> {
    let mut file = fs::File::create(path)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    writeln!(file)?;
    Ok(())
}
