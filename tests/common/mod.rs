//! Hermetic filesystem fixtures shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use modernize_attrs::{ModernizeError, Result};
use tempfile::TempDir;

/// A throwaway project directory populated with Python sources.
pub struct TestProject {
    temp_dir: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()
            .map_err(|e| ModernizeError::Internal(format!("Failed to create temp directory: {}", e)))?;
        Ok(Self { temp_dir })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn add_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root().join(relative))?)
    }
}

/// Strip the leading newline of an indented raw-string fixture.
pub fn source(text: &str) -> String {
    text.strip_prefix('\n').unwrap_or(text).to_string()
}
