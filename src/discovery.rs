use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::DiscoveryConfig;
use crate::{ModernizeError, Result};

/// Expands command-line paths into the Python files to process.
#[derive(Debug)]
pub struct FileDiscovery {
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    exclude_patterns: Vec<Regex>,
}

impl FileDiscovery {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            extensions: config.extensions.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
            exclude_patterns,
        })
    }

    /// Every Python file under `paths`, sorted and without duplicates.
    ///
    /// Explicitly named files are taken as long as their extension matches;
    /// directories are walked recursively, skipping excluded directory names.
    pub fn discover<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();

        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(ModernizeError::PathNotFound(path.to_path_buf()));
            }

            if path.is_file() {
                if self.is_python_file(path) && !self.is_excluded(path) {
                    files.insert(path.to_path_buf());
                }
                continue;
            }

            for entry in WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded_dir(entry))
                .filter_map(|e| e.ok())
            {
                let candidate = entry.path();
                if entry.file_type().is_file()
                    && self.is_python_file(candidate)
                    && !self.is_excluded(candidate)
                {
                    files.insert(candidate.to_path_buf());
                }
            }
        }

        if files.is_empty() {
            return Err(ModernizeError::NoPythonFiles);
        }

        debug!(count = files.len(), "discovered python files");
        Ok(files.into_iter().collect())
    }

    fn is_python_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|extension| self.extensions.iter().any(|allowed| allowed == extension))
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.exclude_dirs.iter().any(|excluded| excluded == name))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.exclude_patterns.iter().any(|pattern| pattern.is_match(&path))
    }
}
