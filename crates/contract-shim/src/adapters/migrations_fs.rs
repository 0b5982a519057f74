//! # Migration Sources
//!
//! Discovery adapters behind the [`MigrationSource`] port: a filesystem
//! scanner over a contract-supplied directory, and a static list for embedded
//! registries and tests.

use crate::errors::ContractError;
use crate::ports::outbound::MigrationSource;
use std::fs;
use std::path::{Path, PathBuf};

/// Lists migration names from a directory.
///
/// File stems are the descriptor names, so `Version-20200101000000` and
/// `Version-20200101000000.json` both discover as `Version-20200101000000`.
/// A missing or non-directory path yields an empty list, not an error.
#[derive(Debug, Clone)]
pub struct FsMigrationSource {
    dir: PathBuf,
}

impl FsMigrationSource {
    /// Source over the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The scanned directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for FsMigrationSource {
    fn list(&self) -> Result<Vec<String>, ContractError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir)
            .map_err(|_| ContractError::unknown("failed to read migrations directory"))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|_| ContractError::unknown("failed to read migrations directory"))?;
            if let Some(stem) = entry.path().file_stem() {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}

/// Serves a fixed list of migration names.
#[derive(Debug, Clone, Default)]
pub struct StaticMigrationSource {
    names: Vec<String>,
}

impl StaticMigrationSource {
    /// Source over the given names.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl MigrationSource for StaticMigrationSource {
    fn list(&self) -> Result<Vec<String>, ContractError> {
        Ok(self.names.clone())
    }
}
