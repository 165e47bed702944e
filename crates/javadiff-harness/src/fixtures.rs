//! Scenario fixture files.
//!
//! A fixture file is one JSON document holding a suite of scenarios.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scenario::TestScenario;

pub const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fixture {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("fixture {} uses schema version {found}, expected {}", .path.display(), SCHEMA_VERSION)]
    Version { path: PathBuf, found: String },
}

/// A suite of scenarios sharing a name, like the test methods of one class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    /// Schema version.
    pub version: String,
    pub suite: String,
    pub scenarios: Vec<TestScenario>,
}

impl ScenarioSet {
    #[must_use]
    pub fn new(suite: impl Into<String>, scenarios: Vec<TestScenario>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            suite: suite.into(),
            scenarios,
        }
    }

    /// Load a scenario set from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the set to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a scenario set from a file path.
    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_json(&content).map_err(|source| FixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if set.version != SCHEMA_VERSION {
            return Err(FixtureError::Version {
                path: path.to_path_buf(),
                found: set.version,
            });
        }
        Ok(set)
    }
}

/// `.json` files of `dir`, sorted; a file path is returned as is.
pub fn fixture_paths(path: &Path) -> Result<Vec<PathBuf>, FixtureError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let io = |source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io)? {
        let entry_path = entry
            .map_err(|source| FixtureError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .path();
        if entry_path.extension().is_some_and(|ext| ext == "json") {
            paths.push(entry_path);
        }
    }
    paths.sort();
    Ok(paths)
}
