//! Export configuration: command line / environment values merged over an
//! optional TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Contents of a `--config` file.
///
/// ```toml
/// pmt = "projects/pmt.json"
/// target = "pmt_metadata.sqlite"
/// json = "pmt_metadata.json"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub pmt: Option<String>,
    pub target: Option<String>,
    pub json: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|reason| Error::ConfigFile {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Fully resolved export configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Source document dump.
    pub source: PathBuf,
    /// Target metadata store.
    pub target: PathBuf,
    /// JSON export file.
    pub json: PathBuf,
}

impl ExportConfig {
    /// Merge explicit values over the config file and validate the result.
    ///
    /// Every missing (or empty) value is reported at once; nothing is
    /// opened or created here.
    pub fn resolve(
        pmt: Option<String>,
        target: Option<String>,
        json: Option<String>,
        file: ConfigFile,
    ) -> Result<Self, Error> {
        let pmt = non_empty(pmt).or_else(|| non_empty(file.pmt));
        let target = non_empty(target).or_else(|| non_empty(file.target));
        let json = non_empty(json).or_else(|| non_empty(file.json));

        match (pmt, target, json) {
            (Some(pmt), Some(target), Some(json)) => Ok(Self {
                source: PathBuf::from(pmt),
                target: PathBuf::from(target),
                json: PathBuf::from(json),
            }),
            (pmt, target, json) => {
                let mut missing = Vec::new();
                if pmt.is_none() {
                    missing.push("--pmt");
                }
                if target.is_none() {
                    missing.push("--target");
                }
                if json.is_none() {
                    missing.push("--json");
                }
                Err(Error::Configuration(missing))
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
