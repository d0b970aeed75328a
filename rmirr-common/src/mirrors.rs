//! Mirror rule configuration
//!
//! The rule file is JSON with three top-level keys: `mirrors` (ordered rule
//! list), `suites` (name to ordered path list) and `defaults`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::endpoint::{Endpoint, expand_home_in, normalize_path};

/// One source tree and where it is mirrored to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorRule {
    /// Rule name, also the lock file name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,

    /// Declared source identity and root path
    pub source: Endpoint,

    /// Extra mount points below the source path owned by this rule
    #[serde(default, rename = "names", alias = "aliases")]
    pub alias_names: Vec<String>,

    #[serde(default)]
    pub destinations: Vec<Endpoint>,

    /// rsync `--exclude` patterns, in order
    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default)]
    pub email_recipients: Vec<String>,
}

impl MirrorRule {
    /// Name for display and logs
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }
}

/// Settings that apply when a rule does not override them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub email_recipients: Vec<String>,
}

/// The whole rule file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorsConfig {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub suites: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub mirrors: Vec<MirrorRule>,
}

impl MirrorsConfig {
    /// Load the rule file without normalizing it
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse configuration {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        Ok(config)
    }

    /// Expand `~` in every source, destination and suite path
    pub fn normalize(&mut self) {
        self.normalize_with_home(dirs::home_dir().as_deref());
    }

    /// Same as [`MirrorsConfig::normalize`] with an explicit home directory
    ///
    /// Source paths, alias names and suite paths are also lexically
    /// normalized so that they compare as plain strings during resolution.
    pub fn normalize_with_home(&mut self, home: Option<&Path>) {
        for paths in self.suites.values_mut() {
            for path in paths.iter_mut() {
                *path = normalize_path(&expand_home_in(path, home));
            }
        }

        for rule in &mut self.mirrors {
            let mut source = rule.source.normalize_with_home(home);
            source.path = source.path.as_deref().map(normalize_path);
            rule.source = source;

            for alias in rule.alias_names.iter_mut() {
                *alias = normalize_path(alias);
            }

            for destination in rule.destinations.iter_mut() {
                *destination = destination.normalize_with_home(home);
            }
        }
    }

    pub fn suite(&self, name: &str) -> Option<&[String]> {
        self.suites.get(name).map(Vec::as_slice)
    }
}
