//! Configuration parser
//!
//! Parses `carousel.toml` into cycling key defaults, console selection
//! defaults, and the ordered kind-override table.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Directory affinity for console selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Affinity {
    /// Reuse any suitable console regardless of directory.
    None,
    /// Prefer a console already in the exact target directory.
    Directory,
    /// Prefer a console anywhere inside the target's project.
    Project,
}

/// Busy tolerance for console selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    /// Only reuse consoles that are not busy.
    Strict,
    /// Reuse a console even if it is busy.
    Tolerant,
    /// Never reuse; always create a fresh console.
    Fresh,
}

/// Default forward/backward cycling keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeysConfig {
    /// Key that moves the ring cursor forward.
    #[serde(default = "default_forward_key")]
    pub forward: String,
    /// Key that moves the ring cursor backward.
    #[serde(default = "default_backward_key")]
    pub backward: String,
}

fn default_forward_key() -> String {
    "n".to_string()
}

fn default_backward_key() -> String {
    "p".to_string()
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            forward: default_forward_key(),
            backward: default_backward_key(),
        }
    }
}

/// Console selection defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Directory affinity mode.
    #[serde(default = "default_affinity")]
    pub affinity: Affinity,
    /// Base busy tolerance (escalation may raise it per invocation).
    #[serde(default = "default_tolerance")]
    pub tolerance: Tolerance,
    /// Canonical console name; fresh consoles take this name, renaming any
    /// unnumbered holder out of the way.
    #[serde(default = "default_console_name")]
    pub name: String,
}

const fn default_affinity() -> Affinity {
    Affinity::None
}

const fn default_tolerance() -> Tolerance {
    Tolerance::Strict
}

fn default_console_name() -> String {
    "console".to_string()
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            affinity: default_affinity(),
            tolerance: default_tolerance(),
            name: default_console_name(),
        }
    }
}

/// One entry of the kind-override table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindOverride {
    /// Regex matched against a clone family's root name.
    pub pattern: String,
    /// Kind assigned when the pattern matches.
    pub kind: String,
}

/// Top-level configuration parsed from `carousel.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Cycling key defaults.
    #[serde(default)]
    pub keys: KeysConfig,
    /// Console selection defaults.
    #[serde(default)]
    pub console: ConsoleConfig,
    /// Ordered name→kind overrides; the first matching pattern wins.
    #[serde(default, rename = "kind_override")]
    pub kind_overrides: Vec<KindOverride>,
}

impl Config {
    /// Parse a `carousel.toml` file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse `carousel.toml` content from a string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse carousel.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Compile the kind-override table for use by the sibling heuristic.
    pub fn override_table(&self) -> Result<OverrideTable> {
        let mut entries = Vec::with_capacity(self.kind_overrides.len());
        for entry in &self.kind_overrides {
            let regex = Regex::new(&entry.pattern)
                .with_context(|| format!("Invalid override pattern '{}'", entry.pattern))?;
            entries.push((regex, entry.kind.clone()));
        }
        Ok(OverrideTable { entries })
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        validate_key("forward", &self.keys.forward)?;
        validate_key("backward", &self.keys.backward)?;
        if self.keys.forward == self.keys.backward {
            bail!(
                "Forward and backward keys must differ (both are '{}')",
                self.keys.forward
            );
        }

        if self.console.name.trim().is_empty() {
            bail!("Console name cannot be empty");
        }
        if self.console.name.contains('<') {
            bail!(
                "Console name '{}' may not contain '<' (reserved for numeric suffixes)",
                self.console.name
            );
        }

        let mut seen = HashSet::new();
        for entry in &self.kind_overrides {
            if entry.kind.trim().is_empty() {
                bail!("Override for pattern '{}' has an empty kind", entry.pattern);
            }
            Regex::new(&entry.pattern)
                .with_context(|| format!("Invalid override pattern '{}'", entry.pattern))?;
            if !seen.insert(&entry.pattern) {
                bail!("Duplicate override pattern: '{}'", entry.pattern);
            }
        }

        Ok(())
    }
}

/// Validate a cycling key: a single non-empty token with no whitespace.
fn validate_key(which: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        bail!("Invalid {which} key: key cannot be empty");
    }
    if key.contains(char::is_whitespace) {
        bail!("Invalid {which} key '{key}': keys cannot contain whitespace");
    }
    Ok(())
}

/// Compiled kind-override table, consulted in declaration order.
#[derive(Debug)]
pub struct OverrideTable {
    entries: Vec<(Regex, String)>,
}

impl OverrideTable {
    /// The kind for `root` per the first matching pattern, if any.
    #[must_use]
    pub fn kind_for(&self, root: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(regex, _)| regex.is_match(root))
            .map(|(_, kind)| kind.as_str())
    }

    /// Number of entries in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
