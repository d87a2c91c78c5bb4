//! Intention catalog and tool descriptions.
//!
//! Both are static configuration data: built into the binary from `data/`, or
//! read from JSON files named in the config. Neither changes after startup.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, RouterError};

const BUILTIN_INTENTIONS: &str = include_str!("../data/intentions.json");
const BUILTIN_TOOLS: &str = include_str!("../data/tools.json");

/// Description reported for tools missing from the table
pub const UNKNOWN_TOOL_DESCRIPTION: &str = "Description not available";

/// One catalog intention before embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display text, also the text that gets embedded
    pub name: String,

    /// Tool names in display priority order
    #[serde(default)]
    pub tools: Vec<String>,
}

impl CatalogEntry {
    pub fn new(name: &str, tools: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Lowercased display text plus every tool name, for keyword matching
    pub fn search_text(&self) -> String {
        let mut text = self.name.to_lowercase();
        for tool in &self.tools {
            text.push(' ');
            text.push_str(&tool.to_lowercase());
        }
        text
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Validate and wrap catalog entries. Names must be unique and non-empty.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(RouterError::Catalog("catalog has no intentions".into()));
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(RouterError::Catalog("intention with empty name".into()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(RouterError::Catalog(format!(
                    "duplicate intention '{}'",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_INTENTIONS)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RouterError::Read {
            what: "intention catalog",
            path: path.to_path_buf(),
            source: e,
        })?;
        let catalog = Self::from_json(&content)?;
        debug!("Loaded {} intentions from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Display texts in catalog order
    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Static tool name → description lookup
#[derive(Debug, Clone, Default)]
pub struct ToolTable {
    descriptions: HashMap<String, String>,
}

impl ToolTable {
    pub fn new(descriptions: HashMap<String, String>) -> Self {
        Self { descriptions }
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TOOLS)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RouterError::Read {
            what: "tool descriptions",
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Description for `tool`, or a placeholder if it is unknown.
    pub fn describe(&self, tool: &str) -> &str {
        self.descriptions
            .get(tool)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TOOL_DESCRIPTION)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}
