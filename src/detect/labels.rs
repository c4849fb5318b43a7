//! Class label table.
//!
//! Labels files are plain text, one label per line, indexed by class id
//! (SSD convention: line 0 is usually the background class).

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::error::WatchError;

/// Label used when a class id falls outside the table.
pub const UNKNOWN_LABEL: &str = "unknown";

pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Load a labels file. Fails when the file cannot be read or contains
    /// no labels.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        let table = Self::from_lines(raw.lines())?;
        if table.is_empty() {
            return Err(anyhow!("labels file {} is empty", path.display()));
        }
        Ok(table)
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let labels = lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Ok(Self { labels })
    }

    /// Look up a class label. Fails with `UnknownClass` when the id is out
    /// of range.
    pub fn get(&self, class_id: usize) -> Result<&str, WatchError> {
        self.labels
            .get(class_id)
            .map(String::as_str)
            .ok_or(WatchError::UnknownClass {
                class_id,
                len: self.labels.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
