//! `key = value` configuration files.
//!
//! ```text
//! # comment
//! source_dir = ./in
//! filter_script = price > 10 & \
//!                 name = 'A'
//! ```
//!
//! Blank lines and lines starting with `#` are ignored, a trailing `\`
//! joins the next line, keys and values are trimmed, and lines without
//! `=` are skipped.

use anyhow::{Context, Result};
use std::path::Path;

pub const SOURCE_DIR: &str = "source_dir";
pub const DEST_DIR: &str = "dest_dir";
pub const FILTER_SCRIPT: &str = "filter_script";
pub const CSV_DELIMITER: &str = "csv_delimiter";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    entries: Vec<(String, String)>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut pending = String::new();

        for line in text.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(head) = line.strip_suffix('\\') {
                pending.push_str(head);
                pending.push(' ');
                continue;
            }
            pending.push_str(line);

            if let Some((key, value)) = pending.split_once('=') {
                entries.push((key.trim().to_string(), value.trim().to_string()));
            }
            pending.clear();
        }

        // A continuation on the last line still completes its entry
        if let Some((key, value)) = pending.split_once('=') {
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }

        Self { entries }
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// First character of `csv_delimiter`, if set
    pub fn delimiter(&self) -> Option<char> {
        self.get(CSV_DELIMITER).and_then(|v| v.chars().next())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
