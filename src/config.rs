//! Run configuration.
//!
//! An optional YAML file names the lookup tables and the page filter; CLI
//! flags override individual fields. Table paths given in a config file are
//! resolved against the file's own directory when relative.

use crate::dump::PageFilter;
use crate::error::{EtymologyError, Result};
use crate::tables::Tables;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "etymology.yaml";
pub const DEFAULT_CITATION: &str = "wik";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// CSV of `iso2,iso3,name`
    pub language_table: PathBuf,
    /// One part-of-speech header label per line
    pub parts_of_speech: PathBuf,
    /// Tag written in the last output column
    pub citation: String,
    pub namespaces: Vec<u32>,
    pub skip_redirects: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language_table: PathBuf::from("data/languages.csv"),
            parts_of_speech: PathBuf::from("data/parts_of_speech.txt"),
            citation: DEFAULT_CITATION.to_string(),
            namespaces: vec![0, 118],
            skip_redirects: true,
        }
    }
}

/// On-disk shape; absent fields fall back to [`Config::default`]
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    language_table: Option<PathBuf>,
    parts_of_speech: Option<PathBuf>,
    citation: Option<String>,
    namespaces: Option<Vec<u32>>,
    skip_redirects: Option<bool>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| EtymologyError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|source| EtymologyError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let defaults = Config::default();
        Ok(Config {
            language_table: file
                .language_table
                .map_or(defaults.language_table, |p| resolve_relative(dir, &p)),
            parts_of_speech: file
                .parts_of_speech
                .map_or(defaults.parts_of_speech, |p| resolve_relative(dir, &p)),
            citation: file.citation.unwrap_or(defaults.citation),
            namespaces: file.namespaces.unwrap_or(defaults.namespaces),
            skip_redirects: file.skip_redirects.unwrap_or(defaults.skip_redirects),
        })
    }

    /// An explicit path must load; otherwise the first config file found, or defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match find_config_file() {
            Some(path) => {
                log::info!("Using config {}", path.display());
                Self::load(&path)
            }
            None => {
                log::info!("No {} found, using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    pub fn page_filter(&self) -> PageFilter {
        PageFilter {
            namespaces: self.namespaces.iter().copied().collect(),
            skip_redirects: self.skip_redirects,
        }
    }

    pub fn load_tables(&self) -> Result<Tables> {
        Tables::load(&self.language_table, &self.parts_of_speech)
    }
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() && !base.as_os_str().is_empty() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from(format!("config/{}", CONFIG_FILE)),
        PathBuf::from(format!("../../config/{}", CONFIG_FILE)), // when running from target/<profile>
    ];
    candidates.into_iter().find(|p| p.exists())
}
