//! Lookup tables shared by every page interpretation.
//!
//! Loaded once at startup into an immutable [`Tables`] value and passed by
//! reference (or behind an `Arc`) to each page's interpreter.

use crate::error::{EtymologyError, Result};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Canonical derivation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Derivation {
    Borrowed,
    Calque,
    Inherited,
    Derived,
    Cognate,
}

impl Derivation {
    pub fn as_str(self) -> &'static str {
        match self {
            Derivation::Borrowed => "bor",
            Derivation::Calque => "cal",
            Derivation::Inherited => "inh",
            Derivation::Derived => "der",
            Derivation::Cognate => "cog",
        }
    }

    /// Ancestor kinds count toward chain distance; cognates do not
    pub fn is_ancestor(self) -> bool {
        !matches!(self, Derivation::Cognate)
    }
}

/// Raw template names that map onto a derivation kind
static DERIVATION_TAGS: Lazy<HashMap<&'static str, Derivation>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("bor", Derivation::Borrowed);
    m.insert("borrowed", Derivation::Borrowed);
    m.insert("learned borrowing", Derivation::Borrowed);
    m.insert("calque", Derivation::Calque);
    m.insert("inherited", Derivation::Inherited);
    m.insert("inh", Derivation::Inherited);
    m.insert("derived", Derivation::Derived);
    m.insert("der", Derivation::Derived);
    m.insert("cognate", Derivation::Cognate);
    m.insert("cog", Derivation::Cognate);
    m
});

// Historical-variant markers that still denote a standard language
static NONSTANDARD_CODES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("LL.", "lat");
    m.insert("VL.", "lat");
    m.insert("ML.", "lat");
    m.insert("NL.", "lat");
    m.insert("la-lat", "lat");
    m
});

/// Resolve a raw template name to its derivation kind
pub fn derivation_for(tag: &str) -> Option<Derivation> {
    DERIVATION_TAGS.get(tag).copied()
}

/// Map a nonstandard source-language marker to a standard code
pub fn nonstandard_to_standard(code: &str) -> Option<&'static str> {
    NONSTANDARD_CODES.get(code).copied()
}

/// code -> language name and language name -> ISO 639-3 code
#[derive(Debug, Default, Clone)]
pub struct LanguageTable {
    code_to_name: HashMap<String, String>,
    name_to_code: HashMap<String, String>,
}

impl LanguageTable {
    /// Parse `iso2,iso3,name` rows (with a header row)
    pub fn from_reader(reader: impl Read, origin: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut table = LanguageTable::default();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            // header is line 1
            let line = i + 2;
            if record.len() != 3 {
                return Err(EtymologyError::table_format(
                    origin,
                    line,
                    format!("expected 3 fields (iso2,iso3,name), found {}", record.len()),
                ));
            }
            let iso2 = record[0].trim();
            let iso3 = record[1].trim();
            let name = record[2].trim();
            if iso3.is_empty() || name.is_empty() {
                return Err(EtymologyError::table_format(origin, line, "empty iso3 code or name"));
            }
            table.insert(iso2, iso3, name);
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| EtymologyError::TableRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Two-letter code is the lookup key when present; the resolved code is always ISO 639-3
    pub fn insert(&mut self, iso2: &str, iso3: &str, name: &str) {
        let key = if iso2.is_empty() { iso3 } else { iso2 };
        self.code_to_name.insert(key.to_string(), name.to_string());
        self.name_to_code.insert(name.to_string(), iso3.to_string());
    }

    /// Resolve a language code as used in templates (`en`, `grc`) to ISO 639-3
    pub fn resolve_code(&self, code: &str) -> Option<&str> {
        let name = self.code_to_name.get(code)?;
        self.name_to_code.get(name).map(String::as_str)
    }

    /// Resolve a language header (`French`) to ISO 639-3
    pub fn code_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_code.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.name_to_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_code.is_empty()
    }
}

/// All lookup tables used while interpreting pages
#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub languages: LanguageTable,
    pub parts_of_speech: HashSet<String>,
}

impl Tables {
    pub fn load(language_path: &Path, pos_path: &Path) -> Result<Self> {
        let languages = LanguageTable::load(language_path)?;
        let parts_of_speech = load_parts_of_speech(pos_path)?;
        log::info!(
            "Loaded {} languages from {} and {} part-of-speech labels from {}",
            languages.len(),
            language_path.display(),
            parts_of_speech.len(),
            pos_path.display()
        );
        Ok(Tables { languages, parts_of_speech })
    }

    pub fn is_part_of_speech(&self, header: &str) -> bool {
        self.parts_of_speech.contains(header)
    }
}

fn load_parts_of_speech(path: &Path) -> Result<HashSet<String>> {
    let read_err = |source| EtymologyError::TableRead {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_err)?;

    let mut labels = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(read_err)?;
        let label = line.trim();
        if !label.is_empty() {
            labels.insert(label.to_string());
        }
    }
    Ok(labels)
}

#[cfg(test)]
mod tables_tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LANGUAGES: &str = "iso2,iso3,name\nen,eng,English\nfr,fra,French\n,ang,Old English\n";

    #[test]
    fn two_letter_code_resolves_to_three_letter() {
        let table = LanguageTable::from_reader(LANGUAGES.as_bytes(), Path::new("mem")).unwrap();
        assert_eq!(table.resolve_code("en"), Some("eng"));
        assert_eq!(table.resolve_code("fr"), Some("fra"));
    }

    #[test]
    fn three_letter_only_language_resolves() {
        let table = LanguageTable::from_reader(LANGUAGES.as_bytes(), Path::new("mem")).unwrap();
        assert_eq!(table.resolve_code("ang"), Some("ang"));
        assert_eq!(table.code_for_name("Old English"), Some("ang"));
    }

    #[test]
    fn three_letter_code_of_two_letter_language_is_not_a_key() {
        let table = LanguageTable::from_reader(LANGUAGES.as_bytes(), Path::new("mem")).unwrap();
        assert_eq!(table.resolve_code("eng"), None);
    }

    #[test]
    fn wrong_field_count_is_fatal() {
        let err = LanguageTable::from_reader("iso2,iso3,name\nen,eng\n".as_bytes(), Path::new("langs.csv"))
            .unwrap_err();
        assert!(err.is_table_error());
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn missing_table_is_fatal() {
        let err = Tables::load(Path::new("/nonexistent/langs.csv"), Path::new("/nonexistent/pos.txt"))
            .unwrap_err();
        assert!(err.is_table_error());
    }

    #[test]
    fn loads_tables_from_files() {
        let mut langs = NamedTempFile::new().unwrap();
        write!(langs, "{}", LANGUAGES).unwrap();
        let mut pos = NamedTempFile::new().unwrap();
        write!(pos, "Noun\n\nVerb\n  Adjective  \n").unwrap();

        let tables = Tables::load(langs.path(), pos.path()).unwrap();
        assert_eq!(tables.languages.len(), 3);
        assert_eq!(tables.parts_of_speech.len(), 3);
        assert!(tables.is_part_of_speech("Adjective"));
        assert!(!tables.is_part_of_speech("Etymology"));
    }

    #[test]
    fn derivation_vocabulary() {
        assert_eq!(derivation_for("learned borrowing"), Some(Derivation::Borrowed));
        assert_eq!(derivation_for("calque"), Some(Derivation::Calque));
        assert_eq!(derivation_for("cog"), Some(Derivation::Cognate));
        assert_eq!(derivation_for("m"), None);
        assert_eq!(derivation_for("doublet"), None);
    }

    #[test]
    fn nonstandard_latin_variants() {
        for code in ["LL.", "VL.", "ML.", "NL.", "la-lat"] {
            assert_eq!(nonstandard_to_standard(code), Some("lat"));
        }
        assert_eq!(nonstandard_to_standard("poz-pro"), None);
    }
}
