use crate::tables::Derivation;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;

/// Column names of the output schema, in order
pub const COLUMNS: [&str; 12] = [
    "word",
    "language",
    "pos",
    "ipa",
    "root_language",
    "nonstandard_root_code",
    "root_word",
    "root_romanization",
    "root_ipa",
    "derivation",
    "distance",
    "citation",
];

impl Serialize for Derivation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn join_pos<S: Serializer>(pos: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&pos_string(pos))
}

fn pos_string(pos: &BTreeSet<String>) -> String {
    pos.iter().map(String::as_str).collect::<Vec<_>>().join("/")
}

/// One emitted derivation hop for a headword
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EtymologyRow {
    pub word: String,
    #[serde(rename = "language")]
    pub language_code: String,
    #[serde(rename = "pos", serialize_with = "join_pos")]
    pub parts_of_speech: BTreeSet<String>,
    pub ipa: String,
    pub root_language: String,
    pub nonstandard_root_code: String,
    pub root_word: String,
    pub root_romanization: String,
    pub root_ipa: String,
    pub derivation: Option<Derivation>,
    pub distance: u32,
    #[serde(skip)]
    pub etymology_index: u32,
}

impl EtymologyRow {
    /// Render the row as output columns, citation tag last
    pub fn columns(&self, citation: &str) -> [String; 12] {
        [
            self.word.clone(),
            self.language_code.clone(),
            pos_string(&self.parts_of_speech),
            self.ipa.clone(),
            self.root_language.clone(),
            self.nonstandard_root_code.clone(),
            self.root_word.clone(),
            self.root_romanization.clone(),
            self.root_ipa.clone(),
            self.derivation.map(Derivation::as_str).unwrap_or_default().to_string(),
            self.distance.to_string(),
            citation.to_string(),
        ]
    }

    /// Source language code given but not resolvable to a standard one
    pub fn has_unresolved_root(&self) -> bool {
        self.root_language.is_empty() && !self.nonstandard_root_code.is_empty()
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;

    #[test]
    fn columns_in_schema_order() {
        let row = EtymologyRow {
            word: "chateau".to_string(),
            language_code: "eng".to_string(),
            parts_of_speech: ["Verb".to_string(), "Noun".to_string()].into_iter().collect(),
            root_language: "fra".to_string(),
            root_word: "château".to_string(),
            derivation: Some(Derivation::Borrowed),
            distance: 1,
            ..Default::default()
        };
        let cols = row.columns("wik");
        assert_eq!(cols.len(), COLUMNS.len());
        assert_eq!(cols[2], "Noun/Verb");
        assert_eq!(cols[9], "bor");
        assert_eq!(cols[10], "1");
        assert_eq!(cols[11], "wik");
    }

    #[test]
    fn serializes_pos_as_joined_string() {
        let row = EtymologyRow {
            parts_of_speech: ["Noun".to_string()].into_iter().collect(),
            derivation: Some(Derivation::Cognate),
            etymology_index: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["pos"], "Noun");
        assert_eq!(json["derivation"], "cog");
        assert!(json.get("etymology_index").is_none());
    }

    #[test]
    fn unresolved_root() {
        let row = EtymologyRow {
            nonstandard_root_code: "poz-pro".to_string(),
            ..Default::default()
        };
        assert!(row.has_unresolved_root());
    }
}
