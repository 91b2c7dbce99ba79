//! Derivation chain building.
//!
//! One [`ChainBuilder`] owns the live entry of a page plus a flat arena of
//! frozen snapshots, one per completed hop or etymology section. Snapshots
//! never own snapshots themselves.

use crate::record::EtymologyRow;
use crate::tables::Derivation;
use std::collections::{BTreeMap, BTreeSet};

/// Root fields of one derivation hop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hop {
    pub root_language: String,
    pub nonstandard_root_code: String,
    pub root_words: Vec<String>,
    pub root_romanization: String,
    pub root_ipa: String,
    pub derivation: Option<Derivation>,
}

impl Hop {
    /// A source word, romanization or transcription was recorded
    pub fn has_payload(&self) -> bool {
        !self.root_words.is_empty() || !self.root_romanization.is_empty() || !self.root_ipa.is_empty()
    }

    pub fn has_language(&self) -> bool {
        !self.root_language.is_empty() || !self.nonstandard_root_code.is_empty()
    }

    fn is_retained(&self) -> bool {
        self.has_payload() || self.has_language() || self.derivation.map_or(false, Derivation::is_ancestor)
    }

    pub fn is_cognate(&self) -> bool {
        self.derivation == Some(Derivation::Cognate)
    }
}

/// The live, evolving record for a page
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub word: String,
    pub language_code: String,
    pub parts_of_speech: BTreeSet<String>,
    pub hop: Hop,
    pub etymology_index: u32,
    pub universal_pronunciation: bool,
}

/// Frozen copy of the live entry taken before a reset. Part-of-speech labels
/// belong to the whole etymology section and are looked up at flatten time.
#[derive(Debug, Clone)]
struct Snapshot {
    language_code: String,
    hop: Hop,
    etymology_index: u32,
}

impl Snapshot {
    fn of(entry: &Entry) -> Self {
        Snapshot {
            language_code: entry.language_code.clone(),
            hop: entry.hop.clone(),
            etymology_index: entry.etymology_index,
        }
    }
}

#[derive(Debug, Default)]
pub struct ChainBuilder {
    entry: Entry,
    snapshots: Vec<Snapshot>,
    // pronunciations keyed by etymology index, plus a page-wide value
    section_ipa: BTreeMap<u32, String>,
    section_pos: BTreeMap<u32, BTreeSet<String>>,
    page_ipa: String,
    seen_etymology: bool,
}

impl ChainBuilder {
    pub fn new(word: impl Into<String>, universal_pronunciation: bool) -> Self {
        ChainBuilder {
            entry: Entry {
                word: word.into(),
                universal_pronunciation,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn hop(&self) -> &Hop {
        &self.entry.hop
    }

    pub fn hop_mut(&mut self) -> &mut Hop {
        &mut self.entry.hop
    }

    pub fn set_language(&mut self, code: impl Into<String>) {
        self.entry.language_code = code.into();
    }

    pub fn add_part_of_speech(&mut self, label: &str) {
        self.entry.parts_of_speech.insert(label.to_string());
        self.section_pos
            .entry(self.entry.etymology_index)
            .or_default()
            .insert(label.to_string());
    }

    /// Start the next hop within an etymology paragraph
    pub fn begin_hop(&mut self) {
        self.push_snapshot();
        self.entry.hop = Hop::default();
    }

    /// Drop whatever the current hop recorded
    pub fn abort_hop(&mut self) {
        self.entry.hop = Hop::default();
    }

    /// An etymology header was read; `Etymology N` (N > 1) opens a new section
    pub fn enter_etymology(&mut self, new_section: bool) {
        self.seen_etymology = true;
        if new_section {
            self.push_snapshot();
            self.entry.hop = Hop::default();
            self.entry.parts_of_speech.clear();
            self.entry.etymology_index += 1;
        }
    }

    /// Fold a pronunciation into the value that applies to the current position
    pub fn apply_pronunciation(&mut self, phonemic: Option<&str>, phonetic: Option<&str>) {
        let target = if self.entry.universal_pronunciation || !self.seen_etymology {
            &mut self.page_ipa
        } else {
            self.section_ipa.entry(self.entry.etymology_index).or_default()
        };
        merge_ipa(target, phonemic, phonetic);
    }

    /// Pronunciation that applies to an etymology section
    pub fn ipa_for(&self, etymology_index: u32) -> &str {
        match self.section_ipa.get(&etymology_index) {
            Some(ipa) if !ipa.is_empty() => ipa,
            _ => &self.page_ipa,
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    fn push_snapshot(&mut self) {
        if self.entry.hop.is_retained() {
            self.snapshots.push(Snapshot::of(&self.entry));
        }
    }

    /// Flatten snapshots and the final live state into output rows with chain distances
    pub fn finish(self) -> Vec<EtymologyRow> {
        let live = Snapshot::of(&self.entry);
        let mut rows = Vec::new();
        let mut distance = 0u32;
        let mut current_index = None;

        for item in self.snapshots.iter().chain(std::iter::once(&live)) {
            if current_index != Some(item.etymology_index) {
                distance = 0;
                current_index = Some(item.etymology_index);
            }
            if !item.hop.has_language() {
                continue;
            }

            if item.hop.is_cognate() {
                if item.hop.has_payload() {
                    self.emit(item, 0, &mut rows);
                }
            } else {
                distance += 1;
                self.emit(item, distance, &mut rows);
            }
        }
        rows
    }

    fn emit(&self, item: &Snapshot, distance: u32, rows: &mut Vec<EtymologyRow>) {
        let row = EtymologyRow {
            word: self.entry.word.clone(),
            language_code: item.language_code.clone(),
            parts_of_speech: self.section_pos.get(&item.etymology_index).cloned().unwrap_or_default(),
            ipa: self.ipa_for(item.etymology_index).to_string(),
            root_language: item.hop.root_language.clone(),
            nonstandard_root_code: item.hop.nonstandard_root_code.clone(),
            root_word: String::new(),
            root_romanization: item.hop.root_romanization.clone(),
            root_ipa: item.hop.root_ipa.clone(),
            derivation: item.hop.derivation,
            distance,
            etymology_index: item.etymology_index,
        };

        if item.hop.root_words.is_empty() {
            rows.push(row);
            return;
        }
        for word in &item.hop.root_words {
            rows.push(EtymologyRow {
                root_word: word.clone(),
                ..row.clone()
            });
        }
    }
}

/// Phonemic (`/.../`) beats phonetic (`[...]`); the first phonemic form is kept
pub fn merge_ipa(current: &mut String, phonemic: Option<&str>, phonetic: Option<&str>) {
    let current_is_phonetic = current.starts_with('[');
    if let Some(p) = phonemic.filter(|p| !p.is_empty()) {
        if current.is_empty() || current_is_phonetic {
            *current = p.to_string();
        }
    } else if let Some(p) = phonetic.filter(|p| !p.is_empty()) {
        if current.is_empty() || current_is_phonetic {
            *current = p.to_string();
        }
    }
}

#[cfg(test)]
mod chain_tests {
    use super::*;

    fn record(builder: &mut ChainBuilder, derivation: Derivation, lang: &str, word: &str) {
        builder.begin_hop();
        let hop = builder.hop_mut();
        hop.derivation = Some(derivation);
        hop.root_language = lang.to_string();
        if !word.is_empty() {
            hop.root_words.push(word.to_string());
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Distances
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn single_hop_has_distance_one() {
        let mut b = ChainBuilder::new("chateau", true);
        b.enter_etymology(false);
        record(&mut b, Derivation::Borrowed, "fra", "château");
        let rows = b.finish();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].distance, 1);
        assert_eq!(rows[0].root_word, "château");
    }

    #[test]
    fn empty_page_has_no_rows() {
        let b = ChainBuilder::new("nothing", true);
        assert!(b.finish().is_empty());
    }

    #[test]
    fn ancestors_increment_and_cognates_stay_zero() {
        let mut b = ChainBuilder::new("house", true);
        b.enter_etymology(false);
        record(&mut b, Derivation::Inherited, "enm", "hous");
        record(&mut b, Derivation::Cognate, "deu", "Haus");
        record(&mut b, Derivation::Inherited, "ang", "hūs");
        let rows = b.finish();
        let distances: Vec<u32> = rows.iter().map(|r| r.distance).collect();
        assert_eq!(distances, vec![1, 0, 2]);
    }

    #[test]
    fn distance_resets_per_etymology_section() {
        let mut b = ChainBuilder::new("bank", false);
        b.enter_etymology(false);
        record(&mut b, Derivation::Inherited, "enm", "banke");
        record(&mut b, Derivation::Borrowed, "fra", "banque");
        b.enter_etymology(true);
        record(&mut b, Derivation::Inherited, "enm", "bank");
        let rows = b.finish();
        let got: Vec<(u32, u32)> = rows.iter().map(|r| (r.etymology_index, r.distance)).collect();
        assert_eq!(got, vec![(0, 1), (0, 2), (1, 1)]);
    }

    #[test]
    fn live_state_resets_when_its_section_is_new() {
        let mut b = ChainBuilder::new("word", false);
        b.enter_etymology(false);
        record(&mut b, Derivation::Inherited, "enm", "a");
        b.begin_hop();
        b.enter_etymology(true);
        b.hop_mut().derivation = Some(Derivation::Borrowed);
        b.hop_mut().root_language = "fra".to_string();
        let rows = b.finish();
        assert_eq!(rows.last().map(|r| (r.etymology_index, r.distance)), Some((1, 1)));
    }

    // ─────────────────────────────────────────────────────────────
    // Emission rules
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn cognate_without_payload_is_dropped() {
        let mut b = ChainBuilder::new("x", true);
        record(&mut b, Derivation::Cognate, "deu", "");
        assert!(b.finish().is_empty());
    }

    #[test]
    fn cognate_with_romanization_is_kept() {
        let mut b = ChainBuilder::new("x", true);
        record(&mut b, Derivation::Cognate, "ban", "");
        b.hop_mut().root_romanization = "alas".to_string();
        let rows = b.finish();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].distance, 0);
    }

    #[test]
    fn hop_without_language_is_dropped() {
        let mut b = ChainBuilder::new("x", true);
        record(&mut b, Derivation::Borrowed, "", "word");
        assert!(b.finish().is_empty());
    }

    #[test]
    fn nonstandard_code_alone_is_emitted() {
        let mut b = ChainBuilder::new("x", true);
        record(&mut b, Derivation::Derived, "", "*halas");
        b.hop_mut().nonstandard_root_code = "poz-pro".to_string();
        let rows = b.finish();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].has_unresolved_root());
    }

    #[test]
    fn one_row_per_root_word() {
        let mut b = ChainBuilder::new("x", true);
        record(&mut b, Derivation::Borrowed, "fra", "a");
        b.hop_mut().root_words.push("b".to_string());
        let rows = b.finish();
        let words: Vec<&str> = rows.iter().map(|r| r.root_word.as_str()).collect();
        assert_eq!(words, vec!["a", "b"]);
        assert!(rows.iter().all(|r| r.distance == 1));
    }

    #[test]
    fn empty_hops_are_not_snapshotted() {
        let mut b = ChainBuilder::new("x", true);
        b.begin_hop();
        b.begin_hop();
        record(&mut b, Derivation::Borrowed, "fra", "a");
        b.begin_hop();
        assert_eq!(b.snapshot_count(), 1);
    }

    #[test]
    fn new_section_clears_parts_of_speech() {
        let mut b = ChainBuilder::new("x", false);
        b.add_part_of_speech("Noun");
        b.enter_etymology(true);
        assert!(b.entry().parts_of_speech.is_empty());
        assert_eq!(b.entry().etymology_index, 1);
    }

    #[test]
    fn hop_reset_keeps_parts_of_speech() {
        let mut b = ChainBuilder::new("x", true);
        b.add_part_of_speech("Noun");
        record(&mut b, Derivation::Borrowed, "fra", "a");
        b.begin_hop();
        assert!(b.entry().parts_of_speech.contains("Noun"));
        assert_eq!(b.hop(), &Hop::default());
    }

    #[test]
    fn late_pos_header_reaches_every_hop_of_its_section() {
        let mut b = ChainBuilder::new("house", false);
        b.enter_etymology(false);
        record(&mut b, Derivation::Inherited, "enm", "hous");
        record(&mut b, Derivation::Inherited, "ang", "hūs");
        b.add_part_of_speech("Noun");
        b.enter_etymology(true);
        record(&mut b, Derivation::Borrowed, "fra", "housse");
        b.add_part_of_speech("Verb");

        let pos: Vec<(String, Vec<String>)> = b
            .finish()
            .into_iter()
            .map(|r| (r.root_language, r.parts_of_speech.into_iter().collect()))
            .collect();
        assert_eq!(
            pos,
            vec![
                ("enm".to_string(), vec!["Noun".to_string()]),
                ("ang".to_string(), vec!["Noun".to_string()]),
                ("fra".to_string(), vec!["Verb".to_string()]),
            ]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Pronunciation placement
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn merge_ipa_precedence() {
        let mut ipa = String::new();
        merge_ipa(&mut ipa, None, Some("[ʃa.to]"));
        assert_eq!(ipa, "[ʃa.to]");
        merge_ipa(&mut ipa, None, Some("[ʃæ.toʊ]"));
        assert_eq!(ipa, "[ʃæ.toʊ]");
        merge_ipa(&mut ipa, Some("/ʃæˈtoʊ/"), None);
        assert_eq!(ipa, "/ʃæˈtoʊ/");
        merge_ipa(&mut ipa, None, Some("[x]"));
        assert_eq!(ipa, "/ʃæˈtoʊ/");
        merge_ipa(&mut ipa, Some("/other/"), None);
        assert_eq!(ipa, "/ʃæˈtoʊ/");
    }

    #[test]
    fn universal_pronunciation_applies_to_every_hop() {
        let mut b = ChainBuilder::new("x", true);
        b.enter_etymology(false);
        record(&mut b, Derivation::Borrowed, "fra", "a");
        record(&mut b, Derivation::Derived, "lat", "b");
        b.apply_pronunciation(Some("/x/"), None);
        let rows = b.finish();
        assert!(rows.iter().all(|r| r.ipa == "/x/"));
    }

    #[test]
    fn section_pronunciations_stay_in_their_section() {
        let mut b = ChainBuilder::new("x", false);
        b.enter_etymology(false);
        record(&mut b, Derivation::Borrowed, "fra", "a");
        b.apply_pronunciation(Some("/one/"), None);
        b.enter_etymology(true);
        record(&mut b, Derivation::Borrowed, "deu", "b");
        b.apply_pronunciation(Some("/two/"), None);
        let rows = b.finish();
        let ipas: Vec<&str> = rows.iter().map(|r| r.ipa.as_str()).collect();
        assert_eq!(ipas, vec!["/one/", "/two/"]);
    }

    #[test]
    fn pronunciation_before_any_etymology_is_a_fallback() {
        let mut b = ChainBuilder::new("x", false);
        b.apply_pronunciation(Some("/shared/"), None);
        b.enter_etymology(false);
        record(&mut b, Derivation::Borrowed, "fra", "a");
        b.enter_etymology(true);
        record(&mut b, Derivation::Borrowed, "deu", "b");
        b.apply_pronunciation(Some("/own/"), None);
        let rows = b.finish();
        let ipas: Vec<&str> = rows.iter().map(|r| r.ipa.as_str()).collect();
        assert_eq!(ipas, vec!["/shared/", "/own/"]);
    }
}
