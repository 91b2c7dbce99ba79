//! Duplicate row merging.
//!
//! Rows for the same source language whose root words agree (or where either
//! is empty) describe the same hop. They are collapsed pairwise, field by
//! field, until a pass no longer shrinks the list.

use crate::record::EtymologyRow;
use crate::tables::Derivation;

pub fn are_duplicates(a: &EtymologyRow, b: &EtymologyRow) -> bool {
    a.root_language == b.root_language
        && (a.root_word == b.root_word || a.root_word.is_empty() || b.root_word.is_empty())
}

/// Merge two duplicate rows; `a` wins every tie
pub fn combine(a: &EtymologyRow, b: &EtymologyRow) -> EtymologyRow {
    EtymologyRow {
        word: a.word.clone(),
        language_code: a.language_code.clone(),
        parts_of_speech: a.parts_of_speech.union(&b.parts_of_speech).cloned().collect(),
        ipa: combine_ipa(&a.ipa, &b.ipa).to_string(),
        root_language: longer(&a.root_language, &b.root_language).to_string(),
        nonstandard_root_code: longer(&a.nonstandard_root_code, &b.nonstandard_root_code).to_string(),
        root_word: longer(&a.root_word, &b.root_word).to_string(),
        root_romanization: longer(&a.root_romanization, &b.root_romanization).to_string(),
        root_ipa: longer(&a.root_ipa, &b.root_ipa).to_string(),
        derivation: combine_derivation(a.derivation, b.derivation),
        distance: combine_distance(a.distance, b.distance),
        etymology_index: combine_distance(a.etymology_index, b.etymology_index),
    }
}

fn longer<'a>(a: &'a str, b: &'a str) -> &'a str {
    if a.len() >= b.len() {
        a
    } else {
        b
    }
}

/// Slash-delimited beats bracketed; otherwise the longer value
fn combine_ipa<'a>(a: &'a str, b: &'a str) -> &'a str {
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    match (a.starts_with('/'), b.starts_with('/')) {
        (true, false) => a,
        (false, true) => b,
        _ => longer(a, b),
    }
}

/// A plain "derived" yields to any more specific kind except cognate
fn combine_derivation(a: Option<Derivation>, b: Option<Derivation>) -> Option<Derivation> {
    if a == Some(Derivation::Derived) && b != Some(Derivation::Cognate) {
        b
    } else {
        a
    }
}

/// Zero means unset; otherwise the smaller value
fn combine_distance(a: u32, b: u32) -> u32 {
    match (a, b) {
        (0, b) => b,
        (a, 0) => a,
        (a, b) => a.min(b),
    }
}

/// Collapse duplicates to a fixpoint. Each pass merges the first available
/// partner for every row in index order, then carries the unmerged rows.
pub fn merge_duplicates(mut rows: Vec<EtymologyRow>) -> Vec<EtymologyRow> {
    let mut passes = 0usize;
    loop {
        passes += 1;
        let mut merged = vec![false; rows.len()];
        let mut next = Vec::with_capacity(rows.len());

        for i in 0..rows.len() {
            for j in (i + 1)..rows.len() {
                if merged[i] || merged[j] {
                    continue;
                }
                if are_duplicates(&rows[i], &rows[j]) {
                    log::trace!("Merging rows {} and {} for '{}'", i, j, rows[i].word);
                    next.push(combine(&rows[i], &rows[j]));
                    merged[i] = true;
                    merged[j] = true;
                }
            }
        }

        let before = rows.len();
        next.extend(
            rows.into_iter()
                .zip(merged)
                .filter(|(_, was_merged)| !was_merged)
                .map(|(row, _)| row),
        );

        if next.len() == before {
            log::trace!("Merge reached fixpoint after {} passes", passes);
            return next;
        }
        rows = next;
    }
}
