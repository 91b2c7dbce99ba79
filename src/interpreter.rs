//! Per-page driver: runs the section state machine over a page's lines and
//! turns the resulting chain into merged, ordered rows.

use crate::chain::ChainBuilder;
use crate::etymology::interpret_etymology_line;
use crate::merge::merge_duplicates;
use crate::pronunciation::interpret_pronunciation_line;
use crate::record::EtymologyRow;
use crate::section::{has_numbered_etymologies, transition, Effect, SectionState};
use crate::tables::Tables;
use lazy_static::lazy_static;
use regex::Regex;

/// Titles with a namespace-like prefix this short are explanatory pages
const META_PREFIX_WINDOW: usize = 11;
const RECONSTRUCTION_PREFIX: &str = "Reconstruction:";

lazy_static! {
    static ref RECONSTRUCTION_TITLE: Regex = Regex::new(r"^Reconstruction:[^/]+/").unwrap();
}

/// Page title as an output word; reconstructions get a leading `*`
pub fn headword(title: &str) -> String {
    RECONSTRUCTION_TITLE.replace(title, "*").into_owned()
}

/// `Wiktionary:...`, `Appendix:...` and the like. Reconstructions are content.
pub fn is_meta_title(title: &str) -> bool {
    if title.starts_with(RECONSTRUCTION_PREFIX) {
        return false;
    }
    title.chars().take(META_PREFIX_WINDOW).any(|c| c == ':')
}

/// Interpret one language section of a page into output rows, ordered by
/// etymology section and then by chain distance
pub fn interpret_page<S: AsRef<str>>(title: &str, lines: &[S], tables: &Tables) -> Vec<EtymologyRow> {
    let mut builder = ChainBuilder::new(headword(title), !has_numbered_etymologies(lines));
    let mut state = SectionState::default();

    for line in lines {
        let (next, effects) = transition(state, line.as_ref(), tables);
        state = next;
        for effect in effects {
            apply(effect, &mut builder, tables);
        }
    }

    if builder.entry().language_code.is_empty() {
        log::debug!("No known language section on '{}'", title);
        return Vec::new();
    }

    let mut rows = merge_duplicates(builder.finish());
    rows.sort_by_key(|r| (r.etymology_index, r.distance));
    rows
}

fn apply(effect: Effect<'_>, builder: &mut ChainBuilder, tables: &Tables) {
    match effect {
        Effect::SetLanguage(code) => builder.set_language(code),
        Effect::AddPartOfSpeech(label) => builder.add_part_of_speech(label),
        Effect::EnterEtymology { new_section } => builder.enter_etymology(new_section),
        Effect::InterpretEtymology(line) => interpret_etymology_line(line, builder, tables),
        Effect::InterpretPronunciation(line) => interpret_pronunciation_line(line, builder),
    }
}
