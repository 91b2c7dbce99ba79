//! Section tracking across the lines of one language section.
//!
//! Modelled as a transition function `(state, line) -> (state, effects)` so
//! the header/tag prefix checks live in one place.

use crate::tables::Tables;

const LANGUAGE_TAG_PREFIX: &str = "{{wikipedia||lang=";
const LANGUAGE_HEADER_DEPTH: usize = 2;
const ETYMOLOGY_HEADER_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionState {
    #[default]
    Other,
    Etymology,
    Pronunciation,
}

/// `===Text===` with depth = number of leading `=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub depth: usize,
    pub text: &'a str,
}

impl<'a> Header<'a> {
    pub fn parse(line: &'a str) -> Option<Self> {
        if !line.starts_with('=') {
            return None;
        }
        let depth = line.bytes().take_while(|&b| b == b'=').count();
        let mut text = &line[depth..];
        for _ in 0..depth {
            match text.strip_suffix('=') {
                Some(rest) => text = rest,
                None => break,
            }
        }
        Some(Header {
            depth,
            text: text.trim(),
        })
    }

    pub fn is_etymology(&self) -> bool {
        self.depth == ETYMOLOGY_HEADER_DEPTH && self.text.starts_with("Etymology")
    }

    /// `Etymology 2`, `Etymology 3`, ... (but not `Etymology` or `Etymology 1`)
    pub fn opens_new_etymology(&self) -> bool {
        if !self.is_etymology() {
            return false;
        }
        matches!(self.text["Etymology".len()..].trim().parse::<u32>(), Ok(n) if n != 1)
    }
}

/// Code carried by a `{{wikipedia||lang=xx}}` line, if the line is one
pub fn language_tag(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(LANGUAGE_TAG_PREFIX)?;
    let end = rest.find(|c: char| c == '}' || c == '|').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Side effects a line has on the entry being built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect<'a> {
    /// ISO code of the entry's own language; empty for an unknown tag code
    SetLanguage(String),
    AddPartOfSpeech(&'a str),
    /// Entered an etymology section; `new_section` for `Etymology N`, N > 1
    EnterEtymology { new_section: bool },
    InterpretEtymology(&'a str),
    InterpretPronunciation(&'a str),
}

/// Advance the state machine by one line
pub fn transition<'a>(state: SectionState, line: &'a str, tables: &Tables) -> (SectionState, Vec<Effect<'a>>) {
    if let Some(header) = Header::parse(line) {
        return header_transition(header, tables);
    }

    if let Some(code) = language_tag(line) {
        // an unknown code clears the entry's language
        let iso = tables.languages.resolve_code(code).unwrap_or_else(|| {
            log::debug!("Unresolved language tag code '{}'", code);
            ""
        });
        return (state, vec![Effect::SetLanguage(iso.to_string())]);
    }

    let effects = match state {
        SectionState::Etymology => vec![Effect::InterpretEtymology(line)],
        SectionState::Pronunciation => vec![Effect::InterpretPronunciation(line)],
        SectionState::Other => vec![],
    };
    (state, effects)
}

fn header_transition<'a>(header: Header<'a>, tables: &Tables) -> (SectionState, Vec<Effect<'a>>) {
    let mut effects = Vec::new();

    let language = match header.depth {
        LANGUAGE_HEADER_DEPTH => tables.languages.code_for_name(header.text),
        _ => None,
    };

    if let Some(iso) = language {
        effects.push(Effect::SetLanguage(iso.to_string()));
    } else if header.text == "Pronunciation" {
        return (SectionState::Pronunciation, effects);
    } else if header.is_etymology() {
        effects.push(Effect::EnterEtymology {
            new_section: header.opens_new_etymology(),
        });
        return (SectionState::Etymology, effects);
    }

    if tables.is_part_of_speech(header.text) {
        effects.push(Effect::AddPartOfSpeech(header.text));
    }
    (SectionState::Other, effects)
}

/// A page with `Etymology N` (N > 1) headers has per-section pronunciations
pub fn has_numbered_etymologies<S: AsRef<str>>(lines: &[S]) -> bool {
    lines
        .iter()
        .filter_map(|l| Header::parse(l.as_ref()))
        .any(|h| h.opens_new_etymology())
}

#[cfg(test)]
mod section_tests {
    use super::*;

    fn tables() -> Tables {
        let mut tables = Tables::default();
        tables.languages.insert("en", "eng", "English");
        tables.languages.insert("fr", "fra", "French");
        tables.parts_of_speech.insert("Noun".to_string());
        tables.parts_of_speech.insert("Verb".to_string());
        tables
    }

    #[test]
    fn header_depth_and_text() {
        let h = Header::parse("=== Etymology 2 ===").unwrap();
        assert_eq!(h.depth, 3);
        assert_eq!(h.text, "Etymology 2");
        assert!(Header::parse("From {{bor|en|fr|x}}").is_none());
    }

    #[test]
    fn degenerate_header() {
        let h = Header::parse("====").unwrap();
        assert_eq!(h.depth, 4);
        assert_eq!(h.text, "");
    }

    #[test]
    fn etymology_numbering() {
        assert!(!Header::parse("===Etymology===").unwrap().opens_new_etymology());
        assert!(!Header::parse("===Etymology 1===").unwrap().opens_new_etymology());
        assert!(Header::parse("===Etymology 2===").unwrap().opens_new_etymology());
        // only depth 3 counts
        assert!(!Header::parse("====Etymology 2====").unwrap().opens_new_etymology());
    }

    #[test]
    fn language_header_sets_language() {
        let (state, effects) = transition(SectionState::Etymology, "==French==", &tables());
        assert_eq!(state, SectionState::Other);
        assert_eq!(effects, vec![Effect::SetLanguage("fra".to_string())]);
    }

    #[test]
    fn unknown_language_header_has_no_effect() {
        let (state, effects) = transition(SectionState::Other, "==Klingon==", &tables());
        assert_eq!(state, SectionState::Other);
        assert!(effects.is_empty());
    }

    #[test]
    fn pronunciation_header_at_any_depth() {
        for line in ["==Pronunciation==", "===Pronunciation===", "====Pronunciation===="] {
            let (state, effects) = transition(SectionState::Other, line, &tables());
            assert_eq!(state, SectionState::Pronunciation);
            assert!(effects.is_empty());
        }
        // a known language at depth 2 still wins
        let (state, effects) = transition(SectionState::Pronunciation, "==English==", &tables());
        assert_eq!(state, SectionState::Other);
        assert_eq!(effects, vec![Effect::SetLanguage("eng".to_string())]);
    }

    #[test]
    fn etymology_headers() {
        let (state, effects) = transition(SectionState::Other, "===Etymology===", &tables());
        assert_eq!(state, SectionState::Etymology);
        assert_eq!(effects, vec![Effect::EnterEtymology { new_section: false }]);

        let (_, effects) = transition(SectionState::Other, "===Etymology 3===", &tables());
        assert_eq!(effects, vec![Effect::EnterEtymology { new_section: true }]);
    }

    #[test]
    fn part_of_speech_at_any_depth() {
        let (state, effects) = transition(SectionState::Pronunciation, "=====Noun=====", &tables());
        assert_eq!(state, SectionState::Other);
        assert_eq!(effects, vec![Effect::AddPartOfSpeech("Noun")]);
    }

    #[test]
    fn body_lines_route_by_state() {
        let t = tables();
        let line = "From {{bor|en|fr|x}}.";
        assert_eq!(
            transition(SectionState::Etymology, line, &t).1,
            vec![Effect::InterpretEtymology(line)]
        );
        assert_eq!(
            transition(SectionState::Pronunciation, line, &t).1,
            vec![Effect::InterpretPronunciation(line)]
        );
        assert!(transition(SectionState::Other, line, &t).1.is_empty());
    }

    #[test]
    fn language_tag_keeps_state() {
        let (state, effects) = transition(SectionState::Etymology, "{{wikipedia||lang=fr}}", &tables());
        assert_eq!(state, SectionState::Etymology);
        assert_eq!(effects, vec![Effect::SetLanguage("fra".to_string())]);
        assert_eq!(language_tag("{{wikipedia||lang=de|Haus}}"), Some("de"));
        assert_eq!(language_tag("{{wikipedia}}"), None);
    }

    #[test]
    fn unknown_language_tag_clears_language() {
        let (state, effects) = transition(SectionState::Other, "{{wikipedia||lang=xx}}", &tables());
        assert_eq!(state, SectionState::Other);
        assert_eq!(effects, vec![Effect::SetLanguage(String::new())]);
    }

    #[test]
    fn numbered_etymology_scan() {
        assert!(has_numbered_etymologies(&["==English==", "===Etymology 1===", "===Etymology 2==="]));
        assert!(!has_numbered_etymologies(&["==English==", "===Etymology===", "===Noun==="]));
    }
}
