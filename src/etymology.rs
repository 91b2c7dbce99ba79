//! Etymology line interpretation.
//!
//! Each template group on an etymology line becomes one derivation hop. Two
//! positional dialects exist: cognate/mention calls put the source language at
//! position 1, derivation calls (`bor`, `inh`, `der`, `calque`, ...) at position 2
//! after the entry's own language.

use crate::chain::ChainBuilder;
use crate::tables::{derivation_for, nonstandard_to_standard, Tables};
use crate::template::{parse_line, ArgValue, TemplateCall, TemplateGroup};
use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Template names that use the cognate dialect
const COGNATE_DIALECT: [&str; 3] = ["cognate", "cog", "m"];
/// Bare mention marker; accepted by the parser but never a derivation
const MENTION: &str = "m";

const MIDDLE_CHINESE: &str = "ltc";
const MIDDLE_CHINESE_LITERAL: &str = "ltc-l";

lazy_static! {
    static ref PAREN_ASIDE: Regex = Regex::new(r"\([^)]*\)").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref SUB_SUP_MARKUP: Regex =
        Regex::new(r"<sub>\w*</sub>|<sup>\w*</sup>\.?|&lt;sub&gt;\w*&lt;/sub&gt;|&lt;sup&gt;\w*&lt;/sup&gt;\.?").unwrap();
}

/// Raw values pulled out of one template call, before language resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFields {
    pub tag: String,
    pub source_code: String,
    pub source_word: String,
    pub romanization: String,
    pub transcription: String,
}

/// Read the fields of a single call in whichever dialect its tag selects
pub fn extract_call(call: &TemplateCall) -> CallFields {
    let mut fields = CallFields::default();
    let mut position = 0usize;

    for arg in &call.args {
        match arg.key.as_str() {
            "tr" => {
                fields.romanization = clean_romanization(&flatten_value(&arg.value)).unwrap_or_default();
            }
            "ts" => {
                if let Some(ts) = clean_romanization(&flatten_value(&arg.value)).filter(|t| !t.is_empty()) {
                    fields.transcription = format!("/{}/", ts);
                }
            }
            // `sort=` and every other named argument are ignored
            "" => {
                let cognate_dialect = COGNATE_DIALECT.contains(&fields.tag.as_str());
                match position {
                    0 => {
                        fields.tag = flatten_value(&arg.value);
                        if derivation_for(&fields.tag).is_none() && fields.tag != MENTION {
                            break;
                        }
                    }
                    1 if cognate_dialect => fields.source_code = flatten_value(&arg.value),
                    2 if cognate_dialect => fields.source_word = flatten_value(&arg.value),
                    2 => fields.source_code = flatten_value(&arg.value),
                    3 if !cognate_dialect => fields.source_word = flatten_value(&arg.value),
                    _ => {}
                }
                position += 1;
            }
            _ => {}
        }
    }
    fields
}

/// Combine the members of a `+` group: tag and language from the first member,
/// word-like fields joined with `+` in member order
pub fn extract_group(group: &TemplateGroup) -> CallFields {
    let members: Vec<CallFields> = group.calls().iter().map(extract_call).collect();
    if members.len() == 1 {
        return members.into_iter().next().unwrap_or_default();
    }

    CallFields {
        tag: members.first().map(|m| m.tag.clone()).unwrap_or_default(),
        source_code: members.first().map(|m| m.source_code.clone()).unwrap_or_default(),
        source_word: join_nonempty(members.iter().map(|m| m.source_word.as_str())),
        romanization: join_nonempty(members.iter().map(|m| m.romanization.as_str())),
        transcription: join_nonempty(members.iter().map(|m| m.transcription.as_str())),
    }
}

fn join_nonempty<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.filter(|v| !v.is_empty()).collect::<Vec<_>>().join("+")
}

/// A nested value stands for its sub-calls' last positional arguments
fn flatten_value(value: &ArgValue) -> String {
    match value {
        ArgValue::Text(s) => s.clone(),
        ArgValue::Nested(calls) => calls
            .iter()
            .filter_map(|call| call.positionals().last())
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join("+"),
    }
}

/// Strip asides and link brackets from a source word; `a, b` yields two words
pub fn clean_source_word(raw: &str) -> Vec<String> {
    let stripped = PAREN_ASIDE.replace_all(raw, "");
    let stripped = stripped.replace(['[', ']'], "");

    let words: Vec<&str> = match stripped.split_once(", ") {
        Some((first, second)) => vec![first, second],
        None => vec![stripped.as_str()],
    };
    words
        .into_iter()
        .map(|w| WHITESPACE_RUN.replace_all(w.trim(), "+").into_owned())
        .filter(|w| !w.is_empty() && w != "-")
        .collect()
}

/// Latin-script romanization with link brackets and sub/superscripts removed.
/// `None` when any letter is outside the Latin script.
pub fn clean_romanization(raw: &str) -> Option<String> {
    if !is_latin_script(raw) {
        return None;
    }
    let cleaned = raw.replace(['[', ']'], "");
    Some(SUB_SUP_MARKUP.replace_all(&cleaned, "").into_owned())
}

/// Non-ASCII letters whose Unicode name is `LATIN ...`, as inclusive ranges.
/// Modifier letters (`ˈ`, `ʰ`, `ᵃ`) and small capitals of other scripts are
/// not in here.
const LATIN_LETTERS: [(u32, u32); 30] = [
    (0x00C0, 0x00D6),
    (0x00D8, 0x00F6),
    (0x00F8, 0x02AF),
    (0x1D00, 0x1D25),
    (0x1D62, 0x1D65),
    (0x1D6B, 0x1D77),
    (0x1D79, 0x1D9A),
    (0x1E00, 0x1EFF),
    (0x2071, 0x2071),
    (0x207F, 0x207F),
    (0x2090, 0x209C),
    (0x2184, 0x2184),
    (0x2C60, 0x2C7C),
    (0x2C7E, 0x2C7F),
    (0xA722, 0xA76F),
    (0xA771, 0xA787),
    (0xA78B, 0xA7CA),
    (0xA7D0, 0xA7D1),
    (0xA7D3, 0xA7D3),
    (0xA7D5, 0xA7D9),
    (0xA7F5, 0xA7F7),
    (0xA7FA, 0xA7FF),
    (0xAB30, 0xAB5A),
    (0xAB60, 0xAB64),
    (0xAB66, 0xAB68),
    (0xFB00, 0xFB06),
    (0xFF21, 0xFF3A),
    (0xFF41, 0xFF5A),
    (0x1DF00, 0x1DF1E),
    (0x1DF25, 0x1DF2A),
];

/// Combining diacritics count as marks, not letters
const COMBINING_MARKS: [(u32, u32); 4] = [(0x0300, 0x036F), (0x1AB0, 0x1AFF), (0x1DC0, 0x1DFF), (0xFE20, 0xFE2F)];

fn in_ranges(ranges: &[(u32, u32)], cp: u32) -> bool {
    ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(&cp))
}

/// Every letter (after NFC composition) is a Latin letter
pub fn is_latin_script(text: &str) -> bool {
    text.nfc()
        .filter(|&c| c.is_alphabetic() && !in_ranges(&COMBINING_MARKS, c as u32))
        .all(is_latin_letter)
}

fn is_latin_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || in_ranges(&LATIN_LETTERS, ch as u32)
}

/// Record one group's fields on the live hop. Returns false when the tag is
/// not a derivation and the hop was discarded.
pub fn interpret_group(group: &TemplateGroup, builder: &mut ChainBuilder, tables: &Tables) -> bool {
    let fields = extract_group(group);
    let derivation = derivation_for(&fields.tag);

    let hop = builder.hop_mut();
    hop.derivation = derivation;
    match tables.languages.resolve_code(&fields.source_code) {
        Some(iso) => hop.root_language = iso.to_string(),
        None => {
            hop.nonstandard_root_code = fields.source_code.clone();
            if let Some(standard) = nonstandard_to_standard(&fields.source_code) {
                hop.root_language = standard.to_string();
            }
            if !fields.source_code.is_empty() && derivation.is_some() {
                log::debug!(
                    "Source language '{}' not in table (mapped to '{}')",
                    fields.source_code,
                    hop.root_language
                );
            }
        }
    }

    hop.root_words.extend(clean_source_word(&fields.source_word));
    if !fields.romanization.is_empty() {
        hop.root_romanization = WHITESPACE_RUN.replace_all(&fields.romanization, "+").into_owned();
    }
    hop.root_ipa = fields.transcription;

    if derivation.is_none() {
        log::debug!("Discarding hop for non-derivation tag '{}'", fields.tag);
        builder.abort_hop();
        return false;
    }
    true
}

/// Interpret every template group on an etymology line, one hop per group
pub fn interpret_etymology_line(line: &str, builder: &mut ChainBuilder, tables: &Tables) {
    let groups = parse_line(line);

    for (i, group) in groups.iter().enumerate() {
        builder.begin_hop();
        interpret_group(group, builder, tables);

        let hop = builder.hop();
        if hop.root_language == MIDDLE_CHINESE && hop.root_words.is_empty() {
            if let Some(word) = groups.get(i + 1).and_then(middle_chinese_literal) {
                builder.hop_mut().root_words.push(word);
            }
        }
    }
}

/// `{{ltc-l|...}}` carries the form of a preceding bare Middle Chinese etymon
fn middle_chinese_literal(group: &TemplateGroup) -> Option<String> {
    let TemplateGroup::Single(call) = group else {
        return None;
    };
    if call.name() != Some(MIDDLE_CHINESE_LITERAL) {
        return None;
    }
    let word = flatten_value(call.positional(1)?).replace(['[', ']', '(', ')'], "");
    (!word.is_empty()).then_some(word)
}
