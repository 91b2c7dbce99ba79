//! Pronunciation line interpretation.

use crate::chain::ChainBuilder;
use crate::template::{parse_line, TemplateCall, TemplateGroup};

/// Template names that carry IPA transcriptions
const IPA_LABELS: [&str; 2] = ["IPA", "IPAchar"];
const ACCENT_LABEL: &str = "a";
/// Label and language code come first; forms start here
const FIRST_FORM_POSITION: usize = 2;

/// What one pronunciation call contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PronunciationCall<'a> {
    /// `{{a|RP}}`: the accent the following transcriptions are given in
    Accent(&'a str),
    Transcription {
        phonemic: Option<&'a str>,
        phonetic: Option<&'a str>,
    },
    Ignored,
}

pub fn classify(call: &TemplateCall) -> PronunciationCall<'_> {
    if call.args.len() == 2 && call.name() == Some(ACCENT_LABEL) {
        return match call.positional_text(1) {
            Some(accent) => PronunciationCall::Accent(accent),
            None => PronunciationCall::Ignored,
        };
    }

    match call.name() {
        Some(label) if IPA_LABELS.contains(&label) => {}
        _ => return PronunciationCall::Ignored,
    }

    let mut phonemic = None;
    let mut phonetic = None;
    for value in call.positionals().skip(FIRST_FORM_POSITION).filter_map(|v| v.as_text()) {
        if value.starts_with('/') {
            phonemic.get_or_insert(value);
        } else if value.starts_with('[') {
            phonetic.get_or_insert(value);
        }
    }
    PronunciationCall::Transcription { phonemic, phonetic }
}

/// Fold every transcription on a pronunciation line into the builder
pub fn interpret_pronunciation_line(line: &str, builder: &mut ChainBuilder) {
    let groups = parse_line(line);
    let mut accent: Option<&str> = None;

    for group in &groups {
        let TemplateGroup::Single(call) = group else {
            continue;
        };
        match classify(call) {
            PronunciationCall::Accent(a) => {
                log::trace!("Accent context '{}' for '{}'", a, builder.entry().word);
                accent = Some(a);
            }
            PronunciationCall::Transcription { phonemic, phonetic } => {
                log::trace!("Transcription {:?}/{:?} (accent {:?})", phonemic, phonetic, accent);
                builder.apply_pronunciation(phonemic, phonetic);
            }
            PronunciationCall::Ignored => {}
        }
    }
}

#[cfg(test)]
mod pronunciation_tests {
    use super::*;
    use crate::tables::Derivation;

    fn classify_line(line: &str) -> Vec<String> {
        parse_line(line)
            .iter()
            .filter_map(|g| g.first())
            .map(|c| format!("{:?}", classify(c)))
            .collect()
    }

    #[test]
    fn accent_call_is_context_only() {
        let groups = parse_line("* {{a|RP}} {{IPA|en|/ʃæˈtəʊ/}}");
        assert_eq!(classify(groups[0].first().unwrap()), PronunciationCall::Accent("RP"));
    }

    #[test]
    fn phonemic_and_phonetic_forms() {
        let groups = parse_line("{{IPA|en|/ʃæˈtoʊ/|[ʃæˈtʰoʊ]|/ʃəˈtoʊ/}}");
        assert_eq!(
            classify(groups[0].first().unwrap()),
            PronunciationCall::Transcription {
                phonemic: Some("/ʃæˈtoʊ/"),
                phonetic: Some("[ʃæˈtʰoʊ]"),
            }
        );
    }

    #[test]
    fn ipachar_label_is_recognised() {
        let got = classify_line("{{IPAchar|[ʃa.to]}} {{IPAchar|fr|[ʃa.to]}}");
        // the first call has no language slot, so its form sits at position 1
        assert_eq!(got[0], "Transcription { phonemic: None, phonetic: None }");
        assert_eq!(got[1], "Transcription { phonemic: None, phonetic: Some(\"[ʃa.to]\") }");
    }

    #[test]
    fn other_templates_are_ignored() {
        let got = classify_line("{{audio|en|chateau.ogg}} {{rhymes|en|əʊ}} {{a|RP|US}}");
        assert!(got.iter().all(|c| c == "Ignored"));
    }

    #[test]
    fn line_updates_builder_pronunciation() {
        let mut b = ChainBuilder::new("chateau", true);
        interpret_pronunciation_line("* {{a|US}} {{IPA|en|[ʃæˈtoʊ]}}", &mut b);
        interpret_pronunciation_line("* {{a|UK}} {{IPA|en|/ˈʃætəʊ/}}", &mut b);
        b.hop_mut().derivation = Some(Derivation::Borrowed);
        b.hop_mut().root_language = "fra".to_string();
        let rows = b.finish();
        assert_eq!(rows[0].ipa, "/ˈʃætəʊ/");
    }
}
