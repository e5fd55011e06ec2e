// Offline glossary substitution, used when the generation backend is
// unreachable. Covers recurring headings and boilerplate of Indian
// government documents; anything the tables miss is returned marked as
// untranslated so the frontend can flag it.

use once_cell::sync::Lazy;

type TermTable = &'static [(&'static str, &'static str)];

// Ordered longest-phrase-first so multi-word terms win over substrings.
static TELUGU_TERMS: Lazy<Vec<(&str, &str)>> = Lazy::new(|| {
    vec![
        ("OFFICE OF THE REGISTRAR GENERAL", "రిజిస్ట్రార్ జనరల్ కార్యాలయం"),
        ("Ministry of Home Affairs", "గృహ వ్యవహారాల మంత్రిత్వ శాఖ"),
        ("TENDER ENQUIRY NOTICE", "టెండర్ విచారణ నోటీసు"),
        ("Terms and Conditions", "నిబంధనలు మరియు షరతులు"),
        ("Government of India", "భారత ప్రభుత్వం"),
        ("Procurement", "కొనుగోలు"),
        ("Agreement", "ఒప్పందం"),
        ("Contract", "ఒప్పందం"),
        ("Services", "సేవలు"),
        ("Subject:", "విషయం:"),
        ("Supply", "సరఫరా"),
        ("Dated:", "తేదీ:"),
        ("No.", "సంఖ్య:"),
    ]
});

static HINDI_TERMS: Lazy<Vec<(&str, &str)>> = Lazy::new(|| {
    vec![
        ("OFFICE OF THE REGISTRAR GENERAL", "रजिस्ट्रार जनरल का कार्यालय"),
        ("Ministry of Home Affairs", "गृह मंत्रालय"),
        ("TENDER ENQUIRY NOTICE", "निविदा पूछताछ नोटिस"),
        ("Terms and Conditions", "नियम और शर्तें"),
        ("Government of India", "भारत सरकार"),
        ("Procurement", "खरीद"),
        ("Agreement", "समझौता"),
        ("Contract", "अनुबंध"),
        ("Services", "सेवाएं"),
        ("Subject:", "विषय:"),
        ("Supply", "आपूर्ति"),
        ("Dated:", "दिनांक:"),
        ("No.", "संख्या:"),
    ]
});

static TAMIL_TERMS: Lazy<Vec<(&str, &str)>> = Lazy::new(|| {
    vec![
        ("OFFICE OF THE REGISTRAR GENERAL", "பதிவாளர் ஜெனரல் அலுவலகம்"),
        ("Ministry of Home Affairs", "உள்துறை அமைச்சகம்"),
        ("TENDER ENQUIRY NOTICE", "டெண்டர் விசாரணை அறிவிப்பு"),
        ("Terms and Conditions", "விதிமுறைகள் மற்றும் நிபந்தனைகள்"),
        ("Government of India", "இந்திய அரசு"),
        ("Procurement", "கொள்முதல்"),
        ("Agreement", "ஒப்பந்தம்"),
        ("Contract", "ஒப்பந்தம்"),
        ("Services", "சேவைகள்"),
        ("Subject:", "பொருள்:"),
        ("Supply", "வழங்கல்"),
        ("Dated:", "தேதி:"),
        ("No.", "எண்:"),
    ]
});

fn table_for(language: &str) -> Option<TermTable> {
    match language {
        "te" => Some(TELUGU_TERMS.as_slice()),
        "hi" => Some(HINDI_TERMS.as_slice()),
        "ta" => Some(TAMIL_TERMS.as_slice()),
        _ => None,
    }
}

/// Substitute known terms. Returns `None` when no substitution applied,
/// meaning the caller should mark the text as untranslated instead.
pub fn apply(text: &str, language: &str) -> Option<String> {
    let table = table_for(language)?;
    let mut result = text.to_string();
    for (term, replacement) in table.iter() {
        result = result.replace(term, replacement);
    }
    (result != text).then_some(result)
}

/// Marker format for text the offline glossary could not handle.
pub fn marked_untranslated(text: &str, language: &str) -> String {
    format!(
        "[{}] {} [Translation unavailable - Ollama service required]",
        language.to_uppercase(),
        text
    )
}

/// Glossary substitution with the untranslated marker as last resort.
pub fn translate_offline(text: &str, language: &str) -> String {
    apply(text, language).unwrap_or_else(|| marked_untranslated(text, language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_terms() {
        let result = apply("Government of India - TENDER ENQUIRY NOTICE", "te").unwrap();
        assert_eq!(result, "భారత ప్రభుత్వం - టెండర్ విచారణ నోటీసు");
    }

    #[test]
    fn longer_phrases_win_over_substrings() {
        // "Terms and Conditions" must not be broken by a bare term hit
        let result = apply("Terms and Conditions", "hi").unwrap();
        assert_eq!(result, "नियम और शर्तें");
    }

    #[test]
    fn unknown_text_gets_marked() {
        let result = translate_offline("Lorem ipsum", "te");
        assert_eq!(
            result,
            "[TE] Lorem ipsum [Translation unavailable - Ollama service required]"
        );
    }

    #[test]
    fn unsupported_language_gets_marked() {
        assert!(apply("Government of India", "kn").is_none());
        let result = translate_offline("Government of India", "kn");
        assert!(result.starts_with("[KN] "));
    }

    #[test]
    fn tables_are_longest_first() {
        for table in [&*TELUGU_TERMS, &*HINDI_TERMS, &*TAMIL_TERMS] {
            for pair in table.windows(2) {
                assert!(pair[0].0.len() >= pair[1].0.len());
            }
        }
    }
}
