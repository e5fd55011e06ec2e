// Language registry: code -> display name, native name, overlay font family

/// Metadata for a supported target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub native: &'static str,
    pub font_family: &'static str,
}

/// Supported target languages. Telugu is the default when a code is
/// unrecognized.
const LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo { code: "te", name: "Telugu", native: "తెలుగు", font_family: "Noto Sans Telugu" },
    LanguageInfo { code: "hi", name: "Hindi", native: "हिन्दी", font_family: "Noto Sans Devanagari" },
    LanguageInfo { code: "ta", name: "Tamil", native: "தமிழ்", font_family: "Noto Sans Tamil" },
    LanguageInfo { code: "kn", name: "Kannada", native: "ಕನ್ನಡ", font_family: "Noto Sans Kannada" },
    LanguageInfo { code: "ml", name: "Malayalam", native: "മലയാളം", font_family: "Noto Sans Malayalam" },
    LanguageInfo { code: "gu", name: "Gujarati", native: "ગુજરાતી", font_family: "Noto Sans Gujarati" },
    LanguageInfo { code: "pa", name: "Punjabi", native: "ਪੰਜਾਬੀ", font_family: "Noto Sans Gurmukhi" },
    LanguageInfo { code: "bn", name: "Bengali", native: "বাংলা", font_family: "Noto Sans Bengali" },
    LanguageInfo { code: "or", name: "Odia", native: "ଓଡ଼ିଆ", font_family: "Noto Sans Oriya" },
    LanguageInfo { code: "en", name: "English", native: "English", font_family: "Roboto" },
];

/// Default language used when a code is unknown.
pub const DEFAULT_LANGUAGE: &str = "te";

/// Look up language metadata by code, falling back to the default language
/// for unknown codes.
pub fn lookup(code: &str) -> &'static LanguageInfo {
    LANGUAGES
        .iter()
        .find(|l| l.code == code)
        .unwrap_or_else(|| {
            LANGUAGES
                .iter()
                .find(|l| l.code == DEFAULT_LANGUAGE)
                .expect("default language is registered")
        })
}

/// Font family for overlay text in the given target language.
pub fn font_family(code: &str) -> &'static str {
    lookup(code).font_family
}
