//! Linguistic collaborators of the edit engine.
//!
//! Spell checking, language guessing, user dictionaries and auto-correction
//! are services owned by the host. The edit engine receives them bundled in a
//! [`LinguisticServices`] value at construction instead of reaching for
//! process-wide singletons.

pub mod dictionary;
pub mod languagetool;
pub mod spell_popup;
pub mod wordlist;

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub use dictionary::{AutoCorrectList, Dictionary, DictionaryKind, DictionaryList, MemoryDictionaryList};
pub use spell_popup::{PopupAction, SpellCallbackCommand, SpellCallbackInfo, SpellPopup};
pub use wordlist::{WordListGuesser, WordListSpellChecker};

/// Script classes a language or a text run can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ScriptType(u8);

impl ScriptType {
    pub const NONE: ScriptType = ScriptType(0);
    pub const LATIN: ScriptType = ScriptType(1);
    pub const ASIAN: ScriptType = ScriptType(2);
    pub const COMPLEX: ScriptType = ScriptType(4);

    pub fn contains(self, other: ScriptType) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Script class of a single character.
    pub fn of_char(c: char) -> ScriptType {
        let cp = c as u32;
        match cp {
            // Hebrew, Arabic, Syriac, Thaana, Devanagari..Sinhala, Thai, Lao
            0x0590..=0x08FF | 0x0900..=0x0DFF | 0x0E00..=0x0EFF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF => {
                ScriptType::COMPLEX
            }
            // CJK, Hangul, Kana, full-width forms
            0x1100..=0x11FF
            | 0x2E80..=0x9FFF
            | 0xA960..=0xA97F
            | 0xAC00..=0xD7FF
            | 0xF900..=0xFAFF
            | 0xFF00..=0xFFEF
            | 0x20000..=0x2FFFF => ScriptType::ASIAN,
            _ => ScriptType::LATIN,
        }
    }

    /// Union of the script classes of every non-weak character in `text`.
    pub fn of_text(text: &str) -> ScriptType {
        text.chars()
            .filter(|c| c.is_alphanumeric())
            .fold(ScriptType::NONE, |acc, c| acc | ScriptType::of_char(c))
    }
}

impl BitOr for ScriptType {
    type Output = ScriptType;

    fn bitor(self, rhs: ScriptType) -> ScriptType {
        ScriptType(self.0 | rhs.0)
    }
}

/// Numeric language identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguageType(pub u16);

impl LanguageType {
    pub const SYSTEM: LanguageType = LanguageType(0x0000);
    pub const NONE: LanguageType = LanguageType(0x00FF);
    pub const DONTKNOW: LanguageType = LanguageType(0x03FF);
    pub const ARABIC_SAUDI_ARABIA: LanguageType = LanguageType(0x0401);
    pub const CHINESE_TRADITIONAL: LanguageType = LanguageType(0x0404);
    pub const GERMAN: LanguageType = LanguageType(0x0407);
    pub const ENGLISH_US: LanguageType = LanguageType(0x0409);
    pub const FINNISH: LanguageType = LanguageType(0x040B);
    pub const FRENCH: LanguageType = LanguageType(0x040C);
    pub const HEBREW: LanguageType = LanguageType(0x040D);
    pub const ITALIAN: LanguageType = LanguageType(0x0410);
    pub const JAPANESE: LanguageType = LanguageType(0x0411);
    pub const KOREAN: LanguageType = LanguageType(0x0412);
    pub const DUTCH: LanguageType = LanguageType(0x0413);
    pub const POLISH: LanguageType = LanguageType(0x0415);
    pub const PORTUGUESE_BRAZILIAN: LanguageType = LanguageType(0x0416);
    pub const RUSSIAN: LanguageType = LanguageType(0x0419);
    pub const SWEDISH: LanguageType = LanguageType(0x041D);
    pub const THAI: LanguageType = LanguageType(0x041E);
    pub const HINDI: LanguageType = LanguageType(0x0439);
    pub const CHINESE_SIMPLIFIED: LanguageType = LanguageType(0x0804);
    pub const GERMAN_SWISS: LanguageType = LanguageType(0x0807);
    pub const ENGLISH_UK: LanguageType = LanguageType(0x0809);
    pub const PORTUGUESE: LanguageType = LanguageType(0x0816);
    pub const SPANISH: LanguageType = LanguageType(0x0C0A);

    /// True for anything but NONE and DONTKNOW.
    pub fn is_known(self) -> bool {
        self != LanguageType::NONE && self != LanguageType::DONTKNOW
    }

    fn entry(self) -> Option<&'static LanguageEntry> {
        LANGUAGES.iter().find(|e| e.id == self)
    }

    /// BCP 47 tag of a known language.
    pub fn tag(self) -> Option<LanguageTag> {
        self.entry().map(|e| LanguageTag::new(e.language, e.country))
    }

    pub fn script_type(self) -> ScriptType {
        self.entry().map(|e| e.script).unwrap_or(ScriptType::LATIN)
    }

    /// Display name used in menus.
    pub fn display_name(self) -> &'static str {
        match self {
            LanguageType::NONE => "[None]",
            LanguageType::SYSTEM => "Default",
            _ => self.entry().map(|e| e.name).unwrap_or("Unknown"),
        }
    }
}

impl fmt::Display for LanguageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

struct LanguageEntry {
    id: LanguageType,
    language: &'static str,
    country: &'static str,
    script: ScriptType,
    name: &'static str,
}

const fn lang(
    id: LanguageType,
    language: &'static str,
    country: &'static str,
    script: ScriptType,
    name: &'static str,
) -> LanguageEntry {
    LanguageEntry {
        id,
        language,
        country,
        script,
        name,
    }
}

// The first entry of a language is its fallback when no country is known.
static LANGUAGES: &[LanguageEntry] = &[
    lang(LanguageType::ENGLISH_US, "en", "US", ScriptType::LATIN, "English (USA)"),
    lang(LanguageType::ENGLISH_UK, "en", "GB", ScriptType::LATIN, "English (UK)"),
    lang(LanguageType::GERMAN, "de", "DE", ScriptType::LATIN, "German (Germany)"),
    lang(LanguageType::GERMAN_SWISS, "de", "CH", ScriptType::LATIN, "German (Switzerland)"),
    lang(LanguageType::FRENCH, "fr", "FR", ScriptType::LATIN, "French (France)"),
    lang(LanguageType::SPANISH, "es", "ES", ScriptType::LATIN, "Spanish (Spain)"),
    lang(LanguageType::ITALIAN, "it", "IT", ScriptType::LATIN, "Italian (Italy)"),
    lang(LanguageType::DUTCH, "nl", "NL", ScriptType::LATIN, "Dutch (Netherlands)"),
    lang(LanguageType::PORTUGUESE, "pt", "PT", ScriptType::LATIN, "Portuguese (Portugal)"),
    lang(LanguageType::PORTUGUESE_BRAZILIAN, "pt", "BR", ScriptType::LATIN, "Portuguese (Brazil)"),
    lang(LanguageType::POLISH, "pl", "PL", ScriptType::LATIN, "Polish"),
    lang(LanguageType::FINNISH, "fi", "FI", ScriptType::LATIN, "Finnish"),
    lang(LanguageType::SWEDISH, "sv", "SE", ScriptType::LATIN, "Swedish (Sweden)"),
    lang(LanguageType::RUSSIAN, "ru", "RU", ScriptType::LATIN, "Russian"),
    lang(LanguageType::JAPANESE, "ja", "JP", ScriptType::ASIAN, "Japanese"),
    lang(LanguageType::KOREAN, "ko", "KR", ScriptType::ASIAN, "Korean (RoK)"),
    lang(LanguageType::CHINESE_SIMPLIFIED, "zh", "CN", ScriptType::ASIAN, "Chinese (simplified)"),
    lang(LanguageType::CHINESE_TRADITIONAL, "zh", "TW", ScriptType::ASIAN, "Chinese (traditional)"),
    lang(LanguageType::ARABIC_SAUDI_ARABIA, "ar", "SA", ScriptType::COMPLEX, "Arabic (Saudi Arabia)"),
    lang(LanguageType::HEBREW, "he", "IL", ScriptType::COMPLEX, "Hebrew"),
    lang(LanguageType::HINDI, "hi", "IN", ScriptType::COMPLEX, "Hindi"),
    lang(LanguageType::THAI, "th", "TH", ScriptType::COMPLEX, "Thai"),
];

/// Language and optional country, e.g. `en-US`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LanguageTag {
    language: String,
    country: String,
}

impl LanguageTag {
    pub fn new(language: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            language: language.into().to_ascii_lowercase(),
            country: country.into().to_ascii_uppercase(),
        }
    }

    /// Parses `ll`, `ll-CC` or `ll_CC`.
    pub fn parse(tag: &str) -> Self {
        let mut parts = tag.split(['-', '_']);
        let language = parts.next().unwrap_or_default();
        let country = parts.next().unwrap_or_default();
        Self::new(language, country)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// Exact match of language and country.
    pub fn language_type(&self) -> LanguageType {
        if self.language.is_empty() {
            return LanguageType::DONTKNOW;
        }
        LANGUAGES
            .iter()
            .find(|e| e.language == self.language && e.country == self.country)
            .map(|e| e.id)
            .unwrap_or(LanguageType::DONTKNOW)
    }

    /// Best known locale: the exact match, else the first entry of the language.
    pub fn fallback(&self) -> LanguageType {
        let exact = self.language_type();
        if exact.is_known() {
            return exact;
        }
        LANGUAGES
            .iter()
            .find(|e| e.language == self.language)
            .map(|e| e.id)
            .unwrap_or(LanguageType::DONTKNOW)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.country.is_empty() {
            f.write_str(&self.language)
        } else {
            write!(f, "{}-{}", self.language, self.country)
        }
    }
}

/// Alternatives offered for a misspelled word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpellAlternatives {
    pub word: String,
    pub language: LanguageType,
    pub alternatives: Vec<String>,
}

impl Default for LanguageType {
    fn default() -> Self {
        LanguageType::NONE
    }
}

/// A spell checking service.
pub trait SpellChecker: Send + Sync {
    fn has_language(&self, language: LanguageType) -> bool;

    fn is_valid(&self, word: &str, language: LanguageType) -> bool;

    /// Returns `None` when the word is correct, else at most
    /// `max_suggestions` alternatives.
    fn spell(
        &self,
        word: &str,
        language: LanguageType,
        max_suggestions: usize,
    ) -> Option<SpellAlternatives>;
}

/// A language guessing service.
pub trait LanguageGuesser: Send + Sync {
    fn guess_primary_language(&self, text: &str) -> LanguageTag;
}

/// An auto-correct replacement table.
pub trait AutoCorrect: Send + Sync {
    /// Records `wrong -> right` for `language`.
    fn put_text(&self, wrong: &str, right: &str, language: LanguageType);

    fn lookup(&self, word: &str, language: LanguageType) -> Option<String>;
}

/// Language settings of the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinguSettings {
    /// Default document language for Western text.
    pub default_language: LanguageType,
    /// User interface language.
    pub ui_language: LanguageType,
    /// Locale setting.
    pub locale: LanguageType,
}

impl Default for LinguSettings {
    fn default() -> Self {
        Self {
            default_language: LanguageType::ENGLISH_US,
            ui_language: LanguageType::ENGLISH_US,
            locale: LanguageType::ENGLISH_US,
        }
    }
}

/// Bundle of linguistic services handed to the edit engine.
#[derive(Clone, Default)]
pub struct LinguisticServices {
    pub spell: Option<Arc<dyn SpellChecker>>,
    pub guesser: Option<Arc<dyn LanguageGuesser>>,
    pub dictionaries: Option<Arc<dyn DictionaryList>>,
    pub auto_correct: Option<Arc<dyn AutoCorrect>>,
    pub settings: LinguSettings,
}

impl fmt::Debug for LinguisticServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinguisticServices")
            .field("spell", &self.spell.is_some())
            .field("guesser", &self.guesser.is_some())
            .field("dictionaries", &self.dictionaries.is_some())
            .field("auto_correct", &self.auto_correct.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl LinguisticServices {
    pub fn new(settings: LinguSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_spell_checker(mut self, spell: Arc<dyn SpellChecker>) -> Self {
        self.spell = Some(spell);
        self
    }

    pub fn with_guesser(mut self, guesser: Arc<dyn LanguageGuesser>) -> Self {
        self.guesser = Some(guesser);
        self
    }

    pub fn with_dictionaries(mut self, dictionaries: Arc<dyn DictionaryList>) -> Self {
        self.dictionaries = Some(dictionaries);
        self
    }

    pub fn with_auto_correct(mut self, auto_correct: Arc<dyn AutoCorrect>) -> Self {
        self.auto_correct = Some(auto_correct);
        self
    }

    /// Checks a word against the ignore list, the dictionaries and the speller.
    ///
    /// Without a speller every word counts as correct.
    pub fn is_word_valid(&self, word: &str, language: LanguageType) -> bool {
        let Some(spell) = &self.spell else {
            return true;
        };
        if let Some(dics) = &self.dictionaries {
            if dics.is_ignored(word) {
                return true;
            }
            match dics.lookup(word, language) {
                Some(DictionaryKind::Positive) => return true,
                Some(DictionaryKind::Negative) => return false,
                None => {}
            }
        }
        spell.is_valid(word, language)
    }

    /// Guesses the language of `text`.
    ///
    /// Paragraph text goes through the language guesser. A single word is
    /// tried against the default document language, the UI language, the
    /// locale and finally English (USA); the first one the speller knows and
    /// accepts the word in wins. `NONE` when nothing matches.
    pub fn check_language(&self, text: &str, is_para_text: bool) -> LanguageType {
        let settings = &self.settings;
        let mut lang = LanguageType::NONE;
        if is_para_text {
            let Some(guesser) = &self.guesser else {
                return lang;
            };
            let guess = guesser.guess_primary_language(text);
            if guess.country().is_empty() {
                if let Some(locale) = settings.locale.tag() {
                    if locale.language() == guess.language() {
                        lang = settings.locale;
                    }
                }
            }
            if lang == LanguageType::NONE {
                lang = guess.fallback();
            }
            if lang == LanguageType::SYSTEM {
                lang = settings.locale;
            }
            if lang == LanguageType::DONTKNOW {
                lang = LanguageType::NONE;
            }
        } else {
            let Some(spell) = &self.spell else {
                return lang;
            };
            let default = if settings.default_language == LanguageType::SYSTEM {
                settings.locale
            } else {
                settings.default_language
            };
            let candidates = [default, settings.ui_language, settings.locale, LanguageType::ENGLISH_US];
            for candidate in candidates {
                if candidate.is_known()
                    && spell.has_language(candidate)
                    && spell.is_valid(text, candidate)
                {
                    lang = candidate;
                    break;
                }
            }
        }
        trace!(text, is_para_text, language = lang.0, "checked language");
        lang
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGuess(&'static str);

    impl LanguageGuesser for FixedGuess {
        fn guess_primary_language(&self, _text: &str) -> LanguageTag {
            LanguageTag::parse(self.0)
        }
    }

    fn services_with_guess(tag: &'static str, locale: LanguageType) -> LinguisticServices {
        LinguisticServices::new(LinguSettings {
            locale,
            ..LinguSettings::default()
        })
        .with_guesser(Arc::new(FixedGuess(tag)))
    }

    #[test]
    fn test_tag_parse_and_display() {
        let tag = LanguageTag::parse("de_ch");
        assert_eq!(tag.language(), "de");
        assert_eq!(tag.country(), "CH");
        assert_eq!(tag.to_string(), "de-CH");
        assert_eq!(tag.language_type(), LanguageType::GERMAN_SWISS);
        assert_eq!(LanguageTag::parse("xx").fallback(), LanguageType::DONTKNOW);
    }

    #[test]
    fn test_paragraph_guess_uses_locale_country() {
        let services = services_with_guess("de", LanguageType::GERMAN_SWISS);
        assert_eq!(services.check_language("Grüezi mitenand", true), LanguageType::GERMAN_SWISS);
    }

    #[test]
    fn test_paragraph_guess_falls_back_to_first_country() {
        let services = services_with_guess("de", LanguageType::ENGLISH_US);
        assert_eq!(services.check_language("Guten Tag", true), LanguageType::GERMAN);
    }

    #[test]
    fn test_paragraph_guess_unknown_is_none() {
        let services = services_with_guess("tlh", LanguageType::ENGLISH_US);
        assert_eq!(services.check_language("nuqneH", true), LanguageType::NONE);
    }

    #[test]
    fn test_without_services_is_none() {
        let services = LinguisticServices::default();
        assert_eq!(services.check_language("hello", true), LanguageType::NONE);
        assert_eq!(services.check_language("hello", false), LanguageType::NONE);
    }

    #[test]
    fn test_word_check_walks_candidates() {
        let spell = WordListSpellChecker::new()
            .with_words(LanguageType::FRENCH, ["bonjour"])
            .with_words(LanguageType::ENGLISH_US, ["hello"]);
        let services = LinguisticServices::new(LinguSettings {
            default_language: LanguageType::FRENCH,
            ui_language: LanguageType::GERMAN,
            locale: LanguageType::GERMAN,
        })
        .with_spell_checker(Arc::new(spell));
        assert_eq!(services.check_language("bonjour", false), LanguageType::FRENCH);
        assert_eq!(services.check_language("hello", false), LanguageType::ENGLISH_US);
        assert_eq!(services.check_language("qwzx", false), LanguageType::NONE);
    }

    #[test]
    fn test_script_type_of_text() {
        assert_eq!(ScriptType::of_text("abc"), ScriptType::LATIN);
        let mixed = ScriptType::of_text("abc 日本");
        assert!(mixed.contains(ScriptType::LATIN));
        assert!(mixed.contains(ScriptType::ASIAN));
        assert!(!mixed.contains(ScriptType::COMPLEX));
        assert!(ScriptType::of_text("  ").is_empty());
        assert_eq!(LanguageType::HEBREW.script_type(), ScriptType::COMPLEX);
    }
}
