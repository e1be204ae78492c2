//! User dictionaries and the auto-correct table.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use super::{AutoCorrect, LanguageType};

/// Positive dictionaries accept words, negative ones reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryKind {
    Positive,
    Negative,
}

/// One user dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    pub name: String,
    /// `LanguageType::NONE` means "all languages".
    pub language: LanguageType,
    pub kind: DictionaryKind,
    pub active: bool,
    pub read_only: bool,
    pub words: BTreeSet<String>,
}

impl Dictionary {
    pub fn new(name: impl Into<String>, language: LanguageType) -> Self {
        Self {
            name: name.into(),
            language,
            kind: DictionaryKind::Positive,
            active: true,
            read_only: false,
            words: BTreeSet::new(),
        }
    }

    pub fn negative(mut self) -> Self {
        self.kind = DictionaryKind::Negative;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// True when words in `language` may be added to this dictionary.
    pub fn accepts_additions(&self, language: LanguageType) -> bool {
        self.active
            && self.kind != DictionaryKind::Negative
            && (self.language == language || self.language == LanguageType::NONE)
            && !self.read_only
    }

    fn applies_to(&self, language: LanguageType) -> bool {
        self.active && (self.language == language || self.language == LanguageType::NONE)
    }
}

/// The host's list of user dictionaries plus the "ignore all" list.
pub trait DictionaryList: Send + Sync {
    /// Snapshot of the dictionaries in list order.
    fn dictionaries(&self) -> Vec<Dictionary>;

    /// Adds `word` to the named dictionary. False if it does not exist or is read-only.
    fn add_word(&self, dictionary: &str, word: &str) -> bool;

    /// Activates the standard dictionary so at least one accepts additions.
    fn activate_standard(&self);

    /// Adds `word` to the ignore-all list.
    fn ignore_all(&self, word: &str);

    fn is_ignored(&self, word: &str) -> bool;

    /// Kind of the first active dictionary for `language` containing `word`.
    fn lookup(&self, word: &str, language: LanguageType) -> Option<DictionaryKind> {
        self.dictionaries()
            .iter()
            .find(|d| d.applies_to(language) && d.words.contains(word))
            .map(|d| d.kind)
    }
}

/// Name of the standard user dictionary.
pub const STANDARD_DICTIONARY: &str = "standard.dic";

/// In-memory dictionary list.
#[derive(Debug, Default)]
pub struct MemoryDictionaryList {
    dictionaries: RwLock<Vec<Dictionary>>,
    ignored: RwLock<HashSet<String>>,
}

impl MemoryDictionaryList {
    /// A list holding an inactive standard dictionary for all languages.
    pub fn new() -> Self {
        let list = Self::default();
        list.push(Dictionary::new(STANDARD_DICTIONARY, LanguageType::NONE).inactive());
        list
    }

    pub fn with_dictionary(self, dictionary: Dictionary) -> Self {
        self.push(dictionary);
        self
    }

    pub fn push(&self, dictionary: Dictionary) {
        let mut dics = self.dictionaries.write().unwrap_or_else(|e| e.into_inner());
        dics.push(dictionary);
    }

    pub fn get(&self, name: &str) -> Option<Dictionary> {
        let dics = self.dictionaries.read().unwrap_or_else(|e| e.into_inner());
        dics.iter().find(|d| d.name == name).cloned()
    }
}

impl DictionaryList for MemoryDictionaryList {
    fn dictionaries(&self) -> Vec<Dictionary> {
        self.dictionaries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn add_word(&self, dictionary: &str, word: &str) -> bool {
        let mut dics = self.dictionaries.write().unwrap_or_else(|e| e.into_inner());
        match dics.iter_mut().find(|d| d.name == dictionary) {
            Some(d) if !d.read_only => {
                debug!(dictionary, word, "word added to dictionary");
                d.words.insert(word.to_string());
                true
            }
            _ => false,
        }
    }

    fn activate_standard(&self) {
        let mut dics = self.dictionaries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(d) = dics.iter_mut().find(|d| d.name == STANDARD_DICTIONARY) {
            d.active = true;
        }
    }

    fn ignore_all(&self, word: &str) {
        let mut ignored = self.ignored.write().unwrap_or_else(|e| e.into_inner());
        ignored.insert(word.to_string());
    }

    fn is_ignored(&self, word: &str) -> bool {
        self.ignored
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(word)
    }
}

/// In-memory auto-correct table keyed by language.
#[derive(Debug, Default)]
pub struct AutoCorrectList {
    entries: RwLock<HashMap<(LanguageType, String), String>>,
}

impl AutoCorrectList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AutoCorrect for AutoCorrectList {
    fn put_text(&self, wrong: &str, right: &str, language: LanguageType) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((language, wrong.to_string()), right.to_string());
    }

    fn lookup(&self, word: &str, language: LanguageType) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&(language, word.to_string()))
            .or_else(|| entries.get(&(LanguageType::NONE, word.to_string())))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition_filter() {
        let en = LanguageType::ENGLISH_US;
        assert!(Dictionary::new("a", en).accepts_additions(en));
        assert!(Dictionary::new("a", LanguageType::NONE).accepts_additions(en));
        assert!(!Dictionary::new("a", LanguageType::GERMAN).accepts_additions(en));
        assert!(!Dictionary::new("a", en).negative().accepts_additions(en));
        assert!(!Dictionary::new("a", en).read_only().accepts_additions(en));
        assert!(!Dictionary::new("a", en).inactive().accepts_additions(en));
    }

    #[test]
    fn test_standard_activation_and_add() {
        let list = MemoryDictionaryList::new();
        assert!(!list.dictionaries()[0].active);
        list.activate_standard();
        assert!(list.dictionaries()[0].active);
        assert!(list.add_word(STANDARD_DICTIONARY, "docpack"));
        assert_eq!(
            list.lookup("docpack", LanguageType::FRENCH),
            Some(DictionaryKind::Positive)
        );
        assert!(!list.add_word("missing.dic", "x"));
    }

    #[test]
    fn test_read_only_rejects_add() {
        let list = MemoryDictionaryList::new()
            .with_dictionary(Dictionary::new("ro.dic", LanguageType::NONE).read_only());
        assert!(!list.add_word("ro.dic", "word"));
    }

    #[test]
    fn test_ignore_list() {
        let list = MemoryDictionaryList::new();
        assert!(!list.is_ignored("teh"));
        list.ignore_all("teh");
        assert!(list.is_ignored("teh"));
    }

    #[test]
    fn test_auto_correct_lookup() {
        let table = AutoCorrectList::new();
        table.put_text("teh", "the", LanguageType::ENGLISH_US);
        assert_eq!(table.lookup("teh", LanguageType::ENGLISH_US).as_deref(), Some("the"));
        assert_eq!(table.lookup("teh", LanguageType::GERMAN), None);
        assert_eq!(table.len(), 1);
    }
}
