//! Spelling context menu model.
//!
//! The edit view builds a [`SpellPopup`] for a misspelled word; the host shows
//! it and hands the chosen [`PopupAction`] back for execution.

use super::LanguageType;

/// Suggestions requested from the speller for the context menu.
pub const MAX_POPUP_SUGGESTIONS: usize = 7;

/// Contents of the spelling context menu.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpellPopup {
    /// The misspelled word.
    pub word: String,
    /// Language the word was checked in.
    pub language: LanguageType,
    /// Replacement suggestions; also offered as auto-correct entries.
    pub suggestions: Vec<String>,
    /// Guessed language of the word, or `NONE` when no guess entry is shown.
    pub word_language: LanguageType,
    /// Guessed language of the paragraph, or `NONE`.
    pub para_language: LanguageType,
    /// Dictionaries that accept the word, as `(list index, name)`.
    pub dictionaries: Vec<(usize, String)>,
}

impl SpellPopup {
    /// The single "add" entry is shown when exactly one dictionary qualifies.
    pub fn has_add(&self) -> bool {
        self.dictionaries.len() == 1
    }

    /// The "insert into" submenu is shown for two or more dictionaries.
    pub fn has_insert_menu(&self) -> bool {
        self.dictionaries.len() >= 2
    }

    /// The auto-correct submenu is shown when there are suggestions.
    pub fn has_auto_correct(&self) -> bool {
        !self.suggestions.is_empty()
    }

    pub fn has_language_entries(&self) -> bool {
        self.word_language != LanguageType::NONE || self.para_language != LanguageType::NONE
    }
}

/// Entry chosen from the spelling context menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupAction {
    Ignore,
    WordLanguage,
    ParaLanguage,
    Check,
    AutoCorrectDialog,
    /// The single "add" entry.
    Add,
    /// "Insert into" submenu entry, by dictionary name.
    AddTo(String),
    /// Auto-correct submenu entry, by suggestion index.
    AutoCorrect(usize),
    /// Replacement, by suggestion index.
    Replace(usize),
    /// Menu dismissed.
    Cancel,
}

/// What happened, for the host's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellCallbackCommand {
    IgnoreWord,
    StartSpellDialog,
    AddToDictionary,
    WordLanguage,
    ParaLanguage,
    AutoCorrectOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellCallbackInfo {
    pub command: SpellCallbackCommand,
    pub word: String,
}

impl SpellCallbackInfo {
    pub fn new(command: SpellCallbackCommand, word: impl Into<String>) -> Self {
        Self {
            command,
            word: word.into(),
        }
    }
}
