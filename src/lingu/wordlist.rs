//! Word-list backed spell checker and language guesser.
//!
//! Small in-process services used by the command line tool and by tests when
//! no real linguistic backend is attached.

use std::collections::{BTreeSet, HashMap};

use super::{LanguageGuesser, LanguageTag, LanguageType, SpellAlternatives, SpellChecker};

/// Accepts exactly the words of its lists.
#[derive(Debug, Clone, Default)]
pub struct WordListSpellChecker {
    words: HashMap<LanguageType, BTreeSet<String>>,
}

impl WordListSpellChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_words<I, S>(mut self, language: LanguageType, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.words
            .entry(language)
            .or_default()
            .extend(words.into_iter().map(Into::into));
        self
    }
}

impl SpellChecker for WordListSpellChecker {
    fn has_language(&self, language: LanguageType) -> bool {
        self.words.contains_key(&language)
    }

    fn is_valid(&self, word: &str, language: LanguageType) -> bool {
        match self.words.get(&language) {
            Some(list) => list.contains(word) || list.contains(&word.to_lowercase()),
            None => false,
        }
    }

    fn spell(
        &self,
        word: &str,
        language: LanguageType,
        max_suggestions: usize,
    ) -> Option<SpellAlternatives> {
        if self.is_valid(word, language) {
            return None;
        }
        let lower = word.to_lowercase();
        let mut scored: Vec<(usize, &String)> = self
            .words
            .get(&language)
            .into_iter()
            .flatten()
            .filter_map(|cand| {
                let d = edit_distance(&lower, cand);
                (d <= 2).then_some((d, cand))
            })
            .collect();
        scored.sort();
        Some(SpellAlternatives {
            word: word.to_string(),
            language,
            alternatives: scored
                .into_iter()
                .take(max_suggestions)
                .map(|(_, w)| w.clone())
                .collect(),
        })
    }
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

/// Guesses the language whose word list covers most words of the text.
#[derive(Debug, Clone, Default)]
pub struct WordListGuesser {
    lists: Vec<(LanguageTag, BTreeSet<String>)>,
}

impl WordListGuesser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_words<I, S>(mut self, tag: LanguageTag, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists
            .push((tag, words.into_iter().map(Into::into).collect()));
        self
    }
}

impl LanguageGuesser for WordListGuesser {
    fn guess_primary_language(&self, text: &str) -> LanguageTag {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let mut best: Option<(usize, &LanguageTag)> = None;
        for (tag, list) in &self.lists {
            let hits = words.iter().filter(|w| list.contains(*w)).count();
            if hits > 0 && best.is_none_or(|(n, _)| hits > n) {
                best = Some((hits, tag));
            }
        }
        best.map(|(_, tag)| tag.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn test_spell_suggestions_sorted_and_capped() {
        let spell = WordListSpellChecker::new()
            .with_words(LanguageType::ENGLISH_US, ["the", "then", "they", "tea", "house"]);
        assert!(spell.spell("the", LanguageType::ENGLISH_US, 7).is_none());
        let alt = spell.spell("teh", LanguageType::ENGLISH_US, 2).unwrap();
        assert_eq!(alt.word, "teh");
        assert_eq!(alt.alternatives.len(), 2);
        assert!(!alt.alternatives.contains(&"house".to_string()));
    }

    #[test]
    fn test_case_insensitive_validity() {
        let spell = WordListSpellChecker::new().with_words(LanguageType::GERMAN, ["haus"]);
        assert!(spell.is_valid("Haus", LanguageType::GERMAN));
        assert!(!spell.is_valid("Haus", LanguageType::FRENCH));
    }

    #[test]
    fn test_guesser_picks_most_hits() {
        let guesser = WordListGuesser::new()
            .with_words(LanguageTag::parse("en"), ["the", "house", "is"])
            .with_words(LanguageTag::parse("de-DE"), ["das", "haus", "ist"]);
        assert_eq!(guesser.guess_primary_language("Das Haus ist rot").to_string(), "de-DE");
        assert_eq!(guesser.guess_primary_language("The house").to_string(), "en");
        assert_eq!(guesser.guess_primary_language("xyz").language(), "");
    }
}
