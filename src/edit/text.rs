//! Character classes and word boundaries.

use super::doc::FIELD_PLACEHOLDER;

/// Check if a character is a punctuation/symbol boundary (not whitespace)
pub fn is_punctuation(ch: char) -> bool {
    matches!(
        ch,
        '/' | ':'
            | ','
            | '.'
            | '-'
            | '('
            | ')'
            | '{'
            | '}'
            | '['
            | ']'
            | ';'
            | '"'
            | '<'
            | '>'
            | '='
            | '+'
            | '*'
            | '&'
            | '|'
            | '!'
            | '@'
            | '#'
            | '$'
            | '%'
            | '^'
            | '~'
            | '`'
            | '\\'
            | '?'
            | '«'
            | '»'
            | '“'
            | '”'
            | '„'
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharType {
    Whitespace,
    WordChar,
    Punctuation,
    /// Field placeholder; never part of a word.
    Field,
}

pub fn char_type(ch: char) -> CharType {
    if ch == FIELD_PLACEHOLDER {
        CharType::Field
    } else if ch.is_whitespace() {
        CharType::Whitespace
    } else if is_punctuation(ch) {
        CharType::Punctuation
    } else {
        CharType::WordChar
    }
}

/// How word boundaries are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordType {
    /// Letters, digits and apostrophes only.
    #[default]
    DictionaryWord,
    /// Also runs of punctuation.
    AnyWord,
}

fn same_word(a: CharType, b: CharType, word_type: WordType) -> bool {
    match word_type {
        WordType::DictionaryWord => a == CharType::WordChar && b == CharType::WordChar,
        WordType::AnyWord => {
            a == b && matches!(a, CharType::WordChar | CharType::Punctuation)
        }
    }
}

/// Bounds `[start, end)` of the word touching `index`: the word the
/// character at `index` belongs to, else the one ending at `index`.
pub fn word_at(chars: &[char], index: usize, word_type: WordType) -> Option<(usize, usize)> {
    let index = index.min(chars.len());
    let seed = if index < chars.len() && is_word_class(char_type(chars[index]), word_type) {
        index
    } else if index > 0 && is_word_class(char_type(chars[index - 1]), word_type) {
        index - 1
    } else {
        return None;
    };
    let class = char_type(chars[seed]);
    let mut start = seed;
    while start > 0 && same_word(char_type(chars[start - 1]), class, word_type) {
        start -= 1;
    }
    let mut end = seed + 1;
    while end < chars.len() && same_word(char_type(chars[end]), class, word_type) {
        end += 1;
    }
    Some((start, end))
}

fn is_word_class(t: CharType, word_type: WordType) -> bool {
    match word_type {
        WordType::DictionaryWord => t == CharType::WordChar,
        WordType::AnyWord => matches!(t, CharType::WordChar | CharType::Punctuation),
    }
}

/// End of the word at `index`, or `index` itself outside words.
pub fn end_of_word(chars: &[char], index: usize) -> usize {
    match word_at(chars, index, WordType::DictionaryWord) {
        Some((_, end)) if end >= index => end,
        _ => index,
    }
}

/// Dictionary words of a text as `(start, end)` pairs.
pub fn words(chars: &[char]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if char_type(chars[i]) == CharType::WordChar {
            let start = i;
            while i < chars.len() && char_type(chars[i]) == CharType::WordChar {
                i += 1;
            }
            out.push((start, i));
        } else {
            i += 1;
        }
    }
    out
}
