//! Serialized paragraph ranges for clipboard, import and undo snapshots.

use serde::{Deserialize, Serialize};

use super::doc::ParagraphData;
use crate::error::EditResult;

/// Format version written into native text objects.
pub const TEXT_OBJECT_VERSION: u32 = 1;

/// A self-contained run of paragraphs with their attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextObject {
    pub version: u32,
    pub paragraphs: Vec<ParagraphData>,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            version: TEXT_OBJECT_VERSION,
            paragraphs: Vec::new(),
        }
    }
}

impl TextObject {
    pub fn new(paragraphs: Vec<ParagraphData>) -> Self {
        Self {
            version: TEXT_OBJECT_VERSION,
            paragraphs,
        }
    }

    /// One paragraph per line; `\r\n` and `\r` count as line breaks.
    pub fn from_plain_text(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        Self::new(normalized.split('\n').map(ParagraphData::new).collect())
    }

    pub fn from_json(json: &str) -> EditResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EditResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Raw text of all paragraphs joined by `\n`.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Same paragraphs without any attributes or fields.
    pub fn unformatted(&self) -> Self {
        Self::new(
            self.paragraphs
                .iter()
                .map(|p| {
                    ParagraphData::new(
                        p.text
                            .chars()
                            .filter(|&c| c != super::doc::FIELD_PLACEHOLDER)
                            .collect::<String>(),
                    )
                })
                .collect(),
        )
    }
}
