//! Paragraph arena.
//!
//! Paragraphs live in a map keyed by [`NodeId`]; document order is a separate
//! list of ids. Ids are never reused, so a position that refers to a removed
//! paragraph is detected instead of silently pointing at a new one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::attribs::{AttribId, AttribValue, CharAttrib, CharAttribList, FieldData, ItemSet};
use super::pam::EditPaM;
use crate::error::{EditError, EditResult};

/// Placeholder character of a field.
pub const FIELD_PLACEHOLDER: char = '\u{1}';

/// Stable paragraph handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Misspelled ranges of a paragraph plus the range still to be checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrongList {
    ranges: Vec<(usize, usize)>,
    invalid: Option<(usize, usize)>,
}

impl WrongList {
    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn push(&mut self, start: usize, end: usize) {
        self.ranges.push((start, end));
    }

    /// Range containing `index`, ends inclusive.
    pub fn find(&self, index: usize) -> Option<(usize, usize)> {
        self.ranges
            .iter()
            .copied()
            .find(|&(s, e)| s <= index && index <= e)
    }

    /// Marks `[start, end)` for re-checking.
    pub fn reset_invalid_range(&mut self, start: usize, end: usize) {
        self.invalid = Some(match self.invalid {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid.is_some()
    }

    pub fn set_valid(&mut self) {
        self.invalid = None;
    }
}

/// Serializable content of one paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphData {
    pub text: String,
    #[serde(default, skip_serializing_if = "CharAttribList::is_empty")]
    pub char_attribs: CharAttribList,
    #[serde(default, skip_serializing_if = "ItemSet::is_empty")]
    pub para_attribs: ItemSet,
    #[serde(default = "visible_default")]
    pub visible: bool,
}

fn visible_default() -> bool {
    true
}

impl ParagraphData {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            ..Self::default()
        }
    }
}

/// One paragraph of the document.
#[derive(Debug, Clone)]
pub struct ContentNode {
    text: String,
    len: usize,
    char_attribs: CharAttribList,
    para_attribs: ItemSet,
    visible: bool,
    wrong_list: WrongList,
    needs_format: bool,
}

impl ContentNode {
    pub fn new(text: &str) -> Self {
        Self::from_data(ParagraphData::new(text))
    }

    pub fn from_data(data: ParagraphData) -> Self {
        let len = data.text.chars().count();
        let mut wrong_list = WrongList::default();
        wrong_list.reset_invalid_range(0, len);
        Self {
            text: data.text,
            len,
            char_attribs: data.char_attribs,
            para_attribs: data.para_attribs,
            visible: data.visible,
            wrong_list,
            needs_format: true,
        }
    }

    pub fn to_data(&self) -> ParagraphData {
        ParagraphData {
            text: self.text.clone(),
            char_attribs: self.char_attribs.clone(),
            para_attribs: self.para_attribs.clone(),
            visible: self.visible,
        }
    }

    /// Data of the characters `[start, end)` with paragraph attributes.
    pub fn slice_data(&self, start: usize, end: usize) -> ParagraphData {
        let end = end.min(self.len);
        let start = start.min(end);
        ParagraphData {
            text: self.chars_between(start, end),
            char_attribs: self.char_attribs.slice(start, end),
            para_attribs: self.para_attribs.clone(),
            visible: self.visible,
        }
    }

    /// Raw text, fields as placeholders.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn char_at(&self, index: usize) -> Option<char> {
        self.text.chars().nth(index)
    }

    pub fn chars_between(&self, start: usize, end: usize) -> String {
        self.text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }

    /// Text with every field replaced by `expand(field)`.
    pub fn expanded_text(
        &self,
        start: usize,
        end: usize,
        expand: &dyn Fn(&FieldData) -> String,
    ) -> String {
        let mut out = String::new();
        for (i, c) in self.text.chars().enumerate().skip(start).take(end.saturating_sub(start)) {
            if c == FIELD_PLACEHOLDER {
                if let Some(field) = self.char_attribs.field_at(i) {
                    out.push_str(&expand(field));
                    continue;
                }
            }
            out.push(c);
        }
        out
    }

    pub fn char_attribs(&self) -> &CharAttribList {
        &self.char_attribs
    }

    pub fn char_attribs_mut(&mut self) -> &mut CharAttribList {
        &mut self.char_attribs
    }

    pub fn para_attribs(&self) -> &ItemSet {
        &self.para_attribs
    }

    pub fn para_attribs_mut(&mut self) -> &mut ItemSet {
        &mut self.para_attribs
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn wrong_list(&self) -> &WrongList {
        &self.wrong_list
    }

    pub fn wrong_list_mut(&mut self) -> &mut WrongList {
        &mut self.wrong_list
    }

    pub fn needs_format(&self) -> bool {
        self.needs_format
    }

    pub fn set_needs_format(&mut self, value: bool) {
        self.needs_format = value;
    }

    fn byte_index(&self, index: usize) -> usize {
        self.text
            .char_indices()
            .nth(index)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len())
    }

    fn invalidate(&mut self, start: usize, end: usize) {
        self.needs_format = true;
        self.wrong_list.reset_invalid_range(start, end);
    }

    /// Inserts `s` at `index`; attributes ending there grow over it.
    pub fn insert_str(&mut self, index: usize, s: &str) {
        let n = s.chars().count();
        if n == 0 {
            return;
        }
        let at = self.byte_index(index);
        self.text.insert_str(at, s);
        self.len += n;
        self.char_attribs.expand(index, n);
        self.invalidate(index, index + n);
    }

    /// Inserts a field placeholder at `index`.
    pub fn insert_field(&mut self, index: usize, field: FieldData) {
        self.insert_str(index, &FIELD_PLACEHOLDER.to_string());
        self.char_attribs.insert(CharAttrib::new(
            AttribId::FeatureField,
            AttribValue::Field(field),
            index,
            index + 1,
        ));
    }

    /// Removes `[start, end)` and returns the removed text.
    pub fn remove(&mut self, start: usize, end: usize) -> String {
        let end = end.min(self.len);
        if start >= end {
            return String::new();
        }
        let (a, b) = (self.byte_index(start), self.byte_index(end));
        let removed: String = self.text.drain(a..b).collect();
        self.len -= end - start;
        self.char_attribs.collapse(start, end - start);
        self.invalidate(start, start);
        removed
    }

    /// Replaces `[start, end)` keeping the attributes of the first character.
    pub fn replace(&mut self, start: usize, end: usize, s: &str) {
        self.remove(start, end);
        self.insert_str(start, s);
    }

    /// Overwrites characters from `start` with `s` of the same length; the
    /// attributes stay where they are.
    pub fn overwrite(&mut self, start: usize, s: &str) {
        let n = s.chars().count();
        let end = (start + n).min(self.len);
        if start >= end {
            return;
        }
        let (a, b) = (self.byte_index(start), self.byte_index(end));
        let replacement: String = s.chars().take(end - start).collect();
        self.text.replace_range(a..b, &replacement);
        self.invalidate(start, end);
    }

    /// Cuts the paragraph at `index`; the tail becomes a new node carrying
    /// the paragraph attributes.
    pub fn split_off(&mut self, index: usize) -> ContentNode {
        let at = self.byte_index(index);
        let tail_text = self.text.split_off(at);
        let tail_attribs = self.char_attribs.split_off(index);
        self.len = index;
        self.invalidate(index, index);
        let mut tail = ContentNode::from_data(ParagraphData {
            text: tail_text,
            char_attribs: tail_attribs,
            para_attribs: self.para_attribs.clone(),
            visible: self.visible,
        });
        tail.needs_format = true;
        tail
    }

    /// Appends `other`; this paragraph keeps its paragraph attributes.
    pub fn append(&mut self, other: ContentNode) {
        let offset = self.len;
        self.text.push_str(&other.text);
        self.len += other.len;
        self.char_attribs.append(other.char_attribs, offset);
        self.invalidate(offset, self.len);
    }

    /// Value of `which` at `index` from character attributes, then paragraph items.
    pub fn value_at(&self, which: AttribId, index: usize) -> Option<&AttribValue> {
        self.char_attribs
            .value_at(which, index)
            .or_else(|| self.para_attribs.get(which))
    }

    /// Ends of the formatting portions, in order; the last one is the length.
    pub fn portions(&self) -> Vec<usize> {
        let mut bounds: Vec<usize> = self
            .char_attribs
            .attribs()
            .iter()
            .flat_map(|a| [a.start, a.end])
            .filter(|&b| b > 0 && b < self.len)
            .collect();
        bounds.push(self.len);
        bounds.sort_unstable();
        bounds.dedup();
        bounds
    }
}

/// Paragraph arena in document order.
#[derive(Debug, Clone)]
pub struct EditDoc {
    nodes: HashMap<NodeId, ContentNode>,
    order: Vec<NodeId>,
    next_id: u64,
}

impl Default for EditDoc {
    fn default() -> Self {
        Self::new()
    }
}

impl EditDoc {
    /// A document with one empty paragraph.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            next_id: 0,
        };
        doc.push(ContentNode::new(""));
        doc
    }

    fn alloc(&mut self, node: ContentNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    pub fn push(&mut self, node: ContentNode) -> NodeId {
        let id = self.alloc(node);
        self.order.push(id);
        id
    }

    /// Inserts `node` at paragraph position `pos`.
    pub fn insert(&mut self, pos: usize, node: ContentNode) -> NodeId {
        let id = self.alloc(node);
        let pos = pos.min(self.order.len());
        self.order.insert(pos, id);
        id
    }

    /// Removes the paragraph at `pos`; its id becomes invalid. Removing the
    /// last paragraph leaves one empty paragraph behind.
    pub fn remove(&mut self, pos: usize) -> Option<ContentNode> {
        if pos >= self.order.len() {
            return None;
        }
        let id = self.order.remove(pos);
        let removed = self.nodes.remove(&id);
        if self.order.is_empty() {
            self.push(ContentNode::new(""));
        }
        removed
    }

    /// Replaces everything with `paras`; an empty list leaves one empty paragraph.
    pub fn set_paragraphs(&mut self, paras: Vec<ParagraphData>) {
        self.nodes.clear();
        self.order.clear();
        for p in paras {
            self.push(ContentNode::from_data(p));
        }
        if self.order.is_empty() {
            self.push(ContentNode::new(""));
        }
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    pub fn id_at(&self, pos: usize) -> Option<NodeId> {
        self.order.get(pos).copied()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Paragraph position of a live node.
    pub fn pos_of(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == id)
    }

    pub fn node(&self, id: NodeId) -> Option<&ContentNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ContentNode> {
        self.nodes.get_mut(&id)
    }

    pub fn get(&self, pos: usize) -> EditResult<&ContentNode> {
        self.id_at(pos)
            .and_then(|id| self.nodes.get(&id))
            .ok_or(EditError::ParagraphOutOfRange(pos))
    }

    pub fn get_mut(&mut self, pos: usize) -> EditResult<&mut ContentNode> {
        let id = self.id_at(pos).ok_or(EditError::ParagraphOutOfRange(pos))?;
        self.nodes
            .get_mut(&id)
            .ok_or(EditError::ParagraphOutOfRange(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Fails for positions in removed paragraphs or past the paragraph end.
    pub fn check_pam(&self, pam: &EditPaM) -> EditResult<&ContentNode> {
        match self.nodes.get(&pam.node()) {
            Some(node) if pam.index() <= node.len() => Ok(node),
            _ => Err(EditError::InvalidPaM),
        }
    }

    pub fn start_pam(&self) -> EditPaM {
        EditPaM::new(self.order[0], 0)
    }

    pub fn end_pam(&self) -> EditPaM {
        let last = self.order[self.order.len() - 1];
        let len = self.nodes.get(&last).map_or(0, ContentNode::len);
        EditPaM::new(last, len)
    }

    /// Moves the paragraphs `[start, end]` so they begin before old position
    /// `dest`. `dest` inside the moved range is a no-op.
    pub fn move_paragraphs(&mut self, start: usize, end: usize, dest: usize) -> bool {
        if start > end || end >= self.order.len() || dest > self.order.len() {
            return false;
        }
        if dest >= start && dest <= end + 1 {
            return false;
        }
        let moved: Vec<NodeId> = self.order.drain(start..=end).collect();
        let insert_at = if dest > end { dest - moved.len() } else { dest };
        for (i, id) in moved.into_iter().enumerate() {
            self.order.insert(insert_at + i, id);
        }
        true
    }

    /// Replaces the `len` paragraphs at `start` with fresh nodes built from
    /// `paras`. Leaves one empty paragraph if the document would be empty.
    pub fn splice(&mut self, start: usize, len: usize, paras: Vec<ParagraphData>) {
        let start = start.min(self.order.len());
        let end = (start + len).min(self.order.len());
        for id in self.order.drain(start..end) {
            self.nodes.remove(&id);
        }
        for (i, p) in paras.into_iter().enumerate() {
            let id = self.alloc(ContentNode::from_data(p));
            self.order.insert(start + i, id);
        }
        if self.order.is_empty() {
            self.push(ContentNode::new(""));
        }
    }

    /// Snapshots of `len` paragraphs from `start`.
    pub fn data_range(&self, start: usize, len: usize) -> Vec<ParagraphData> {
        self.order
            .iter()
            .skip(start)
            .take(len)
            .filter_map(|id| self.nodes.get(id))
            .map(ContentNode::to_data)
            .collect()
    }

    pub fn data(&self) -> Vec<ParagraphData> {
        self.iter().map(ContentNode::to_data).collect()
    }
}
