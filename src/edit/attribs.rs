//! Attribute identifiers, values and item sets.
//!
//! Identifiers form one inclusive, ordered range: paragraph items first, then
//! character items, then the field feature. Operations that clear "all
//! attributes" walk this range.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lingu::LanguageType;

/// Attribute identifier. The declaration order is the iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttribId {
    ParaAdjust,
    ParaLeftMargin,
    ParaRightMargin,
    ParaLineSpacing,
    CharColor,
    CharFontName,
    CharFontHeight,
    CharFontHeightCjk,
    CharFontHeightCtl,
    CharWeight,
    CharItalic,
    CharUnderline,
    CharStrikeout,
    CharLanguage,
    CharLanguageCjk,
    CharLanguageCtl,
    FeatureField,
}

impl AttribId {
    /// Every identifier, first to last.
    pub const ALL: [AttribId; 17] = [
        AttribId::ParaAdjust,
        AttribId::ParaLeftMargin,
        AttribId::ParaRightMargin,
        AttribId::ParaLineSpacing,
        AttribId::CharColor,
        AttribId::CharFontName,
        AttribId::CharFontHeight,
        AttribId::CharFontHeightCjk,
        AttribId::CharFontHeightCtl,
        AttribId::CharWeight,
        AttribId::CharItalic,
        AttribId::CharUnderline,
        AttribId::CharStrikeout,
        AttribId::CharLanguage,
        AttribId::CharLanguageCjk,
        AttribId::CharLanguageCtl,
        AttribId::FeatureField,
    ];

    /// The three font height items, Western first.
    pub const FONT_HEIGHTS: [AttribId; 3] = [
        AttribId::CharFontHeight,
        AttribId::CharFontHeightCjk,
        AttribId::CharFontHeightCtl,
    ];

    pub fn is_para(self) -> bool {
        self <= AttribId::ParaLineSpacing
    }

    pub fn is_char(self) -> bool {
        self >= AttribId::CharColor && self <= AttribId::CharLanguageCtl
    }

    pub fn is_feature(self) -> bool {
        self == AttribId::FeatureField
    }

    /// Language items are kept by "remove attributes, keep languages".
    pub fn is_language(self) -> bool {
        matches!(
            self,
            AttribId::CharLanguage | AttribId::CharLanguageCjk | AttribId::CharLanguageCtl
        )
    }
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjust {
    Left,
    Right,
    Center,
    Block,
}

/// Kind of a field and the data needed to expand it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A URL with its representation.
    Url { url: String, representation: String },
    /// Page number; expanded from the engine's current page.
    PageNumber,
    /// Page count.
    PageCount,
    /// Document title.
    Title,
    /// Fixed text.
    Text(String),
}

/// A field occupying one placeholder character in its paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldData {
    pub kind: FieldKind,
}

impl FieldData {
    pub fn new(kind: FieldKind) -> Self {
        Self { kind }
    }

    pub fn url(url: impl Into<String>, representation: impl Into<String>) -> Self {
        Self::new(FieldKind::Url {
            url: url.into(),
            representation: representation.into(),
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FieldKind::Text(text.into()))
    }
}

/// Value of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttribValue {
    Adjust(Adjust),
    Int(i32),
    Bool(bool),
    Color(u32),
    FontName(String),
    /// Font height in the pool's map unit.
    Height(u32),
    Language(LanguageType),
    Field(FieldData),
}

impl AttribValue {
    pub fn as_height(&self) -> Option<u32> {
        match self {
            AttribValue::Height(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_language(&self) -> Option<LanguageType> {
        match self {
            AttribValue::Language(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldData> {
        match self {
            AttribValue::Field(f) => Some(f),
            _ => None,
        }
    }
}

/// Map unit of font heights stored in item sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapUnit {
    /// 1/20 point.
    #[default]
    Twip,
    /// 1/100 millimetre.
    Mm100,
    /// 1/10 point.
    TenthPoint,
}

impl MapUnit {
    /// Converts `value` in this unit to tenths of a point, rounding to nearest.
    pub fn to_tenth_points(self, value: i64) -> i64 {
        match self {
            MapUnit::Twip => div_round(value, 2),
            MapUnit::Mm100 => div_round(value * 720, 2540),
            MapUnit::TenthPoint => value,
        }
    }

    /// Converts tenths of a point to this unit, rounding to nearest.
    pub fn from_tenth_points(self, value: i64) -> i64 {
        match self {
            MapUnit::Twip => value * 2,
            MapUnit::Mm100 => div_round(value * 2540, 720),
            MapUnit::TenthPoint => value,
        }
    }
}

fn div_round(n: i64, d: i64) -> i64 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        (n - d / 2) / d
    }
}

/// An ordered set of attribute values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSet {
    items: BTreeMap<AttribId, AttribValue>,
    #[serde(default)]
    metric: MapUnit,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metric(metric: MapUnit) -> Self {
        Self {
            items: BTreeMap::new(),
            metric,
        }
    }

    pub fn metric(&self) -> MapUnit {
        self.metric
    }

    pub fn put(&mut self, which: AttribId, value: AttribValue) {
        self.items.insert(which, value);
    }

    pub fn get(&self, which: AttribId) -> Option<&AttribValue> {
        self.items.get(&which)
    }

    pub fn remove(&mut self, which: AttribId) -> Option<AttribValue> {
        self.items.remove(&which)
    }

    pub fn contains(&self, which: AttribId) -> bool {
        self.items.contains_key(&which)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttribId, &AttribValue)> {
        self.items.iter().map(|(k, v)| (*k, v))
    }

    /// Copies every item of `other` into this set.
    pub fn merge(&mut self, other: &ItemSet) {
        for (k, v) in other.iter() {
            self.items.insert(k, v.clone());
        }
    }

    pub fn retain(&mut self, mut f: impl FnMut(AttribId) -> bool) {
        self.items.retain(|k, _| f(*k));
    }

    pub fn height(&self, which: AttribId) -> Option<u32> {
        self.get(which).and_then(AttribValue::as_height)
    }

    pub fn language(&self, which: AttribId) -> Option<LanguageType> {
        self.get(which).and_then(AttribValue::as_language)
    }
}

/// A character attribute covering `[start, end)` of a paragraph.
///
/// Fields are features: they cover exactly their placeholder character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharAttrib {
    pub which: AttribId,
    pub value: AttribValue,
    pub start: usize,
    pub end: usize,
}

impl CharAttrib {
    pub fn new(which: AttribId, value: AttribValue, start: usize, end: usize) -> Self {
        Self {
            which,
            value,
            start,
            end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True when the attribute applies to the character at `index`.
    pub fn covers(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

/// Character attributes of one paragraph, kept sorted by start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharAttribList {
    attribs: Vec<CharAttrib>,
}

impl CharAttribList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribs(&self) -> &[CharAttrib] {
        &self.attribs
    }

    pub fn is_empty(&self) -> bool {
        self.attribs.is_empty()
    }

    fn sort(&mut self) {
        self.attribs.sort_by_key(|a| (a.start, a.end, a.which));
    }

    /// Inserts an attribute, replacing what `which` covered in its range.
    pub fn insert(&mut self, attrib: CharAttrib) {
        if attrib.is_empty() {
            return;
        }
        if !attrib.which.is_feature() {
            self.remove_range(Some(attrib.which), attrib.start, attrib.end);
        }
        self.attribs.push(attrib);
        self.merge_neighbours();
        self.sort();
    }

    /// Removes `which` (or every non-feature attribute when `None`) from
    /// `[start, end)`, splitting attributes that straddle the range.
    pub fn remove_range(&mut self, which: Option<AttribId>, start: usize, end: usize) -> bool {
        let mut changed = false;
        let mut kept = Vec::with_capacity(self.attribs.len());
        for a in self.attribs.drain(..) {
            let matches = match which {
                Some(w) => a.which == w,
                None => !a.which.is_feature(),
            };
            if !matches || a.end <= start || a.start >= end {
                kept.push(a);
                continue;
            }
            changed = true;
            if a.start < start {
                kept.push(CharAttrib::new(a.which, a.value.clone(), a.start, start));
            }
            if a.end > end {
                kept.push(CharAttrib::new(a.which, a.value, end, a.end));
            }
        }
        self.attribs = kept;
        self.sort();
        changed
    }

    /// Removes every attribute with this id.
    pub fn remove_all(&mut self, which: AttribId) -> bool {
        let before = self.attribs.len();
        self.attribs.retain(|a| a.which != which);
        before != self.attribs.len()
    }

    /// Adjusts for `len` characters inserted at `index`. Attributes ending at
    /// the insertion point grow; features at or after it move.
    pub fn expand(&mut self, index: usize, len: usize) {
        for a in &mut self.attribs {
            if a.which.is_feature() {
                if a.start >= index {
                    a.start += len;
                    a.end += len;
                }
            } else if a.start > index || (a.start == index && index > 0) {
                a.start += len;
                a.end += len;
            } else if a.end >= index {
                a.end += len;
            }
        }
        self.sort();
    }

    /// Adjusts for characters `[index, index + len)` being deleted.
    pub fn collapse(&mut self, index: usize, len: usize) {
        let del_end = index + len;
        self.attribs.retain(|a| !(a.which.is_feature() && a.start >= index && a.start < del_end));
        for a in &mut self.attribs {
            a.start = shrink_pos(a.start, index, del_end);
            a.end = shrink_pos(a.end, index, del_end);
        }
        self.attribs.retain(|a| !a.is_empty());
        self.merge_neighbours();
        self.sort();
    }

    /// Splits off the attributes from `index` on, rebased to zero.
    pub fn split_off(&mut self, index: usize) -> CharAttribList {
        let mut tail = Vec::new();
        let mut head = Vec::new();
        for a in self.attribs.drain(..) {
            if a.start >= index {
                tail.push(CharAttrib::new(a.which, a.value, a.start - index, a.end - index));
            } else if a.end > index {
                tail.push(CharAttrib::new(a.which, a.value.clone(), 0, a.end - index));
                head.push(CharAttrib::new(a.which, a.value, a.start, index));
            } else {
                head.push(a);
            }
        }
        self.attribs = head;
        let mut tail = CharAttribList { attribs: tail };
        tail.sort();
        tail
    }

    /// Appends `other`, shifted by `offset`.
    pub fn append(&mut self, other: CharAttribList, offset: usize) {
        for mut a in other.attribs {
            a.start += offset;
            a.end += offset;
            self.attribs.push(a);
        }
        self.merge_neighbours();
        self.sort();
    }

    /// Attributes clipped to `[start, end)` and rebased to `start`.
    pub fn slice(&self, start: usize, end: usize) -> CharAttribList {
        let mut attribs = Vec::new();
        for a in &self.attribs {
            if a.end <= start || a.start >= end {
                continue;
            }
            attribs.push(CharAttrib::new(
                a.which,
                a.value.clone(),
                a.start.max(start) - start,
                a.end.min(end) - start,
            ));
        }
        CharAttribList { attribs }
    }

    /// Value of `which` applying to the character at `index`.
    pub fn value_at(&self, which: AttribId, index: usize) -> Option<&AttribValue> {
        self.attribs
            .iter()
            .rev()
            .find(|a| a.which == which && a.covers(index))
            .map(|a| &a.value)
    }

    /// Field whose placeholder sits at `index`.
    pub fn field_at(&self, index: usize) -> Option<&FieldData> {
        self.attribs
            .iter()
            .rev()
            .find(|a| a.which.is_feature() && a.start == index)
            .and_then(|a| a.value.as_field())
    }

    /// Fields in position order.
    pub fn fields(&self) -> impl Iterator<Item = (usize, &FieldData)> {
        self.attribs
            .iter()
            .filter(|a| a.which.is_feature())
            .filter_map(|a| a.value.as_field().map(|f| (a.start, f)))
    }

    /// Joins touching attributes of the same id and value.
    fn merge_neighbours(&mut self) {
        self.sort();
        let mut merged: Vec<CharAttrib> = Vec::with_capacity(self.attribs.len());
        for a in self.attribs.drain(..) {
            if !a.which.is_feature() {
                if let Some(prev) = merged
                    .iter_mut()
                    .rev()
                    .find(|p| p.which == a.which && p.end == a.start)
                {
                    if prev.value == a.value {
                        prev.end = a.end;
                        continue;
                    }
                }
            }
            merged.push(a);
        }
        self.attribs = merged;
    }
}

fn shrink_pos(pos: usize, del_start: usize, del_end: usize) -> usize {
    if pos <= del_start {
        pos
    } else if pos >= del_end {
        pos - (del_end - del_start)
    } else {
        del_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold(start: usize, end: usize) -> CharAttrib {
        CharAttrib::new(AttribId::CharWeight, AttribValue::Int(700), start, end)
    }

    #[test]
    fn test_id_ranges() {
        assert!(AttribId::ParaAdjust.is_para());
        assert!(AttribId::CharWeight.is_char());
        assert!(!AttribId::FeatureField.is_char());
        assert!(AttribId::CharLanguageCjk.is_language());
        assert!(!AttribId::CharFontHeight.is_language());
        assert_eq!(AttribId::ALL.len(), 17);
        assert!(AttribId::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_insert_replaces_overlap() {
        let mut list = CharAttribList::new();
        list.insert(bold(0, 10));
        list.insert(CharAttrib::new(AttribId::CharWeight, AttribValue::Int(400), 3, 5));
        let ranges: Vec<_> = list.attribs().iter().map(|a| (a.start, a.end)).collect();
        assert_eq!(ranges, vec![(0, 3), (3, 5), (5, 10)]);
    }

    #[test]
    fn test_insert_merges_equal_neighbours() {
        let mut list = CharAttribList::new();
        list.insert(bold(0, 3));
        list.insert(bold(3, 6));
        assert_eq!(list.attribs().len(), 1);
        assert_eq!(list.attribs()[0].end, 6);
    }

    #[test]
    fn test_expand_grows_attrib_at_end() {
        let mut list = CharAttribList::new();
        list.insert(bold(2, 4));
        list.expand(4, 3);
        assert_eq!((list.attribs()[0].start, list.attribs()[0].end), (2, 7));
        list.expand(0, 1);
        assert_eq!((list.attribs()[0].start, list.attribs()[0].end), (3, 8));
    }

    #[test]
    fn test_collapse_drops_empty_and_fields() {
        let mut list = CharAttribList::new();
        list.insert(bold(2, 4));
        list.insert(CharAttrib::new(
            AttribId::FeatureField,
            AttribValue::Field(FieldData::text("x")),
            5,
            6,
        ));
        list.collapse(1, 5);
        assert!(list.is_empty());
    }

    #[test]
    fn test_split_and_append() {
        let mut list = CharAttribList::new();
        list.insert(bold(1, 6));
        let tail = list.split_off(4);
        assert_eq!((list.attribs()[0].start, list.attribs()[0].end), (1, 4));
        assert_eq!((tail.attribs()[0].start, tail.attribs()[0].end), (0, 2));
        list.append(tail, 4);
        assert_eq!(list.attribs().len(), 1);
        assert_eq!(list.attribs()[0].end, 6);
    }

    #[test]
    fn test_remove_range_splits() {
        let mut list = CharAttribList::new();
        list.insert(bold(0, 10));
        assert!(list.remove_range(Some(AttribId::CharWeight), 4, 6));
        let ranges: Vec<_> = list.attribs().iter().map(|a| (a.start, a.end)).collect();
        assert_eq!(ranges, vec![(0, 4), (6, 10)]);
        assert!(!list.remove_range(Some(AttribId::CharItalic), 0, 10));
    }

    #[test]
    fn test_map_unit_conversion() {
        assert_eq!(MapUnit::Twip.to_tenth_points(240), 120);
        assert_eq!(MapUnit::Twip.from_tenth_points(120), 240);
        assert_eq!(MapUnit::Mm100.to_tenth_points(423), 120);
        assert_eq!(MapUnit::TenthPoint.from_tenth_points(95), 95);
    }
}
