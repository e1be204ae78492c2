//! Document mutation primitives.
//!
//! Every primitive that touches paragraphs goes through one helper that
//! snapshots the affected paragraph range before and after, so an open undo
//! group can replay it. Positions handed in must be live; stale ones fail
//! with [`EditError::InvalidPaM`] or [`EditError::InvalidSelection`].

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use super::attribs::{AttribId, AttribValue, CharAttrib, FieldData, FieldKind, ItemSet, MapUnit};
use super::doc::{ContentNode, EditDoc, FIELD_PLACEHOLDER, NodeId, ParagraphData};
use super::pam::{ESelection, EditPaM, EditSelection};
use super::text::{self, CharType, WordType};
use super::text_object::TextObject;
use super::undo::{DEFAULT_MAX_UNDO_GROUPS, ParaRangeChange, UndoId, UndoManager};
use crate::error::{EditError, EditResult};
use crate::lingu::{LanguageType, LinguisticServices, ScriptType};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditConfig {
    /// Format dirty paragraphs after each view operation.
    pub update_layout: bool,
    pub undo_enabled: bool,
    /// Replace words from the auto-correct table when completing them.
    pub auto_correct: bool,
    pub max_undo_groups: usize,
    /// Unit of font heights in item sets.
    pub metric: MapUnit,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            update_layout: true,
            undo_enabled: true,
            auto_correct: false,
            max_undo_groups: DEFAULT_MAX_UNDO_GROUPS,
            metric: MapUnit::Twip,
        }
    }
}

/// How [`EditEngine::set_attribs`] treats a collapsed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetAttribsMode {
    /// Only the selected range.
    #[default]
    Normal,
    /// A collapsed selection inside a word applies to the whole word.
    WholeWord,
}

/// What happens to paragraph items when attributes are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveParaAttribsMode {
    RemoveAll,
    RemoveCharItems,
    RemoveNone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransliterationMode {
    Uppercase,
    Lowercase,
    TitleCase,
    SentenceCase,
    ToggleCase,
    HalfWidth,
    FullWidth,
}

impl TransliterationMode {
    pub fn apply(self, text: &str) -> String {
        match self {
            TransliterationMode::Uppercase => text.to_uppercase(),
            TransliterationMode::Lowercase => text.to_lowercase(),
            TransliterationMode::ToggleCase => text
                .chars()
                .flat_map(|c| {
                    if c.is_uppercase() {
                        c.to_lowercase().collect::<Vec<_>>()
                    } else {
                        c.to_uppercase().collect()
                    }
                })
                .collect(),
            TransliterationMode::TitleCase => {
                let mut out = String::with_capacity(text.len());
                let mut word_start = true;
                for c in text.chars() {
                    if c.is_alphanumeric() {
                        if word_start {
                            out.extend(c.to_uppercase());
                        } else {
                            out.extend(c.to_lowercase());
                        }
                        word_start = false;
                    } else {
                        out.push(c);
                        word_start = text::char_type(c) != CharType::WordChar;
                    }
                }
                out
            }
            TransliterationMode::SentenceCase => {
                let mut out = String::with_capacity(text.len());
                let mut sentence_start = true;
                for c in text.chars() {
                    if c.is_alphabetic() {
                        if sentence_start {
                            out.extend(c.to_uppercase());
                        } else {
                            out.extend(c.to_lowercase());
                        }
                        sentence_start = false;
                    } else {
                        if matches!(c, '.' | '!' | '?') {
                            sentence_start = true;
                        }
                        out.push(c);
                    }
                }
                out
            }
            TransliterationMode::HalfWidth => text
                .chars()
                .map(|c| match c {
                    '\u{3000}' => ' ',
                    '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
                    _ => c,
                })
                .collect(),
            TransliterationMode::FullWidth => text
                .chars()
                .map(|c| match c {
                    ' ' => '\u{3000}',
                    '!'..='~' => char::from_u32(c as u32 + 0xFEE0).unwrap_or(c),
                    _ => c,
                })
                .collect(),
        }
    }
}

/// A field with its location and current expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub para: usize,
    pub index: usize,
    pub field: FieldData,
    pub text: String,
}

/// Input format for [`EditEngine::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    /// Plain text; one paragraph per line.
    Text,
    /// A JSON text object.
    Native,
}

/// The document plus undo history, settings and linguistic services.
#[derive(Debug)]
pub struct EditEngine {
    doc: EditDoc,
    undo: UndoManager,
    config: EditConfig,
    lingu: LinguisticServices,
    defaults: ItemSet,
    field_texts: HashMap<NodeId, Vec<String>>,
    modified: bool,
    layout_passes: usize,
    online_spelling: bool,
    page: u32,
    page_count: u32,
    title: String,
}

impl Default for EditEngine {
    fn default() -> Self {
        Self::new(EditConfig::default(), LinguisticServices::default())
    }
}

impl EditEngine {
    pub fn new(config: EditConfig, lingu: LinguisticServices) -> Self {
        let mut defaults = ItemSet::with_metric(config.metric);
        let height = u32::try_from(config.metric.from_tenth_points(120)).unwrap_or(240);
        for which in AttribId::FONT_HEIGHTS {
            defaults.put(which, AttribValue::Height(height));
        }
        defaults.put(
            AttribId::CharLanguage,
            AttribValue::Language(lingu.settings.default_language),
        );
        defaults.put(
            AttribId::CharLanguageCjk,
            AttribValue::Language(LanguageType::CHINESE_SIMPLIFIED),
        );
        defaults.put(
            AttribId::CharLanguageCtl,
            AttribValue::Language(LanguageType::ARABIC_SAUDI_ARABIA),
        );
        let mut undo = UndoManager::new(config.max_undo_groups);
        undo.set_enabled(config.undo_enabled);
        Self {
            doc: EditDoc::new(),
            undo,
            config,
            lingu,
            defaults,
            field_texts: HashMap::new(),
            modified: false,
            layout_passes: 0,
            online_spelling: false,
            page: 1,
            page_count: 1,
            title: String::new(),
        }
    }

    pub fn doc(&self) -> &EditDoc {
        &self.doc
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn lingu(&self) -> &LinguisticServices {
        &self.lingu
    }

    pub fn set_lingu(&mut self, lingu: LinguisticServices) {
        self.lingu = lingu;
        self.invalidate_spelling();
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    /// Pool defaults used where no attribute is set.
    pub fn defaults(&self) -> &ItemSet {
        &self.defaults
    }

    pub fn set_default(&mut self, which: AttribId, value: AttribValue) {
        self.defaults.put(which, value);
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    pub fn is_auto_correct(&self) -> bool {
        self.config.auto_correct
    }

    pub fn set_auto_correct(&mut self, on: bool) {
        self.config.auto_correct = on;
    }

    pub fn paragraph_count(&self) -> usize {
        self.doc.count()
    }

    /// Paragraph text with fields expanded.
    pub fn text(&self, para: usize) -> EditResult<String> {
        let node = self.doc.get(para)?;
        Ok(node.expanded_text(0, node.len(), &|f| self.field_value(f)))
    }

    /// Paragraph text with field placeholders.
    pub fn raw_text(&self, para: usize) -> EditResult<&str> {
        Ok(self.doc.get(para)?.text())
    }

    pub fn paragraph_len(&self, para: usize) -> EditResult<usize> {
        Ok(self.doc.get(para)?.len())
    }

    /// Expanded text of the whole document, paragraphs joined by `\n`.
    pub fn full_text(&self) -> String {
        self.doc
            .iter()
            .map(|n| n.expanded_text(0, n.len(), &|f| self.field_value(f)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replaces the content. History is cleared.
    pub fn set_text(&mut self, text: &str) {
        self.set_paragraphs(TextObject::from_plain_text(text).paragraphs);
    }

    pub fn set_paragraphs(&mut self, paras: Vec<ParagraphData>) {
        self.doc.set_paragraphs(paras);
        self.undo.clear();
        self.field_texts.clear();
        self.modified = false;
        debug!(paragraphs = self.doc.count(), "content replaced");
    }

    pub fn set_paragraph_visible(&mut self, para: usize, visible: bool) -> EditResult<()> {
        self.doc.get_mut(para)?.set_visible(visible);
        Ok(())
    }

    fn para_of(&self, pam: &EditPaM) -> EditResult<usize> {
        self.doc.check_pam(pam)?;
        self.doc.pos_of(pam.node()).ok_or(EditError::InvalidPaM)
    }

    /// `(paragraph, start, end)` of every paragraph an adjusted selection touches.
    fn para_spans(&self, sel: &EditSelection) -> EditResult<Vec<(usize, usize, usize)>> {
        let start = self.para_of(&sel.min())?;
        let end = self.para_of(&sel.max())?;
        let mut spans = Vec::with_capacity(end - start + 1);
        for para in start..=end {
            let len = self.doc.get(para)?.len();
            let s = if para == start { sel.min().index() } else { 0 };
            let e = if para == end { sel.max().index() } else { len };
            spans.push((para, s, e));
        }
        Ok(spans)
    }

    /// Runs `f` on the document and records paragraphs `[start, start + len)`
    /// before and after. `f` may only insert or remove paragraphs inside
    /// that range.
    fn change<R>(
        &mut self,
        start: usize,
        len: usize,
        f: impl FnOnce(&mut EditDoc) -> EditResult<R>,
    ) -> EditResult<R> {
        let count = self.doc.count();
        let before = self
            .undo
            .is_recording()
            .then(|| self.doc.data_range(start, len));
        let out = f(&mut self.doc)?;
        let new_len = (len + self.doc.count()).saturating_sub(count);
        if let Some(before) = before {
            let after = self.doc.data_range(start, new_len);
            self.undo.record(ParaRangeChange {
                start,
                before,
                after,
            });
        }
        self.modified = true;
        Ok(out)
    }

    pub fn undo_action_start(&mut self, id: UndoId, selection: Option<ESelection>) {
        self.undo.start(id, selection);
    }

    pub fn undo_action_end(&mut self, selection: Option<ESelection>) {
        self.undo.end(selection);
    }

    pub fn has_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn has_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Reverts the latest group and returns its selection from before.
    pub fn undo(&mut self) -> Option<ESelection> {
        if self.undo.depth() > 0 {
            warn!("undo requested inside an open undo group");
            return None;
        }
        let group = self.undo.pop_undo()?;
        for change in group.changes.iter().rev() {
            self.doc
                .splice(change.start, change.after.len(), change.before.clone());
        }
        self.modified = true;
        debug!(id = ?group.id, "undo");
        Some(group.selection_before.unwrap_or_default())
    }

    /// Reapplies the latest undone group and returns its selection from after.
    pub fn redo(&mut self) -> Option<ESelection> {
        if self.undo.depth() > 0 {
            return None;
        }
        let group = self.undo.pop_redo()?;
        for change in &group.changes {
            self.doc
                .splice(change.start, change.before.len(), change.after.clone());
        }
        self.modified = true;
        debug!(id = ?group.id, "redo");
        Some(
            group
                .selection_after
                .or(group.selection_before)
                .unwrap_or_default(),
        )
    }

    pub fn is_update_layout(&self) -> bool {
        self.config.update_layout
    }

    /// Switching layout back on formats what piled up meanwhile.
    pub fn set_update_layout(&mut self, on: bool) -> bool {
        let old = self.config.update_layout;
        self.config.update_layout = on;
        if on && !old {
            self.format_and_layout();
        }
        old
    }

    /// Number of layout passes that formatted something.
    pub fn layout_passes(&self) -> usize {
        self.layout_passes
    }

    /// Formats dirty paragraphs; returns how many. Does nothing while
    /// layout updates are off.
    pub fn format_and_layout(&mut self) -> usize {
        if !self.config.update_layout {
            return 0;
        }
        let ids = self.doc.ids().to_vec();
        let mut formatted = 0;
        for id in ids {
            if let Some(node) = self.doc.node_mut(id)
                && node.needs_format()
            {
                node.set_needs_format(false);
                formatted += 1;
            }
        }
        if self.online_spelling
            && let Err(e) = self.do_online_spelling()
        {
            warn!("online spelling failed: {e}");
        }
        if formatted > 0 {
            self.layout_passes += 1;
            trace!(formatted, "paragraphs formatted");
        }
        formatted
    }

    /// Removes the selected range and returns the position where it began.
    pub fn delete_selection(&mut self, sel: &EditSelection) -> EditResult<EditPaM> {
        let sel = sel.adjusted(&self.doc)?;
        if !sel.has_range() {
            return Ok(sel.min());
        }
        let (min, max) = (sel.min(), sel.max());
        let start = self.para_of(&min)?;
        let end = self.para_of(&max)?;
        self.change(start, end - start + 1, |doc| {
            if start == end {
                doc.get_mut(start)?.remove(min.index(), max.index());
                return Ok(());
            }
            let mut last = doc.remove(end).ok_or(EditError::ParagraphOutOfRange(end))?;
            for _ in start + 1..end {
                doc.remove(start + 1);
            }
            last.remove(0, max.index());
            let first = doc.get_mut(start)?;
            let len = first.len();
            first.remove(min.index(), len);
            first.append(last);
            Ok(())
        })?;
        Ok(min)
    }

    fn insert_plain(&mut self, pam: EditPaM, s: &str) -> EditResult<EditPaM> {
        let para = self.para_of(&pam)?;
        if s.is_empty() {
            return Ok(pam);
        }
        self.change(para, 1, |doc| {
            doc.get_mut(para)?.insert_str(pam.index(), s);
            Ok(())
        })?;
        Ok(EditPaM::new(pam.node(), pam.index() + s.chars().count()))
    }

    /// Replaces the selection by `text`; line breaks become paragraph breaks.
    pub fn insert_text(&mut self, sel: &EditSelection, text: &str) -> EditResult<EditPaM> {
        let mut pam = self.delete_selection(sel)?;
        let text = text
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace(FIELD_PLACEHOLDER, "");
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                pam = self.insert_para_break(pam)?;
            }
            pam = self.insert_plain(pam, line)?;
        }
        Ok(pam)
    }

    /// Splits the paragraph at `pam`; returns the start of the new paragraph.
    pub fn insert_para_break(&mut self, pam: EditPaM) -> EditResult<EditPaM> {
        let para = self.para_of(&pam)?;
        let id = self.change(para, 1, |doc| {
            let tail = doc.get_mut(para)?.split_off(pam.index());
            Ok(doc.insert(para + 1, tail))
        })?;
        Ok(EditPaM::new(id, 0))
    }

    /// Replaces the selection by a field; returns the position behind it.
    pub fn insert_field(&mut self, sel: &EditSelection, field: FieldData) -> EditResult<EditPaM> {
        let pam = self.delete_selection(sel)?;
        let para = self.para_of(&pam)?;
        self.change(para, 1, |doc| {
            doc.get_mut(para)?.insert_field(pam.index(), field);
            Ok(())
        })?;
        Ok(EditPaM::new(pam.node(), pam.index() + 1))
    }

    /// Applies `set`: paragraph items to every touched paragraph, character
    /// items over the selected range.
    pub fn set_attribs(
        &mut self,
        sel: &EditSelection,
        set: &ItemSet,
        mode: SetAttribsMode,
    ) -> EditResult<()> {
        let mut sel = sel.adjusted(&self.doc)?;
        if mode == SetAttribsMode::WholeWord && !sel.has_range() {
            sel = self.select_word(&sel, WordType::DictionaryWord)?;
        }
        let spans = self.para_spans(&sel)?;
        let (first, last) = (spans[0].0, spans[spans.len() - 1].0);
        let relanguage = set.iter().any(|(w, _)| w.is_language());
        self.change(first, last - first + 1, |doc| {
            for &(para, s, e) in &spans {
                let node = doc.get_mut(para)?;
                for (which, value) in set.iter() {
                    if which.is_para() {
                        node.para_attribs_mut().put(which, value.clone());
                    } else if which.is_char() && s < e {
                        node.char_attribs_mut()
                            .insert(CharAttrib::new(which, value.clone(), s, e));
                    }
                }
                if relanguage {
                    node.wrong_list_mut().reset_invalid_range(s, e);
                }
                node.set_needs_format(true);
            }
            Ok(())
        })
    }

    /// Removes character attributes `which` (all when `None`) from the range.
    pub fn remove_char_attribs(
        &mut self,
        sel: &EditSelection,
        which: Option<AttribId>,
    ) -> EditResult<()> {
        self.remove_attribs(sel, RemoveParaAttribsMode::RemoveNone, which)
    }

    /// Removes attributes from the range and, per `mode`, from the
    /// paragraph items of the touched paragraphs. With a `which`, only that
    /// item is removed from the paragraph items.
    pub fn remove_attribs(
        &mut self,
        sel: &EditSelection,
        mode: RemoveParaAttribsMode,
        which: Option<AttribId>,
    ) -> EditResult<()> {
        let sel = sel.adjusted(&self.doc)?;
        let spans = self.para_spans(&sel)?;
        let (first, last) = (spans[0].0, spans[spans.len() - 1].0);
        self.change(first, last - first + 1, |doc| {
            for &(para, s, e) in &spans {
                let node = doc.get_mut(para)?;
                let items = node.para_attribs_mut();
                match (mode, which) {
                    (RemoveParaAttribsMode::RemoveAll, Some(w)) => {
                        items.remove(w);
                    }
                    (RemoveParaAttribsMode::RemoveAll, None) => items.retain(|_| false),
                    (RemoveParaAttribsMode::RemoveCharItems, Some(w)) => {
                        if w.is_char() {
                            items.remove(w);
                        }
                    }
                    (RemoveParaAttribsMode::RemoveCharItems, None) => {
                        items.retain(|w| !w.is_char())
                    }
                    (RemoveParaAttribsMode::RemoveNone, _) => {}
                }
                if !which.is_some_and(AttribId::is_feature) {
                    node.char_attribs_mut().remove_range(which, s, e);
                }
                node.set_needs_format(true);
            }
            Ok(())
        })
    }

    /// Removes character attributes `which` (all when `None`) from a whole
    /// paragraph. Fields are kept.
    pub fn remove_char_attribs_para(
        &mut self,
        para: usize,
        which: Option<AttribId>,
    ) -> EditResult<()> {
        if which.is_some_and(AttribId::is_feature) {
            return Ok(());
        }
        let len = self.doc.get(para)?.len();
        self.change(para, 1, |doc| {
            let node = doc.get_mut(para)?;
            node.char_attribs_mut().remove_range(which, 0, len);
            node.set_needs_format(true);
            Ok(())
        })
    }

    /// Items with one value over the whole selection. A collapsed selection
    /// reports the character left of the caret. Pool defaults fill the gaps
    /// unless `only_hard` is set.
    pub fn attribs(&self, sel: &EditSelection, only_hard: bool) -> EditResult<ItemSet> {
        let sel = sel.adjusted(&self.doc)?;
        let spans = self.para_spans(&sel)?;
        let ranged = sel.has_range();
        let mut out = ItemSet::with_metric(self.config.metric);
        for which in AttribId::ALL {
            if which.is_feature() {
                continue;
            }
            let mut seen: Option<Option<&AttribValue>> = None;
            'spans: for &(para, s, e) in &spans {
                if ranged && s == e {
                    continue;
                }
                let node = self.doc.get(para)?;
                let samples: Vec<Option<usize>> = if s < e {
                    (s..e).map(Some).collect()
                } else if node.is_empty() {
                    vec![None]
                } else {
                    vec![Some(s.saturating_sub(1).min(node.len() - 1))]
                };
                for index in samples {
                    let mut value = match index {
                        Some(i) => node.value_at(which, i),
                        None => node.para_attribs().get(which),
                    };
                    if value.is_none() && !only_hard {
                        value = self.defaults.get(which);
                    }
                    match seen {
                        None => seen = Some(value),
                        Some(prev) if prev != value => {
                            seen = Some(None);
                            break 'spans;
                        }
                        _ => {}
                    }
                }
            }
            if let Some(Some(value)) = seen {
                out.put(which, value.clone());
            }
        }
        Ok(out)
    }

    /// Selected text with fields expanded; paragraphs joined by `\n`.
    pub fn selected(&self, sel: &EditSelection) -> EditResult<String> {
        let sel = sel.adjusted(&self.doc)?;
        let mut parts = Vec::new();
        for (para, s, e) in self.para_spans(&sel)? {
            let node = self.doc.get(para)?;
            parts.push(node.expanded_text(s, e, &|f| self.field_value(f)));
        }
        Ok(parts.join("\n"))
    }

    /// Moves paragraphs `[start, end]` before old position `dest`. Returns
    /// the new index range of the moved paragraphs, `None` for a no-op.
    pub fn move_paragraphs(
        &mut self,
        start: usize,
        end: usize,
        dest: usize,
    ) -> EditResult<Option<(usize, usize)>> {
        let count = self.doc.count();
        if start > end || end >= count || dest > count || (dest >= start && dest <= end + 1) {
            return Ok(None);
        }
        let lo = start.min(dest);
        let hi = (end + 1).max(dest);
        let moved = self.change(lo, hi - lo, |doc| Ok(doc.move_paragraphs(start, end, dest)))?;
        if !moved {
            return Ok(None);
        }
        let n = end - start + 1;
        let new_start = if dest > end { dest - n } else { dest };
        debug!(start, end, dest, "paragraphs moved");
        Ok(Some((new_start, new_start + n - 1)))
    }

    /// Transliterates the range; a collapsed selection takes the word at the
    /// caret. Returns the range covering the result.
    pub fn transliterate(
        &mut self,
        sel: &EditSelection,
        mode: TransliterationMode,
    ) -> EditResult<EditSelection> {
        let mut sel = sel.adjusted(&self.doc)?;
        if !sel.has_range() {
            sel = self.select_word(&sel, WordType::DictionaryWord)?;
            if !sel.has_range() {
                return Ok(sel);
            }
        }
        let spans = self.para_spans(&sel)?;
        let (first, last) = (spans[0].0, spans[spans.len() - 1].0);
        let mut new_end = sel.max().index();
        self.change(first, last - first + 1, |doc| {
            for &(para, s, e) in &spans {
                let node = doc.get_mut(para)?;
                let old = node.chars_between(s, e);
                let new = mode.apply(&old);
                if new == old {
                    continue;
                }
                let n = new.chars().count();
                if n == e - s {
                    node.overwrite(s, &new);
                } else {
                    node.replace(s, e, &new);
                }
                if para == last {
                    new_end = s + n;
                }
            }
            Ok(())
        })?;
        Ok(EditSelection::new(
            sel.min(),
            EditPaM::new(sel.max().node(), new_end),
        ))
    }

    /// Word touching `pam`, if any.
    pub fn word_at(&self, pam: &EditPaM, word_type: WordType) -> EditResult<Option<EditSelection>> {
        let node = self.doc.check_pam(pam)?;
        let chars: Vec<char> = node.text().chars().collect();
        Ok(text::word_at(&chars, pam.index(), word_type).map(|(s, e)| {
            EditSelection::new(EditPaM::new(pam.node(), s), EditPaM::new(pam.node(), e))
        }))
    }

    /// The selection itself if it has a range, else the word at the caret.
    pub fn select_word(
        &self,
        sel: &EditSelection,
        word_type: WordType,
    ) -> EditResult<EditSelection> {
        let sel = sel.adjusted(&self.doc)?;
        if sel.has_range() {
            return Ok(sel);
        }
        Ok(self.word_at(&sel.max(), word_type)?.unwrap_or(sel))
    }

    pub fn end_of_word(&self, pam: &EditPaM) -> EditResult<EditPaM> {
        let node = self.doc.check_pam(pam)?;
        let chars: Vec<char> = node.text().chars().collect();
        Ok(EditPaM::new(pam.node(), text::end_of_word(&chars, pam.index())))
    }

    /// Replaces the word ending at the caret from the auto-correct table,
    /// then inserts `insert` if given. Returns the new caret.
    pub fn auto_correct(&mut self, sel: &EditSelection, insert: Option<char>) -> EditResult<EditPaM> {
        let mut pam = self.delete_selection(sel)?;
        if let Some(table) = self.lingu.auto_correct.clone() {
            let para = self.para_of(&pam)?;
            let chars: Vec<char> = self.doc.get(para)?.text().chars().collect();
            if let Some((s, e)) = text::word_at(&chars, pam.index(), WordType::DictionaryWord)
                && e == pam.index()
            {
                let word: String = chars[s..e].iter().collect();
                let language = self.language_at(&pam)?;
                if let Some(right) = table.lookup(&word, language)
                    && right != word
                {
                    self.change(para, 1, |doc| {
                        doc.get_mut(para)?.replace(s, e, &right);
                        Ok(())
                    })?;
                    trace!(%word, %right, "auto-corrected");
                    pam = EditPaM::new(pam.node(), s + right.chars().count());
                }
            }
        }
        if let Some(c) = insert {
            pam = self.insert_plain(pam, &c.to_string())?;
        }
        Ok(pam)
    }

    pub fn set_page_info(&mut self, page: u32, page_count: u32) {
        self.page = page;
        self.page_count = page_count;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Current expansion of a field.
    pub fn field_value(&self, field: &FieldData) -> String {
        match &field.kind {
            FieldKind::Url {
                url,
                representation,
            } => {
                if representation.is_empty() {
                    url.clone()
                } else {
                    representation.clone()
                }
            }
            FieldKind::PageNumber => self.page.to_string(),
            FieldKind::PageCount => self.page_count.to_string(),
            FieldKind::Title => self.title.clone(),
            FieldKind::Text(t) => t.clone(),
        }
    }

    pub fn field_count(&self, para: usize) -> EditResult<usize> {
        Ok(self.doc.get(para)?.char_attribs().fields().count())
    }

    pub fn field_info(&self, para: usize) -> EditResult<Vec<FieldInfo>> {
        Ok(self
            .doc
            .get(para)?
            .char_attribs()
            .fields()
            .map(|(index, field)| FieldInfo {
                para,
                index,
                field: field.clone(),
                text: self.field_value(field),
            })
            .collect())
    }

    /// Field whose placeholder is at `pam`.
    pub fn field_at(&self, pam: &EditPaM) -> EditResult<Option<FieldData>> {
        let node = self.doc.check_pam(pam)?;
        Ok(node.char_attribs().field_at(pam.index()).cloned())
    }

    /// Recomputes field expansions; paragraphs whose fields changed are
    /// marked for formatting. True if anything changed.
    pub fn update_fields(&mut self) -> bool {
        let mut fresh = HashMap::new();
        let mut changed = Vec::new();
        for &id in self.doc.ids() {
            let Some(node) = self.doc.node(id) else {
                continue;
            };
            let texts: Vec<String> = node
                .char_attribs()
                .fields()
                .map(|(_, f)| self.field_value(f))
                .collect();
            if texts.is_empty() {
                continue;
            }
            if self.field_texts.get(&id) != Some(&texts) {
                changed.push(id);
            }
            fresh.insert(id, texts);
        }
        self.field_texts = fresh;
        for id in &changed {
            if let Some(node) = self.doc.node_mut(*id) {
                node.set_needs_format(true);
            }
        }
        !changed.is_empty()
    }

    /// Extra length fields add up to position `pos` of paragraph `para`.
    ///
    /// Fields of all paragraphs up to `para` count, in `para` only those
    /// before `pos`. Each field contributes its expanded length minus its
    /// placeholder. Without `can_overflow`, a field reaching past `pos`
    /// counts only up to `pos`.
    pub fn count_fields_offset_sum(&self, para: usize, pos: usize, can_overflow: bool) -> i64 {
        let mut offset = 0i64;
        for (n, node) in self.doc.iter().enumerate().take(para + 1) {
            for (fpos, field) in node.char_attribs().fields() {
                if n == para && fpos >= pos {
                    break;
                }
                let mut len = self.field_value(field).chars().count();
                if !can_overflow && n == para && fpos + len > pos {
                    len = pos - fpos;
                }
                offset += len as i64 - 1;
            }
        }
        offset
    }

    /// Position in the expanded text mapped back to one with placeholders.
    pub fn pos_no_field(&self, para: usize, pos: usize) -> usize {
        let offset = self.count_fields_offset_sum(para, pos, false);
        usize::try_from(pos as i64 - offset).unwrap_or(0)
    }

    /// Position with placeholders mapped to one in the expanded text.
    pub fn pos_with_field(&self, para: usize, pos: usize) -> usize {
        let offset = self.count_fields_offset_sum(para, pos, true);
        usize::try_from(pos as i64 + offset).unwrap_or(0)
    }

    /// Language at `pam`, read from the character left of it in the
    /// attribute matching its script.
    pub fn language_at(&self, pam: &EditPaM) -> EditResult<LanguageType> {
        let node = self.doc.check_pam(pam)?;
        Ok(self.language_in(node, pam.index()))
    }

    fn language_in(&self, node: &ContentNode, index: usize) -> LanguageType {
        let sample = index.saturating_sub(1);
        let script = node
            .char_at(sample)
            .map_or(ScriptType::LATIN, ScriptType::of_char);
        let which = script_language_id(script);
        let settings = &self.lingu.settings;
        let language = node
            .value_at(which, sample)
            .or_else(|| self.defaults.get(which))
            .and_then(AttribValue::as_language)
            .unwrap_or(settings.default_language);
        if language == LanguageType::SYSTEM {
            settings.locale
        } else {
            language
        }
    }

    /// Scripts used in the selection; the script left of the caret when
    /// collapsed.
    pub fn script_type(&self, sel: &EditSelection) -> EditResult<ScriptType> {
        let sel = sel.adjusted(&self.doc)?;
        if !sel.has_range() {
            let node = self.doc.check_pam(&sel.max())?;
            return Ok(node
                .char_at(sel.max().index().saturating_sub(1))
                .map_or(ScriptType::LATIN, ScriptType::of_char));
        }
        let mut script = ScriptType::NONE;
        for (para, s, e) in self.para_spans(&sel)? {
            script = script | ScriptType::of_text(&self.doc.get(para)?.chars_between(s, e));
        }
        Ok(if script.is_empty() {
            ScriptType::LATIN
        } else {
            script
        })
    }

    pub fn is_online_spelling(&self) -> bool {
        self.online_spelling
    }

    pub fn set_online_spelling(&mut self, on: bool) {
        self.online_spelling = on;
        if on {
            self.invalidate_spelling();
        } else {
            let ids = self.doc.ids().to_vec();
            for id in ids {
                if let Some(node) = self.doc.node_mut(id) {
                    node.wrong_list_mut().clear();
                }
            }
        }
    }

    /// Marks every paragraph for re-checking.
    pub fn invalidate_spelling(&mut self) {
        let ids = self.doc.ids().to_vec();
        for id in ids {
            if let Some(node) = self.doc.node_mut(id) {
                let len = node.len();
                node.wrong_list_mut().reset_invalid_range(0, len);
            }
        }
    }

    /// Marks `[start, end)` of a paragraph for re-checking.
    pub fn reset_wrong_list(&mut self, para: usize, start: usize, end: usize) -> EditResult<()> {
        self.doc
            .get_mut(para)?
            .wrong_list_mut()
            .reset_invalid_range(start, end);
        Ok(())
    }

    /// Re-checks every word of a paragraph; returns the misspelled count.
    pub fn spell_paragraph(&mut self, para: usize) -> EditResult<usize> {
        let node = self.doc.get(para)?;
        let chars: Vec<char> = node.text().chars().collect();
        let mut wrong = Vec::new();
        for (s, e) in text::words(&chars) {
            let word: String = chars[s..e].iter().collect();
            if word.chars().all(|c| !c.is_alphabetic()) {
                continue;
            }
            let language = self.language_in(node, s + 1);
            if !self.lingu.is_word_valid(&word, language) {
                wrong.push((s, e));
            }
        }
        let count = wrong.len();
        let list = self.doc.get_mut(para)?.wrong_list_mut();
        list.clear();
        for (s, e) in wrong {
            list.push(s, e);
        }
        list.set_valid();
        trace!(para, count, "paragraph spelled");
        Ok(count)
    }

    /// Spells every paragraph with pending changes.
    pub fn do_online_spelling(&mut self) -> EditResult<usize> {
        let mut wrong = 0;
        for para in 0..self.doc.count() {
            if self.doc.get(para)?.wrong_list().is_invalid() {
                wrong += self.spell_paragraph(para)?;
            }
        }
        Ok(wrong)
    }

    /// The misspelled word at `pam`, spelling its paragraph first if needed.
    pub fn wrong_spelled_word(&mut self, pam: &EditPaM) -> EditResult<Option<EditSelection>> {
        let para = self.para_of(pam)?;
        if self.doc.get(para)?.wrong_list().is_invalid() {
            self.spell_paragraph(para)?;
        }
        if self.doc.get(para)?.wrong_list().find(pam.index()).is_none() {
            return Ok(None);
        }
        let sel = self.select_word(&EditSelection::collapsed(*pam), WordType::DictionaryWord)?;
        Ok(sel.has_range().then_some(sel))
    }

    /// Copy of the selected range.
    pub fn create_text_object(&self, sel: &EditSelection) -> EditResult<TextObject> {
        let sel = sel.adjusted(&self.doc)?;
        let mut paras = Vec::new();
        for (para, s, e) in self.para_spans(&sel)? {
            paras.push(self.doc.get(para)?.slice_data(s, e));
        }
        Ok(TextObject::new(paras))
    }

    /// Replaces the selection by `obj`; returns the position behind it.
    pub fn insert_text_object(
        &mut self,
        sel: &EditSelection,
        obj: &TextObject,
    ) -> EditResult<EditPaM> {
        let pam = self.delete_selection(sel)?;
        let Some((first, rest)) = obj.paragraphs.split_first() else {
            return Ok(pam);
        };
        let para = self.para_of(&pam)?;
        let node_id = pam.node();
        self.change(para, 1, |doc| {
            let node = doc.get_mut(para)?;
            let tail = node.split_off(pam.index());
            node.append(ContentNode::from_data(first.clone()));
            let Some((last, middle)) = rest.split_last() else {
                let end = node.len();
                node.append(tail);
                return Ok(EditPaM::new(node_id, end));
            };
            for (i, p) in middle.iter().enumerate() {
                doc.insert(para + 1 + i, ContentNode::from_data(p.clone()));
            }
            let mut last_node = ContentNode::from_data(last.clone());
            let end = last_node.len();
            last_node.append(tail);
            let id = doc.insert(para + 1 + middle.len(), last_node);
            Ok(EditPaM::new(id, end))
        })
    }

    /// Inserts `input` in place of the selection.
    pub fn read(
        &mut self,
        sel: &EditSelection,
        input: &str,
        format: ReadFormat,
    ) -> EditResult<EditPaM> {
        let obj = match format {
            ReadFormat::Text => TextObject::from_plain_text(input),
            ReadFormat::Native => TextObject::from_json(input)?,
        };
        debug!(paragraphs = obj.paragraph_count(), ?format, "read");
        self.insert_text_object(sel, &obj)
    }

    /// Next occurrence of `search` at or after `from`, inside one paragraph.
    pub fn find(
        &self,
        from: &EditPaM,
        search: &str,
        match_case: bool,
    ) -> EditResult<Option<EditSelection>> {
        if search.is_empty() {
            return Ok(None);
        }
        let fold = |c: char| {
            if match_case {
                c
            } else {
                c.to_lowercase().next().unwrap_or(c)
            }
        };
        let needle: Vec<char> = search.chars().map(fold).collect();
        let start_para = self.para_of(from)?;
        for para in start_para..self.doc.count() {
            let node = self.doc.get(para)?;
            let hay: Vec<char> = node.text().chars().map(fold).collect();
            let begin = if para == start_para { from.index() } else { 0 };
            if hay.len() < needle.len() {
                continue;
            }
            let hit = (begin..=hay.len() - needle.len())
                .find(|&i| hay[i..i + needle.len()] == needle[..]);
            if let Some(i) = hit
                && let Some(id) = self.doc.id_at(para)
            {
                return Ok(Some(EditSelection::new(
                    EditPaM::new(id, i),
                    EditPaM::new(id, i + needle.len()),
                )));
            }
        }
        Ok(None)
    }
}

/// Language attribute matching a script.
pub fn script_language_id(script: ScriptType) -> AttribId {
    if script == ScriptType::ASIAN {
        AttribId::CharLanguageCjk
    } else if script == ScriptType::COMPLEX {
        AttribId::CharLanguageCtl
    } else {
        AttribId::CharLanguage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(text: &str) -> EditEngine {
        let mut engine = EditEngine::default();
        engine.set_text(text);
        engine
    }

    fn sel(engine: &EditEngine, sp: usize, si: usize, ep: usize, ei: usize) -> EditSelection {
        engine
            .doc()
            .convert_selection(&ESelection::new(sp, si, ep, ei))
    }

    #[test]
    fn test_delete_across_paragraphs() {
        let mut e = engine("hello\nbig\nworld");
        let s = sel(&e, 0, 2, 2, 3);
        let pam = e.delete_selection(&s).unwrap();
        assert_eq!(e.full_text(), "held");
        assert_eq!(pam.index(), 2);
    }

    #[test]
    fn test_insert_text_with_breaks() {
        let mut e = engine("ab");
        let s = sel(&e, 0, 1, 0, 1);
        let pam = e.insert_text(&s, "x\ny\r\nz").unwrap();
        assert_eq!(e.full_text(), "ax\ny\nzb");
        assert_eq!(e.doc().epam(&pam).unwrap(), (2, 1));
    }

    #[test]
    fn test_undo_redo_group() {
        let mut e = engine("0123456789");
        e.undo_action_start(UndoId::Insert, Some(ESelection::new(0, 0, 0, 5)));
        let s = sel(&e, 0, 0, 0, 5);
        e.insert_text(&s, "XY").unwrap();
        e.undo_action_end(Some(ESelection::new(0, 0, 0, 2)));
        assert_eq!(e.full_text(), "XY56789");
        assert_eq!(e.undo(), Some(ESelection::new(0, 0, 0, 5)));
        assert_eq!(e.full_text(), "0123456789");
        assert_eq!(e.redo(), Some(ESelection::new(0, 0, 0, 2)));
        assert_eq!(e.full_text(), "XY56789");
    }

    #[test]
    fn test_undo_para_break() {
        let mut e = engine("onetwo");
        e.undo_action_start(UndoId::ParaBreak, None);
        let pam = e.doc().convert_pam(0, 3);
        e.insert_para_break(pam).unwrap();
        e.undo_action_end(None);
        assert_eq!(e.paragraph_count(), 2);
        e.undo();
        assert_eq!(e.paragraph_count(), 1);
        assert_eq!(e.full_text(), "onetwo");
    }

    #[test]
    fn test_attribs_uniform_only() {
        let mut e = engine("abcdef");
        let mut set = ItemSet::new();
        set.put(AttribId::CharWeight, AttribValue::Int(700));
        e.set_attribs(&sel(&e, 0, 0, 0, 3), &set, SetAttribsMode::Normal)
            .unwrap();
        let bold = e.attribs(&sel(&e, 0, 0, 0, 3), true).unwrap();
        assert_eq!(bold.get(AttribId::CharWeight), Some(&AttribValue::Int(700)));
        let mixed = e.attribs(&sel(&e, 0, 1, 0, 5), true).unwrap();
        assert!(!mixed.contains(AttribId::CharWeight));
        let defaults = e.attribs(&sel(&e, 0, 4, 0, 4), false).unwrap();
        assert_eq!(defaults.height(AttribId::CharFontHeight), Some(240));
    }

    #[test]
    fn test_whole_word_mode() {
        let mut e = engine("one two");
        let mut set = ItemSet::new();
        set.put(AttribId::CharItalic, AttribValue::Bool(true));
        e.set_attribs(&sel(&e, 0, 5, 0, 5), &set, SetAttribsMode::WholeWord)
            .unwrap();
        let attrib = &e.doc().get(0).unwrap().char_attribs().attribs()[0];
        assert_eq!((attrib.start, attrib.end), (4, 7));
    }

    #[test]
    fn test_remove_attribs_modes() {
        let mut e = engine("abc");
        let mut set = ItemSet::new();
        set.put(AttribId::ParaLeftMargin, AttribValue::Int(100));
        set.put(AttribId::CharWeight, AttribValue::Int(700));
        let all = sel(&e, 0, 0, 0, 3);
        e.set_attribs(&all, &set, SetAttribsMode::Normal).unwrap();
        e.remove_attribs(&all, RemoveParaAttribsMode::RemoveCharItems, None)
            .unwrap();
        let node = e.doc().get(0).unwrap();
        assert!(node.char_attribs().is_empty());
        assert!(node.para_attribs().contains(AttribId::ParaLeftMargin));
        e.remove_attribs(&all, RemoveParaAttribsMode::RemoveAll, None)
            .unwrap();
        assert!(e.doc().get(0).unwrap().para_attribs().is_empty());
    }

    #[test]
    fn test_move_paragraphs_undo() {
        let mut e = engine("a\nb\nc");
        e.undo_action_start(UndoId::MoveParas, None);
        assert_eq!(e.move_paragraphs(0, 0, 3).unwrap(), Some((2, 2)));
        e.undo_action_end(None);
        assert_eq!(e.full_text(), "b\nc\na");
        assert_eq!(e.move_paragraphs(1, 1, 1).unwrap(), None);
        e.undo();
        assert_eq!(e.full_text(), "a\nb\nc");
    }

    #[test]
    fn test_transliterate_modes() {
        assert_eq!(TransliterationMode::TitleCase.apply("it's a WELL-known fact"), "It's A Well-Known Fact");
        assert_eq!(TransliterationMode::SentenceCase.apply("hello WORLD. bye"), "Hello world. Bye");
        assert_eq!(TransliterationMode::ToggleCase.apply("aB"), "Ab");
        assert_eq!(TransliterationMode::FullWidth.apply("A 1"), "Ａ\u{3000}１");
        assert_eq!(TransliterationMode::HalfWidth.apply("Ａ\u{3000}１"), "A 1");
    }

    #[test]
    fn test_transliterate_length_change() {
        let mut e = engine("straße x");
        let s = sel(&e, 0, 0, 0, 6);
        let out = e.transliterate(&s, TransliterationMode::Uppercase).unwrap();
        assert_eq!(e.full_text(), "STRASSE x");
        assert_eq!(out.max().index(), 7);
    }

    #[test]
    fn test_fields_offsets() {
        let mut e = engine("ab");
        let s = sel(&e, 0, 1, 0, 1);
        e.insert_field(&s, FieldData::text("XYZ")).unwrap();
        assert_eq!(e.text(0).unwrap(), "aXYZb");
        assert_eq!(e.field_count(0).unwrap(), 1);
        assert_eq!(e.count_fields_offset_sum(0, 3, true), 2);
        assert_eq!(e.pos_with_field(0, 2), 4);
        assert_eq!(e.pos_no_field(0, 4), 2);
        assert_eq!(e.count_fields_offset_sum(0, 1, true), 0);
        assert!(e.update_fields());
        assert!(!e.update_fields());
    }

    #[test]
    fn test_page_field_updates() {
        let mut e = engine("");
        let s = sel(&e, 0, 0, 0, 0);
        e.insert_field(&s, FieldData::new(FieldKind::PageNumber)).unwrap();
        e.update_fields();
        e.set_page_info(7, 9);
        assert!(e.update_fields());
        assert_eq!(e.text(0).unwrap(), "7");
    }

    #[test]
    fn test_read_native_and_find() {
        let mut e = engine("start end");
        let obj = TextObject::from_plain_text("one\ntwo");
        let s = sel(&e, 0, 6, 0, 6);
        let pam = e
            .read(&s, &obj.to_json().unwrap(), ReadFormat::Native)
            .unwrap();
        assert_eq!(e.full_text(), "start one\ntwoend");
        assert_eq!(e.doc().epam(&pam).unwrap(), (1, 3));
        let hit = e.find(&e.doc().start_pam(), "TWO", false).unwrap().unwrap();
        assert_eq!(e.doc().eselection(&hit).unwrap(), ESelection::new(1, 0, 1, 3));
        assert!(e.find(&e.doc().start_pam(), "TWO", true).unwrap().is_none());
    }

    #[test]
    fn test_layout_passes() {
        let mut e = engine("a\nb");
        assert_eq!(e.format_and_layout(), 2);
        assert_eq!(e.format_and_layout(), 0);
        e.set_update_layout(false);
        let s = sel(&e, 0, 1, 0, 1);
        e.insert_text(&s, "x").unwrap();
        assert_eq!(e.format_and_layout(), 0);
        e.set_update_layout(true);
        assert_eq!(e.layout_passes(), 2);
    }

    #[test]
    fn test_stale_selection_rejected() {
        let mut e = engine("a\nb");
        let s = sel(&e, 1, 0, 1, 1);
        e.set_text("x");
        assert!(matches!(
            e.delete_selection(&s),
            Err(EditError::InvalidSelection)
        ));
    }
}
