//! The edit view: a selection over an [`EditEngine`] and the user-level
//! operations on it.
//!
//! Mutating operations run inside an undo group, then update the selection,
//! then format. A selection that went stale is reset to the document start.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::attribs::{AttribId, AttribValue, FieldData, ItemSet};
use super::engine::{
    EditEngine, ReadFormat, RemoveParaAttribsMode, SetAttribsMode, TransliterationMode,
    script_language_id,
};
use super::font_size::{FontList, change_font_size_in_set};
use super::pam::{ESelection, EditPaM, EditSelection, TEXTPOS_ALL};
use super::text::WordType;
use super::text_object::TextObject;
use super::undo::UndoId;
use crate::error::{EditError, EditResult};
use crate::lingu::spell_popup::MAX_POPUP_SUGGESTIONS;
use crate::lingu::{
    LanguageType, PopupAction, ScriptType, SpellCallbackCommand, SpellCallbackInfo, SpellPopup,
};

/// Clipboard collaborator.
pub trait Clipboard: Send + Sync {
    fn set_contents(&self, obj: TextObject);

    fn contents(&self) -> Option<TextObject>;
}

/// Process-local clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<TextObject>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_contents(&self, obj: TextObject) {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(obj);
    }

    fn contents(&self) -> Option<TextObject> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCommand {
    Find,
    Replace,
    ReplaceAll,
}

/// A search and replace request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub search: String,
    pub replace: String,
    pub command: SearchCommand,
    pub match_case: bool,
}

impl SearchItem {
    pub fn new(command: SearchCommand, search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: String::new(),
            command,
            match_case: false,
        }
    }

    pub fn with_replace(mut self, replace: impl Into<String>) -> Self {
        self.replace = replace.into();
        self
    }

    pub fn match_case(mut self, on: bool) -> Self {
        self.match_case = on;
        self
    }
}

pub struct EditView {
    engine: EditEngine,
    selection: EditSelection,
    read_only: bool,
    insert_mode: bool,
    clipboard: Arc<dyn Clipboard>,
}

impl fmt::Debug for EditView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditView")
            .field("selection", &self.selection())
            .field("read_only", &self.read_only)
            .field("insert_mode", &self.insert_mode)
            .finish_non_exhaustive()
    }
}

impl EditView {
    /// A view with the caret at the document start.
    pub fn new(engine: EditEngine) -> Self {
        let selection = EditSelection::collapsed(engine.doc().start_pam());
        Self {
            engine,
            selection,
            read_only: false,
            insert_mode: true,
            clipboard: Arc::new(MemoryClipboard::new()),
        }
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn engine(&self) -> &EditEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EditEngine {
        &mut self.engine
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_insert_mode(&self) -> bool {
        self.insert_mode
    }

    pub fn set_insert_mode(&mut self, insert: bool) {
        self.insert_mode = insert;
    }

    fn check_writable(&self) -> EditResult<()> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        Ok(())
    }

    /// The selection, reset to the document start if it went stale.
    fn live_selection(&mut self) -> EditSelection {
        if !self.selection.is_valid(self.engine.doc()) {
            warn!("selection refers to deleted content, reset to document start");
            self.selection = EditSelection::collapsed(self.engine.doc().start_pam());
        }
        self.selection
    }

    fn eselection_of(&self, sel: &EditSelection) -> Option<ESelection> {
        self.engine.doc().eselection(sel).ok()
    }

    /// Opens an undo group carrying the current selection.
    fn begin(&mut self, id: UndoId) -> EditResult<EditSelection> {
        self.check_writable()?;
        let sel = self.live_selection();
        let before = self
            .eselection_of(&sel)
            .map(ESelection::adjusted);
        self.engine.undo_action_start(id, before);
        Ok(sel)
    }

    /// Closes the group opened by [`Self::begin`], installs the new
    /// selection and formats.
    fn finish(&mut self, result: EditResult<EditSelection>) -> EditResult<()> {
        match result {
            Ok(sel) => {
                self.selection = sel;
                let after = self.eselection_of(&sel);
                self.engine.undo_action_end(after);
                self.engine.format_and_layout();
                Ok(())
            }
            Err(e) => {
                self.engine.undo_action_end(None);
                Err(e)
            }
        }
    }

    /// Current selection as paragraph indices, anchor first.
    pub fn selection(&self) -> ESelection {
        self.eselection_of(&self.selection).unwrap_or_default()
    }

    /// Sets the selection; out of range values clamp. An end inside a hidden
    /// paragraph moves to the end of the previous visible one.
    pub fn set_selection(&mut self, sel: ESelection) {
        let doc = self.engine.doc();
        let mut new = doc.convert_selection(&sel);
        new.set_min(self.visible_pam(new.min()));
        new.set_max(self.visible_pam(new.max()));
        self.selection = new;
    }

    fn visible_pam(&self, pam: EditPaM) -> EditPaM {
        let doc = self.engine.doc();
        let Some(para) = doc.pos_of(pam.node()) else {
            return pam;
        };
        if doc.get(para).is_ok_and(|n| n.is_visible()) {
            return pam;
        }
        let target = (0..para)
            .rev()
            .find(|&p| doc.get(p).is_ok_and(|n| n.is_visible()))
            .unwrap_or(0);
        let len = doc.get(target).map_or(0, |n| n.len());
        doc.convert_pam(target, len)
    }

    pub fn has_selection(&self) -> bool {
        self.selection.has_range()
    }

    /// Selected text with fields expanded.
    pub fn selected(&mut self) -> EditResult<String> {
        let sel = self.live_selection();
        self.engine.selected(&sel)
    }

    pub fn selected_script_type(&mut self) -> EditResult<ScriptType> {
        let sel = self.live_selection();
        self.engine.script_type(&sel)
    }

    pub fn delete_selected(&mut self) -> EditResult<()> {
        self.delete_selected_as(UndoId::Delete)
    }

    fn delete_selected_as(&mut self, id: UndoId) -> EditResult<()> {
        let sel = self.begin(id)?;
        let result = self
            .engine
            .delete_selection(&sel)
            .map(EditSelection::collapsed);
        self.finish(result)
    }

    /// Replaces the selection by `text`. With `select` the inserted text
    /// ends up selected, else the caret sits behind it.
    pub fn insert_text(&mut self, text: &str, select: bool) -> EditResult<()> {
        let sel = self.begin(UndoId::Insert)?;
        let start = sel.adjusted(self.engine.doc()).map(|s| s.min());
        let result = start.and_then(|start| {
            let end = self.engine.insert_text(&sel, text)?;
            Ok(if select {
                EditSelection::new(start, end)
            } else {
                EditSelection::collapsed(end)
            })
        });
        self.finish(result)
    }

    /// Replaces the selection by a paragraph break.
    pub fn insert_para_break(&mut self) -> EditResult<bool> {
        let sel = self.begin(UndoId::ParaBreak)?;
        let result = self
            .engine
            .delete_selection(&sel)
            .and_then(|pam| self.engine.insert_para_break(pam))
            .map(EditSelection::collapsed);
        self.finish(result)?;
        Ok(true)
    }

    /// Replaces the selection by a field and refreshes field expansions.
    pub fn insert_field(&mut self, field: FieldData) -> EditResult<()> {
        let sel = self.begin(UndoId::InsertField)?;
        let result = self
            .engine
            .insert_field(&sel, field)
            .map(EditSelection::collapsed);
        self.engine.update_fields();
        self.finish(result)
    }

    /// Replaces the selection by a text object; the caret ends behind it.
    pub fn insert_text_object(&mut self, obj: &TextObject) -> EditResult<()> {
        self.insert_object_as(UndoId::Insert, obj)
    }

    fn insert_object_as(&mut self, id: UndoId, obj: &TextObject) -> EditResult<()> {
        let sel = self.begin(id)?;
        let result = self
            .engine
            .insert_text_object(&sel, obj)
            .map(EditSelection::collapsed);
        self.finish(result)
    }

    /// Copy of the selected range.
    pub fn create_text_object(&mut self) -> EditResult<TextObject> {
        let sel = self.live_selection();
        self.engine.create_text_object(&sel)
    }

    /// Inserts `input` in place of the selection.
    pub fn read(&mut self, input: &str, format: ReadFormat) -> EditResult<()> {
        let sel = self.begin(UndoId::Read)?;
        let result = self
            .engine
            .read(&sel, input, format)
            .map(EditSelection::collapsed);
        self.finish(result)
    }

    /// Copies the selection to the clipboard. Nothing without a selection.
    pub fn copy(&mut self) -> EditResult<()> {
        if !self.has_selection() {
            return Ok(());
        }
        let obj = self.create_text_object()?;
        self.clipboard.set_contents(obj);
        Ok(())
    }

    pub fn cut(&mut self) -> EditResult<()> {
        self.check_writable()?;
        if !self.has_selection() {
            return Ok(());
        }
        self.copy()?;
        self.delete_selected_as(UndoId::Cut)
    }

    /// Pastes the clipboard with its formatting.
    pub fn paste(&mut self) -> EditResult<()> {
        self.paste_special(false)
    }

    /// Pastes the clipboard; `plain` drops attributes and fields.
    pub fn paste_special(&mut self, plain: bool) -> EditResult<()> {
        self.check_writable()?;
        let Some(obj) = self.clipboard.contents() else {
            return Ok(());
        };
        let obj = if plain { obj.unformatted() } else { obj };
        self.insert_object_as(UndoId::Paste, &obj)
    }

    /// Items with one value over the whole selection, pool defaults included.
    pub fn get_attribs(&mut self) -> EditResult<ItemSet> {
        let sel = self.live_selection();
        self.engine.attribs(&sel, false)
    }

    /// Applies `set`; a caret inside a word applies to the whole word.
    pub fn set_attribs(&mut self, set: &ItemSet) -> EditResult<()> {
        let sel = self.begin(UndoId::SetAttribs)?;
        let result = self
            .engine
            .set_attribs(&sel, set, SetAttribsMode::WholeWord)
            .map(|_| sel);
        self.finish(result)
    }

    pub fn remove_char_attribs(&mut self, which: Option<AttribId>) -> EditResult<()> {
        self.remove_attribs(RemoveParaAttribsMode::RemoveNone, which)
    }

    /// Removes character attributes from one whole paragraph.
    pub fn remove_char_attribs_para(
        &mut self,
        para: usize,
        which: Option<AttribId>,
    ) -> EditResult<()> {
        let sel = self.begin(UndoId::ResetAttribs)?;
        let result = self
            .engine
            .remove_char_attribs_para(para, which)
            .map(|_| sel);
        self.finish(result)
    }

    pub fn remove_attribs(
        &mut self,
        mode: RemoveParaAttribsMode,
        which: Option<AttribId>,
    ) -> EditResult<()> {
        let sel = self.begin(UndoId::ResetAttribs)?;
        let result = self
            .engine
            .remove_attribs(&sel, mode, which)
            .map(|_| sel);
        self.finish(result)
    }

    /// `remove_para_attribs` clears paragraph items too, else only the
    /// character items stored on the paragraph.
    pub fn remove_attribs_simple(
        &mut self,
        remove_para_attribs: bool,
        which: Option<AttribId>,
    ) -> EditResult<()> {
        let mode = if remove_para_attribs {
            RemoveParaAttribsMode::RemoveAll
        } else {
            RemoveParaAttribsMode::RemoveCharItems
        };
        self.remove_attribs(mode, which)
    }

    /// Removes every attribute but the three language items.
    pub fn remove_attribs_keep_languages(&mut self, remove_para_attribs: bool) -> EditResult<()> {
        let mode = if remove_para_attribs {
            RemoveParaAttribsMode::RemoveAll
        } else {
            RemoveParaAttribsMode::RemoveCharItems
        };
        let sel = self.begin(UndoId::ResetAttribs)?;
        let result = AttribId::ALL
            .into_iter()
            .filter(|w| !w.is_language())
            .try_for_each(|w| self.engine.remove_attribs(&sel, mode, Some(w)))
            .map(|_| sel);
        self.finish(result)
    }

    /// Moves paragraphs `[start, end]` before old position `dest` and
    /// selects them.
    pub fn move_paragraphs_to(&mut self, start: usize, end: usize, dest: usize) -> EditResult<bool> {
        let sel = self.begin(UndoId::MoveParas)?;
        let result = self.engine.move_paragraphs(start, end, dest);
        let moved = matches!(result, Ok(Some(_)));
        let result = result.map(|range| match range {
            Some((first, last)) => {
                let doc = self.engine.doc();
                let len = doc.get(last).map_or(0, |n| n.len());
                EditSelection::new(doc.convert_pam(first, 0), doc.convert_pam(last, len))
            }
            None => sel,
        });
        self.finish(result)?;
        Ok(moved)
    }

    /// Moves the selected paragraphs by `diff` positions.
    pub fn move_paragraphs(&mut self, diff: i64) -> EditResult<bool> {
        let sel = self.selection().adjusted();
        let (min, max) = (sel.start_para as i64, sel.end_para as i64);
        let mut dest = if diff > 0 { max } else { min } + diff;
        if diff > 0 {
            dest += 1;
        }
        let Ok(dest) = usize::try_from(dest) else {
            return Ok(false);
        };
        if dest > self.engine.paragraph_count() {
            return Ok(false);
        }
        self.move_paragraphs_to(sel.start_para, sel.end_para, dest)
    }

    /// Transliterates the selection, or the word at the caret.
    pub fn transliterate_text(&mut self, mode: TransliterationMode) -> EditResult<()> {
        let sel = self.begin(UndoId::Transliterate)?;
        let result = self.engine.transliterate(&sel, mode);
        self.finish(result)
    }

    pub fn undo(&mut self) -> EditResult<bool> {
        self.check_writable()?;
        let Some(sel) = self.engine.undo() else {
            return Ok(false);
        };
        self.set_selection(sel);
        self.engine.format_and_layout();
        Ok(true)
    }

    pub fn redo(&mut self) -> EditResult<bool> {
        self.check_writable()?;
        let Some(sel) = self.engine.redo() else {
            return Ok(false);
        };
        self.set_selection(sel);
        self.engine.format_and_layout();
        Ok(true)
    }

    /// Selects the word at the caret.
    pub fn select_current_word(&mut self, word_type: WordType) -> EditResult<()> {
        let sel = self.live_selection();
        let pam = sel.max();
        self.selection = self
            .engine
            .word_at(&pam, word_type)?
            .unwrap_or(EditSelection::collapsed(pam));
        Ok(())
    }

    /// Runs auto-correction on the word at the caret. Only without a
    /// selection and with auto-correction on.
    pub fn complete_auto_correct(&mut self) -> EditResult<()> {
        if self.has_selection() || !self.engine.is_auto_correct() {
            return Ok(());
        }
        let sel = self.begin(UndoId::AutoCorrect)?;
        let result = self
            .engine
            .end_of_word(&sel.max())
            .and_then(|end| self.engine.auto_correct(&EditSelection::collapsed(end), None))
            .map(EditSelection::collapsed);
        self.finish(result)
    }

    fn is_wrong_spelled_word(&mut self, pam: EditPaM, mark: bool) -> EditResult<bool> {
        match self.engine.wrong_spelled_word(&pam)? {
            Some(word) => {
                if mark {
                    self.selection = word;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// True when the caret sits on a misspelled word. Always false with a
    /// selection.
    pub fn is_cursor_at_wrong_spelled_word(&mut self) -> EditResult<bool> {
        if self.has_selection() {
            return Ok(false);
        }
        let pam = self.live_selection().max();
        self.is_wrong_spelled_word(pam, false)
    }

    /// True when the word at `(para, pos)` is misspelled; `mark` selects it.
    pub fn is_wrong_spelled_word_at(&mut self, para: usize, pos: usize, mark: bool) -> EditResult<bool> {
        let pam = self.engine.doc().convert_pam(para, pos);
        self.is_wrong_spelled_word(pam, mark)
    }

    /// Adds the selected word, or the word at the caret, to the ignore list
    /// and re-checks everything. Returns the word.
    pub fn spell_ignore_word(&mut self) -> EditResult<String> {
        let lingu = self.engine.lingu().clone();
        if lingu.spell.is_none() {
            return Ok(String::new());
        }
        let sel = self.live_selection();
        let sel = self.engine.select_word(&sel, WordType::DictionaryWord)?;
        let word = self.engine.selected(&sel)?;
        if !word.is_empty() {
            if let Some(dics) = &lingu.dictionaries {
                dics.ignore_all(&word);
            }
            self.engine.invalidate_spelling();
            self.engine.do_online_spelling()?;
            debug!(%word, "word ignored");
        }
        Ok(word)
    }

    /// Marks the misspelled word at `pam` and gathers the context menu.
    fn spell_popup_at(&mut self, pam: EditPaM) -> EditResult<Option<SpellPopup>> {
        let lingu = self.engine.lingu().clone();
        let Some(spell) = lingu.spell.clone() else {
            return Ok(None);
        };
        if !self.is_wrong_spelled_word(pam, true)? {
            return Ok(None);
        }
        let word = self.engine.selected(&self.selection)?;
        let len = self.engine.doc().check_pam(&pam)?.len();
        let pam2 = EditPaM::new(pam.node(), (pam.index() + 1).min(len));
        let language = self.engine.language_at(&pam2)?;
        let alternatives = spell.spell(&word, language, MAX_POPUP_SUGGESTIONS);

        let mut word_language = LanguageType::NONE;
        let mut para_language = LanguageType::NONE;
        if let Some(alt) = &alternatives
            && lingu.guesser.is_some()
        {
            let para_text = self.engine.doc().check_pam(&pam)?.text().to_string();
            word_language = lingu.check_language(&alt.word, false);
            para_language = lingu.check_language(&para_text, true);
        }
        if word_language == LanguageType::NONE {
            word_language = para_language;
        }
        if para_language == LanguageType::NONE {
            para_language = word_language;
        }

        let suggestions = alternatives
            .map(|a| {
                a.alternatives
                    .into_iter()
                    .take(MAX_POPUP_SUGGESTIONS)
                    .collect()
            })
            .unwrap_or_default();

        let mut dictionaries = Vec::new();
        if let Some(dics) = &lingu.dictionaries {
            dics.activate_standard();
            for (i, dic) in dics.dictionaries().into_iter().enumerate() {
                if dic.accepts_additions(language) {
                    dictionaries.push((i, dic.name));
                }
            }
        }
        Ok(Some(SpellPopup {
            word,
            language,
            suggestions,
            word_language,
            para_language,
            dictionaries,
        }))
    }

    /// Context menu for the misspelled word at `(para, pos)`; `None` when
    /// there is no speller or the word is fine. The selection is unchanged.
    pub fn build_spell_popup(&mut self, para: usize, pos: usize) -> EditResult<Option<SpellPopup>> {
        let old = self.selection;
        let pam = self.engine.doc().convert_pam(para, pos);
        let popup = self.spell_popup_at(pam);
        self.selection = old;
        popup
    }

    /// Runs `action` from the context menu of the word at `(para, pos)`.
    /// Host notifications go through `callback`. Returns false when nothing
    /// was done.
    pub fn execute_spell_popup(
        &mut self,
        para: usize,
        pos: usize,
        action: PopupAction,
        callback: &mut dyn FnMut(SpellCallbackInfo),
    ) -> EditResult<bool> {
        let old = self.selection();
        let pam = self.engine.doc().convert_pam(para, pos);
        let Some(popup) = self.spell_popup_at(pam)? else {
            return Ok(false);
        };
        let lingu = self.engine.lingu().clone();
        debug!(word = %popup.word, ?action, "spell popup action");
        match action {
            PopupAction::Ignore => {
                let word = self.spell_ignore_word()?;
                callback(SpellCallbackInfo::new(SpellCallbackCommand::IgnoreWord, word));
                self.set_selection(old);
                Ok(true)
            }
            PopupAction::WordLanguage | PopupAction::ParaLanguage => {
                if !popup.has_language_entries() {
                    self.set_selection(old);
                    return Ok(false);
                }
                let whole_para = action == PopupAction::ParaLanguage;
                let language = if whole_para {
                    popup.para_language
                } else {
                    popup.word_language
                };
                let mut set = ItemSet::with_metric(self.engine.config().metric);
                set.put(
                    script_language_id(language.script_type()),
                    AttribValue::Language(language),
                );
                if whole_para {
                    let mut sel = self.selection();
                    sel.start_pos = 0;
                    sel.end_pos = TEXTPOS_ALL;
                    self.set_selection(sel);
                }
                self.set_attribs(&set)?;
                self.engine.do_online_spelling()?;
                let command = if whole_para {
                    SpellCallbackCommand::ParaLanguage
                } else {
                    SpellCallbackCommand::WordLanguage
                };
                callback(SpellCallbackInfo::new(command, ""));
                self.set_selection(old);
                Ok(true)
            }
            PopupAction::Check => {
                callback(SpellCallbackInfo::new(
                    SpellCallbackCommand::StartSpellDialog,
                    "",
                ));
                Ok(true)
            }
            PopupAction::AutoCorrectDialog => {
                callback(SpellCallbackInfo::new(
                    SpellCallbackCommand::AutoCorrectOptions,
                    "",
                ));
                Ok(true)
            }
            PopupAction::Add | PopupAction::AddTo(_) => {
                let name = match action {
                    PopupAction::AddTo(name)
                        if popup.dictionaries.iter().any(|(_, d)| *d == name) =>
                    {
                        name
                    }
                    PopupAction::Add if popup.has_add() => match popup.dictionaries.first() {
                        Some((_, name)) => name.clone(),
                        None => return Ok(false),
                    },
                    _ => {
                        self.set_selection(old);
                        return Ok(false);
                    }
                };
                if let Some(dics) = &lingu.dictionaries {
                    dics.add_word(&name, &popup.word);
                }
                let para = self
                    .engine
                    .doc()
                    .pos_of(pam.node())
                    .ok_or(EditError::InvalidPaM)?;
                let len = self.engine.paragraph_len(para)?;
                self.engine.reset_wrong_list(para, 0, len)?;
                self.engine.do_online_spelling()?;
                callback(SpellCallbackInfo::new(
                    SpellCallbackCommand::AddToDictionary,
                    popup.word.clone(),
                ));
                self.set_selection(old);
                Ok(true)
            }
            PopupAction::AutoCorrect(i) => {
                let Some(right) = popup.suggestions.get(i) else {
                    self.set_selection(old);
                    return Ok(false);
                };
                if let Some(table) = &lingu.auto_correct {
                    table.put_text(&popup.word, right, popup.language);
                }
                self.insert_text(right, false)?;
                Ok(true)
            }
            PopupAction::Replace(i) => {
                let Some(right) = popup.suggestions.get(i) else {
                    self.set_selection(old);
                    return Ok(false);
                };
                self.insert_text(right, false)?;
                Ok(true)
            }
            PopupAction::Cancel => {
                self.set_selection(old);
                Ok(false)
            }
        }
    }

    /// The field at the caret, or the field that alone is selected.
    pub fn field_at_selection(&mut self) -> EditResult<Option<FieldData>> {
        let sel = self.live_selection().adjusted(self.engine.doc())?;
        let (min, max) = (sel.min(), sel.max());
        if min.node() == max.node()
            && (max.index() == min.index() || max.index() == min.index() + 1)
        {
            return self.engine.field_at(&min);
        }
        Ok(None)
    }

    /// Extends the selection over the field at or just before the caret.
    pub fn select_field_at_cursor(&mut self) -> EditResult<bool> {
        let mut field = self.field_at_selection()?;
        if field.is_some() {
            let mut sel = self.selection();
            if sel.start_pos == sel.end_pos {
                sel.end_pos += 1;
                self.set_selection(sel);
            }
        } else {
            let mut sel = self.selection();
            if sel.start_pos > 0 && sel.start_pos == sel.end_pos {
                sel.start_pos -= 1;
                self.set_selection(sel);
                field = self.field_at_selection()?;
            }
        }
        Ok(field.is_some())
    }

    pub fn pos_no_field(&self, para: usize, pos: usize) -> usize {
        self.engine.pos_no_field(para, pos)
    }

    pub fn pos_with_field(&self, para: usize, pos: usize) -> usize {
        self.engine.pos_with_field(para, pos)
    }

    /// Grows or shrinks the font of every formatting portion in the
    /// selection, or of the word at the caret. The selection is restored.
    pub fn change_font_size(&mut self, grow: bool, font_list: Option<&FontList>) -> EditResult<bool> {
        let Some(font_list) = font_list else {
            return Ok(false);
        };
        self.check_writable()?;
        let old = self.selection();
        let mut sel = old.adjusted();
        if !sel.has_range() {
            let live = self.live_selection();
            if let Some(word) = self.engine.word_at(&live.max(), WordType::DictionaryWord)?
                && let Ok(word) = self.engine.doc().eselection(&word)
            {
                sel = word;
            }
        }
        self.engine.undo_action_start(UndoId::SetAttribs, Some(old));
        let result = self.change_font_size_portions(grow, sel, font_list);
        self.engine.undo_action_end(Some(old));
        self.set_selection(old);
        result.map(|_| true)
    }

    fn change_font_size_portions(
        &mut self,
        grow: bool,
        sel: ESelection,
        font_list: &FontList,
    ) -> EditResult<()> {
        if !sel.has_range() {
            return self.change_font_size_impl(grow, sel, font_list);
        }
        for para in sel.start_para..=sel.end_para {
            let portions = self.engine.doc().get(para)?.portions();
            let begin = if para == sel.start_para { sel.start_pos } else { 0 };
            let end = if para == sel.end_para { sel.end_pos } else { TEXTPOS_ALL };
            for (i, &portion_end) in portions.iter().enumerate() {
                let portion_start = if i > 0 { portions[i - 1] } else { 0 };
                if portion_end < begin || portion_start > end {
                    continue;
                }
                let s = portion_start.max(begin);
                let e = portion_end.min(end);
                if s == e {
                    continue;
                }
                self.change_font_size_impl(grow, ESelection::new(para, s, para, e), font_list)?;
            }
        }
        Ok(())
    }

    fn change_font_size_impl(
        &mut self,
        grow: bool,
        sel: ESelection,
        font_list: &FontList,
    ) -> EditResult<()> {
        self.set_selection(sel);
        let mut set = self.get_attribs()?;
        if change_font_size_in_set(grow, &mut set, Some(font_list)) {
            let mut heights = ItemSet::with_metric(set.metric());
            for which in AttribId::FONT_HEIGHTS {
                if let Some(value) = set.get(which) {
                    heights.put(which, value.clone());
                }
            }
            self.set_attribs(&heights)?;
        }
        Ok(())
    }

    /// Text around the caret for input methods: the selected text (empty if
    /// it spans paragraphs), else the caret's whole paragraph.
    pub fn surrounding_text(&mut self) -> EditResult<String> {
        let sel = self.live_selection().adjusted(self.engine.doc())?;
        if self.has_selection() {
            let text = self.engine.selected(&sel)?;
            return Ok(if text.contains('\n') { String::new() } else { text });
        }
        let para = self
            .engine
            .doc()
            .pos_of(sel.max().node())
            .ok_or(EditError::InvalidPaM)?;
        self.engine.text(para)
    }

    /// Selection inside [`Self::surrounding_text`] as `(start, end)`.
    pub fn surrounding_text_selection(&mut self) -> EditResult<(usize, usize)> {
        let esel = self.selection().adjusted();
        if self.has_selection() {
            let text = self.selected()?;
            if text.contains('\n') {
                return Ok((0, 0));
            }
            return Ok((0, esel.end_pos - esel.start_pos));
        }
        Ok((esel.start_pos, esel.end_pos))
    }

    /// Deletes `[start, end)` of the paragraph where the selection starts.
    pub fn delete_surrounding_text(&mut self, range: (usize, usize)) -> EditResult<bool> {
        let mut sel = self.selection();
        sel.end_para = sel.start_para;
        sel.start_pos = range.0;
        sel.end_pos = range.1;
        self.set_selection(sel);
        self.delete_selected()?;
        Ok(true)
    }

    /// Runs a search or replacement; returns how many matches were found
    /// or replaced.
    pub fn search_and_replace(&mut self, item: &SearchItem) -> EditResult<usize> {
        match item.command {
            SearchCommand::Find => {
                let sel = self.live_selection().adjusted(self.engine.doc())?;
                match self.engine.find(&sel.max(), &item.search, item.match_case)? {
                    Some(hit) => {
                        self.selection = hit;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
            SearchCommand::Replace => {
                self.check_writable()?;
                let mut replaced = 0;
                if self.has_selection() {
                    let current = self.selected()?;
                    let same = if item.match_case {
                        current == item.search
                    } else {
                        current.to_lowercase() == item.search.to_lowercase()
                    };
                    if same {
                        self.replace_selection(&item.replace)?;
                        replaced = 1;
                    }
                }
                let caret = self.live_selection().adjusted(self.engine.doc())?.max();
                if let Some(hit) = self.engine.find(&caret, &item.search, item.match_case)? {
                    self.selection = hit;
                }
                Ok(replaced)
            }
            SearchCommand::ReplaceAll => {
                let sel = self.begin(UndoId::Replace)?;
                let mut count = 0;
                let mut caret = self.engine.doc().start_pam();
                let mut result = Ok(sel);
                loop {
                    match self.engine.find(&caret, &item.search, item.match_case) {
                        Ok(Some(hit)) => match self.engine.insert_text(&hit, &item.replace) {
                            Ok(end) => {
                                caret = end;
                                count += 1;
                                result = Ok(EditSelection::collapsed(end));
                            }
                            Err(e) => {
                                result = Err(e);
                                break;
                            }
                        },
                        Ok(None) => break,
                        Err(e) => {
                            result = Err(e);
                            break;
                        }
                    }
                }
                debug!(count, search = %item.search, "replaced all");
                self.finish(result)?;
                Ok(count)
            }
        }
    }

    fn replace_selection(&mut self, text: &str) -> EditResult<()> {
        let sel = self.begin(UndoId::Replace)?;
        let result = self
            .engine
            .insert_text(&sel, text)
            .map(EditSelection::collapsed);
        self.finish(result)
    }
}
