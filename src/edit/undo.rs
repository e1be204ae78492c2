//! Undo groups for the edit engine.
//!
//! A group is opened with [`UndoManager::start`] and closed with
//! [`UndoManager::end`]; nested brackets join the outermost group. Every
//! mutation inside records which paragraphs it replaced, as snapshots taken
//! before and after, so undo and redo are paragraph range replacements.

use tracing::{debug, trace};

use super::doc::ParagraphData;
use super::pam::ESelection;

/// Default number of groups kept.
pub const DEFAULT_MAX_UNDO_GROUPS: usize = 100;

/// Kind of user action a group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoId {
    Insert,
    Delete,
    Cut,
    Paste,
    ParaBreak,
    InsertField,
    SetAttribs,
    ResetAttribs,
    MoveParas,
    Read,
    Transliterate,
    Replace,
    AutoCorrect,
}

/// Paragraphs `[start, start + before.len())` were replaced by `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParaRangeChange {
    pub start: usize,
    pub before: Vec<ParagraphData>,
    pub after: Vec<ParagraphData>,
}

/// One undoable user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoGroup {
    pub id: UndoId,
    pub changes: Vec<ParaRangeChange>,
    pub selection_before: Option<ESelection>,
    pub selection_after: Option<ESelection>,
}

#[derive(Debug, Clone)]
pub struct UndoManager {
    undo: Vec<UndoGroup>,
    redo: Vec<UndoGroup>,
    current: Option<UndoGroup>,
    depth: usize,
    max_groups: usize,
    enabled: bool,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_GROUPS)
    }
}

impl UndoManager {
    pub fn new(max_groups: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            current: None,
            depth: 0,
            max_groups,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling drops the whole history.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.clear();
        }
    }

    /// True while a group is open and changes are being recorded.
    pub fn is_recording(&self) -> bool {
        self.enabled && self.current.is_some()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Opens a group, or joins the one already open.
    pub fn start(&mut self, id: UndoId, selection: Option<ESelection>) {
        self.depth += 1;
        if self.depth == 1 && self.enabled {
            trace!(?id, "undo group started");
            self.current = Some(UndoGroup {
                id,
                changes: Vec::new(),
                selection_before: selection,
                selection_after: None,
            });
        }
    }

    /// Closes a bracket. The outermost close files the group if it recorded
    /// anything; the selection given there becomes its "after" selection.
    pub fn end(&mut self, selection: Option<ESelection>) {
        if self.depth == 0 {
            return;
        }
        if let Some(sel) = selection {
            if let Some(group) = self.current.as_mut() {
                group.selection_after = Some(sel);
            }
        }
        self.depth -= 1;
        if self.depth > 0 {
            return;
        }
        let Some(group) = self.current.take() else {
            return;
        };
        if group.changes.is_empty() {
            return;
        }
        debug!(id = ?group.id, changes = group.changes.len(), "undo group filed");
        self.redo.clear();
        self.undo.push(group);
        if self.undo.len() > self.max_groups {
            let excess = self.undo.len() - self.max_groups;
            self.undo.drain(..excess);
        }
    }

    /// Records a change in the open group. Consecutive changes of the same
    /// paragraph range are folded into one.
    pub fn record(&mut self, change: ParaRangeChange) {
        if !self.enabled {
            return;
        }
        let Some(group) = self.current.as_mut() else {
            return;
        };
        if let Some(last) = group.changes.last_mut() {
            if last.start == change.start && last.after.len() == change.before.len() {
                last.after = change.after;
                return;
            }
        }
        group.changes.push(change);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    /// Takes the latest group for undoing and parks it for redo.
    pub fn pop_undo(&mut self) -> Option<UndoGroup> {
        let group = self.undo.pop()?;
        self.redo.push(group.clone());
        Some(group)
    }

    /// Takes the latest undone group for redoing.
    pub fn pop_redo(&mut self) -> Option<UndoGroup> {
        let group = self.redo.pop()?;
        self.undo.push(group.clone());
        Some(group)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.current = None;
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(start: usize, before: &str, after: &str) -> ParaRangeChange {
        ParaRangeChange {
            start,
            before: vec![ParagraphData::new(before)],
            after: vec![ParagraphData::new(after)],
        }
    }

    #[test]
    fn test_nested_brackets_make_one_group() {
        let mut undo = UndoManager::default();
        undo.start(UndoId::Insert, Some(ESelection::at(0, 0)));
        undo.start(UndoId::SetAttribs, None);
        undo.record(change(0, "a", "ab"));
        undo.end(None);
        assert_eq!(undo.undo_count(), 0);
        undo.record(change(1, "x", "y"));
        undo.end(Some(ESelection::at(0, 2)));
        assert_eq!(undo.undo_count(), 1);
        let group = undo.pop_undo().unwrap();
        assert_eq!(group.id, UndoId::Insert);
        assert_eq!(group.changes.len(), 2);
        assert_eq!(group.selection_after, Some(ESelection::at(0, 2)));
        assert!(undo.can_redo());
    }

    #[test]
    fn test_same_range_changes_fold() {
        let mut undo = UndoManager::default();
        undo.start(UndoId::Insert, None);
        undo.record(change(0, "a", "ab"));
        undo.record(change(0, "ab", "abc"));
        undo.end(None);
        let group = undo.pop_undo().unwrap();
        assert_eq!(group.changes.len(), 1);
        assert_eq!(group.changes[0].before[0].text, "a");
        assert_eq!(group.changes[0].after[0].text, "abc");
    }

    #[test]
    fn test_empty_group_not_filed() {
        let mut undo = UndoManager::default();
        undo.start(UndoId::Delete, None);
        undo.end(None);
        assert!(!undo.can_undo());
    }

    #[test]
    fn test_new_group_clears_redo() {
        let mut undo = UndoManager::default();
        undo.start(UndoId::Insert, None);
        undo.record(change(0, "", "a"));
        undo.end(None);
        undo.pop_undo();
        assert!(undo.can_redo());
        undo.start(UndoId::Insert, None);
        undo.record(change(0, "", "b"));
        undo.end(None);
        assert!(!undo.can_redo());
    }

    #[test]
    fn test_max_groups() {
        let mut undo = UndoManager::new(3);
        for i in 0..5 {
            undo.start(UndoId::Insert, None);
            undo.record(change(i, "", "x"));
            undo.end(None);
        }
        assert_eq!(undo.undo_count(), 3);
        assert_eq!(undo.pop_undo().unwrap().changes[0].start, 4);
    }

    #[test]
    fn test_disabled_records_nothing() {
        let mut undo = UndoManager::default();
        undo.set_enabled(false);
        undo.start(UndoId::Insert, None);
        assert!(!undo.is_recording());
        undo.record(change(0, "", "x"));
        undo.end(None);
        assert!(!undo.can_undo());
        assert_eq!(undo.depth(), 0);
    }
}
