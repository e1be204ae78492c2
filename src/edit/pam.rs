//! Positions and selections.
//!
//! [`EditPaM`] and [`EditSelection`] address live paragraphs by [`NodeId`].
//! [`ESelection`] uses paragraph indices and survives structural edits; it is
//! the form the public API and the undo stack work with.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::doc::{EditDoc, NodeId};
use crate::error::{EditError, EditResult};

/// Character position meaning "end of paragraph".
pub const TEXTPOS_ALL: usize = usize::MAX;

/// A caret position: paragraph node and character index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditPaM {
    node: NodeId,
    index: usize,
}

impl EditPaM {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Document order of two positions; fails if either is stale.
    pub fn cmp_in(&self, other: &EditPaM, doc: &EditDoc) -> EditResult<Ordering> {
        doc.check_pam(self)?;
        doc.check_pam(other)?;
        let a = doc.pos_of(self.node).ok_or(EditError::InvalidPaM)?;
        let b = doc.pos_of(other.node).ok_or(EditError::InvalidPaM)?;
        Ok(a.cmp(&b).then(self.index.cmp(&other.index)))
    }
}

/// Two positions: `min` is where the selection started, `max` where the
/// caret is. They are in document order only after [`EditSelection::adjust`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditSelection {
    min: EditPaM,
    max: EditPaM,
}

impl EditSelection {
    pub fn new(min: EditPaM, max: EditPaM) -> Self {
        Self { min, max }
    }

    pub fn collapsed(pam: EditPaM) -> Self {
        Self { min: pam, max: pam }
    }

    pub fn min(&self) -> EditPaM {
        self.min
    }

    pub fn max(&self) -> EditPaM {
        self.max
    }

    pub fn set_min(&mut self, pam: EditPaM) {
        self.min = pam;
    }

    pub fn set_max(&mut self, pam: EditPaM) {
        self.max = pam;
    }

    pub fn has_range(&self) -> bool {
        self.min != self.max
    }

    /// Invalid when either end is stale.
    pub fn is_valid(&self, doc: &EditDoc) -> bool {
        doc.check_pam(&self.min).is_ok() && doc.check_pam(&self.max).is_ok()
    }

    /// Puts the ends in document order.
    pub fn adjust(&mut self, doc: &EditDoc) -> EditResult<()> {
        let order = self
            .min
            .cmp_in(&self.max, doc)
            .map_err(|_| EditError::InvalidSelection)?;
        if order == Ordering::Greater {
            std::mem::swap(&mut self.min, &mut self.max);
        }
        Ok(())
    }

    /// Copy in document order.
    pub fn adjusted(mut self, doc: &EditDoc) -> EditResult<Self> {
        self.adjust(doc)?;
        Ok(self)
    }
}

/// Selection by paragraph index and character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ESelection {
    pub start_para: usize,
    pub start_pos: usize,
    pub end_para: usize,
    pub end_pos: usize,
}

impl ESelection {
    pub fn new(start_para: usize, start_pos: usize, end_para: usize, end_pos: usize) -> Self {
        Self {
            start_para,
            start_pos,
            end_para,
            end_pos,
        }
    }

    pub fn at(para: usize, pos: usize) -> Self {
        Self::new(para, pos, para, pos)
    }

    /// From the document start to the end of everything.
    pub fn all() -> Self {
        Self::new(0, 0, usize::MAX, TEXTPOS_ALL)
    }

    pub fn has_range(&self) -> bool {
        self.start_para != self.end_para || self.start_pos != self.end_pos
    }

    pub fn is_adjusted(&self) -> bool {
        (self.start_para, self.start_pos) <= (self.end_para, self.end_pos)
    }

    /// Puts start before end.
    pub fn adjust(&mut self) {
        if !self.is_adjusted() {
            std::mem::swap(&mut self.start_para, &mut self.end_para);
            std::mem::swap(&mut self.start_pos, &mut self.end_pos);
        }
    }

    pub fn adjusted(mut self) -> Self {
        self.adjust();
        self
    }
}

impl EditDoc {
    /// Live position of a paragraph index and offset. Out of range values
    /// clamp to the last paragraph and its end.
    pub fn convert_pam(&self, para: usize, pos: usize) -> EditPaM {
        let para = para.min(self.count() - 1);
        let id = self.ids()[para];
        let len = self.node(id).map_or(0, |n| n.len());
        EditPaM::new(id, pos.min(len))
    }

    pub fn convert_selection(&self, sel: &ESelection) -> EditSelection {
        EditSelection::new(
            self.convert_pam(sel.start_para, sel.start_pos),
            self.convert_pam(sel.end_para, sel.end_pos),
        )
    }

    /// Index form of a live position.
    pub fn epam(&self, pam: &EditPaM) -> EditResult<(usize, usize)> {
        self.check_pam(pam)?;
        let para = self.pos_of(pam.node()).ok_or(EditError::InvalidPaM)?;
        Ok((para, pam.index()))
    }

    pub fn eselection(&self, sel: &EditSelection) -> EditResult<ESelection> {
        let (sp, si) = self.epam(&sel.min()).map_err(|_| EditError::InvalidSelection)?;
        let (ep, ei) = self.epam(&sel.max()).map_err(|_| EditError::InvalidSelection)?;
        Ok(ESelection::new(sp, si, ep, ei))
    }
}
