//! Rich-text edit engine.
//!
//! ## Architecture
//!
//! - [`attribs`]: attribute identifiers, values, item sets and character runs
//! - [`doc`]: the paragraph arena with stable node ids
//! - [`pam`]: live positions and selections, plus their index form
//! - [`text`]: character classes and word boundaries
//! - [`undo`]: undo groups of paragraph range snapshots
//! - [`text_object`]: serialized paragraph ranges for the clipboard
//! - [`font_size`]: the grow/shrink size ladder
//! - [`engine`]: mutation primitives, fields and online spelling
//! - [`view`]: the selection-driven editing surface

pub mod attribs;
pub mod doc;
pub mod engine;
pub mod font_size;
pub mod pam;
pub mod text;
pub mod text_object;
pub mod undo;
pub mod view;

pub use attribs::{AttribId, AttribValue, CharAttrib, FieldData, FieldKind, ItemSet, MapUnit};
pub use doc::{ContentNode, EditDoc, NodeId, ParagraphData};
pub use engine::{
    EditConfig, EditEngine, FieldInfo, ReadFormat, RemoveParaAttribsMode, SetAttribsMode,
    TransliterationMode,
};
pub use font_size::FontList;
pub use pam::{ESelection, EditPaM, EditSelection, TEXTPOS_ALL};
pub use text::WordType;
pub use text_object::TextObject;
pub use undo::{UndoId, UndoManager};
pub use view::{Clipboard, EditView, MemoryClipboard, SearchCommand, SearchItem};
