//! Core engine of a block-based note-taking app: documents are ordered
//! sequences of typed blocks, persisted as a single JSON table in an
//! opaque key-value store, with a nested subdocument tree, a trash
//! lifecycle, and a debounced autosave editing session on top.

pub mod blocks;
pub mod doc;
pub mod editor;
pub mod error;
pub mod samples;
pub mod store;
pub mod tree;

pub use doc::{Block, BlockType, Document, DocumentRepository, DocumentsChanged};
pub use editor::{ClickModifier, EditorSession, KeyEvent, PaletteOutcome};
pub use error::{Error, Result};
pub use store::{ContentStore, FileStore, MemoryStore};
pub use tree::DocumentTree;
