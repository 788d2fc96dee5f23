//! Document data model and persistence.

pub mod repository;
pub mod types;

pub use repository::{DocumentRepository, DocumentsChanged};
pub use types::{Block, BlockType, Document, ImageData, TableData};
