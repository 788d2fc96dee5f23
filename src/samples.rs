//! First-run sample content.

use crate::doc::repository::DocumentRepository;
use crate::doc::types::{Block, BlockType, Document};
use crate::error::Result;

pub const SAMPLE_DOCUMENT_ID: &str = "sample_doc_1";

fn sample_document() -> Document {
    let mut doc = Document::with_title(SAMPLE_DOCUMENT_ID, "Getting Started");
    doc.blocks = vec![
        Block::new("1", BlockType::Heading1, "👋 Welcome to your workspace"),
        Block::new("2", BlockType::Text, "This sample document helps you get started."),
        Block::new("3", BlockType::Heading2, "🚀 Main features"),
        Block::new("4", BlockType::BulletList, "Draggable content blocks"),
        Block::new("5", BlockType::BulletList, "Support for many block types"),
        Block::new("6", BlockType::BulletList, "Nested subdocuments"),
        Block::new("7", BlockType::Heading2, "💡 Tips"),
        Block::new("8", BlockType::NumberedList, "Press '/' on an empty block to open the command menu"),
        Block::new("9", BlockType::NumberedList, "Drag blocks to reorganize them"),
        Block::new("10", BlockType::NumberedList, "Press Enter on an empty list item to end the list"),
    ];
    doc
}

/// Seed the sample document on first run. Re-running is a no-op: the
/// stored copy wins, so user edits to the sample are never clobbered.
pub fn ensure_sample_document(repo: &DocumentRepository) -> Result<Document> {
    if let Some(existing) = repo.load(SAMPLE_DOCUMENT_ID)? {
        return Ok(existing);
    }
    repo.save(&sample_document())
}
