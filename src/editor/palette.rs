use crate::doc::types::BlockType;

/// One choice in the command palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub kind: BlockType,
    pub name: &'static str,
    pub description: &'static str,
}

/// Every block type the palette offers, in display order.
pub const PALETTE_ENTRIES: &[PaletteEntry] = &[
    PaletteEntry {
        kind: BlockType::Text,
        name: "Text",
        description: "Plain text. Simple and straightforward.",
    },
    PaletteEntry {
        kind: BlockType::Heading1,
        name: "Heading 1",
        description: "Large heading.",
    },
    PaletteEntry {
        kind: BlockType::Heading2,
        name: "Heading 2",
        description: "Medium heading.",
    },
    PaletteEntry {
        kind: BlockType::Heading3,
        name: "Heading 3",
        description: "Small heading.",
    },
    PaletteEntry {
        kind: BlockType::BulletList,
        name: "Bulleted list",
        description: "Create a bulleted list.",
    },
    PaletteEntry {
        kind: BlockType::NumberedList,
        name: "Numbered list",
        description: "Create a numbered list.",
    },
    PaletteEntry {
        kind: BlockType::Todo,
        name: "To-do list",
        description: "Task list with checkboxes.",
    },
    PaletteEntry {
        kind: BlockType::Image,
        name: "Image",
        description: "Upload or embed an image.",
    },
    PaletteEntry {
        kind: BlockType::Code,
        name: "Code",
        description: "Code block with syntax highlighting.",
    },
    PaletteEntry {
        kind: BlockType::Table,
        name: "Table",
        description: "Spreadsheet-style grid with formulas.",
    },
    PaletteEntry {
        kind: BlockType::Subdocument,
        name: "Subdocument",
        description: "Create a new nested subdocument.",
    },
];

/// Searchable block-type menu, invoked by `/` on an empty block. Opening
/// it transacts no content change; the anchored block is only touched
/// once an entry is chosen.
#[derive(Debug, Default)]
pub struct CommandPalette {
    anchor_block_id: Option<String>,
    query: String,
}

impl CommandPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.anchor_block_id.is_some()
    }

    /// The block the palette is anchored to, while open.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor_block_id.as_deref()
    }

    pub fn open_at(&mut self, block_id: impl Into<String>) {
        self.anchor_block_id = Some(block_id.into());
        self.query.clear();
    }

    pub fn close(&mut self) {
        self.anchor_block_id = None;
        self.query.clear();
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Entries matching the current query, by name or description.
    pub fn matching_entries(&self) -> Vec<&'static PaletteEntry> {
        let term = self.query.trim().to_lowercase();
        PALETTE_ENTRIES
            .iter()
            .filter(|entry| {
                term.is_empty()
                    || entry.name.to_lowercase().contains(&term)
                    || entry.description.to_lowercase().contains(&term)
            })
            .collect()
    }
}
