use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder title for documents without a top-level heading.
pub const DEFAULT_TITLE: &str = "Untitled";
/// Title seeded into a freshly created page.
pub const NEW_PAGE_TITLE: &str = "New page";
/// Title seeded into a freshly created subdocument.
pub const NEW_SUBDOCUMENT_TITLE: &str = "New subdocument";

// ==================== Block Types ====================

/// The closed set of block types a document is composed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "heading-1")]
    Heading1,
    #[serde(rename = "heading-2")]
    Heading2,
    #[serde(rename = "heading-3")]
    Heading3,
    #[serde(rename = "bullet-list")]
    BulletList,
    #[serde(rename = "numbered-list")]
    NumberedList,
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "table")]
    Table,
    #[serde(rename = "subdocument")]
    Subdocument,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Text => "text",
            BlockType::Heading1 => "heading-1",
            BlockType::Heading2 => "heading-2",
            BlockType::Heading3 => "heading-3",
            BlockType::BulletList => "bullet-list",
            BlockType::NumberedList => "numbered-list",
            BlockType::Todo => "todo",
            BlockType::Image => "image",
            BlockType::Code => "code",
            BlockType::Table => "table",
            BlockType::Subdocument => "subdocument",
        }
    }

    /// List-like types that continue themselves on Enter and convert
    /// between each other without losing content.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            BlockType::BulletList | BlockType::NumberedList | BlockType::Todo
        )
    }

    /// Types whose `content` carries a structured JSON payload rather than
    /// raw text.
    pub fn has_structured_content(&self) -> bool {
        matches!(self, BlockType::Image | BlockType::Table)
    }
}

// ==================== Structured Payloads ====================

/// Payload of an `image` block, stored serialized inside `Block::content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    pub url: String,
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default)]
    pub show_caption: bool,
}

impl Default for ImageData {
    fn default() -> Self {
        Self {
            url: String::new(),
            width: 100.0,
            caption: None,
            show_caption: false,
        }
    }
}

impl ImageData {
    /// Parse image content, falling back to treating the raw string as a
    /// bare URL. This is the self-heal path: stored content that fails to
    /// parse is never an error.
    pub fn parse(content: &str) -> Self {
        match serde_json::from_str::<ImageData>(content) {
            Ok(data) => data,
            Err(_) => Self {
                url: content.to_string(),
                ..Self::default()
            },
        }
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Payload of a `table` block, stored serialized inside `Block::content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    /// Grid of cell values (string, number or null per cell).
    pub data: Vec<Vec<Value>>,
    pub col_headers: bool,
    pub row_headers: bool,
    pub formulas: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
}

impl Default for TableData {
    fn default() -> Self {
        let empty_row = || vec![Value::from(""), Value::from(""), Value::from("")];
        Self {
            data: vec![empty_row(), empty_row(), empty_row()],
            col_headers: true,
            row_headers: true,
            formulas: true,
            settings: Some(Map::new()),
        }
    }
}

impl TableData {
    /// Parse table content, reinitializing to the default 3x3 grid when
    /// the payload is empty or malformed.
    pub fn parse(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_default()
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ==================== Block ====================

/// A single typed content unit within a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique within the owning document, not globally.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    /// Raw text, or a serialized structured payload depending on `kind`.
    pub content: String,
    /// Free-form auxiliary data merged into render parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            props: None,
        }
    }

    /// The structured image payload, self-healed if malformed.
    pub fn image_data(&self) -> ImageData {
        ImageData::parse(&self.content)
    }

    /// The structured table payload, self-healed if malformed.
    pub fn table_data(&self) -> TableData {
        TableData::parse(&self.content)
    }
}

// ==================== Document ====================

/// A named, persisted ordered collection of blocks, possibly nested under
/// a parent document.
///
/// The serialized field names match the historical on-disk format, so
/// records written by earlier versions load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Display metadata, opaque to the core. `None` means "not supplied";
    /// it must survive saves that omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub blocks: Vec<Block>,
    /// Present iff this document is a subdocument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Ordered child document IDs. `None` means "not supplied" on a save;
    /// `Some(vec![])` is an explicit clear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdocuments: Option<Vec<String>>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Document {
    /// A new document with a single default heading block, as created on
    /// first load of an unknown ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_title(id, DEFAULT_TITLE)
    }

    /// A new single-heading document with the given title.
    pub fn with_title(id: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.clone(),
            icon: None,
            cover: None,
            blocks: vec![Block::new("1", BlockType::Heading1, title)],
            parent_id: None,
            subdocuments: None,
            is_deleted: false,
            deleted_at: None,
            created: now,
            last_modified: now,
        }
    }

    /// Title derived from the first block when it is a top-level heading,
    /// otherwise the placeholder.
    pub fn derived_title(blocks: &[Block]) -> String {
        blocks
            .iter()
            .find(|b| b.kind == BlockType::Heading1)
            .filter(|b| !b.content.is_empty())
            .map(|b| b.content.clone())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    /// Child IDs, treating an omitted list as empty.
    pub fn subdocument_ids(&self) -> &[String] {
        self.subdocuments.as_deref().unwrap_or(&[])
    }
}

// ==================== Identifiers ====================

static LAST_BLOCK_ID: AtomicI64 = AtomicI64::new(0);

/// A fresh block ID: the current millisecond timestamp as a decimal
/// string, bumped past the previous ID so rapid insertions within the same
/// millisecond stay unique and ordered.
pub fn next_block_id() -> String {
    let now = Utc::now().timestamp_millis();
    let id = LAST_BLOCK_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .expect("fetch_update closure never returns None");
    // fetch_update returns the previous value.
    now.max(id + 1).to_string()
}

/// A fresh document ID: `doc_<base36 millis><base36 random suffix>`.
pub fn generate_document_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = u128::from_le_bytes(*uuid::Uuid::new_v4().as_bytes()) % 36u128.pow(11);
    format!("doc_{}{}", to_base36(millis as u128), to_base36(suffix))
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = String::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    out.chars().rev().collect()
}
