use std::time::Instant;

use tracing::warn;

use crate::blocks;
use crate::doc::repository::DocumentRepository;
use crate::doc::types::{Block, BlockType, Document, NEW_PAGE_TITLE};
use crate::editor::autosave::AutosaveCoordinator;
use crate::editor::focus::{ClickModifier, FocusController};
use crate::editor::palette::CommandPalette;
use crate::error::Result;
use crate::tree::DocumentTree;

/// Keyboard input the session reacts to. Plain character input goes
/// through [`EditorSession::change_block_content`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Enter { shift: bool },
    Backspace,
    Slash,
    ArrowUp,
    ArrowDown,
}

/// What the caller should do after a palette choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaletteOutcome {
    /// Keep editing the current document.
    Stay,
    /// A subdocument was created; navigate into it.
    Navigate(String),
}

/// Editing state for one open document: the working block sequence,
/// focus and selection, the command palette, and the autosave timer.
///
/// Block mutations rewrite the working sequence and re-arm autosave; the
/// document on disk only changes when the debounce window elapses (or on
/// an explicit [`flush`](EditorSession::flush)). One session exists per
/// open document and is torn down on navigation.
pub struct EditorSession {
    document_id: String,
    blocks: Vec<Block>,
    focus: FocusController,
    palette: CommandPalette,
    autosave: AutosaveCoordinator,
}

impl EditorSession {
    /// Open `document_id` for editing, creating the record if absent.
    pub fn open(repo: &DocumentRepository, document_id: &str) -> Result<Self> {
        let doc = repo.load_or_create(document_id)?;
        Ok(Self::from_document(&doc))
    }

    pub fn from_document(doc: &Document) -> Self {
        Self {
            document_id: doc.id.clone(),
            blocks: doc.blocks.clone(),
            focus: FocusController::new(),
            palette: CommandPalette::new(),
            autosave: AutosaveCoordinator::new(),
        }
    }

    // ==================== Accessors ====================

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn focus(&self) -> &FocusController {
        &self.focus
    }

    pub fn palette(&self) -> &CommandPalette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut CommandPalette {
        &mut self.palette
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.pending()
    }

    // ==================== Keyboard ====================

    /// Dispatch a key pressed while `block_id` holds focus.
    pub fn handle_key(&mut self, block_id: &str, key: KeyEvent, now: Instant) {
        let Some(index) = blocks::position(&self.blocks, block_id) else {
            return;
        };

        match key {
            // Shift+Enter is a soft line break inside the block; the
            // sequence does not change.
            KeyEvent::Enter { shift: true } => {}
            KeyEvent::Enter { shift: false } => self.handle_enter(block_id, now),
            KeyEvent::Backspace => {
                let block = &self.blocks[index];
                if block.content.is_empty() && self.blocks.len() > 1 {
                    self.delete_block(block_id, now);
                }
            }
            KeyEvent::Slash => {
                if self.blocks[index].content.is_empty() {
                    self.palette.open_at(block_id);
                }
            }
            KeyEvent::ArrowUp => {
                if index > 0 {
                    self.focus.focus(self.blocks[index - 1].id.clone());
                }
            }
            KeyEvent::ArrowDown => {
                if index + 1 < self.blocks.len() {
                    self.focus.focus(self.blocks[index + 1].id.clone());
                }
            }
        }
    }

    fn handle_enter(&mut self, block_id: &str, now: Instant) {
        if self.palette.is_open() {
            // Enter belongs to the palette while it is open; the palette
            // choice arrives via `choose_block_type`.
            self.palette.close();
            return;
        }
        let Some(index) = blocks::position(&self.blocks, block_id) else {
            return;
        };
        let block = &self.blocks[index];

        // Enter on an empty list item ends the list: the item turns back
        // into a plain text block instead of continuing the sequence.
        if block.kind.is_list() && block.content.trim().is_empty() {
            self.blocks = blocks::change_type(&self.blocks, block_id, BlockType::Text);
            self.autosave.schedule(now);
            return;
        }

        self.create_block_after(block_id, BlockType::Text, false, now);
    }

    // ==================== Block Mutations ====================

    /// Insert a new block after `anchor_id` and focus it. A non-empty
    /// list block continues its list: the new block inherits the anchor's
    /// type regardless of `requested`. `is_new_page` seeds a page title
    /// instead.
    pub fn create_block_after(
        &mut self,
        anchor_id: &str,
        requested: BlockType,
        is_new_page: bool,
        now: Instant,
    ) -> String {
        let (kind, content) = if is_new_page {
            (BlockType::Heading1, NEW_PAGE_TITLE)
        } else {
            let continuation = blocks::position(&self.blocks, anchor_id)
                .map(|i| &self.blocks[i])
                .filter(|b| b.kind.is_list() && !b.content.trim().is_empty())
                .map(|b| b.kind);
            (continuation.unwrap_or(requested), "")
        };

        let (next, new_id) = blocks::insert_after(&self.blocks, anchor_id, kind, content);
        self.blocks = next;
        self.focus.after_insert(&new_id);
        self.autosave.schedule(now);
        new_id
    }

    /// Remove a block and focus its predecessor.
    pub fn delete_block(&mut self, block_id: &str, now: Instant) {
        let Some(index) = blocks::position(&self.blocks, block_id) else {
            return;
        };
        self.blocks = blocks::delete(&self.blocks, block_id);
        self.focus.after_delete(&self.blocks, index, block_id);
        self.autosave.schedule(now);
    }

    pub fn change_block_content(&mut self, block_id: &str, content: &str, now: Instant) {
        self.blocks = blocks::change_content(&self.blocks, block_id, content);
        self.autosave.schedule(now);
    }

    pub fn change_block_type(&mut self, block_id: &str, kind: BlockType, now: Instant) {
        self.blocks = blocks::change_type(&self.blocks, block_id, kind);
        self.autosave.schedule(now);
    }

    /// Drag-reorder. A drag of a multi-selected block moves the whole
    /// selection; the selection is released once the drop lands.
    pub fn reorder_blocks(&mut self, from_index: usize, to_index: usize, now: Instant) {
        self.blocks = blocks::reorder(&self.blocks, self.focus.selection(), from_index, to_index);
        self.focus.clear_selection();
        self.autosave.schedule(now);
    }

    /// A click on the empty area below the last block appends a fresh
    /// text block there and focuses it.
    pub fn append_trailing_block(&mut self, now: Instant) -> Option<String> {
        let last_id = self.blocks.last()?.id.clone();
        Some(self.create_block_after(&last_id, BlockType::Text, false, now))
    }

    // ==================== Focus & Selection ====================

    pub fn click_block(&mut self, block_id: &str, modifier: ClickModifier) {
        self.focus.click(&self.blocks, block_id, modifier);
    }

    pub fn focus_block(&mut self, block_id: &str) {
        self.focus.focus(block_id);
    }

    pub fn blur(&mut self) {
        self.focus.blur();
    }

    // ==================== Command Palette ====================

    /// Apply a palette choice to the anchored block. Choosing
    /// `subdocument` creates and links a child document and asks the
    /// caller to navigate into it; every other type converts the block in
    /// place and remounts its editing surface.
    pub fn choose_block_type(
        &mut self,
        repo: &DocumentRepository,
        kind: BlockType,
        now: Instant,
    ) -> Result<PaletteOutcome> {
        let Some(anchor) = self.palette.anchor().map(str::to_string) else {
            return Ok(PaletteOutcome::Stay);
        };
        self.palette.close();

        if kind == BlockType::Subdocument {
            let tree = DocumentTree::new(repo);
            let (updated, child_id) =
                tree.convert_block_to_subdocument(&self.document_id, &self.blocks, &anchor)?;
            self.blocks = updated;
            // The tree call persisted the parent; a pending autosave
            // would only rewrite the same state after navigation.
            self.autosave.cancel();
            return Ok(PaletteOutcome::Navigate(child_id));
        }

        self.blocks = blocks::change_type(&self.blocks, &anchor, kind);
        self.focus.refocus(anchor);
        self.autosave.schedule(now);
        Ok(PaletteOutcome::Stay)
    }

    // ==================== Persistence ====================

    /// Poll the debounce timer and persist the working blocks when it
    /// fires. A failed save is logged and swallowed; the next mutation
    /// re-arms the timer, so editing is never interrupted.
    pub fn autosave_tick(&mut self, repo: &DocumentRepository, now: Instant) -> bool {
        if !self.autosave.poll(now) {
            return false;
        }
        match repo.update_document(&self.snapshot()) {
            Ok(Some(_)) => true,
            Ok(None) => {
                warn!(document_id = %self.document_id, "autosave skipped: document gone or trashed");
                false
            }
            Err(err) => {
                warn!(document_id = %self.document_id, error = %err, "autosave failed");
                false
            }
        }
    }

    /// Persist immediately, regardless of the debounce state. Errors
    /// surface to the caller, unlike the background autosave path.
    pub fn flush(&mut self, repo: &DocumentRepository) -> Result<()> {
        self.autosave.cancel();
        repo.update_document(&self.snapshot())?;
        Ok(())
    }

    /// Drop any pending save. Called on navigation away so a stale timer
    /// cannot write this document's blocks after the session is gone.
    pub fn teardown(&mut self) {
        self.autosave.cancel();
    }

    /// The working state as a savable record. Metadata fields stay `None`
    /// so the stored values survive the merge; the title re-derives from
    /// the current blocks.
    fn snapshot(&self) -> Document {
        let mut doc = Document::new(self.document_id.clone());
        doc.title = Document::derived_title(&self.blocks);
        doc.blocks = self.blocks.clone();
        doc
    }
}
