use crate::blocks;
use crate::doc::types::Block;

/// Modifier state of a block click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickModifier {
    None,
    Shift,
    Ctrl,
}

/// Tracks which block has input focus and which blocks are multi-selected,
/// and computes new focus targets after structural edits.
///
/// `focus_epoch` increments whenever the render layer must remount the
/// focused block's editing surface (the forced blur/refocus cycle after a
/// palette type conversion); re-focusing the same ID without a bump is a
/// plain caret move.
#[derive(Debug, Default)]
pub struct FocusController {
    focused_block_id: Option<String>,
    selected_block_ids: Vec<String>,
    last_selected_block_id: Option<String>,
    focus_epoch: u64,
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused_block_id.as_deref()
    }

    /// Selected block IDs in selection order.
    pub fn selection(&self) -> &[String] {
        &self.selected_block_ids
    }

    pub fn focus_epoch(&self) -> u64 {
        self.focus_epoch
    }

    pub fn focus(&mut self, block_id: impl Into<String>) {
        self.focused_block_id = Some(block_id.into());
    }

    pub fn blur(&mut self) {
        self.focused_block_id = None;
    }

    /// Focus a block and request a remount of its editing surface.
    pub fn refocus(&mut self, block_id: impl Into<String>) {
        self.focus_epoch += 1;
        self.focused_block_id = Some(block_id.into());
    }

    pub fn clear_selection(&mut self) {
        self.selected_block_ids.clear();
    }

    /// A click on a block. Plain clicks focus, single-select and set the
    /// range anchor; Ctrl toggles membership and Shift extends the
    /// contiguous range from the anchor (excluding the page title), both
    /// without moving focus.
    pub fn click(&mut self, all_blocks: &[Block], block_id: &str, modifier: ClickModifier) {
        match modifier {
            ClickModifier::Shift => {
                if let Some(anchor) = self.last_selected_block_id.clone() {
                    self.selected_block_ids = blocks::range_select(all_blocks, &anchor, block_id);
                    return;
                }
                // No anchor yet: selects like a plain click, still
                // without taking focus.
                self.select_single(block_id);
            }
            ClickModifier::Ctrl => {
                if let Some(i) = self.selected_block_ids.iter().position(|id| id == block_id) {
                    self.selected_block_ids.remove(i);
                } else {
                    self.selected_block_ids.push(block_id.to_string());
                }
                self.last_selected_block_id = Some(block_id.to_string());
            }
            ClickModifier::None => {
                self.focused_block_id = Some(block_id.to_string());
                self.select_single(block_id);
            }
        }
    }

    fn select_single(&mut self, block_id: &str) {
        self.selected_block_ids = vec![block_id.to_string()];
        self.last_selected_block_id = Some(block_id.to_string());
    }

    /// Focus after inserting a block: the new block, with any prior
    /// multi-selection cleared.
    pub fn after_insert(&mut self, new_block_id: &str) {
        self.focused_block_id = Some(new_block_id.to_string());
        self.selected_block_ids.clear();
    }

    /// Focus after deleting the block at `deleted_index`: the preceding
    /// block, or the new first block when the deleted one was first. The
    /// deleted ID also leaves the selection.
    pub fn after_delete(&mut self, remaining: &[Block], deleted_index: usize, deleted_id: &str) {
        self.selected_block_ids.retain(|id| id != deleted_id);
        if self.focused_block_id.as_deref() == Some(deleted_id) {
            self.focused_block_id = None;
        }
        if remaining.is_empty() {
            return;
        }
        let target = deleted_index.saturating_sub(1).min(remaining.len() - 1);
        self.focused_block_id = Some(remaining[target].id.clone());
    }
}
