//! Block sequence operations.
//!
//! All operations take the current ordered block list and return a new
//! list instead of mutating in place, which keeps invariant checking and
//! re-rendering simple. Focus decisions belong to the editor layer; these
//! functions only compute sequences.

use crate::doc::types::{next_block_id, Block, BlockType};

/// Index of a block within the sequence.
pub fn position(blocks: &[Block], block_id: &str) -> Option<usize> {
    blocks.iter().position(|b| b.id == block_id)
}

/// Insert a newly identified block immediately after `anchor_id`.
///
/// When the anchor is not found the new block is inserted at the front
/// rather than dropped. Returns the new sequence and the new block's ID.
pub fn insert_after(
    blocks: &[Block],
    anchor_id: &str,
    kind: BlockType,
    initial_content: &str,
) -> (Vec<Block>, String) {
    let insert_at = position(blocks, anchor_id).map(|i| i + 1).unwrap_or(0);
    let new_id = next_block_id();

    let mut next = Vec::with_capacity(blocks.len() + 1);
    next.extend_from_slice(&blocks[..insert_at]);
    next.push(Block::new(new_id.clone(), kind, initial_content));
    next.extend_from_slice(&blocks[insert_at..]);
    (next, new_id)
}

/// Remove a block. A document never persists with an empty block list, so
/// deleting the last remaining block re-seeds a default text block.
pub fn delete(blocks: &[Block], block_id: &str) -> Vec<Block> {
    let mut next: Vec<Block> = blocks.iter().filter(|b| b.id != block_id).cloned().collect();
    if next.is_empty() {
        next.push(Block::new(next_block_id(), BlockType::Text, ""));
    }
    next
}

/// Replace a block's content in place, preserving type and position.
pub fn change_content(blocks: &[Block], block_id: &str, content: &str) -> Vec<Block> {
    blocks
        .iter()
        .map(|b| {
            if b.id == block_id {
                let mut changed = b.clone();
                changed.content = content.to_string();
                changed
            } else {
                b.clone()
            }
        })
        .collect()
}

/// Change a block's type. Content resets to empty, except when converting
/// between list-like types while the block already has content, in which
/// case only the type flips.
pub fn change_type(blocks: &[Block], block_id: &str, kind: BlockType) -> Vec<Block> {
    blocks
        .iter()
        .map(|b| {
            if b.id == block_id {
                let keep_content = b.kind.is_list() && kind.is_list() && !b.content.trim().is_empty();
                let mut changed = b.clone();
                changed.kind = kind;
                if !keep_content {
                    changed.content = String::new();
                }
                changed
            } else {
                b.clone()
            }
        })
        .collect()
}

/// Reorder via drag.
///
/// Single mode removes the block at `from_index` and reinserts it at
/// `to_index`. When the dragged block belongs to a multi-block selection,
/// all selected blocks move as one contiguous run: they are extracted in
/// their current relative order and reinserted at `to_index` computed
/// against the remaining (non-selected) list.
pub fn reorder(
    blocks: &[Block],
    selection: &[String],
    from_index: usize,
    to_index: usize,
) -> Vec<Block> {
    if from_index >= blocks.len() {
        return blocks.to_vec();
    }

    let dragged_in_selection = selection.len() > 1
        && selection.iter().any(|id| *id == blocks[from_index].id);

    if dragged_in_selection {
        let (selected, mut remaining): (Vec<Block>, Vec<Block>) = blocks
            .iter()
            .cloned()
            .partition(|b| selection.iter().any(|id| *id == b.id));
        let insert_at = to_index.min(remaining.len());
        remaining.splice(insert_at..insert_at, selected);
        remaining
    } else {
        let mut next = blocks.to_vec();
        let moved = next.remove(from_index);
        let insert_at = to_index.min(next.len());
        next.insert(insert_at, moved);
        next
    }
}

/// The contiguous run of block IDs between two positions, inclusive and
/// independent of which end is the anchor. The page title (a `heading-1`
/// at index 0) is never part of a range selection.
pub fn range_select(blocks: &[Block], anchor_id: &str, target_id: &str) -> Vec<String> {
    let (Some(a), Some(b)) = (position(blocks, anchor_id), position(blocks, target_id)) else {
        return Vec::new();
    };
    let (start, end) = (a.min(b), a.max(b));

    blocks[start..=end]
        .iter()
        .enumerate()
        .filter(|(offset, block)| {
            !(start + offset == 0 && block.kind == BlockType::Heading1)
        })
        .map(|(_, block)| block.id.clone())
        .collect()
}
