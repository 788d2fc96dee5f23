//! The interactive editing layer: focus and selection, the command
//! palette, debounced autosave, and the per-document session that ties
//! them to the block operations.

pub mod autosave;
pub mod focus;
pub mod palette;
pub mod session;

pub use autosave::{AutosaveCoordinator, AUTOSAVE_DEBOUNCE};
pub use focus::{ClickModifier, FocusController};
pub use palette::{CommandPalette, PaletteEntry, PALETTE_ENTRIES};
pub use session::{EditorSession, KeyEvent, PaletteOutcome};
