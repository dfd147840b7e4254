//! Optimistic state layered over the mirror.
//!
//! The mirror only ever holds server-confirmed records. In-flight writes
//! live here as overrides; the reconciled view is the mirror folded through
//! the overlay stack in push order.

mod merge;
mod overlay;

pub use merge::{apply_diff, apply_update, merge_fields};
pub use overlay::{OverlayStack, OverlayToken, Override};
