//! # Memory Management
//!
//! Recycled query containers and the packed singleton buffer.
//!
//! ## Design Philosophy
//!
//! Both structures allocate up front and then reuse:
//! - Query results cycle through the [`ResultPool`]
//! - Shared components live at fixed offsets in one [`SharedStore`] buffer

mod pool;
mod shared;

pub use pool::{EntityList, IndexSet, Pooled, Recyclable, ResultPool, ScratchList};
pub use shared::{PinnedSlot, SharedEntryView, SharedStore, SHARED_ALIGNMENT};
