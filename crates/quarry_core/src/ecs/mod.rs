//! # Entity Component Storage
//!
//! Handles, slot maps, component tables and the query machinery on top.
//!
//! ## Design Philosophy
//!
//! - Every sub-world owns one slot map and one table per component type
//! - Tables are slot-indexed dense arrays with a presence flag per slot
//! - Queries are described once, cached, and matched straight off the
//!   presence arrays
//! - Structural changes bump version counters so detached cursors can
//!   refuse to continue

mod component;
mod descriptor;
mod entity;
mod matcher;
mod slot_map;
mod sub_world;
mod table;
mod view;
mod world;

pub use component::{Component, ComponentHook};
pub use descriptor::{DescriptorBuilder, FieldBinding, QueryShape, TypeDescriptor};
pub use entity::EntityId;
pub use matcher::{
    collect_matches, ComponentFilter, ComponentFilter2, Matcher, SlotFilter, SlotPredicate,
    SubWorldView,
};
pub use slot_map::{EntitySlotMap, SlotCursor, SlotIter};
pub use sub_world::{DirectColumns, SubWorld};
pub use table::{ComponentTable, ErasedTable, TableCursor, TableIter};
pub use view::{View1, View2, View3, View4, View5};
pub use world::World;
