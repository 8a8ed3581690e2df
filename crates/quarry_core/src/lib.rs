//! # QUARRY Core Engine
//!
//! Sparse component storage and query engine designed for:
//! - Large populations of uniformly typed records attached to entity handles
//! - High-frequency "has A and B but not C" queries
//! - Zero allocation in steady state
//!
//! ## Architecture Rules
//!
//! 1. **Handles, not pointers** - Entities are `{serial, slot, sub-world}`
//!    values checked against the slot map on every access
//! 2. **One dense array per type** - Tables are indexed by slot, with a
//!    parallel presence array the matcher reads directly
//! 3. **Pooled results** - Match output goes through a recycling pool
//! 4. **Fail fast** - Stale handles, double releases and mutation under an
//!    open cursor are errors, never silent
//!
//! ## Example
//!
//! ```rust,ignore
//! use quarry_core::{World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::default())?;
//! world.register_sub_world::<Units, _>(|sub| {
//!     sub.register::<Position>(None)?;
//!     sub.register::<Velocity>(None)?;
//!     Ok(())
//! })?;
//!
//! let unit = world.create_entity::<Units>()?;
//! let units = world.sub_world_mut::<Units>()?;
//! units.set(unit, Position::default())?;
//! units.set(unit, Velocity::default())?;
//! units.view2::<Position, Velocity>()?.for_each(|_, pos, vel| pos.advance(vel))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::WorldConfig;
pub use ecs::{
    collect_matches, Component, ComponentFilter, ComponentFilter2, ComponentHook, ComponentTable,
    DescriptorBuilder, DirectColumns, EntityId, EntitySlotMap, ErasedTable, FieldBinding, Matcher,
    QueryShape, SlotCursor, SlotFilter, SlotPredicate, SubWorld, SubWorldView, TableCursor,
    TypeDescriptor, View1, View2, View3, View4, View5, World,
};
pub use error::{EcsError, EcsResult, ErrorKind};
pub use memory::{EntityList, PinnedSlot, Pooled, ResultPool, SharedStore};
