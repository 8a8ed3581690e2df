//! # Entity Slot Map
//!
//! Sparse registry mapping slot index -> live entity handle.
//!
//! - `handles[slot]` and `present[slot]` are parallel arrays
//! - Capacity grows by doubling; it never shrinks
//! - `version` bumps on every add/remove so cursors can detect drift

use tracing::trace;

use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

/// Per-sub-world registry of live entity handles, indexed by slot.
///
/// Invariant: `present[slot]` is true iff `handles[slot]` is a live handle,
/// and that handle strictly equals whatever the caller added at that slot.
#[derive(Debug, Clone)]
pub struct EntitySlotMap {
    handles: Vec<EntityId>,
    present: Vec<bool>,
    count: usize,
    /// Upper bound of the occupied range. Shrinks only when the slot at the
    /// mark itself is removed, so it may overestimate.
    high_water: usize,
    version: u64,
}

impl EntitySlotMap {
    /// Creates an empty map with room for `capacity` slots.
    ///
    /// A zero capacity is bumped to one so doubling always makes progress.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            handles: vec![EntityId::EMPTY; capacity],
            present: vec![false; capacity],
            count: 0,
            high_water: 0,
            version: 0,
        }
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Checks if no entity is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of allocated slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.handles.len()
    }

    /// Largest slot that iteration has to consider.
    #[inline]
    #[must_use]
    pub const fn high_water_slot(&self) -> usize {
        self.high_water
    }

    /// Structural version; changes on every add/remove.
    #[inline]
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Raw handle array (empty handles in free slots).
    #[inline]
    #[must_use]
    pub fn handles(&self) -> &[EntityId] {
        &self.handles
    }

    /// Raw presence array.
    #[inline]
    #[must_use]
    pub fn presence(&self) -> &[bool] {
        &self.present
    }

    /// Returns the live handle stored at `slot`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<EntityId> {
        match self.present.get(slot) {
            Some(true) => Some(self.handles[slot]),
            _ => None,
        }
    }

    /// Checks whether `id` is live here, comparing all handle fields.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        if id.is_empty() {
            return false;
        }
        let index = id.index();
        index < self.handles.len() && self.present[index] && self.handles[index].strict_eq(id)
    }

    /// Registers a live handle at its slot, growing the arrays if needed.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EmptyEntity`] for the empty handle
    /// - [`EcsError::SlotOccupied`] if the slot already holds a live entity
    pub fn add(&mut self, id: EntityId) -> EcsResult<()> {
        if id.is_empty() {
            return Err(EcsError::EmptyEntity);
        }

        let index = id.index();
        if index >= self.handles.len() {
            self.grow_to_fit(index);
        }

        if self.present[index] {
            return Err(EcsError::SlotOccupied {
                slot: index,
                occupant: self.handles[index],
            });
        }

        self.handles[index] = id;
        self.present[index] = true;
        if index > self.high_water {
            self.high_water = index;
        }
        self.count += 1;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Removes a live handle, freeing its slot.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EmptyEntity`] for the empty handle
    /// - [`EcsError::EntityNotFound`] if the slot does not strictly hold `id`
    pub fn remove(&mut self, id: EntityId) -> EcsResult<()> {
        if id.is_empty() {
            return Err(EcsError::EmptyEntity);
        }
        if !self.contains(id) {
            return Err(EcsError::EntityNotFound { entity: id });
        }

        let index = id.index();
        self.handles[index] = EntityId::EMPTY;
        self.present[index] = false;
        if self.high_water == index {
            self.high_water = index.saturating_sub(1);
        }
        self.count -= 1;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Iterates live handles in ascending slot order.
    ///
    /// The borrow keeps the map frozen for the whole pass. Use
    /// [`EntitySlotMap::cursor`] when the map must stay mutable in between.
    #[must_use]
    pub fn iter(&self) -> SlotIter<'_> {
        SlotIter {
            map: self,
            next: 0,
            yielded: 0,
        }
    }

    /// Opens a detached cursor pinned to the current version.
    #[must_use]
    pub fn cursor(&self) -> SlotCursor {
        SlotCursor {
            version: self.version,
            next: 0,
            yielded: 0,
        }
    }

    fn grow_to_fit(&mut self, index: usize) {
        let mut capacity = self.handles.len().max(1);
        while capacity <= index {
            capacity <<= 1;
        }
        trace!(from = self.handles.len(), to = capacity, "slot map grew");
        self.handles.resize(capacity, EntityId::EMPTY);
        self.present.resize(capacity, false);
    }

    /// Shared stepping logic for [`SlotIter`] and [`SlotCursor`].
    fn step(&self, next: &mut usize, yielded: &mut usize) -> Option<EntityId> {
        loop {
            let index = *next;
            if index > self.high_water || *yielded >= self.count {
                return None;
            }
            *next += 1;
            if self.present[index] {
                *yielded += 1;
                return Some(self.handles[index]);
            }
        }
    }
}

impl Default for EntitySlotMap {
    fn default() -> Self {
        Self::with_capacity(crate::config::START_ENTITIES_CAPACITY)
    }
}

impl<'a> IntoIterator for &'a EntitySlotMap {
    type Item = EntityId;
    type IntoIter = SlotIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over live handles.
pub struct SlotIter<'a> {
    map: &'a EntitySlotMap,
    next: usize,
    yielded: usize,
}

impl Iterator for SlotIter<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<Self::Item> {
        self.map.step(&mut self.next, &mut self.yielded)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.map.count - self.yielded;
        (remaining, Some(remaining))
    }
}

/// Detached single-pass cursor over a slot map.
///
/// Holds no borrow; every step is checked against the version captured at
/// construction and fails once the map has been mutated.
#[derive(Debug, Clone)]
pub struct SlotCursor {
    version: u64,
    next: usize,
    yielded: usize,
}

impl SlotCursor {
    /// Advances to the next live handle.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleIteration`] if `map` changed since the cursor opened.
    pub fn advance(&mut self, map: &EntitySlotMap) -> EcsResult<Option<EntityId>> {
        if self.version != map.version {
            return Err(EcsError::StaleIteration {
                expected: self.version,
                found: map.version,
            });
        }
        Ok(map.step(&mut self.next, &mut self.yielded))
    }

    /// Rewinds to the first slot. The captured version is kept.
    pub fn reset(&mut self) {
        self.next = 0;
        self.yielded = 0;
    }
}
