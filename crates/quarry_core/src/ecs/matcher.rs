//! # Matching Engine
//!
//! Walks a sub-world's slot range and collects the entities whose
//! component presence fits a [`TypeDescriptor`].
//!
//! ## Algorithm
//!
//! For every slot in `0..=high_water`, stopping once all live entities
//! have been seen:
//! 1. Skip slots that hold no live entity
//! 2. Every include type must be present (first miss rejects)
//! 3. No exclude type may be present (first hit rejects)
//! 4. Every predicate must accept, in registration order
//!
//! Survivors are appended in ascending slot order. A presence array that
//! is shorter than the slot being tested counts as "absent".

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use super::component::Component;
use super::descriptor::TypeDescriptor;
use super::entity::EntityId;
use super::slot_map::EntitySlotMap;
use super::sub_world::SubWorld;
use super::table::{ComponentTable, ErasedTable};
use crate::error::{EcsError, EcsResult};
use crate::memory::EntityList;

/// Read-only snapshot of a sub-world handed to the matcher and predicates.
#[derive(Clone, Copy)]
pub struct SubWorldView<'w> {
    slots: &'w EntitySlotMap,
    tables: &'w [Box<dyn ErasedTable>],
    type_indices: &'w HashMap<TypeId, usize>,
}

impl<'w> SubWorldView<'w> {
    /// Creates a view over the given parts.
    #[must_use]
    pub fn new(
        slots: &'w EntitySlotMap,
        tables: &'w [Box<dyn ErasedTable>],
        type_indices: &'w HashMap<TypeId, usize>,
    ) -> Self {
        Self {
            slots,
            tables,
            type_indices,
        }
    }

    /// The slot map.
    #[inline]
    #[must_use]
    pub const fn slots(&self) -> &'w EntitySlotMap {
        self.slots
    }

    /// Number of registered tables.
    #[inline]
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Type index of `T`, if registered.
    #[must_use]
    pub fn type_index_of<T: Component>(&self) -> Option<usize> {
        self.type_indices.get(&TypeId::of::<T>()).copied()
    }

    /// Presence array of the table at `type_index`.
    #[inline]
    #[must_use]
    pub fn presence(&self, type_index: usize) -> Option<&'w [bool]> {
        self.tables.get(type_index).map(|table| table.presence())
    }

    /// Whether the table at `type_index` has a value in `slot`.
    #[inline]
    #[must_use]
    pub fn is_present(&self, type_index: usize, slot: usize) -> bool {
        self.presence(type_index)
            .and_then(|presence| presence.get(slot).copied())
            .unwrap_or(false)
    }

    /// Raw value column of the table at `type_index`, if it stores `T`.
    #[must_use]
    pub fn column<T: Component>(&self, type_index: usize) -> Option<&'w [T]> {
        let table = self.tables.get(type_index)?;
        table.downcast_ref::<T>().map(|table| table.raw_components())
    }

    fn admits(&self, descriptor: &TypeDescriptor, slot: usize) -> bool {
        descriptor
            .include()
            .iter()
            .all(|&index| self.is_present(index, slot))
            && !descriptor
                .exclude()
                .iter()
                .any(|&index| self.is_present(index, slot))
    }
}

/// A per-slot test applied after the include/exclude checks.
pub trait SlotPredicate {
    /// Whether the entity in `slot` should be kept.
    fn is_match(&self, view: &SubWorldView<'_>, slot: usize) -> bool;
}

/// Appends every live entity matching `descriptor` and `predicates` to `out`.
///
/// # Errors
///
/// [`EcsError::UnknownTypeIndex`] if the descriptor names a type index the
/// view has no table for. Nothing is appended in that case.
pub fn collect_matches(
    out: &mut Vec<EntityId>,
    descriptor: &TypeDescriptor,
    view: &SubWorldView<'_>,
    predicates: &[Box<dyn SlotPredicate + '_>],
) -> EcsResult<()> {
    let registered = view.table_count();
    if let Some(&index) = descriptor
        .include()
        .iter()
        .chain(descriptor.exclude())
        .find(|&&index| index >= registered)
    {
        return Err(EcsError::UnknownTypeIndex { index, registered });
    }

    let slots = view.slots();
    let live = slots.presence();
    let handles = slots.handles();
    let total = slots.len();
    let high_water = slots.high_water_slot();

    let mut seen = 0;
    let mut slot = 0;
    while seen < total && slot <= high_water {
        if live[slot] {
            seen += 1;
            if view.admits(descriptor, slot)
                && predicates.iter().all(|predicate| predicate.is_match(view, slot))
            {
                out.push(handles[slot]);
            }
        }
        slot += 1;
    }
    Ok(())
}

/// Keeps entities whose `T` value passes `test`.
///
/// Reads the value and presence columns it was built with, without going
/// back through the sub-world.
pub struct ComponentFilter<'w, T, F> {
    column: &'w [T],
    presence: &'w [bool],
    test: F,
}

impl<'w, T: Component, F: Fn(&T) -> bool> ComponentFilter<'w, T, F> {
    /// Creates a filter over `T`'s value and presence columns.
    #[must_use]
    pub fn new(table: &'w ComponentTable<T>, test: F) -> Self {
        Self {
            column: table.raw_components(),
            presence: table.raw_presence(),
            test,
        }
    }
}

impl<T: Component, F: Fn(&T) -> bool> SlotPredicate for ComponentFilter<'_, T, F> {
    #[inline]
    fn is_match(&self, _view: &SubWorldView<'_>, slot: usize) -> bool {
        self.presence.get(slot).copied().unwrap_or(false)
            && self.column.get(slot).is_some_and(|value| (self.test)(value))
    }
}

/// Keeps entities whose `A` and `B` values jointly pass `test`.
pub struct ComponentFilter2<'w, A, B, F> {
    first: &'w [A],
    first_presence: &'w [bool],
    second: &'w [B],
    second_presence: &'w [bool],
    test: F,
}

impl<'w, A: Component, B: Component, F: Fn(&A, &B) -> bool> ComponentFilter2<'w, A, B, F> {
    /// Creates a filter over the columns of `first` and `second`.
    #[must_use]
    pub fn new(first: &'w ComponentTable<A>, second: &'w ComponentTable<B>, test: F) -> Self {
        Self {
            first: first.raw_components(),
            first_presence: first.raw_presence(),
            second: second.raw_components(),
            second_presence: second.raw_presence(),
            test,
        }
    }
}

impl<A: Component, B: Component, F: Fn(&A, &B) -> bool> SlotPredicate
    for ComponentFilter2<'_, A, B, F>
{
    #[inline]
    fn is_match(&self, _view: &SubWorldView<'_>, slot: usize) -> bool {
        if !self.first_presence.get(slot).copied().unwrap_or(false)
            || !self.second_presence.get(slot).copied().unwrap_or(false)
        {
            return false;
        }
        match (self.first.get(slot), self.second.get(slot)) {
            (Some(a), Some(b)) => (self.test)(a, b),
            _ => false,
        }
    }
}

/// Keeps entities for which `test(view, slot)` holds.
pub struct SlotFilter<F>(pub F);

impl<F: Fn(&SubWorldView<'_>, usize) -> bool> SlotPredicate for SlotFilter<F> {
    fn is_match(&self, view: &SubWorldView<'_>, slot: usize) -> bool {
        (self.0)(view, slot)
    }
}

/// A descriptor bound to a sub-world, plus a predicate chain.
///
/// # Example
///
/// ```rust,ignore
/// let fast = sub_world
///     .matcher::<(Position, Velocity)>()?
///     .add_filter(|v: &Velocity| v.speed() > 10.0)?
///     .entities("fast movers")?;
/// // ...
/// sub_world.pool().release(fast)?;
/// ```
pub struct Matcher<'w> {
    sub_world: &'w SubWorld,
    descriptor: Rc<TypeDescriptor>,
    predicates: Vec<Box<dyn SlotPredicate + 'w>>,
}

impl<'w> Matcher<'w> {
    /// Creates a matcher with no predicates.
    #[must_use]
    pub fn new(sub_world: &'w SubWorld, descriptor: Rc<TypeDescriptor>) -> Self {
        Self {
            sub_world,
            descriptor,
            predicates: Vec::new(),
        }
    }

    /// The descriptor this matcher runs.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Appends a filter on the value of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` has no table.
    pub fn add_filter<T, F>(mut self, test: F) -> EcsResult<Self>
    where
        T: Component,
        F: Fn(&T) -> bool + 'w,
    {
        let sub_world: &'w SubWorld = self.sub_world;
        let table = sub_world.table::<T>()?;
        self.predicates.push(Box::new(ComponentFilter::new(table, test)));
        Ok(self)
    }

    /// Appends a filter on the values of `A` and `B` together.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if either type has no table.
    pub fn add_filter2<A, B, F>(mut self, test: F) -> EcsResult<Self>
    where
        A: Component,
        B: Component,
        F: Fn(&A, &B) -> bool + 'w,
    {
        let sub_world: &'w SubWorld = self.sub_world;
        let first = sub_world.table::<A>()?;
        let second = sub_world.table::<B>()?;
        self.predicates
            .push(Box::new(ComponentFilter2::new(first, second, test)));
        Ok(self)
    }

    /// Appends an arbitrary predicate.
    #[must_use]
    pub fn add_predicate<P: SlotPredicate + 'w>(mut self, predicate: P) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Appends the matches to `out`, ascending by slot.
    ///
    /// # Errors
    ///
    /// See [`collect_matches`].
    pub fn entities_into(&self, out: &mut Vec<EntityId>) -> EcsResult<()> {
        collect_matches(out, &self.descriptor, &self.sub_world.query_view(), &self.predicates)
    }

    /// Collects the matches into a pooled list tagged with `context`.
    ///
    /// The caller owns the list and must release it to the sub-world's pool.
    ///
    /// # Errors
    ///
    /// Pool errors, plus those of [`Matcher::entities_into`].
    pub fn entities(&self, context: &'static str) -> EcsResult<EntityList> {
        let pool = self.sub_world.pool();
        let mut list = pool.acquire_entities(context)?;
        if let Err(err) = self.entities_into(&mut list) {
            pool.release(list)?;
            return Err(err);
        }
        Ok(list)
    }

    /// Number of matches.
    ///
    /// # Errors
    ///
    /// Same as [`Matcher::entities`].
    pub fn count(&self) -> EcsResult<usize> {
        let list = self.entities("matcher count")?;
        let count = list.len();
        self.sub_world.pool().release(list)?;
        Ok(count)
    }

    /// Raw value column of a component the shape binds.
    ///
    /// Index it with a matched entity's [`EntityId::index`].
    ///
    /// # Errors
    ///
    /// [`EcsError::UnboundColumn`] if the shape does not bind `T`.
    pub fn column<T: Component>(&self) -> EcsResult<&'w [T]> {
        let unbound = || EcsError::UnboundColumn {
            type_name: type_name::<T>(),
        };
        let binding = self.descriptor.binding_of::<T>().ok_or_else(unbound)?;
        let sub_world: &'w SubWorld = self.sub_world;
        sub_world.tables()[binding.type_index]
            .downcast_ref::<T>()
            .map(|table| table.raw_components())
            .ok_or_else(unbound)
    }
}
