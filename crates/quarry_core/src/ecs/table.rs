//! # Component Tables
//!
//! Sparse, slot-indexed storage for a single component type.
//!
//! The table uses a dense array strategy:
//! - One value per slot plus a parallel presence array
//! - Slots are the same indices the sub-world's slot map hands out
//! - Absent slots hold `T::default()`
//! - Iteration starts at the lowest occupied slot and stops once every
//!   present value has been visited
//!
//! Every operation that takes an [`EntitySlotMap`] validates the handle
//! against it. The table never owns the slot map; the sub-world does.

use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;

use tracing::trace;

use super::component::{Component, ComponentHook};
use super::entity::EntityId;
use super::slot_map::EntitySlotMap;
use crate::error::{EcsError, EcsResult};

/// Sentinel for "no occupied slot".
const NO_SLOT: usize = usize::MAX;

/// Storage for a single component type within one sub-world.
///
/// # Type Parameters
///
/// * `T` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut table: ComponentTable<Position> = ComponentTable::new(0, 64, None);
/// table.set(&slots, entity, Position::new(1.0, 2.0))?;
/// ```
pub struct ComponentTable<T: Component> {
    data: Vec<T>,
    present: Vec<bool>,
    count: usize,
    /// Lower bound on the smallest present slot, `NO_SLOT` when empty.
    lowest: usize,
    version: u64,
    type_index: usize,
    hook: Option<Box<dyn ComponentHook<T>>>,
}

impl<T: Component> ComponentTable<T> {
    /// Creates a table with `capacity` default-filled slots.
    ///
    /// # Arguments
    ///
    /// * `type_index` - Index of this table in its sub-world's registry
    /// * `capacity` - Initial slot capacity (match the slot map's)
    /// * `hook` - Optional lifecycle callbacks
    #[must_use]
    pub fn new(type_index: usize, capacity: usize, hook: Option<Box<dyn ComponentHook<T>>>) -> Self {
        let mut data = Vec::with_capacity(capacity);
        data.resize_with(capacity, T::default);
        Self {
            data,
            present: vec![false; capacity],
            count: 0,
            lowest: NO_SLOT,
            version: 0,
            type_index,
            hook,
        }
    }

    /// Installs or removes the lifecycle hook.
    pub fn set_hook(&mut self, hook: Option<Box<dyn ComponentHook<T>>>) {
        self.hook = hook;
    }

    /// Index of this table in its sub-world's registry.
    #[inline]
    #[must_use]
    pub const fn type_index(&self) -> usize {
        self.type_index
    }

    /// Number of present values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Checks if no value is present.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of allocated slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Table version; changes on every set/delete.
    #[inline]
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Lower bound of the occupied range, `None` when empty.
    #[inline]
    #[must_use]
    pub const fn lowest_occupied_slot(&self) -> Option<usize> {
        if self.lowest == NO_SLOT {
            None
        } else {
            Some(self.lowest)
        }
    }

    /// All slot values, present or not.
    #[inline]
    #[must_use]
    pub fn raw_components(&self) -> &[T] {
        &self.data
    }

    /// All slot values, mutably. Presence is unaffected.
    #[inline]
    pub fn raw_components_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Presence array, parallel to [`ComponentTable::raw_components`].
    #[inline]
    #[must_use]
    pub fn raw_presence(&self) -> &[bool] {
        &self.present
    }

    /// Splits the table into its mutable values and read-only presence.
    #[inline]
    pub fn columns_mut(&mut self) -> (&mut [T], &[bool]) {
        (&mut self.data, &self.present)
    }

    /// Checks whether `entity` is live and has a value here.
    #[inline]
    #[must_use]
    pub fn contains(&self, slots: &EntitySlotMap, entity: EntityId) -> bool {
        slots.contains(entity) && self.present.get(entity.index()).copied().unwrap_or(false)
    }

    /// Attaches or replaces the value for `entity`.
    ///
    /// Absent slot: `before_set`, store, `after_set`.
    /// Present slot: `before_replace`, store, `after_replace`.
    /// The version bumps in both cases.
    ///
    /// # Errors
    ///
    /// - [`EcsError::StaleEntity`] / [`EcsError::EmptyEntity`] if `entity`
    ///   is not live in `slots`
    /// - [`EcsError::SlotOutOfBounds`] if the table lags behind the slot map
    pub fn set(&mut self, slots: &EntitySlotMap, entity: EntityId, mut value: T) -> EcsResult<()> {
        let index = self.ensure_live(slots, entity)?;

        if self.present[index] {
            if let Some(hook) = self.hook.as_mut() {
                hook.before_replace(entity, &mut self.data[index], &mut value);
            }
            self.data[index] = value;
            self.version = self.version.wrapping_add(1);
            if let Some(hook) = self.hook.as_mut() {
                hook.after_replace(entity, &self.data[index]);
            }
        } else {
            if let Some(hook) = self.hook.as_mut() {
                hook.before_set(entity, &mut value);
            }
            self.data[index] = value;
            self.present[index] = true;
            self.count += 1;
            if index < self.lowest {
                self.lowest = index;
            }
            self.version = self.version.wrapping_add(1);
            if let Some(hook) = self.hook.as_mut() {
                hook.after_set(entity, &self.data[index]);
            }
        }
        Ok(())
    }

    /// Detaches the value for `entity`, resetting the slot to its default.
    ///
    /// Returns `false` (and fires no hook) if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Same handle validation as [`ComponentTable::set`].
    pub fn delete(&mut self, slots: &EntitySlotMap, entity: EntityId) -> EcsResult<bool> {
        let index = self.ensure_live(slots, entity)?;
        if !self.present[index] {
            return Ok(false);
        }

        if let Some(hook) = self.hook.as_mut() {
            hook.before_delete(entity, &mut self.data[index]);
        }
        self.data[index] = T::default();
        self.present[index] = false;
        self.count -= 1;
        if index == self.lowest {
            self.lowest = if self.count > 0 { index + 1 } else { NO_SLOT };
        }
        self.version = self.version.wrapping_add(1);
        if let Some(hook) = self.hook.as_mut() {
            hook.after_delete(entity);
        }
        Ok(true)
    }

    /// Deletes every present value in ascending slot order, firing hooks.
    ///
    /// # Errors
    ///
    /// Propagates handle validation failures, which indicate the table and
    /// slot map disagree.
    pub fn delete_all(&mut self, slots: &EntitySlotMap) -> EcsResult<()> {
        let mut index = self.lowest;
        while self.count > 0 && index < self.present.len() {
            if self.present[index] {
                let entity = slots.handles()[index];
                self.delete(slots, entity)?;
            }
            index += 1;
        }
        Ok(())
    }

    /// Reads the value for `entity`.
    ///
    /// The strict handle check only runs in debug builds.
    ///
    /// # Errors
    ///
    /// - [`EcsError::SlotOutOfBounds`] for slots beyond capacity
    /// - [`EcsError::StaleEntity`] (debug builds) for stale handles
    /// - [`EcsError::MissingComponent`] if no value is present
    pub fn get(&self, slots: &EntitySlotMap, entity: EntityId) -> EcsResult<&T> {
        let index = self.checked_index(slots, entity)?;
        if !self.present[index] {
            return Err(self.missing(entity));
        }
        Ok(&self.data[index])
    }

    /// Mutable counterpart of [`ComponentTable::get`].
    ///
    /// Writes through the reference bypass hooks and do not bump the version.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentTable::get`].
    pub fn get_mut(&mut self, slots: &EntitySlotMap, entity: EntityId) -> EcsResult<&mut T> {
        let index = self.checked_index(slots, entity)?;
        if !self.present[index] {
            return Err(self.missing(entity));
        }
        Ok(&mut self.data[index])
    }

    /// Reads the value for `entity` if it is live and has one.
    #[must_use]
    pub fn try_get(&self, slots: &EntitySlotMap, entity: EntityId) -> Option<&T> {
        if self.contains(slots, entity) {
            Some(&self.data[entity.index()])
        } else {
            None
        }
    }

    /// Direct slot access for callers that already hold a matched slot.
    #[inline]
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&T> {
        match self.present.get(index) {
            Some(true) => Some(&self.data[index]),
            _ => None,
        }
    }

    /// Mutable counterpart of [`ComponentTable::slot`].
    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut T> {
        match self.present.get(index) {
            Some(true) => Some(&mut self.data[index]),
            _ => None,
        }
    }

    /// Appends every entity with a value here, in ascending slot order.
    pub fn get_entities(&self, slots: &EntitySlotMap, out: &mut Vec<EntityId>) {
        let handles = slots.handles();
        let mut found = 0;
        let mut index = self.lowest;
        while found < self.count && index < self.present.len() {
            if self.present[index] {
                out.push(handles[index]);
                found += 1;
            }
            index += 1;
        }
    }

    /// Grows to `capacity` slots. Never shrinks.
    pub fn resize_to(&mut self, capacity: usize) {
        if capacity <= self.data.len() {
            return;
        }
        trace!(
            table = type_name::<T>(),
            from = self.data.len(),
            to = capacity,
            "component table resized"
        );
        self.data.resize_with(capacity, T::default);
        self.present.resize(capacity, false);
    }

    /// Iterates `(entity, value)` pairs in ascending slot order.
    #[must_use]
    pub fn iter<'a>(&'a self, slots: &'a EntitySlotMap) -> TableIter<'a, T> {
        TableIter {
            table: self,
            handles: slots.handles(),
            next: self.lowest,
            yielded: 0,
        }
    }

    /// Iterates `(entity, value)` pairs mutably in ascending slot order.
    ///
    /// Values can be edited in place; hooks do not fire.
    pub fn iter_mut<'a>(
        &'a mut self,
        slots: &'a EntitySlotMap,
    ) -> impl Iterator<Item = (EntityId, &'a mut T)> + 'a {
        let start = self.lowest.min(self.data.len());
        let handles = slots.handles();
        self.data
            .iter_mut()
            .zip(self.present.iter())
            .enumerate()
            .skip(start)
            .filter_map(move |(index, (value, &present))| {
                if present {
                    Some((handles[index], value))
                } else {
                    None
                }
            })
    }

    /// Opens a detached cursor pinned to the table and slot map versions.
    #[must_use]
    pub fn cursor(&self, slots: &EntitySlotMap) -> TableCursor<T> {
        TableCursor {
            table_version: self.version,
            slots_version: slots.version(),
            next: self.lowest,
            yielded: 0,
            _marker: PhantomData,
        }
    }

    fn ensure_live(&self, slots: &EntitySlotMap, entity: EntityId) -> EcsResult<usize> {
        if entity.is_empty() {
            return Err(EcsError::EmptyEntity);
        }
        if !slots.contains(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        self.bounded(entity.index())
    }

    fn checked_index(&self, slots: &EntitySlotMap, entity: EntityId) -> EcsResult<usize> {
        let index = self.bounded(entity.index())?;
        if cfg!(debug_assertions) && !slots.contains(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        Ok(index)
    }

    fn bounded(&self, index: usize) -> EcsResult<usize> {
        if index < self.data.len() {
            Ok(index)
        } else {
            Err(EcsError::SlotOutOfBounds {
                slot: index,
                capacity: self.data.len(),
            })
        }
    }

    fn missing(&self, entity: EntityId) -> EcsError {
        EcsError::MissingComponent {
            entity,
            type_name: type_name::<T>(),
        }
    }
}

/// Borrowing iterator over a table's `(entity, value)` pairs.
pub struct TableIter<'a, T: Component> {
    table: &'a ComponentTable<T>,
    handles: &'a [EntityId],
    next: usize,
    yielded: usize,
}

impl<'a, T: Component> Iterator for TableIter<'a, T> {
    type Item = (EntityId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let table = self.table;
        while self.yielded < table.count && self.next < table.present.len() {
            let index = self.next;
            self.next += 1;
            if table.present[index] {
                self.yielded += 1;
                return Some((self.handles[index], &table.data[index]));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.count - self.yielded;
        (remaining, Some(remaining))
    }
}

/// Detached cursor over a table.
///
/// Captures both the table version and the slot map version; any change
/// to either, including one made from inside a hook, fails the next step.
pub struct TableCursor<T: Component> {
    table_version: u64,
    slots_version: u64,
    next: usize,
    yielded: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> TableCursor<T> {
    /// Advances to the next `(entity, value)` pair.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleIteration`] if the table or slot map changed since
    /// the cursor opened.
    pub fn advance<'t>(
        &mut self,
        table: &'t ComponentTable<T>,
        slots: &EntitySlotMap,
    ) -> EcsResult<Option<(EntityId, &'t T)>> {
        if self.table_version != table.version {
            return Err(EcsError::StaleIteration {
                expected: self.table_version,
                found: table.version,
            });
        }
        if self.slots_version != slots.version() {
            return Err(EcsError::StaleIteration {
                expected: self.slots_version,
                found: slots.version(),
            });
        }

        while self.yielded < table.count && self.next < table.present.len() {
            let index = self.next;
            self.next += 1;
            if table.present[index] {
                self.yielded += 1;
                return Ok(Some((slots.handles()[index], &table.data[index])));
            }
        }
        Ok(None)
    }

    /// Rewinds to the table's lowest occupied slot. Captured versions are kept.
    pub fn reset(&mut self, table: &ComponentTable<T>) {
        self.next = table.lowest;
        self.yielded = 0;
    }
}

/// Type-erased view of a [`ComponentTable`], used by sub-worlds and the
/// matcher to handle heterogeneous tables uniformly.
pub trait ErasedTable: Any {
    /// Index of the table in its sub-world's registry.
    fn type_index(&self) -> usize;
    /// `TypeId` of the stored component.
    fn component_type(&self) -> TypeId;
    /// Human-readable component type name.
    fn component_name(&self) -> &'static str;
    /// Number of present values.
    fn len(&self) -> usize;
    /// Checks if no value is present.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Number of allocated slots.
    fn capacity(&self) -> usize;
    /// Table version.
    fn version(&self) -> u64;
    /// Presence array.
    fn presence(&self) -> &[bool];
    /// Checks whether `entity` is live and has a value here.
    fn contains(&self, slots: &EntitySlotMap, entity: EntityId) -> bool;
    /// See [`ComponentTable::delete`].
    ///
    /// # Errors
    ///
    /// Handle validation failures.
    fn delete(&mut self, slots: &EntitySlotMap, entity: EntityId) -> EcsResult<bool>;
    /// See [`ComponentTable::delete_all`].
    ///
    /// # Errors
    ///
    /// Handle validation failures.
    fn delete_all(&mut self, slots: &EntitySlotMap) -> EcsResult<()>;
    /// See [`ComponentTable::get_entities`].
    fn get_entities(&self, slots: &EntitySlotMap, out: &mut Vec<EntityId>);
    /// See [`ComponentTable::resize_to`].
    fn resize_to(&mut self, capacity: usize);
    /// Upcast for downcasting to the concrete table.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting to the concrete table.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedTable for ComponentTable<T> {
    fn type_index(&self) -> usize {
        self.type_index
    }

    fn component_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn len(&self) -> usize {
        self.count
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn presence(&self) -> &[bool] {
        &self.present
    }

    fn contains(&self, slots: &EntitySlotMap, entity: EntityId) -> bool {
        Self::contains(self, slots, entity)
    }

    fn delete(&mut self, slots: &EntitySlotMap, entity: EntityId) -> EcsResult<bool> {
        Self::delete(self, slots, entity)
    }

    fn delete_all(&mut self, slots: &EntitySlotMap) -> EcsResult<()> {
        Self::delete_all(self, slots)
    }

    fn get_entities(&self, slots: &EntitySlotMap, out: &mut Vec<EntityId>) {
        Self::get_entities(self, slots, out);
    }

    fn resize_to(&mut self, capacity: usize) {
        Self::resize_to(self, capacity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn ErasedTable {
    /// Downcasts to the concrete table type.
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&ComponentTable<T>> {
        self.as_any().downcast_ref()
    }

    /// Mutable counterpart of `downcast_ref`.
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut ComponentTable<T>> {
        self.as_any_mut().downcast_mut()
    }
}

#[cfg(test)]
#[allow(dead_code)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Mass(f32);

    impl Component for Mass {}

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Label(String);

    impl Component for Label {}

    fn populated(slots_used: &[u16]) -> (EntitySlotMap, Vec<EntityId>) {
        let mut slots = EntitySlotMap::with_capacity(8);
        let ids: Vec<EntityId> = slots_used
            .iter()
            .enumerate()
            .map(|(i, &slot)| EntityId::new(i as u32 + 1, slot, 0))
            .collect();
        for &id in &ids {
            slots.add(id).unwrap();
        }
        (slots, ids)
    }

    #[derive(Default)]
    struct Log(Vec<String>);

    struct Recorder(Rc<RefCell<Log>>);

    fn recorder(log: &Rc<RefCell<Log>>) -> Option<Box<dyn ComponentHook<Mass>>> {
        Some(Box::new(Recorder(Rc::clone(log))))
    }

    impl ComponentHook<Mass> for Recorder {
        fn before_set(&mut self, entity: EntityId, component: &mut Mass) {
            self.0.borrow_mut().0.push(format!("before_set {} {}", entity.serial(), component.0));
        }
        fn after_set(&mut self, entity: EntityId, _component: &Mass) {
            self.0.borrow_mut().0.push(format!("after_set {}", entity.serial()));
        }
        fn before_replace(&mut self, _entity: EntityId, current: &mut Mass, incoming: &mut Mass) {
            self.0.borrow_mut().0.push(format!("replace {} -> {}", current.0, incoming.0));
        }
        fn after_replace(&mut self, _entity: EntityId, component: &Mass) {
            self.0.borrow_mut().0.push(format!("after_replace {}", component.0));
        }
        fn before_delete(&mut self, _entity: EntityId, component: &mut Mass) {
            self.0.borrow_mut().0.push(format!("before_delete {}", component.0));
        }
        fn after_delete(&mut self, entity: EntityId) {
            self.0.borrow_mut().0.push(format!("after_delete {}", entity.serial()));
        }
    }

    #[test]
    fn test_set_get_delete() {
        let (slots, ids) = populated(&[0, 1]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);

        table.set(&slots, ids[1], Mass(2.5)).unwrap();
        assert_eq!(table.get(&slots, ids[1]).unwrap(), &Mass(2.5));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lowest_occupied_slot(), Some(1));

        assert!(table.delete(&slots, ids[1]).unwrap());
        assert!(table.try_get(&slots, ids[1]).is_none());
        assert!(matches!(
            table.get(&slots, ids[1]),
            Err(EcsError::MissingComponent { .. })
        ));
        assert_eq!(table.lowest_occupied_slot(), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let log = Rc::new(RefCell::new(Log::default()));
        let (slots, ids) = populated(&[0]);
        let mut table = ComponentTable::new(0, 8, recorder(&log));

        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        assert!(table.delete(&slots, ids[0]).unwrap());
        let version = table.version();
        assert!(!table.delete(&slots, ids[0]).unwrap());

        assert_eq!(table.len(), 0);
        assert_eq!(table.version(), version);
        let deletes = log.borrow().0.iter().filter(|e| e.starts_with("after_delete")).count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn test_hook_order() {
        let log = Rc::new(RefCell::new(Log::default()));
        let (slots, ids) = populated(&[3]);
        let mut table = ComponentTable::new(0, 8, recorder(&log));

        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        table.set(&slots, ids[0], Mass(2.0)).unwrap();
        table.delete(&slots, ids[0]).unwrap();

        assert_eq!(
            log.borrow().0,
            vec![
                "before_set 1 1",
                "after_set 1",
                "replace 1 -> 2",
                "after_replace 2",
                "before_delete 2",
                "after_delete 1",
            ]
        );
    }

    #[test]
    fn test_version_bumps_on_every_set() {
        let (slots, ids) = populated(&[0]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);
        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        assert_eq!(table.version(), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_delete_resets_to_default() {
        let (slots, ids) = populated(&[2]);
        let mut table: ComponentTable<Label> = ComponentTable::new(0, 8, None);
        table.set(&slots, ids[0], Label("crate".into())).unwrap();
        table.delete(&slots, ids[0]).unwrap();
        assert_eq!(table.raw_components()[2], Label::default());
    }

    #[test]
    fn test_stale_handle_rejected() {
        let (mut slots, ids) = populated(&[0]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);
        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        table.delete(&slots, ids[0]).unwrap();
        slots.remove(ids[0]).unwrap();

        let reused = EntityId::new(99, 0, 0);
        slots.add(reused).unwrap();
        assert_eq!(
            table.set(&slots, ids[0], Mass(5.0)),
            Err(EcsError::StaleEntity { entity: ids[0] })
        );
        table.set(&slots, reused, Mass(7.0)).unwrap();
        assert!(table.try_get(&slots, ids[0]).is_none());
    }

    #[test]
    fn test_iteration_and_get_entities() {
        let (slots, ids) = populated(&[5, 1, 3]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);
        for (i, &id) in ids.iter().enumerate() {
            table.set(&slots, id, Mass(i as f32)).unwrap();
        }

        let pairs: Vec<(u16, f32)> = table.iter(&slots).map(|(id, m)| (id.slot(), m.0)).collect();
        assert_eq!(pairs, vec![(1, 1.0), (3, 2.0), (5, 0.0)]);

        let mut out = Vec::new();
        table.get_entities(&slots, &mut out);
        assert_eq!(out.iter().map(|id| id.slot()).collect::<Vec<_>>(), vec![1, 3, 5]);

        for (_, mass) in table.iter_mut(&slots) {
            mass.0 += 10.0;
        }
        assert_eq!(table.slot(3), Some(&Mass(12.0)));
    }

    #[test]
    fn test_lowest_slot_advances() {
        let (slots, ids) = populated(&[1, 2]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);
        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        table.set(&slots, ids[1], Mass(2.0)).unwrap();
        table.delete(&slots, ids[0]).unwrap();
        assert_eq!(table.lowest_occupied_slot(), Some(2));
        assert_eq!(table.iter(&slots).count(), 1);
    }

    #[test]
    fn test_delete_all_fires_hooks() {
        let log = Rc::new(RefCell::new(Log::default()));
        let (slots, ids) = populated(&[4, 0, 2]);
        let mut table = ComponentTable::new(0, 8, recorder(&log));
        for &id in &ids {
            table.set(&slots, id, Mass(1.0)).unwrap();
        }
        log.borrow_mut().0.clear();

        table.delete_all(&slots).unwrap();
        assert!(table.is_empty());
        let order: Vec<String> = log
            .borrow()
            .0
            .iter()
            .filter(|e| e.starts_with("after_delete"))
            .cloned()
            .collect();
        assert_eq!(order, vec!["after_delete 2", "after_delete 3", "after_delete 1"]);
    }

    #[test]
    fn test_cursor_fails_after_mutation() {
        let (slots, ids) = populated(&[0, 1]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);
        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        table.set(&slots, ids[1], Mass(2.0)).unwrap();

        let mut cursor = table.cursor(&slots);
        let first = cursor.advance(&table, &slots).unwrap().map(|(id, m)| (id.slot(), m.0));
        assert_eq!(first, Some((0, 1.0)));

        table.delete(&slots, ids[1]).unwrap();
        assert!(matches!(
            cursor.advance(&table, &slots),
            Err(EcsError::StaleIteration { .. })
        ));
    }

    #[test]
    fn test_cursor_fails_after_slot_map_change() {
        let (mut slots, ids) = populated(&[0]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);
        table.set(&slots, ids[0], Mass(1.0)).unwrap();

        let mut cursor = table.cursor(&slots);
        slots.add(EntityId::new(50, 6, 0)).unwrap();
        assert!(cursor.advance(&table, &slots).is_err());
    }

    #[test]
    fn test_resize_preserves_contents() {
        let (slots, ids) = populated(&[1, 6]);
        let mut table: ComponentTable<Mass> = ComponentTable::new(0, 8, None);
        table.set(&slots, ids[0], Mass(1.0)).unwrap();
        table.set(&slots, ids[1], Mass(6.0)).unwrap();
        let version = table.version();

        table.resize_to(16);
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.slot(1), Some(&Mass(1.0)));
        assert_eq!(table.slot(6), Some(&Mass(6.0)));
        assert_eq!(table.len(), 2);
        assert_eq!(table.version(), version);

        table.resize_to(4);
        assert_eq!(table.capacity(), 16);
    }

    #[test]
    fn test_erased_downcast() {
        let (slots, ids) = populated(&[0]);
        let mut boxed: Box<dyn ErasedTable> = Box::new(ComponentTable::<Mass>::new(3, 8, None));
        boxed
            .downcast_mut::<Mass>()
            .unwrap()
            .set(&slots, ids[0], Mass(4.0))
            .unwrap();

        assert_eq!(boxed.type_index(), 3);
        assert_eq!(boxed.len(), 1);
        assert!(boxed.presence()[0]);
        assert!(boxed.downcast_ref::<Label>().is_none());
        assert!(boxed.delete(&slots, ids[0]).unwrap());
    }
}
