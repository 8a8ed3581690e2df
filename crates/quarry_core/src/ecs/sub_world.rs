//! # Sub-Worlds
//!
//! A sub-world is one partition of a world: its own slot map, its own
//! component tables and its own shared store. Every entity lives in
//! exactly one sub-world.

use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::component::{Component, ComponentHook};
use super::descriptor::{QueryShape, TypeDescriptor};
use super::entity::EntityId;
use super::matcher::{collect_matches, Matcher, SubWorldView};
use super::slot_map::{EntitySlotMap, SlotIter};
use super::table::{ComponentTable, ErasedTable};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::{ResultPool, SharedStore};

/// Number of addressable slots per sub-world.
const SLOT_SPACE: usize = u16::MAX as usize + 1;

/// Raw column access for one component type.
///
/// `components`, `presence` and `handles` are parallel and indexed by slot.
#[derive(Debug, Clone, Copy)]
pub struct DirectColumns<'a, T> {
    /// Values, including defaults in absent slots.
    pub components: &'a [T],
    /// Presence flags.
    pub presence: &'a [bool],
    /// Entity handle per slot (empty where no entity lives).
    pub handles: &'a [EntityId],
    /// Number of present values.
    pub count: usize,
}

/// One partition of a [`World`](super::World).
///
/// Owns the slot map and every component table, and keeps them the same
/// capacity.
pub struct SubWorld {
    id: u16,
    slots: EntitySlotMap,
    tables: Vec<Box<dyn ErasedTable>>,
    type_indices: HashMap<TypeId, usize>,
    /// Freed slots, reused LIFO.
    free_slots: Vec<u16>,
    next_slot: usize,
    descriptors: RefCell<HashMap<TypeId, Rc<TypeDescriptor>>>,
    shared: SharedStore,
    pool: Rc<ResultPool>,
}

impl SubWorld {
    /// Creates an empty sub-world that shares `pool` with its world.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if `config` fails
    /// [`WorldConfig::validate`].
    pub fn new(id: u16, config: &WorldConfig, pool: Rc<ResultPool>) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self {
            id,
            slots: EntitySlotMap::with_capacity(config.start_entities_capacity),
            tables: Vec::with_capacity(config.start_component_types),
            type_indices: HashMap::with_capacity(config.start_component_types),
            free_slots: Vec::new(),
            next_slot: 0,
            descriptors: RefCell::new(HashMap::new()),
            shared: SharedStore::from_config(config),
            pool,
        })
    }

    /// Creates a sub-world with a private pool.
    ///
    /// # Errors
    ///
    /// Same as [`SubWorld::new`].
    pub fn standalone(id: u16, config: &WorldConfig) -> EcsResult<Self> {
        Self::new(id, config, Rc::new(ResultPool::from_config(config)))
    }

    /// Sub-world id carried by every handle created here.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u16 {
        self.id
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if no entity is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current slot capacity shared by the slot map and every table.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// The slot map.
    #[inline]
    #[must_use]
    pub const fn slots(&self) -> &EntitySlotMap {
        &self.slots
    }

    /// Iterates live handles in ascending slot order.
    #[must_use]
    pub fn iter(&self) -> SlotIter<'_> {
        self.slots.iter()
    }

    /// The pool query results come from.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Rc<ResultPool> {
        &self.pool
    }

    /// Sub-world scoped shared store.
    #[inline]
    #[must_use]
    pub const fn shared(&self) -> &SharedStore {
        &self.shared
    }

    /// Mutable shared store.
    #[inline]
    pub fn shared_mut(&mut self) -> &mut SharedStore {
        &mut self.shared
    }

    /// Registers component type `T` and returns its type index.
    ///
    /// Type indices are dense and follow registration order.
    ///
    /// # Errors
    ///
    /// [`EcsError::AlreadyRegistered`] if `T` has a table already.
    pub fn register<T: Component>(
        &mut self,
        hook: Option<Box<dyn ComponentHook<T>>>,
    ) -> EcsResult<usize> {
        let type_id = TypeId::of::<T>();
        if self.type_indices.contains_key(&type_id) {
            return Err(EcsError::AlreadyRegistered {
                type_name: type_name::<T>(),
            });
        }

        let type_index = self.tables.len();
        let table = ComponentTable::<T>::new(type_index, self.slots.capacity(), hook);
        self.tables.push(Box::new(table));
        self.type_indices.insert(type_id, type_index);
        debug!(
            sub_world = self.id,
            component = type_name::<T>(),
            type_index,
            "component type registered"
        );
        Ok(type_index)
    }

    /// Checks whether `T` has a table here.
    #[must_use]
    pub fn is_registered<T: Component>(&self) -> bool {
        self.type_indices.contains_key(&TypeId::of::<T>())
    }

    /// Type index of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` has no table.
    pub fn type_index<T: Component>(&self) -> EcsResult<usize> {
        self.type_indices
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(EcsError::Unregistered {
                type_name: type_name::<T>(),
            })
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.tables.len()
    }

    /// Creates an entity with the given world serial.
    ///
    /// Freed slots are reused most-recent first; otherwise the next fresh
    /// slot is taken. Tables grow with the slot map.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EmptyEntity`] for serial 0
    /// - [`EcsError::CapacityExceeded`] when all 65536 slots are live
    pub fn create_entity(&mut self, serial: u32) -> EcsResult<EntityId> {
        if serial == 0 {
            return Err(EcsError::EmptyEntity);
        }

        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                let slot = u16::try_from(self.next_slot).map_err(|_| EcsError::CapacityExceeded {
                    what: "entity slots",
                    capacity: SLOT_SPACE,
                })?;
                self.next_slot += 1;
                slot
            }
        };

        let id = EntityId::new(serial, slot, self.id);
        if let Err(err) = self.slots.add(id) {
            self.free_slots.push(slot);
            return Err(err);
        }
        self.sync_capacity();
        Ok(id)
    }

    /// Deletes an entity and every component it has.
    ///
    /// Delete hooks fire per table in registration order, then the slot is
    /// freed for reuse.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EmptyEntity`] for the empty handle
    /// - [`EcsError::EntityNotFound`] if `id` is not live here
    pub fn delete_entity(&mut self, id: EntityId) -> EcsResult<()> {
        if id.is_empty() {
            return Err(EcsError::EmptyEntity);
        }
        if !self.slots.contains(id) {
            return Err(EcsError::EntityNotFound { entity: id });
        }

        for table in &mut self.tables {
            table.delete(&self.slots, id)?;
        }
        self.slots.remove(id)?;
        self.free_slots.push(id.slot());
        Ok(())
    }

    /// Checks whether `id` is live here.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains(id)
    }

    /// Checks whether `id` is live and has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.table::<T>()
            .is_ok_and(|table| table.contains(&self.slots, id))
    }

    /// Attaches or replaces `T` on `id`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] plus the table's handle validation.
    pub fn set<T: Component>(&mut self, id: EntityId, value: T) -> EcsResult<()> {
        let (table, slots) = self.table_mut::<T>()?;
        table.set(slots, id, value)
    }

    /// Detaches `T` from `id`. Returns whether a value was removed.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] plus the table's handle validation.
    pub fn delete<T: Component>(&mut self, id: EntityId) -> EcsResult<bool> {
        let (table, slots) = self.table_mut::<T>()?;
        table.delete(slots, id)
    }

    /// Reads `T` on `id`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] plus [`ComponentTable::get`] errors.
    pub fn get<T: Component>(&self, id: EntityId) -> EcsResult<&T> {
        self.table::<T>()?.get(&self.slots, id)
    }

    /// Mutably reads `T` on `id`. Hooks do not fire for edits made here.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] plus [`ComponentTable::get`] errors.
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> EcsResult<&mut T> {
        let (table, slots) = self.table_mut::<T>()?;
        table.get_mut(slots, id)
    }

    /// Reads `T` on `id`, or `None` if unregistered, absent or stale.
    #[must_use]
    pub fn try_get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.table::<T>().ok()?.try_get(&self.slots, id)
    }

    /// The table for `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` has no table.
    pub fn table<T: Component>(&self) -> EcsResult<&ComponentTable<T>> {
        let index = self.type_index::<T>()?;
        self.tables[index]
            .downcast_ref::<T>()
            .ok_or(EcsError::Unregistered {
                type_name: type_name::<T>(),
            })
    }

    /// The table for `T`, mutably, with the slot map it validates against.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` has no table.
    pub fn table_mut<T: Component>(&mut self) -> EcsResult<(&mut ComponentTable<T>, &EntitySlotMap)> {
        let index = self.type_index::<T>()?;
        let table = self.tables[index]
            .downcast_mut::<T>()
            .ok_or(EcsError::Unregistered {
                type_name: type_name::<T>(),
            })?;
        Ok((table, &self.slots))
    }

    /// Every table, indexed by type index.
    #[inline]
    #[must_use]
    pub fn tables(&self) -> &[Box<dyn ErasedTable>] {
        &self.tables
    }

    /// Every table mutably, together with the slot map.
    pub(crate) fn tables_mut(&mut self) -> (&mut [Box<dyn ErasedTable>], &EntitySlotMap) {
        (&mut self.tables, &self.slots)
    }

    /// Appends the type index of every component `id` has, ascending.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] if `id` is not live here.
    pub fn type_indices_of(&self, id: EntityId, out: &mut Vec<usize>) -> EcsResult<()> {
        if !self.slots.contains(id) {
            return Err(EcsError::EntityNotFound { entity: id });
        }
        out.extend(
            self.tables
                .iter()
                .filter(|table| table.contains(&self.slots, id))
                .map(|table| table.type_index()),
        );
        Ok(())
    }

    /// Raw parallel columns for `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` has no table.
    pub fn direct_columns<T: Component>(&self) -> EcsResult<DirectColumns<'_, T>> {
        let table = self.table::<T>()?;
        Ok(DirectColumns {
            components: table.raw_components(),
            presence: table.raw_presence(),
            handles: self.slots.handles(),
            count: table.len(),
        })
    }

    /// Read-only snapshot for the matching engine.
    #[must_use]
    pub fn query_view(&self) -> SubWorldView<'_> {
        SubWorldView::new(&self.slots, &self.tables, &self.type_indices)
    }

    /// The cached descriptor of shape `Q`, built on first use.
    ///
    /// # Errors
    ///
    /// Whatever `Q::describe` reports.
    pub fn descriptor<Q: QueryShape>(&self) -> EcsResult<Rc<TypeDescriptor>> {
        let key = TypeId::of::<Q>();
        if let Some(cached) = self.descriptors.borrow().get(&key) {
            return Ok(Rc::clone(cached));
        }

        let built = Rc::new(TypeDescriptor::build::<Q>(&self.type_indices, &self.pool)?);
        self.descriptors.borrow_mut().insert(key, Rc::clone(&built));
        Ok(built)
    }

    /// A matcher over shape `Q`.
    ///
    /// # Errors
    ///
    /// Whatever `Q::describe` reports.
    pub fn matcher<Q: QueryShape>(&self) -> EcsResult<Matcher<'_>> {
        Ok(Matcher::new(self, self.descriptor::<Q>()?))
    }

    /// Appends every entity matching `descriptor`, ascending by slot.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownTypeIndex`] if the descriptor names a type index
    /// with no table here.
    pub fn match_descriptor(&self, descriptor: &TypeDescriptor, out: &mut Vec<EntityId>) -> EcsResult<()> {
        collect_matches(out, descriptor, &self.query_view(), &[])
    }

    fn sync_capacity(&mut self) {
        let capacity = self.slots.capacity();
        for table in &mut self.tables {
            if table.capacity() < capacity {
                table.resize_to(capacity);
            }
        }
    }
}
