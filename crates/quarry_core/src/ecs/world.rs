//! # World
//!
//! The top-level container: a fixed-capacity registry of sub-worlds, the
//! world-wide serial issuer, a world-scope shared store and the result
//! pool every sub-world draws from.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::entity::EntityId;
use super::sub_world::SubWorld;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::{ResultPool, SharedStore};

/// Container for every sub-world and entity.
///
/// Sub-worlds are keyed by a marker type chosen by the caller.
///
/// # Example
///
/// ```rust,ignore
/// struct Terrain;
///
/// let mut world = World::new(WorldConfig::default())?;
/// world.register_sub_world::<Terrain, _>(|sub| {
///     sub.register::<Position>(None)?;
///     Ok(())
/// })?;
///
/// let rock = world.create_entity::<Terrain>()?;
/// world.sub_world_mut::<Terrain>()?.set(rock, Position::default())?;
/// ```
pub struct World {
    config: WorldConfig,
    sub_worlds: Vec<SubWorld>,
    markers: HashMap<TypeId, u16>,
    /// Next serial to hand out. Kept wider than `u32` to detect exhaustion.
    next_serial: u64,
    shared: SharedStore,
    pool: Rc<ResultPool>,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        let pool = Rc::new(ResultPool::from_config(&config));
        Ok(Self {
            sub_worlds: Vec::with_capacity(config.max_sub_worlds),
            markers: HashMap::with_capacity(config.max_sub_worlds),
            next_serial: 1,
            shared: SharedStore::from_config(&config),
            pool,
            config,
        })
    }

    /// Creates a world from a TOML configuration document.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] on malformed or invalid configuration.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        Self::new(WorldConfig::from_toml_str(source)?)
    }

    /// The configuration this world was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Adds a sub-world keyed by `K` and lets `setup` register its types.
    ///
    /// Returns the new sub-world's id.
    ///
    /// # Errors
    ///
    /// - [`EcsError::AlreadyRegistered`] if `K` is taken
    /// - [`EcsError::CapacityExceeded`] past `max_sub_worlds`
    /// - Whatever `setup` returns; the sub-world is discarded in that case
    pub fn register_sub_world<K, F>(&mut self, setup: F) -> EcsResult<u16>
    where
        K: 'static,
        F: FnOnce(&mut SubWorld) -> EcsResult<()>,
    {
        let marker = TypeId::of::<K>();
        if self.markers.contains_key(&marker) {
            return Err(EcsError::AlreadyRegistered {
                type_name: type_name::<K>(),
            });
        }
        let full = EcsError::CapacityExceeded {
            what: "sub-worlds",
            capacity: self.config.max_sub_worlds,
        };
        if self.sub_worlds.len() >= self.config.max_sub_worlds {
            return Err(full);
        }
        let id = u16::try_from(self.sub_worlds.len()).map_err(|_| full)?;

        let mut sub_world = SubWorld::new(id, &self.config, Rc::clone(&self.pool))?;
        setup(&mut sub_world)?;
        self.sub_worlds.push(sub_world);
        self.markers.insert(marker, id);
        debug!(sub_world = id, marker = type_name::<K>(), "sub-world registered");
        Ok(id)
    }

    /// Id of the sub-world keyed by `K`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if no sub-world uses `K`.
    pub fn sub_world_id<K: 'static>(&self) -> EcsResult<u16> {
        self.markers
            .get(&TypeId::of::<K>())
            .copied()
            .ok_or(EcsError::Unregistered {
                type_name: type_name::<K>(),
            })
    }

    /// The sub-world keyed by `K`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if no sub-world uses `K`.
    pub fn sub_world<K: 'static>(&self) -> EcsResult<&SubWorld> {
        let id = self.sub_world_id::<K>()?;
        self.sub_world_by_id(id)
    }

    /// Mutable counterpart of [`World::sub_world`].
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if no sub-world uses `K`.
    pub fn sub_world_mut<K: 'static>(&mut self) -> EcsResult<&mut SubWorld> {
        let id = self.sub_world_id::<K>()?;
        self.sub_world_by_id_mut(id)
    }

    /// The sub-world with the given id.
    ///
    /// # Errors
    ///
    /// [`EcsError::SubWorldNotFound`] for unknown ids.
    pub fn sub_world_by_id(&self, id: u16) -> EcsResult<&SubWorld> {
        self.sub_worlds
            .get(usize::from(id))
            .ok_or(EcsError::SubWorldNotFound { id })
    }

    /// Mutable counterpart of [`World::sub_world_by_id`].
    ///
    /// # Errors
    ///
    /// [`EcsError::SubWorldNotFound`] for unknown ids.
    pub fn sub_world_by_id_mut(&mut self, id: u16) -> EcsResult<&mut SubWorld> {
        self.sub_worlds
            .get_mut(usize::from(id))
            .ok_or(EcsError::SubWorldNotFound { id })
    }

    /// The sub-world `entity` belongs to, by its handle.
    ///
    /// # Errors
    ///
    /// [`EcsError::SubWorldNotFound`] if the handle names no sub-world.
    pub fn sub_world_of(&self, entity: EntityId) -> EcsResult<&SubWorld> {
        self.sub_world_by_id(entity.sub_world())
    }

    /// Mutable counterpart of [`World::sub_world_of`].
    ///
    /// # Errors
    ///
    /// [`EcsError::SubWorldNotFound`] if the handle names no sub-world.
    pub fn sub_world_of_mut(&mut self, entity: EntityId) -> EcsResult<&mut SubWorld> {
        self.sub_world_by_id_mut(entity.sub_world())
    }

    /// Number of registered sub-worlds.
    #[inline]
    #[must_use]
    pub fn sub_world_count(&self) -> usize {
        self.sub_worlds.len()
    }

    /// Iterates the sub-worlds in id order.
    pub fn sub_worlds(&self) -> impl Iterator<Item = &SubWorld> {
        self.sub_worlds.iter()
    }

    /// Creates an entity in the sub-world keyed by `K`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Unregistered`] if no sub-world uses `K`
    /// - [`EcsError::CapacityExceeded`] when serials or slots run out
    pub fn create_entity<K: 'static>(&mut self) -> EcsResult<EntityId> {
        let id = self.sub_world_id::<K>()?;
        let serial = u32::try_from(self.next_serial).map_err(|_| EcsError::CapacityExceeded {
            what: "entity serials",
            capacity: u32::MAX as usize,
        })?;
        let entity = self.sub_world_by_id_mut(id)?.create_entity(serial)?;
        self.next_serial += 1;
        Ok(entity)
    }

    /// Deletes an entity from whichever sub-world owns it.
    ///
    /// # Errors
    ///
    /// - [`EcsError::SubWorldNotFound`] if the handle names no sub-world
    /// - [`SubWorld::delete_entity`] errors
    pub fn delete_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        self.sub_world_of_mut(entity)?.delete_entity(entity)
    }

    /// Checks whether `entity` is live in its sub-world.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.sub_world_of(entity)
            .is_ok_and(|sub_world| sub_world.contains(entity))
    }

    /// Number of live entities across every sub-world.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sub_worlds.iter().map(SubWorld::len).sum()
    }

    /// Checks if no entity is live anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sub_worlds.iter().all(SubWorld::is_empty)
    }

    /// World-scope shared store.
    #[inline]
    #[must_use]
    pub const fn shared(&self) -> &SharedStore {
        &self.shared
    }

    /// Mutable world-scope shared store.
    #[inline]
    pub fn shared_mut(&mut self) -> &mut SharedStore {
        &mut self.shared
    }

    /// The pool shared by every sub-world.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Rc<ResultPool> {
        &self.pool
    }
}
