//! # Result Pool
//!
//! Recycles the containers that queries produce and consume.
//!
//! Every container handed out carries its pool's id and a ticket. The pool
//! remembers which tickets are outstanding, so a second release of the same
//! container, or a container that came from another pool, is caught instead
//! of putting one buffer on the idle shelf twice.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::error;

use crate::config::WorldConfig;
use crate::ecs::EntityId;
use crate::error::{EcsError, EcsResult};

/// A container type the pool knows how to recycle.
pub trait Recyclable: Default + 'static {
    /// Empties the container while keeping its allocation.
    fn recycle(&mut self);

    /// Makes room for at least `additional` more items.
    fn reserve_items(&mut self, additional: usize);
}

impl<T: 'static> Recyclable for Vec<T> {
    fn recycle(&mut self) {
        self.clear();
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

impl<T: Eq + Hash + 'static> Recyclable for HashSet<T> {
    fn recycle(&mut self) {
        self.clear();
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

/// A container checked out of a [`ResultPool`].
///
/// Dereferences to the container. Hand it back to the pool it came from
/// with the matching `release` call.
#[derive(Debug)]
pub struct Pooled<C> {
    pool: u64,
    ticket: u64,
    context: &'static str,
    items: C,
}

impl<C> Pooled<C> {
    /// Ticket identifying this checkout.
    #[inline]
    #[must_use]
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Diagnostic tag given at acquisition.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> &'static str {
        self.context
    }
}

impl<C> Deref for Pooled<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.items
    }
}

impl<C> DerefMut for Pooled<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.items
    }
}

/// Pooled sequence of entity handles, the output of every match.
pub type EntityList = Pooled<Vec<EntityId>>;

/// Pooled set of small integers (type indices).
pub type IndexSet = Pooled<HashSet<usize>>;

/// Pooled general-purpose list.
pub type ScratchList<T> = Pooled<Vec<T>>;

/// Source of pool ids, so tickets from different pools never collide.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

struct PoolState {
    /// One `Vec<C>` per container type, boxed as `dyn Any`.
    shelves: HashMap<TypeId, Box<dyn Any>>,
    idle: usize,
    outstanding: HashMap<u64, &'static str>,
    next_ticket: u64,
}

/// Recycling pool for query results and descriptor scratch space.
///
/// Not thread-safe. Sub-worlds share one pool with their world through an
/// `Rc`, so all methods take `&self`.
pub struct ResultPool {
    id: u64,
    state: RefCell<PoolState>,
    list_capacity: usize,
    leak_threshold: usize,
    track_leaks: bool,
}

impl ResultPool {
    /// Creates an empty pool.
    ///
    /// # Arguments
    ///
    /// * `list_capacity` - Initial capacity of fresh entity lists
    /// * `leak_threshold` - Outstanding count at which acquisition fails
    /// * `track_leaks` - Whether the leak check runs at all
    #[must_use]
    pub fn new(list_capacity: usize, leak_threshold: usize, track_leaks: bool) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            state: RefCell::new(PoolState {
                shelves: HashMap::new(),
                idle: 0,
                outstanding: HashMap::new(),
                next_ticket: 1,
            }),
            list_capacity,
            leak_threshold,
            track_leaks,
        }
    }

    /// Creates a pool sized by `config`.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(
            config.entity_list_capacity,
            config.pool_leak_threshold,
            config.track_pool_leaks,
        )
    }

    /// Checks out an entity list.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolLeak`] when leak tracking is on and too many
    /// containers are outstanding.
    pub fn acquire_entities(&self, context: &'static str) -> EcsResult<EntityList> {
        self.acquire_with_capacity(context, self.list_capacity)
    }

    /// Checks out an entity list with room for at least `capacity` handles.
    ///
    /// # Errors
    ///
    /// See [`ResultPool::acquire_entities`].
    pub fn acquire_entities_with_capacity(
        &self,
        context: &'static str,
        capacity: usize,
    ) -> EcsResult<EntityList> {
        self.acquire_with_capacity(context, capacity)
    }

    /// Checks out an integer set.
    ///
    /// # Errors
    ///
    /// See [`ResultPool::acquire_entities`].
    pub fn acquire_index_set(&self, context: &'static str) -> EcsResult<IndexSet> {
        self.acquire(context)
    }

    /// Checks out a list of `T`.
    ///
    /// # Errors
    ///
    /// See [`ResultPool::acquire_entities`].
    pub fn acquire_list<T: 'static>(&self, context: &'static str) -> EcsResult<ScratchList<T>> {
        self.acquire(context)
    }

    /// Checks out any recyclable container.
    ///
    /// Reuses an idle container of the same type if there is one.
    ///
    /// # Errors
    ///
    /// See [`ResultPool::acquire_entities`].
    pub fn acquire<C: Recyclable>(&self, context: &'static str) -> EcsResult<Pooled<C>> {
        self.acquire_with_capacity(context, 0)
    }

    fn acquire_with_capacity<C: Recyclable>(
        &self,
        context: &'static str,
        capacity: usize,
    ) -> EcsResult<Pooled<C>> {
        let mut state = self.state.borrow_mut();
        if self.track_leaks && state.outstanding.len() >= self.leak_threshold {
            return Err(Self::leak(&state.outstanding));
        }

        let recycled = state
            .shelves
            .get_mut(&TypeId::of::<C>())
            .and_then(|shelf| shelf.downcast_mut::<Vec<C>>())
            .and_then(Vec::pop);
        let mut items = match recycled {
            Some(items) => {
                state.idle -= 1;
                items
            }
            None => C::default(),
        };
        if capacity > 0 {
            items.reserve_items(capacity);
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.outstanding.insert(ticket, context);
        Ok(Pooled {
            pool: self.id,
            ticket,
            context,
            items,
        })
    }

    /// Returns a container to the pool, clearing it.
    ///
    /// # Errors
    ///
    /// [`EcsError::DoubleRelease`] if the container belongs to another pool
    /// or its ticket is not outstanding. The container is dropped in that
    /// case and the pool's counts are left untouched.
    pub fn release<C: Recyclable>(&self, pooled: Pooled<C>) -> EcsResult<()> {
        if pooled.pool != self.id {
            return Err(EcsError::DoubleRelease {
                ticket: pooled.ticket,
            });
        }
        let mut state = self.state.borrow_mut();
        if state.outstanding.remove(&pooled.ticket).is_none() {
            return Err(EcsError::DoubleRelease {
                ticket: pooled.ticket,
            });
        }

        let mut items = pooled.items;
        items.recycle();
        let shelf = state
            .shelves
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Box::new(Vec::<C>::new()));
        match shelf.downcast_mut::<Vec<C>>() {
            Some(shelf) => shelf.push(items),
            None => {
                return Err(EcsError::Unregistered {
                    type_name: type_name::<C>(),
                })
            }
        }
        state.idle += 1;
        Ok(())
    }

    /// Number of idle containers across all types.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.state.borrow().idle
    }

    /// Number of idle containers of type `C`.
    #[must_use]
    pub fn idle_count_of<C: Recyclable>(&self) -> usize {
        self.state
            .borrow()
            .shelves
            .get(&TypeId::of::<C>())
            .and_then(|shelf| shelf.downcast_ref::<Vec<C>>())
            .map_or(0, Vec::len)
    }

    /// Number of containers currently checked out.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.state.borrow().outstanding.len()
    }

    /// Context tags of the outstanding containers, in ticket order.
    #[must_use]
    pub fn outstanding_contexts(&self) -> Vec<&'static str> {
        let state = self.state.borrow();
        let mut tickets: Vec<(u64, &'static str)> =
            state.outstanding.iter().map(|(&t, &c)| (t, c)).collect();
        tickets.sort_unstable_by_key(|&(ticket, _)| ticket);
        tickets.into_iter().map(|(_, context)| context).collect()
    }

    /// Logs every outstanding container and builds the error.
    fn leak(outstanding: &HashMap<u64, &'static str>) -> EcsError {
        let mut tickets: Vec<(&u64, &&'static str)> = outstanding.iter().collect();
        tickets.sort_unstable_by_key(|&(ticket, _)| *ticket);
        for (ticket, context) in &tickets {
            error!(ticket = **ticket, context = **context, "pooled container not released");
        }
        EcsError::PoolLeak {
            outstanding: tickets.len(),
            contexts: tickets
                .iter()
                .map(|(_, context)| **context)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl Default for ResultPool {
    fn default() -> Self {
        Self::from_config(&WorldConfig::default())
    }
}
