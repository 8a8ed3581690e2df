//! # Engine Error Types
//!
//! All errors that can occur in the storage and query engine.
//!
//! Every failure is either a caller precondition that was violated
//! (fail fast, never retried) or an explicit "not found" signal. Plain
//! absence, where the API allows it, is modelled with `Option` instead.

use thiserror::Error;

use crate::ecs::EntityId;

/// Broad classification of an [`EcsError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A contract was broken by the caller (stale handle, double release, ...).
    InvariantViolation,
    /// A lookup targeted something that does not exist.
    NotFound,
    /// A fixed-size registry or buffer is full.
    CapacityExceeded,
    /// A collection changed while a cursor was walking it.
    StaleIteration,
    /// Configuration could not be parsed or is inconsistent.
    Configuration,
}

/// Errors that can occur in the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle does not strictly match what its slot holds.
    #[error("stale or foreign entity handle {entity}")]
    StaleEntity {
        /// The offending handle.
        entity: EntityId,
    },

    /// The empty handle (serial 0) was used where a live one is required.
    #[error("the empty entity handle is not a valid entity")]
    EmptyEntity,

    /// A slot index is beyond the allocated capacity.
    #[error("slot {slot} is beyond allocated capacity {capacity}")]
    SlotOutOfBounds {
        /// Requested slot.
        slot: usize,
        /// Current capacity.
        capacity: usize,
    },

    /// A slot was added while it still holds a live entity.
    #[error("slot {slot} still holds live entity {occupant}")]
    SlotOccupied {
        /// The slot index.
        slot: usize,
        /// The entity currently living there.
        occupant: EntityId,
    },

    /// A pooled container was released while not checked out.
    #[error("pooled container #{ticket} released twice or not owned by this pool")]
    DoubleRelease {
        /// Ticket carried by the container.
        ticket: u64,
    },

    /// A type was registered twice in the same registry.
    #[error("type {type_name} is already registered")]
    AlreadyRegistered {
        /// Name of the type.
        type_name: &'static str,
    },

    /// A query names the same component type as both required and excluded.
    #[error("component type {type_name} is both included and excluded")]
    ContradictoryQuery {
        /// Name of the type.
        type_name: &'static str,
    },

    /// A query shape binds the same component type twice.
    #[error("component type {type_name} is bound more than once")]
    DuplicateBinding {
        /// Name of the type.
        type_name: &'static str,
    },

    /// A type exceeds the alignment the shared store can guarantee.
    #[error("type {type_name} needs alignment {align}, shared store guarantees {max}")]
    UnsupportedAlignment {
        /// Name of the type.
        type_name: &'static str,
        /// Required alignment.
        align: usize,
        /// Supported alignment.
        max: usize,
    },

    /// A type index does not name a registered table.
    #[error("type index {index} is not registered (have {registered})")]
    UnknownTypeIndex {
        /// The index.
        index: usize,
        /// Number of registered tables.
        registered: usize,
    },

    /// A column was requested that the query shape does not bind.
    #[error("component type {type_name} is not bound by this query")]
    UnboundColumn {
        /// Name of the type.
        type_name: &'static str,
    },

    /// Lookup of an unregistered type.
    #[error("type {type_name} is not registered")]
    Unregistered {
        /// Name of the type.
        type_name: &'static str,
    },

    /// Entity is not present where removal expected it.
    #[error("entity {entity} not found")]
    EntityNotFound {
        /// The missing handle.
        entity: EntityId,
    },

    /// A live entity has no value of the requested component type.
    #[error("entity {entity} has no {type_name} component")]
    MissingComponent {
        /// The entity that was read.
        entity: EntityId,
        /// Name of the component type.
        type_name: &'static str,
    },

    /// A registered shared component has no value right now.
    #[error("shared component {type_name} has no value")]
    SharedAbsent {
        /// Name of the type.
        type_name: &'static str,
    },

    /// No sub-world answers to this id.
    #[error("sub-world {id} not found")]
    SubWorldNotFound {
        /// Requested id.
        id: u16,
    },

    /// A fixed-size registry or buffer is full.
    #[error("{what} capacity {capacity} exceeded")]
    CapacityExceeded {
        /// What ran out.
        what: &'static str,
        /// The limit that was hit.
        capacity: usize,
    },

    /// A collection was mutated while a cursor was open over it.
    #[error("collection modified during iteration (version {expected} -> {found})")]
    StaleIteration {
        /// Version captured at cursor construction.
        expected: u64,
        /// Version observed now.
        found: u64,
    },

    /// Too many pooled containers are checked out at once.
    #[error("result pool leak: {outstanding} containers outstanding [{contexts}]")]
    PoolLeak {
        /// Number of outstanding containers.
        outstanding: usize,
        /// Comma separated context tags of outstanding containers.
        contexts: String,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EcsError {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StaleEntity { .. }
            | Self::EmptyEntity
            | Self::SlotOutOfBounds { .. }
            | Self::SlotOccupied { .. }
            | Self::DoubleRelease { .. }
            | Self::AlreadyRegistered { .. }
            | Self::ContradictoryQuery { .. }
            | Self::DuplicateBinding { .. }
            | Self::UnsupportedAlignment { .. }
            | Self::UnknownTypeIndex { .. }
            | Self::UnboundColumn { .. }
            | Self::SharedAbsent { .. }
            | Self::PoolLeak { .. } => ErrorKind::InvariantViolation,
            Self::Unregistered { .. }
            | Self::EntityNotFound { .. }
            | Self::MissingComponent { .. }
            | Self::SubWorldNotFound { .. } => ErrorKind::NotFound,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::StaleIteration { .. } => ErrorKind::StaleIteration,
            Self::InvalidConfig(_) => ErrorKind::Configuration,
        }
    }
}

/// Result type for engine operations.
pub type EcsResult<T> = Result<T, EcsError>;
