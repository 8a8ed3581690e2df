//! # World Configuration
//!
//! Capacities and pool diagnostics, loaded once at startup.
//!
//! ```toml
//! start_entities_capacity = 256
//! max_sub_worlds = 4
//! pool_leak_threshold = 32
//! ```

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// Initial slot capacity of every sub-world.
pub const START_ENTITIES_CAPACITY: usize = 64;
/// Initial capacity of freshly created pooled entity lists.
pub const DEFAULT_ENTITY_LIST_CAPACITY: usize = 64;
/// Maximum number of sub-worlds per world.
pub const MAX_SUB_WORLDS: usize = 8;
/// Maximum number of types a shared store can register.
pub const SHARED_COMPONENTS_CAPACITY: usize = 16;
/// Size of a shared store's packed buffer in bytes.
pub const SHARED_BUFFER_CAPACITY: usize = 16 * 1024;
/// Initial capacity of a sub-world's table registry.
pub const START_COMPONENT_TYPES: usize = 8;
/// Outstanding pooled containers tolerated before the leak diagnostic fires.
pub const POOL_LEAK_THRESHOLD: usize = 20;

/// Configuration of a [`World`](crate::ecs::World) and its sub-worlds.
///
/// Every field is optional in TOML; missing fields fall back to the
/// module constants.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Initial slot capacity of every sub-world (grows by doubling).
    pub start_entities_capacity: usize,
    /// Initial capacity of newly created pooled entity lists.
    pub entity_list_capacity: usize,
    /// Fixed number of sub-worlds a world may register.
    pub max_sub_worlds: usize,
    /// Maximum number of types per shared store.
    pub shared_components_capacity: usize,
    /// Bytes in each shared store buffer.
    pub shared_buffer_capacity: usize,
    /// Initial capacity of a sub-world's table registry.
    pub start_component_types: usize,
    /// Outstanding containers tolerated before the leak diagnostic fires.
    pub pool_leak_threshold: usize,
    /// Whether the pool tracks outstanding containers for leak reports.
    pub track_pool_leaks: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            start_entities_capacity: START_ENTITIES_CAPACITY,
            entity_list_capacity: DEFAULT_ENTITY_LIST_CAPACITY,
            max_sub_worlds: MAX_SUB_WORLDS,
            shared_components_capacity: SHARED_COMPONENTS_CAPACITY,
            shared_buffer_capacity: SHARED_BUFFER_CAPACITY,
            start_component_types: START_COMPONENT_TYPES,
            pool_leak_threshold: POOL_LEAK_THRESHOLD,
            track_pool_leaks: cfg!(debug_assertions),
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed TOML, unknown keys
    /// or zero capacities.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every capacity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> EcsResult<()> {
        let checks = [
            ("start_entities_capacity", self.start_entities_capacity),
            ("max_sub_worlds", self.max_sub_worlds),
            ("shared_components_capacity", self.shared_components_capacity),
            ("shared_buffer_capacity", self.shared_buffer_capacity),
            ("start_component_types", self.start_component_types),
            ("pool_leak_threshold", self.pool_leak_threshold),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(EcsError::InvalidConfig(format!("{name} must be greater than zero")));
            }
        }
        if self.start_entities_capacity > usize::from(u16::MAX) + 1 {
            return Err(EcsError::InvalidConfig(format!(
                "start_entities_capacity {} exceeds the 16-bit slot space",
                self.start_entities_capacity
            )));
        }
        if self.max_sub_worlds > usize::from(u16::MAX) + 1 {
            return Err(EcsError::InvalidConfig(format!(
                "max_sub_worlds {} exceeds the 16-bit sub-world id space",
                self.max_sub_worlds
            )));
        }
        Ok(())
    }
}
