//! # Entity Handles
//!
//! Entities are lightweight identifiers consisting of:
//! - A serial, unique for the lifetime of the world (never reused)
//! - A slot index into the owning sub-world's arrays (reused after removal)
//! - The id of the owning sub-world
//!
//! Two equality notions exist. `==` and `Hash` compare the serial only,
//! which is all a map key needs. [`EntityId::strict_eq`] compares all three
//! fields and is what storage uses to reject stale handles after a slot has
//! been recycled.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};

/// Unique identifier for an entity.
///
/// Packed into 64 bits:
/// - Bits 0..32: serial
/// - Bits 32..48: slot index
/// - Bits 48..64: sub-world id
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// The empty/invalid handle. Its serial is zero.
    pub const EMPTY: Self = Self(0);

    /// Creates a handle from its parts.
    ///
    /// # Arguments
    ///
    /// * `serial` - World-unique serial (0 is reserved for [`EntityId::EMPTY`])
    /// * `slot` - Slot index inside the sub-world
    /// * `sub_world` - Owning sub-world id
    #[inline]
    #[must_use]
    pub const fn new(serial: u32, slot: u16, sub_world: u16) -> Self {
        Self(((sub_world as u64) << 48) | ((slot as u64) << 32) | (serial as u64))
    }

    /// Returns the serial portion.
    #[inline]
    #[must_use]
    pub const fn serial(self) -> u32 {
        self.0 as u32
    }

    /// Returns the slot index portion.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u16 {
        (self.0 >> 32) as u16
    }

    /// Returns the slot index widened for array indexing.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.slot() as usize
    }

    /// Returns the owning sub-world id.
    #[inline]
    #[must_use]
    pub const fn sub_world(self) -> u16 {
        (self.0 >> 48) as u16
    }

    /// Checks if this is the empty handle.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.serial() == 0
    }

    /// Compares serial, slot and sub-world.
    #[inline]
    #[must_use]
    pub const fn strict_eq(self, other: Self) -> bool {
        self.0 == other.0
    }

    /// Returns the packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`EntityId::to_bits`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for EntityId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.serial() == other.serial()
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial().hash(state);
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serial().cmp(&other.serial())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityId")
            .field("serial", &self.serial())
            .field("slot", &self.slot())
            .field("sub_world", &self.sub_world())
            .finish()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[EntityId({}, slot {}, sub-world {})]",
            self.serial(),
            self.slot(),
            self.sub_world()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::new(123_456, 789, 3);
        assert_eq!(id.serial(), 123_456);
        assert_eq!(id.slot(), 789);
        assert_eq!(id.index(), 789);
        assert_eq!(id.sub_world(), 3);
        assert!(EntityId::from_bits(id.to_bits()).strict_eq(id));
    }

    #[test]
    fn test_weak_vs_strict_equality() {
        let a = EntityId::new(7, 1, 0);
        let moved = EntityId::new(7, 2, 0);
        assert_eq!(a, moved);
        assert!(!a.strict_eq(moved));

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&moved));
    }

    #[test]
    fn test_empty_handle() {
        assert!(EntityId::EMPTY.is_empty());
        assert!(EntityId::default().is_empty());
        assert!(EntityId::new(0, 5, 1).is_empty());
        assert!(!EntityId::new(1, 0, 0).is_empty());
    }

    #[test]
    fn test_ordering_by_serial() {
        let early = EntityId::new(1, 40, 0);
        let late = EntityId::new(2, 0, 0);
        assert!(early < late);
    }
}
