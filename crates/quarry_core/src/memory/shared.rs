//! # Shared Store
//!
//! Packed byte buffer holding at most one value per registered type.
//!
//! ## Layout
//!
//! - The buffer is allocated once and never moves or grows
//! - Each registered type gets a fixed offset, aligned up to
//!   [`SHARED_ALIGNMENT`], assigned in registration order
//! - Offsets are stable for the lifetime of the store
//!
//! Values are stored as raw bytes, so only `bytemuck::Pod` types qualify.

use std::any::{type_name, TypeId};
use std::mem::{align_of, size_of};

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace};

use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// Alignment of every entry offset, and of the buffer itself.
pub const SHARED_ALIGNMENT: usize = 16;

/// Backing unit of the buffer; its alignment is what makes the typed
/// casts in [`SharedStore::get_ref`] succeed.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(16))]
struct Chunk([u8; SHARED_ALIGNMENT]);

#[derive(Debug, Clone, Copy)]
struct SharedEntry {
    type_id: TypeId,
    type_name: &'static str,
    offset: usize,
    size: usize,
}

/// A present entry, as reported by [`SharedStore::entries`].
#[derive(Debug, Clone, Copy)]
pub struct SharedEntryView<'a> {
    /// Name of the stored type.
    pub type_name: &'static str,
    /// Byte offset inside the buffer.
    pub offset: usize,
    /// Size of the value in bytes.
    pub size: usize,
    /// The raw value.
    pub bytes: &'a [u8],
}

/// Singleton component storage with fixed, aligned offsets.
///
/// # Example
///
/// ```rust,ignore
/// let mut shared = SharedStore::new(16, 16 * 1024);
/// shared.register::<GameClock>()?;
/// shared.set(GameClock { tick: 3 })?;
/// assert_eq!(shared.get::<GameClock>()?.tick, 3);
/// ```
pub struct SharedStore {
    buffer: Box<[Chunk]>,
    entries: Vec<SharedEntry>,
    present: Vec<bool>,
    cursor: usize,
    max_types: usize,
}

/// Rounds `offset` up to the next multiple of [`SHARED_ALIGNMENT`].
#[inline]
const fn align_up(offset: usize) -> usize {
    (offset + SHARED_ALIGNMENT - 1) & !(SHARED_ALIGNMENT - 1)
}

impl SharedStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    ///
    /// * `max_types` - Maximum number of registered types
    /// * `capacity_bytes` - Buffer size, rounded up to the alignment
    #[must_use]
    pub fn new(max_types: usize, capacity_bytes: usize) -> Self {
        let chunks = align_up(capacity_bytes) / SHARED_ALIGNMENT;
        Self {
            buffer: vec![Chunk::zeroed(); chunks].into_boxed_slice(),
            entries: Vec::with_capacity(max_types),
            present: Vec::with_capacity(max_types),
            cursor: 0,
            max_types,
        }
    }

    /// Creates a store sized by `config`.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.shared_components_capacity, config.shared_buffer_capacity)
    }

    /// Reserves an aligned region for `T`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::AlreadyRegistered`] if `T` has a region already
    /// - [`EcsError::UnsupportedAlignment`] if `T` needs more than 16 bytes
    /// - [`EcsError::CapacityExceeded`] if the type table or buffer is full
    pub fn register<T: Pod>(&mut self) -> EcsResult<()> {
        let name = type_name::<T>();
        if self.position::<T>().is_some() {
            return Err(EcsError::AlreadyRegistered { type_name: name });
        }
        if align_of::<T>() > SHARED_ALIGNMENT {
            return Err(EcsError::UnsupportedAlignment {
                type_name: name,
                align: align_of::<T>(),
                max: SHARED_ALIGNMENT,
            });
        }
        if self.entries.len() >= self.max_types {
            return Err(EcsError::CapacityExceeded {
                what: "shared component types",
                capacity: self.max_types,
            });
        }

        let offset = align_up(self.cursor);
        let size = size_of::<T>();
        if offset + size > self.capacity_bytes() {
            return Err(EcsError::CapacityExceeded {
                what: "shared buffer bytes",
                capacity: self.capacity_bytes(),
            });
        }

        self.entries.push(SharedEntry {
            type_id: TypeId::of::<T>(),
            type_name: name,
            offset,
            size,
        });
        self.present.push(false);
        self.cursor = offset + size;
        debug!(shared = name, offset, size, "shared component registered");
        Ok(())
    }

    /// Checks whether `T` is registered.
    #[must_use]
    pub fn is_registered<T: Pod>(&self) -> bool {
        self.position::<T>().is_some()
    }

    /// Checks whether `T` currently holds a value.
    #[must_use]
    pub fn contains<T: Pod>(&self) -> bool {
        self.position::<T>().is_some_and(|i| self.present[i])
    }

    /// Writes `value` into `T`'s region and marks it present.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` was never registered.
    pub fn set<T: Pod>(&mut self, value: T) -> EcsResult<()> {
        let position = self.require::<T>()?;
        let entry = self.entries[position];
        self.bytes_mut()[entry.offset..entry.offset + entry.size]
            .copy_from_slice(bytemuck::bytes_of(&value));
        self.present[position] = true;
        Ok(())
    }

    /// Returns a copy of the value, or `T::zeroed()` if absent.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` was never registered.
    pub fn get<T: Pod>(&self) -> EcsResult<T> {
        let position = self.require::<T>()?;
        if !self.present[position] {
            return Ok(T::zeroed());
        }
        let entry = self.entries[position];
        Ok(bytemuck::pod_read_unaligned(
            &self.bytes()[entry.offset..entry.offset + entry.size],
        ))
    }

    /// Borrows the value in place.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Unregistered`] if `T` was never registered
    /// - [`EcsError::SharedAbsent`] if `T` holds no value
    pub fn get_ref<T: Pod>(&self) -> EcsResult<&T> {
        let entry = self.present_entry::<T>()?;
        bytemuck::try_from_bytes(&self.bytes()[entry.offset..entry.offset + entry.size])
            .map_err(|_| Self::misaligned::<T>())
    }

    /// Mutably borrows the value in place.
    ///
    /// # Errors
    ///
    /// Same as [`SharedStore::get_ref`].
    pub fn get_mut<T: Pod>(&mut self) -> EcsResult<&mut T> {
        let entry = self.present_entry::<T>()?;
        bytemuck::try_from_bytes_mut(&mut self.bytes_mut()[entry.offset..entry.offset + entry.size])
            .map_err(|_| Self::misaligned::<T>())
    }

    /// Clears the presence flag. The bytes stay until the next `set`.
    ///
    /// Returns whether a value was present.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` was never registered.
    pub fn delete<T: Pod>(&mut self) -> EcsResult<bool> {
        let position = self.require::<T>()?;
        let was_present = self.present[position];
        self.present[position] = false;
        Ok(was_present)
    }

    /// Locks `T`'s region for raw access.
    ///
    /// Returns `None` if `T` holds no value. The guard borrows the store
    /// mutably, so nothing else can touch it until the guard is released
    /// or dropped.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` was never registered.
    pub fn pin<T: Pod>(&mut self) -> EcsResult<Option<PinnedSlot<'_>>> {
        let position = self.require::<T>()?;
        if !self.present[position] {
            return Ok(None);
        }
        let entry = self.entries[position];
        let bytes = &mut self.bytes_mut()[entry.offset..entry.offset + entry.size];
        Ok(Some(PinnedSlot {
            type_name: entry.type_name,
            offset: entry.offset,
            bytes,
        }))
    }

    /// Number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if no type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes consumed by registrations, including alignment padding.
    #[inline]
    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.cursor
    }

    /// Total buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.buffer.len() * SHARED_ALIGNMENT
    }

    /// Byte offset of `T`'s region.
    #[must_use]
    pub fn offset_of<T: Pod>(&self) -> Option<usize> {
        self.position::<T>().map(|i| self.entries[i].offset)
    }

    /// Present entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = SharedEntryView<'_>> + '_ {
        let bytes = self.bytes();
        self.entries
            .iter()
            .zip(self.present.iter())
            .filter(|(_, &present)| present)
            .map(move |(entry, _)| SharedEntryView {
                type_name: entry.type_name,
                offset: entry.offset,
                size: entry.size,
                bytes: &bytes[entry.offset..entry.offset + entry.size],
            })
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.buffer)
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.buffer)
    }

    fn position<T: 'static>(&self) -> Option<usize> {
        let id = TypeId::of::<T>();
        self.entries.iter().position(|entry| entry.type_id == id)
    }

    fn require<T: 'static>(&self) -> EcsResult<usize> {
        self.position::<T>().ok_or(EcsError::Unregistered {
            type_name: type_name::<T>(),
        })
    }

    fn present_entry<T: 'static>(&self) -> EcsResult<SharedEntry> {
        let position = self.require::<T>()?;
        if !self.present[position] {
            return Err(EcsError::SharedAbsent {
                type_name: type_name::<T>(),
            });
        }
        Ok(self.entries[position])
    }

    fn misaligned<T>() -> EcsError {
        EcsError::UnsupportedAlignment {
            type_name: type_name::<T>(),
            align: align_of::<T>(),
            max: SHARED_ALIGNMENT,
        }
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::from_config(&WorldConfig::default())
    }
}

/// Exclusive raw access to one shared region.
///
/// The region is locked for as long as the guard lives. Call
/// [`PinnedSlot::release`] to end it explicitly; dropping has the same effect.
pub struct PinnedSlot<'a> {
    type_name: &'static str,
    offset: usize,
    bytes: &'a mut [u8],
}

impl PinnedSlot<'_> {
    /// Raw address of the region, valid until the guard is released.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes.as_mut_ptr()
    }

    /// Size of the region in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Checks if the region has zero size.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The region as bytes.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    /// Unlocks the region.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PinnedSlot<'_> {
    fn drop(&mut self) {
        trace!(shared = self.type_name, offset = self.offset, "shared region released");
    }
}

#[cfg(test)]
#[allow(dead_code)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Clock {
        tick: u64,
        scale: f32,
        paused: u32,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Seed(u8);

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C, align(32))]
    struct Wide([u8; 32]);

    #[test]
    fn test_set_get_roundtrip() {
        let mut shared = SharedStore::new(4, 256);
        shared.register::<Clock>().unwrap();
        let clock = Clock {
            tick: 42,
            scale: 0.5,
            paused: 1,
        };
        shared.set(clock).unwrap();

        assert_eq!(shared.get::<Clock>().unwrap(), clock);
        assert_eq!(shared.get_ref::<Clock>().unwrap(), &clock);
        assert!(shared.contains::<Clock>());
    }

    #[test]
    fn test_offsets_are_aligned_and_stable() {
        let mut shared = SharedStore::new(4, 256);
        shared.register::<Seed>().unwrap();
        shared.register::<Clock>().unwrap();

        assert_eq!(shared.offset_of::<Seed>(), Some(0));
        assert_eq!(shared.offset_of::<Clock>(), Some(16));
        assert_eq!(shared.used_bytes(), 16 + size_of::<Clock>());

        shared.set(Seed(9)).unwrap();
        assert_eq!(shared.offset_of::<Clock>(), Some(16));
    }

    #[test]
    fn test_registration_errors() {
        let mut shared = SharedStore::new(1, 32);
        shared.register::<Seed>().unwrap();
        assert!(matches!(
            shared.register::<Seed>(),
            Err(EcsError::AlreadyRegistered { .. })
        ));
        assert!(matches!(
            shared.register::<Clock>(),
            Err(EcsError::CapacityExceeded { .. })
        ));
        assert!(matches!(
            SharedStore::new(4, 64).register::<Wide>(),
            Err(EcsError::UnsupportedAlignment { align: 32, .. })
        ));

        let mut tight = SharedStore::new(4, 24);
        tight.register::<Seed>().unwrap();
        assert!(matches!(
            tight.register::<Clock>(),
            Err(EcsError::CapacityExceeded { what: "shared buffer bytes", .. })
        ));
    }

    #[test]
    fn test_absent_and_unregistered() {
        let mut shared = SharedStore::new(4, 64);
        assert!(matches!(shared.get::<Clock>(), Err(EcsError::Unregistered { .. })));

        shared.register::<Clock>().unwrap();
        assert_eq!(shared.get::<Clock>().unwrap(), Clock::zeroed());
        assert!(matches!(shared.get_ref::<Clock>(), Err(EcsError::SharedAbsent { .. })));
        assert!(shared.pin::<Clock>().unwrap().is_none());
    }

    #[test]
    fn test_delete_clears_presence_only() {
        let mut shared = SharedStore::new(4, 64);
        shared.register::<Seed>().unwrap();
        shared.set(Seed(7)).unwrap();

        assert!(shared.delete::<Seed>().unwrap());
        assert!(!shared.delete::<Seed>().unwrap());
        assert_eq!(shared.get::<Seed>().unwrap(), Seed(0));
        assert_eq!(shared.bytes()[0], 7);
        assert_eq!(shared.entries().count(), 0);
    }

    #[test]
    fn test_get_mut_edits_in_place() {
        let mut shared = SharedStore::new(4, 64);
        shared.register::<Clock>().unwrap();
        shared.set(Clock::zeroed()).unwrap();
        shared.get_mut::<Clock>().unwrap().tick += 5;
        assert_eq!(shared.get::<Clock>().unwrap().tick, 5);
    }

    #[test]
    fn test_pin_exposes_region() {
        let mut shared = SharedStore::new(4, 64);
        shared.register::<Seed>().unwrap();
        shared.register::<Clock>().unwrap();
        shared.set(Clock::zeroed()).unwrap();

        let mut pinned = shared.pin::<Clock>().unwrap().unwrap();
        assert_eq!(pinned.len(), size_of::<Clock>());
        assert_eq!(pinned.as_mut_ptr() as usize % SHARED_ALIGNMENT, 0);
        pinned.bytes_mut()[..8].copy_from_slice(&9u64.to_ne_bytes());
        pinned.release();

        assert_eq!(shared.get::<Clock>().unwrap().tick, 9);
    }

    #[test]
    fn test_entries_report_present_values() {
        let mut shared = SharedStore::new(4, 64);
        shared.register::<Seed>().unwrap();
        shared.register::<Clock>().unwrap();
        shared.set(Seed(3)).unwrap();

        let entries: Vec<SharedEntryView<'_>> = shared.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[0].bytes, &[3]);
    }
}
