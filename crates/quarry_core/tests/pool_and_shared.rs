//! # Pool and Shared Store Tests
//!
//! Result pool accounting and leak detection, and the packed shared store.
//!
//! Run with: cargo test --package quarry_core --test pool_and_shared

#![allow(dead_code)]

use bytemuck::{Pod, Zeroable};

use quarry_core::{
    Component, EcsError, EntityList, ErrorKind, ResultPool, SharedStore, SubWorld, World,
    WorldConfig,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Marker;
impl Component for Marker {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Weather {
    wind: [f32; 3],
    storm: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Tick(u64);

// ============================================================================
// RESULT POOL
// ============================================================================

#[test]
fn acquire_n_release_n_restores_idle_count() {
    let pool = ResultPool::new(16, 64, true);
    let before = pool.idle_count();

    let lists: Vec<EntityList> = (0..12)
        .map(|_| pool.acquire_entities("batch").unwrap())
        .collect();
    for list in lists {
        pool.release(list).unwrap();
    }
    assert_eq!(pool.idle_count(), before + 12);

    let lists: Vec<EntityList> = (0..12)
        .map(|_| pool.acquire_entities("again").unwrap())
        .collect();
    assert_eq!(pool.idle_count(), before);
    for list in lists {
        pool.release(list).unwrap();
    }
    assert_eq!(pool.idle_count(), before + 12);
}

#[test]
fn container_from_another_pool_is_rejected() {
    let world_pool = ResultPool::new(16, 64, true);
    let sub_pool = ResultPool::new(16, 64, true);
    let ours = world_pool.acquire_entities("world").unwrap();
    let theirs = sub_pool.acquire_entities("sub-world").unwrap();

    let err = world_pool.release(theirs).unwrap_err();
    assert!(matches!(err, EcsError::DoubleRelease { .. }));
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(world_pool.outstanding_count(), 1);
    assert_eq!(world_pool.idle_count(), 0);
    assert_eq!(sub_pool.outstanding_count(), 1);

    world_pool.release(ours).unwrap();
    assert_eq!(world_pool.outstanding_count(), 0);
    assert_eq!(world_pool.idle_count(), 1);
}

#[test]
fn leak_diagnostic_names_outstanding_contexts() {
    let config = WorldConfig {
        pool_leak_threshold: 2,
        track_pool_leaks: true,
        ..WorldConfig::default()
    };
    let mut sub = SubWorld::standalone(0, &config).unwrap();
    sub.register::<Marker>(None).unwrap();
    let id = sub.create_entity(1).unwrap();
    sub.set(id, Marker).unwrap();

    let matcher = sub.matcher::<(Marker,)>().unwrap();
    let first = matcher.entities("ai").unwrap();
    let second = matcher.entities("physics").unwrap();

    match matcher.entities("render") {
        Err(EcsError::PoolLeak { outstanding, contexts }) => {
            assert_eq!(outstanding, 2);
            assert!(contexts.contains("ai"));
            assert!(contexts.contains("physics"));
        }
        other => panic!("expected a leak report, got {other:?}"),
    }

    sub.pool().release(first).unwrap();
    sub.pool().release(second).unwrap();
    let third = matcher.entities("render").unwrap();
    assert_eq!(third.len(), 1);
    sub.pool().release(third).unwrap();
}

// ============================================================================
// SHARED STORE
// ============================================================================

#[test]
fn shared_round_trip_is_bit_exact() {
    let mut shared = SharedStore::new(4, 1024);
    shared.register::<Weather>().unwrap();
    let weather = Weather {
        wind: [1.5, -0.0, f32::MIN_POSITIVE],
        storm: 0xDEAD_BEEF,
    };
    shared.set(weather).unwrap();

    let back = shared.get::<Weather>().unwrap();
    assert_eq!(bytemuck::bytes_of(&back), bytemuck::bytes_of(&weather));
    assert_eq!(shared.get_ref::<Weather>().unwrap(), &weather);
}

#[test]
fn shared_store_offsets_do_not_move() {
    let mut shared = SharedStore::new(4, 1024);
    shared.register::<Tick>().unwrap();
    let tick_offset = shared.offset_of::<Tick>();
    shared.register::<Weather>().unwrap();
    shared.set(Tick(1)).unwrap();
    shared.set(Weather::zeroed()).unwrap();

    assert_eq!(shared.offset_of::<Tick>(), tick_offset);
    assert_eq!(shared.offset_of::<Weather>(), Some(16));
    assert_eq!(shared.entries().count(), 2);
}

#[test]
fn unregistered_shared_type_is_not_found() {
    let shared = SharedStore::new(4, 64);
    let err = shared.get::<Tick>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn pinned_region_writes_land_in_the_store() {
    let mut world = World::new(WorldConfig::default()).unwrap();
    let shared = world.shared_mut();
    shared.register::<Tick>().unwrap();
    shared.set(Tick(0)).unwrap();

    {
        let mut pinned = shared.pin::<Tick>().unwrap().unwrap();
        assert_eq!(pinned.len(), 8);
        pinned.bytes_mut().copy_from_slice(&77u64.to_ne_bytes());
    }

    assert_eq!(world.shared().get::<Tick>().unwrap(), Tick(77));
}
