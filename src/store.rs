//! Collaborator interfaces consumed by the fence engine.
//!
//! The engine never owns objects, indexes or expiration schedules. It reads
//! them through these narrow traits while the caller holds the write lock of
//! the mutated collection. [`Collaborators`] bundles one implementation of
//! each for a single evaluation.

use geo::Point;
use spatio_types::{Fields, Object};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point lookups and ordered scans over collections.
pub trait ObjectStore {
    /// Current value of `(key, id)`.
    fn get(&self, key: &str, id: &str) -> Option<(Object, Fields)>;

    /// Visit every object of `key` in ascending id order until `visit` returns false.
    fn scan(&self, key: &str, visit: &mut dyn FnMut(&str, &Object, &Fields) -> bool);
}

/// Radius queries over collections.
pub trait NearbyIndex {
    /// Visit every object of `key` whose representative point is within
    /// `meters` of `center`, in unspecified order, until `visit` returns false.
    fn nearby(
        &self,
        key: &str,
        center: Point,
        meters: f64,
        visit: &mut dyn FnMut(&str, &Object, &Fields) -> bool,
    );
}

pub trait ExpireChecker {
    fn has_expired(&self, key: &str, id: &str) -> bool;
}

/// Source of correlation group tokens.
pub trait GroupIdGenerator {
    fn next_group(&self) -> String;
}

/// Random tokens (uuid v4, simple form).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGroupIds;

impl GroupIdGenerator for UuidGroupIds {
    fn next_group(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic tokens `g1`, `g2`, ...
#[derive(Debug, Default)]
pub struct SequentialGroupIds {
    next: AtomicU64,
}

impl SequentialGroupIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl GroupIdGenerator for SequentialGroupIds {
    fn next_group(&self) -> String {
        format!("g{}", self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Everything an evaluation reads from outside the fence.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub objects: &'a dyn ObjectStore,
    pub index: &'a dyn NearbyIndex,
    pub expires: &'a dyn ExpireChecker,
    pub group_ids: &'a dyn GroupIdGenerator,
}

impl<'a> Collaborators<'a> {
    /// Use one backend for all lookups.
    pub fn new<S>(store: &'a S, group_ids: &'a dyn GroupIdGenerator) -> Self
    where
        S: ObjectStore + NearbyIndex + ExpireChecker,
    {
        Self {
            objects: store,
            index: store,
            expires: store,
            group_ids,
        }
    }
}
