//! In-memory collections backing the collaborator traits.
//!
//! Each collection keeps its objects in id order and indexes the
//! representative point of every geometry in an R-tree. Every mutation returns
//! the [`MutationEvent`] that describes it, ready to be handed to fences.

use crate::error::{FenceError, Result};
use crate::event::MutationEvent;
use crate::spatial::{distance_between, radius_envelopes};
use crate::store::{ExpireChecker, NearbyIndex, ObjectStore};
use geo::Point;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use rustc_hash::{FxHashMap, FxHashSet};
use spatio_types::{Fields, Object};
use std::collections::BTreeMap;
use std::time::SystemTime;

type IndexedId = GeomWithData<[f64; 2], String>;

#[derive(Debug, Clone)]
struct Entry {
    object: Object,
    fields: Fields,
    expires_at: Option<SystemTime>,
}

impl Entry {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Collection {
    entries: BTreeMap<String, Entry>,
    points: RTree<IndexedId>,
}

impl Collection {
    fn index(&mut self, id: &str, object: &Object) {
        if let Some(point) = object.representative_point() {
            self.points.insert(GeomWithData::new([point.x(), point.y()], id.to_string()));
        }
    }

    fn unindex(&mut self, id: &str, object: &Object) {
        if let Some(point) = object.representative_point() {
            self.points.remove(&GeomWithData::new([point.x(), point.y()], id.to_string()));
        }
    }

    fn insert(&mut self, id: &str, entry: Entry) -> Option<Entry> {
        let old = self.entries.remove(id);
        if let Some(old) = &old {
            self.unindex(id, &old.object);
        }
        self.index(id, &entry.object);
        self.entries.insert(id.to_string(), entry);
        old
    }

    fn remove(&mut self, id: &str) -> Option<Entry> {
        let old = self.entries.remove(id)?;
        self.unindex(id, &old.object);
        Some(old)
    }
}

/// Keyed collections of objects with fields and optional expiration.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: FxHashMap<String, Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `object` under `(key, id)`, replacing any previous value.
    pub fn set(&mut self, key: &str, id: &str, object: Object, fields: Fields) -> MutationEvent {
        self.put(key, id, object, fields, None)
    }

    /// Like [`set`](Self::set), but the object expires at `expires_at`.
    pub fn set_with_expiry(
        &mut self,
        key: &str,
        id: &str,
        object: Object,
        fields: Fields,
        expires_at: SystemTime,
    ) -> MutationEvent {
        self.put(key, id, object, fields, Some(expires_at))
    }

    fn put(
        &mut self,
        key: &str,
        id: &str,
        object: Object,
        fields: Fields,
        expires_at: Option<SystemTime>,
    ) -> MutationEvent {
        let entry = Entry {
            object: object.clone(),
            fields: fields.clone(),
            expires_at,
        };
        let old = self
            .collections
            .entry(key.to_string())
            .or_default()
            .insert(id, entry);

        let (old_object, old_fields) = match old {
            Some(old) => (Some(old.object), old.fields),
            None => (None, Fields::new()),
        };
        MutationEvent::set(key, id, old_object, object)
            .with_old_fields(old_fields)
            .with_fields(fields)
    }

    /// Merge `updates` into the fields of an existing object.
    pub fn fset(&mut self, key: &str, id: &str, updates: &Fields) -> Result<MutationEvent> {
        let entry = self
            .collections
            .get_mut(key)
            .and_then(|collection| collection.entries.get_mut(id))
            .ok_or_else(|| FenceError::InvalidInput(format!("no object {key}/{id}")))?;

        let old_fields = entry.fields.clone();
        entry.fields.merge(updates);
        Ok(MutationEvent::fset(
            key,
            id,
            entry.object.clone(),
            old_fields,
            entry.fields.clone(),
        ))
    }

    /// Remove `(key, id)`. `None` when there was nothing to remove.
    pub fn del(&mut self, key: &str, id: &str) -> Option<MutationEvent> {
        let collection = self.collections.get_mut(key)?;
        let old = collection.remove(id)?;
        if collection.entries.is_empty() {
            self.collections.remove(key);
        }
        Some(MutationEvent::del(key, id, Some(old.object)).with_old_fields(old.fields))
    }

    /// Remove a whole collection. `None` when it did not exist.
    pub fn drop_collection(&mut self, key: &str) -> Option<MutationEvent> {
        self.collections
            .remove(key)
            .map(|_| MutationEvent::drop_collection(key))
    }

    /// Number of objects in `key`, expired ones included.
    pub fn len(&self, key: &str) -> usize {
        self.collections
            .get(key)
            .map_or(0, |collection| collection.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, key: &str, id: &str) -> Option<(Object, Fields)> {
        let entry = self.collections.get(key)?.entries.get(id)?;
        Some((entry.object.clone(), entry.fields.clone()))
    }

    fn scan(&self, key: &str, visit: &mut dyn FnMut(&str, &Object, &Fields) -> bool) {
        let Some(collection) = self.collections.get(key) else {
            return;
        };
        for (id, entry) in &collection.entries {
            if !visit(id, &entry.object, &entry.fields) {
                break;
            }
        }
    }
}

impl NearbyIndex for MemoryStore {
    fn nearby(
        &self,
        key: &str,
        center: Point,
        meters: f64,
        visit: &mut dyn FnMut(&str, &Object, &Fields) -> bool,
    ) {
        let Some(collection) = self.collections.get(key) else {
            return;
        };
        let mut seen: FxHashSet<&str> = FxHashSet::default();

        for envelope in radius_envelopes(&center, meters) {
            let aabb = AABB::from_corners(
                [envelope.min().x, envelope.min().y],
                [envelope.max().x, envelope.max().y],
            );
            for candidate in collection.points.locate_in_envelope_intersecting(&aabb) {
                let [lon, lat] = *candidate.geom();
                if distance_between(&center, &Point::new(lon, lat)) > meters {
                    continue;
                }
                if !seen.insert(candidate.data.as_str()) {
                    continue;
                }
                let Some(entry) = collection.entries.get(&candidate.data) else {
                    continue;
                };
                if !visit(&candidate.data, &entry.object, &entry.fields) {
                    return;
                }
            }
        }
    }
}

impl ExpireChecker for MemoryStore {
    fn has_expired(&self, key: &str, id: &str) -> bool {
        self.collections
            .get(key)
            .and_then(|collection| collection.entries.get(id))
            .is_some_and(|entry| entry.is_expired(SystemTime::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CommandKind;
    use std::time::Duration;

    fn nearby_ids(store: &MemoryStore, key: &str, center: Point, meters: f64) -> Vec<String> {
        let mut ids = Vec::new();
        store.nearby(key, center, meters, &mut |id, _, _| {
            ids.push(id.to_string());
            true
        });
        ids.sort();
        ids
    }

    #[test]
    fn test_set_reports_previous_value() {
        let mut store = MemoryStore::new();
        let first = store.set("fleet", "truck1", Object::point(1.0, 1.0), Fields::new());
        assert_eq!(first.command, CommandKind::Set);
        assert!(first.old_object.is_none());

        let fields = Fields::new().with("speed", 10.0);
        let second = store.set("fleet", "truck1", Object::point(2.0, 2.0), fields);
        assert_eq!(second.old_object, Some(Object::point(1.0, 1.0)));
        assert_eq!(second.new_object, Some(Object::point(2.0, 2.0)));
        assert_eq!(second.fields.get("speed"), 10.0);
        assert_eq!(store.len("fleet"), 1);
    }

    #[test]
    fn test_nearby_follows_moves() {
        let mut store = MemoryStore::new();
        store.set("fleet", "a", Object::point(0.0, 0.0), Fields::new());
        store.set("fleet", "b", Object::point(0.0, 0.0005), Fields::new());
        store.set("fleet", "c", Object::point(1.0, 1.0), Fields::new());
        store.set("fleet", "note", Object::String("hello".into()), Fields::new());

        let origin = Point::new(0.0, 0.0);
        assert_eq!(nearby_ids(&store, "fleet", origin, 100.0), vec!["a", "b"]);

        store.set("fleet", "b", Object::point(5.0, 5.0), Fields::new());
        assert_eq!(nearby_ids(&store, "fleet", origin, 100.0), vec!["a"]);
        assert!(nearby_ids(&store, "other", origin, 100.0).is_empty());
    }

    #[test]
    fn test_nearby_reaches_across_the_antimeridian() {
        let mut store = MemoryStore::new();
        store.set("fleet", "west", Object::point(-179.9999, 0.0), Fields::new());
        store.set("fleet", "east", Object::point(179.9995, 0.0), Fields::new());
        store.set("fleet", "far", Object::point(-179.9, 0.0), Fields::new());

        let center = Point::new(179.9999, 0.0);
        assert_eq!(nearby_ids(&store, "fleet", center, 200.0), vec!["east", "west"]);

        let center = Point::new(-179.9999, 0.0);
        assert_eq!(nearby_ids(&store, "fleet", center, 200.0), vec!["east", "west"]);
    }

    #[test]
    fn test_scan_is_id_ordered_and_stoppable() {
        let mut store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            store.set("fleet", id, Object::point(0.0, 0.0), Fields::new());
        }

        let mut seen = Vec::new();
        store.scan("fleet", &mut |id, _, _| {
            seen.push(id.to_string());
            seen.len() < 2
        });
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_fset_merges_fields() {
        let mut store = MemoryStore::new();
        store.set(
            "fleet",
            "truck1",
            Object::point(0.0, 0.0),
            Fields::new().with("speed", 5.0),
        );

        let event = store
            .fset("fleet", "truck1", &Fields::new().with("fuel", 0.5))
            .unwrap();
        assert_eq!(event.command, CommandKind::Fset);
        assert_eq!(event.old_object, event.new_object);
        assert_eq!(event.old_fields.get("fuel"), 0.0);
        assert_eq!(event.fields.get("speed"), 5.0);
        assert_eq!(event.fields.get("fuel"), 0.5);

        assert!(store.fset("fleet", "ghost", &Fields::new()).is_err());
    }

    #[test]
    fn test_del_and_drop() {
        let mut store = MemoryStore::new();
        store.set("fleet", "truck1", Object::point(0.0, 0.0), Fields::new());
        store.set("zones", "z1", Object::point(0.0, 0.0), Fields::new());

        let del = store.del("fleet", "truck1").unwrap();
        assert_eq!(del.command, CommandKind::Del);
        assert_eq!(del.old_object, Some(Object::point(0.0, 0.0)));
        assert!(store.del("fleet", "truck1").is_none());
        assert!(store.get("fleet", "truck1").is_none());

        let drop = store.drop_collection("zones").unwrap();
        assert_eq!(drop.command, CommandKind::Drop);
        assert!(store.drop_collection("zones").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expiry() {
        let mut store = MemoryStore::new();
        let past = SystemTime::now() - Duration::from_secs(1);
        let future = SystemTime::now() + Duration::from_secs(3600);
        store.set_with_expiry("fleet", "old", Object::point(0.0, 0.0), Fields::new(), past);
        store.set_with_expiry("fleet", "new", Object::point(0.0, 0.0), Fields::new(), future);
        store.set("fleet", "forever", Object::point(0.0, 0.0), Fields::new());

        assert!(store.has_expired("fleet", "old"));
        assert!(!store.has_expired("fleet", "new"));
        assert!(!store.has_expired("fleet", "forever"));
        assert!(!store.has_expired("fleet", "missing"));
        // expired objects stay visible until something removes them
        assert!(store.get("fleet", "old").is_some());
    }
}
