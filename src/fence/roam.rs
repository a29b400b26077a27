//! Roam proximity tracking.
//!
//! A roaming fence follows each target of its collection and reports which
//! members of the roam collection come within range (`nearby`) and which move
//! out of range (`faraway`). The per-target bookkeeping lives in
//! [`NearbySets`], owned by the fence and mutated only from the write path.

use crate::config::RoamSpec;
use crate::glob::Pattern;
use crate::spatial::distance_between;
use crate::store::Collaborators;
use rustc_hash::FxHashMap;
use spatio_types::Object;
use std::collections::BTreeSet;

/// One observed proximity relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct RoamMatch {
    pub id: String,
    pub object: Object,
    pub meters: f64,
}

/// What changed for one target on one update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoamOutcome {
    /// Matches within range, in index visiting order.
    pub nearby: Vec<RoamMatch>,
    /// Previously tracked matches now out of range, in id order.
    pub faraway: Vec<RoamMatch>,
    /// The target had nothing nearby before this update.
    pub started: bool,
}

impl RoamOutcome {
    pub fn is_empty(&self) -> bool {
        self.nearby.is_empty() && self.faraway.is_empty()
    }
}

/// Ids currently nearby each target. Targets with nothing nearby have no entry.
#[derive(Debug, Clone, Default)]
pub struct NearbySets {
    targets: FxHashMap<String, BTreeSet<String>>,
}

impl NearbySets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &str) -> Option<&BTreeSet<String>> {
        self.targets.get(target)
    }

    pub fn contains(&self, target: &str, id: &str) -> bool {
        self.targets.get(target).is_some_and(|ids| ids.contains(id))
    }

    /// Forget a target entirely.
    pub fn remove(&mut self, target: &str) -> Option<BTreeSet<String>> {
        self.targets.remove(target)
    }

    /// Number of targets with at least one nearby id.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

/// Compiled roam settings of one fence.
#[derive(Debug, Clone)]
pub struct RoamTracker {
    spec: RoamSpec,
    id_pattern: Pattern,
}

impl RoamTracker {
    pub fn new(spec: RoamSpec) -> Self {
        let id_pattern = Pattern::parse(&spec.id);
        Self { spec, id_pattern }
    }

    pub fn spec(&self) -> &RoamSpec {
        &self.spec
    }

    /// Update `sets` for `target_id` at its new position.
    ///
    /// Returns `None` when nothing came into or went out of range, in which
    /// case no message should be emitted for this update.
    pub fn track(
        &self,
        sets: &mut NearbySets,
        ctx: &Collaborators<'_>,
        target_key: &str,
        target_id: &str,
        target: &Object,
    ) -> Option<RoamOutcome> {
        let center = target.representative_point()?;
        let roam_key = self.spec.key.as_str();
        let previous = sets.remove(target_id).unwrap_or_default();
        let mut current = BTreeSet::new();
        let mut outcome = RoamOutcome {
            started: previous.is_empty(),
            ..RoamOutcome::default()
        };

        ctx.index
            .nearby(roam_key, center, self.spec.meters, &mut |id, object, _fields| {
                if roam_key == target_key && id == target_id {
                    return true;
                }
                if !self.id_pattern.matches(id) || ctx.expires.has_expired(roam_key, id) {
                    return true;
                }
                current.insert(id.to_string());
                if !previous.contains(id) || !self.spec.no_dwell {
                    outcome.nearby.push(RoamMatch {
                        id: id.to_string(),
                        object: object.clone(),
                        meters: meters_between(&center, object),
                    });
                }
                true
            });

        for id in previous.difference(&current) {
            if ctx.expires.has_expired(roam_key, id) {
                continue;
            }
            if let Some((object, _)) = ctx.objects.get(roam_key, id) {
                outcome.faraway.push(RoamMatch {
                    id: id.clone(),
                    meters: meters_between(&center, &object),
                    object,
                });
            }
        }

        outcome.started &= !current.is_empty();
        if !current.is_empty() {
            sets.targets.insert(target_id.to_string(), current);
        }

        if outcome.is_empty() {
            log::trace!("no roam activity for {}/{}", target_key, target_id);
            return None;
        }
        log::debug!(
            "roam {}/{}: {} nearby, {} faraway",
            target_key,
            target_id,
            outcome.nearby.len(),
            outcome.faraway.len()
        );
        Some(outcome)
    }
}

fn meters_between(center: &geo::Point, object: &Object) -> f64 {
    object
        .representative_point()
        .map(|point| distance_between(center, &point))
        .unwrap_or(0.0)
}
