//! Fence state detection.
//!
//! Classifies one mutation against a fence's static area. The detector holds
//! no state: evaluating the same event twice yields the same answer.

use super::predicate::{FencePredicate, Predicate};
use crate::config::FenceSpec;
use crate::event::{CommandKind, MutationEvent};
use crate::glob::Pattern;
use geo::{Geometry, Line};
use serde::{Deserialize, Serialize};
use spatio_types::{Fields, Object};
use std::fmt;

/// Relationship between a mutation and a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectState {
    Inside,
    Outside,
    Enter,
    Exit,
    Cross,
    Roam,
    Del,
    Drop,
}

impl DetectState {
    pub const ALL: [DetectState; 8] = [
        DetectState::Inside,
        DetectState::Outside,
        DetectState::Enter,
        DetectState::Exit,
        DetectState::Cross,
        DetectState::Roam,
        DetectState::Del,
        DetectState::Drop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectState::Inside => "inside",
            DetectState::Outside => "outside",
            DetectState::Enter => "enter",
            DetectState::Exit => "exit",
            DetectState::Cross => "cross",
            DetectState::Roam => "roam",
            DetectState::Del => "del",
            DetectState::Drop => "drop",
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for DetectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of detect states, serialized as a list of names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<DetectState>", into = "Vec<DetectState>")]
pub struct DetectSet(u8);

impl DetectSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::of(&DetectState::ALL)
    }

    pub fn of(states: &[DetectState]) -> Self {
        states.iter().copied().collect()
    }

    pub fn insert(&mut self, state: DetectState) {
        self.0 |= state.bit();
    }

    pub fn contains(&self, state: DetectState) -> bool {
        self.0 & state.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = DetectState> + '_ {
        DetectState::ALL
            .into_iter()
            .filter(|state| self.contains(*state))
    }
}

impl FromIterator<DetectState> for DetectSet {
    fn from_iter<I: IntoIterator<Item = DetectState>>(iter: I) -> Self {
        let mut set = DetectSet::empty();
        for state in iter {
            set.insert(state);
        }
        set
    }
}

impl From<Vec<DetectState>> for DetectSet {
    fn from(states: Vec<DetectState>) -> Self {
        states.into_iter().collect()
    }
}

impl From<DetectSet> for Vec<DetectState> {
    fn from(set: DetectSet) -> Self {
        set.iter().collect()
    }
}

/// Whether `filter` lets `state` through (no filter allows everything).
pub fn allows(filter: Option<&DetectSet>, state: DetectState) -> bool {
    filter.is_none_or(|set| set.contains(state))
}

/// Apply a detect filter as a fallback rather than a hard drop.
///
/// A filtered `enter` is reported as `inside` and a filtered `exit` as
/// `outside`, if those are allowed. Anything else that is filtered out is
/// suppressed.
pub fn canonicalize(filter: Option<&DetectSet>, state: DetectState) -> Option<DetectState> {
    if allows(filter, state) {
        return Some(state);
    }
    let fallback = match state {
        DetectState::Enter => DetectState::Inside,
        DetectState::Exit => DetectState::Outside,
        _ => return None,
    };
    allows(filter, fallback).then_some(fallback)
}

/// Outcome of testing one side (old or new) of a mutation.
#[derive(Debug, Clone, Copy)]
struct SideMatch {
    geometry: bool,
    fields: bool,
}

impl SideMatch {
    fn matched(&self) -> bool {
        self.geometry && self.fields
    }

    /// Geometry matched but a field filter rejected the object.
    fn rejected_by_fields(&self) -> bool {
        self.geometry && !self.fields
    }
}

fn match_side(
    spec: &FenceSpec,
    predicate: &Predicate<'_>,
    object: Option<&Object>,
    fields: &Fields,
) -> SideMatch {
    let geometry = predicate.matches(object);
    let fields = !geometry || spec.where_filters.iter().all(|filter| filter.matches(fields));
    SideMatch { geometry, fields }
}

/// Classify a geometric mutation before detect filtering.
///
/// `new_object` must already be known to carry geometry.
pub fn transition(
    spec: &FenceSpec,
    event: &MutationEvent,
    new_object: &Object,
) -> Option<DetectState> {
    let predicate = Predicate::for_query(spec.query, spec.area.as_ref());
    let new = match_side(spec, &predicate, Some(new_object), &event.fields);

    if event.command == CommandKind::Fset {
        // geometry did not move, so there is nothing to cross
        return new.matched().then_some(DetectState::Inside);
    }

    let old = match_side(
        spec,
        &predicate,
        event.old_object.as_ref(),
        &event.old_fields,
    );

    let state = match (old.matched(), new.matched()) {
        (true, true) => DetectState::Inside,
        (false, true) => DetectState::Enter,
        (true, false) => DetectState::Exit,
        (false, false) => {
            let nocross = old.rejected_by_fields() || new.rejected_by_fields();
            match (nocross, event.old_object.as_ref()) {
                (false, Some(old_object)) if crosses(spec, old_object, new_object) => {
                    DetectState::Cross
                }
                _ => DetectState::Outside,
            }
        }
    };
    Some(state)
}

/// Whether the straight path from `old` to `new` touches the fence area.
///
/// Always tested with the intersects predicate: a path can pass through an
/// area without being within it.
fn crosses(spec: &FenceSpec, old: &Object, new: &Object) -> bool {
    let (Some(from), Some(to)) = (old.representative_point(), new.representative_point()) else {
        return false;
    };
    let path = Geometry::Line(Line::new(from.0, to.0));
    Predicate::crossing(spec.area.as_ref()).matches_geometry(&path)
}

/// Classify `event` against a static (non-roaming) fence.
///
/// Returns `None` when the event is suppressed for this fence.
pub fn detect(
    spec: &FenceSpec,
    id_pattern: &Pattern,
    event: &MutationEvent,
) -> Option<DetectState> {
    match event.command {
        CommandKind::Drop => return Some(DetectState::Drop),
        CommandKind::Del => return Some(DetectState::Del),
        CommandKind::Set | CommandKind::Fset => {}
        CommandKind::Other(_) => return None,
    }

    if !id_pattern.matches(&event.id) {
        log::trace!("fence on '{}' ignores id '{}'", spec.key, event.id);
        return None;
    }

    let new_object = event.new_object.as_ref().filter(|object| object.is_geometry())?;
    let state = transition(spec, event, new_object)?;
    let resolved = canonicalize(spec.detect.as_ref(), state);
    log::debug!(
        "{} {}/{} classified as {} (reported as {:?})",
        event.command,
        event.key,
        event.id,
        state,
        resolved.map(|s| s.as_str())
    );
    resolved
}
