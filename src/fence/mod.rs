//! Live fences.
//!
//! A [`Fence`] is one standing query: a validated [`FenceSpec`] plus the state
//! it accumulates across mutations. That state is owned by the fence and only
//! ever changed through [`detect_and_emit`], on the caller's write path.

pub mod detect;
pub mod message;
pub mod predicate;
pub mod roam;

pub use detect::{DetectSet, DetectState};
pub use message::{Groups, Meta, detect_and_emit};
pub use roam::{NearbySets, RoamMatch, RoamOutcome, RoamTracker};

use crate::config::FenceSpec;
use crate::error::Result;
use crate::event::{CommandKind, MutationEvent};
use crate::glob::Pattern;

/// Mutable bookkeeping of one fence.
#[derive(Debug, Clone, Default)]
pub struct FenceState {
    /// Live correlation tokens.
    pub groups: Groups,
    /// Roam matches currently near each target.
    pub nearby: NearbySets,
}

#[derive(Debug, Clone)]
pub struct Fence {
    spec: FenceSpec,
    id_pattern: Pattern,
    roam: Option<RoamTracker>,
    state: FenceState,
}

impl Fence {
    /// Validate `spec` and compile its patterns.
    pub fn new(spec: FenceSpec) -> Result<Self> {
        spec.validate()?;
        let id_pattern = Pattern::parse(&spec.id_pattern);
        let roam = spec
            .roam
            .clone()
            .filter(|roam| roam.enabled)
            .map(RoamTracker::new);
        Ok(Self {
            spec,
            id_pattern,
            roam,
            state: FenceState::default(),
        })
    }

    pub fn spec(&self) -> &FenceSpec {
        &self.spec
    }

    pub fn state(&self) -> &FenceState {
        &self.state
    }

    pub fn is_roaming(&self) -> bool {
        self.roam.is_some()
    }

    /// Classify `event` without touching any state.
    ///
    /// Roaming fences classify every geometric `set` of a matching id as
    /// [`DetectState::Roam`]; whether anything is emitted then depends on
    /// what the tracker finds.
    pub fn detect(&self, event: &MutationEvent) -> Option<DetectState> {
        if self.roam.is_none() {
            return detect::detect(&self.spec, &self.id_pattern, event);
        }
        match event.command {
            CommandKind::Drop => Some(DetectState::Drop),
            CommandKind::Del => Some(DetectState::Del),
            CommandKind::Set => {
                let geometric = event.new_object.as_ref().is_some_and(|o| o.is_geometry());
                (geometric
                    && self.id_pattern.matches(&event.id)
                    && detect::allows(self.spec.detect.as_ref(), DetectState::Roam))
                .then_some(DetectState::Roam)
            }
            CommandKind::Fset | CommandKind::Other(_) => None,
        }
    }
}
