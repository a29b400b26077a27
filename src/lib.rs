//! Live geofence detection and notification for spatio collections.
//!
//! ```rust
//! use spatio_fence::prelude::*;
//!
//! let mut store = MemoryStore::new();
//! let groups = SequentialGroupIds::new();
//! let mut hooks = HookSet::new();
//!
//! let fence = Fence::new(FenceSpec::within_bounds("fleet", -0.5, -0.5, 0.5, 0.5))?;
//! hooks.add(Hook::new("depot", fence, ScanWriter::new(OutputMode::Objects)))?;
//!
//! store.set("fleet", "truck1", Object::point(10.0, 10.0), Fields::new());
//! let event = store.set("fleet", "truck1", Object::point(0.1, 0.1), Fields::new());
//! let sent = hooks.notify(&event, &Collaborators::new(&store, &groups));
//! assert_eq!(sent.len(), 2); // enter, inside
//! # Ok::<(), spatio_fence::FenceError>(())
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod fence;
pub mod glob;
pub mod hook;
pub mod memory;
pub mod scan;
pub mod spatial;
pub mod store;

pub use config::{FenceArea, FenceSpec, QueryKind, RoamSpec, WhereFilter};
pub use error::{FenceError, Result};
pub use event::{CommandKind, MutationEvent};
pub use fence::{DetectSet, DetectState, Fence, FenceState, Meta, detect_and_emit};
pub use hook::{Hook, HookSet, Notification};
pub use memory::MemoryStore;
pub use scan::{OutputMode, ScanWriter};
pub use store::{
    Collaborators, ExpireChecker, GroupIdGenerator, NearbyIndex, ObjectStore, SequentialGroupIds,
    UuidGroupIds,
};

pub use geo::{Point, Polygon, Rect};
pub use spatio_types::{Fields, Object};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{FenceError, Result};

    pub use crate::{DetectSet, DetectState, Fence, FenceSpec, QueryKind, RoamSpec};

    pub use crate::{Hook, HookSet, Meta, OutputMode, ScanWriter};

    pub use crate::{Collaborators, MemoryStore, SequentialGroupIds, UuidGroupIds};

    pub use crate::{CommandKind, MutationEvent};

    pub use spatio_types::{Fields, Object};

    pub use geo::{Point, Polygon, Rect};
}
