#![forbid(unsafe_code)]
//! biochip: placement, routing and lock-step scheduling for digital microfluidic biochips.
//!
//! Modules:
//! - grid: growable pad arena, zones, animation tags
//! - placement: bijective sample/pad map
//! - routing: L-shaped pathfinder, single-route and batch schedulers
//! - device: the mutex-guarded device handle, zone allocator and snapshots
//! - choreo: appear/disappear/merge/split primitives and compound operations
//! - events: observer channel for renderers
//!
//! For a walkthrough, see README and the `biochip_examples` crate.
pub mod cancel;
pub mod choreo;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod grid;
pub mod placement;
pub mod routing;
pub mod sample;

/// Convenient re-exports for common types. Import with `use biochip::prelude::*;`.
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::choreo::Incubation;
    pub use crate::config::DeviceConfig;
    pub use crate::device::{CellView, Device, DeviceSnapshot, Tint};
    pub use crate::error::{Error, Result};
    pub use crate::events::{
        ChannelSink, DeviceEvent, DeviceEventKind, EventSink, FnSink, MultiSink, VecSink,
    };
    pub use crate::grid::{Animation, Direction, DropletSize, Grid, PlaceId, Zone, ZoneLayout};
    pub use crate::placement::Placement;
    pub use crate::routing::{can_step_to, path_axis_first, Route};
    pub use crate::sample::{Sample, SampleId};
}
