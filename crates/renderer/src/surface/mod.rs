//! Per-canvas lifecycle management.
//!
//! - `sizing` turns layout size and device pixel ratio into a backing size.
//! - `clock` measures tick deltas with an upper clamp.
//! - `status` holds the user-facing status strings and lifecycle states.
//! - `manager` is the state machine that ties device, canvas, render unit
//!   and frame scheduling together.

mod clock;
mod manager;
mod sizing;
mod status;

pub use clock::{TickClock, DEFAULT_MAX_TICK_DELTA};
pub use manager::{SurfaceManager, SurfaceOptions};
pub use sizing::{backing_size, SizingLimits};
pub use status::{LifecycleState, Status};
