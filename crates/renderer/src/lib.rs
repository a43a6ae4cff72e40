//! Surface lifecycle manager for GPU demo canvases.
//!
//! Every canvas on a page is driven by one [`SurfaceManager`]. Managers share
//! a single [`DeviceProvider`] and a [`RenderUnitRegistry`] of demo factories:
//!
//! ```text
//!   host event loop ──▶ SurfaceManager ──▶ DeviceProvider ──▶ GpuBackend
//!     │  mount / resize        │                 (one device, shared)
//!     │  hover / visibility    ├──▶ Canvas::configure (backing size, format)
//!     │  on_frame(ticket)      ├──▶ RenderUnitRegistry::load ─▶ RenderUnit
//!     ▼                        └──▶ FrameScheduler::request_frame
//!   poll(now) ◀── Pending<T> completions (device, unit creation)
//! ```
//!
//! Full canvases render continuously. Previews render one frame when they
//! become visible and animate only while hovered; hidden previews pause.
//! Device loss retires the shared device so the next acquisition creates a
//! fresh one.
//!
//! The lifecycle core is generic over [`GpuBackend`], [`Canvas`] and
//! [`FrameScheduler`] so it can be exercised without a GPU. The `gpu` and
//! `window` modules provide the native `wgpu` + winit host.

mod canvas;
mod device;
mod error;
mod frame;
pub mod gpu;
mod pending;
mod surface;
mod unit;
mod visibility;
pub mod window;

pub use canvas::{AlphaMode, Canvas, CssSize, PixelSize};
pub use device::{DeviceHandle, DeviceId, DeviceProvider, GpuBackend, LossNotifier};
pub use error::{CapabilityError, RenderError, SurfaceFault, TickDisposition};
pub use frame::{FrameScheduler, FrameTicket};
pub use pending::{Pending, PendingPoll, Resolver};
pub use surface::{
    backing_size, LifecycleState, SizingLimits, Status, SurfaceManager, SurfaceOptions, TickClock,
    DEFAULT_MAX_TICK_DELTA,
};
pub use unit::{RenderUnit, RenderUnitFactory, RenderUnitRegistry, UnitResult};
pub use visibility::{
    Rect, TargetId, ViewportObserver, VisibilityChange, VisibilityGate, DEFAULT_THRESHOLD,
};
