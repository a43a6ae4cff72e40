//! Native `wgpu` host for the surface lifecycle.
//!
//! - `backend` negotiates adapter and device on a worker thread and wires the
//!   device-lost callback into the provider's loss channel.
//! - `context` owns one window's swap surface plus the offscreen backing
//!   texture that render units draw into.
//! - `pipeline` is the blit that stretches the backing texture over the
//!   window on every submitted frame.
//! - `canvas` adapts a winit window to the [`Canvas`](crate::Canvas) trait.

mod backend;
mod canvas;
mod context;
mod pipeline;

pub use backend::{BackendOptions, GpuDevice, WgpuBackend};
pub use canvas::WindowCanvas;
pub use context::{Frame, SurfaceContext};
