use std::fmt;

use crate::device::GpuBackend;
use crate::error::RenderError;

/// Layout size of a canvas in logical (CSS) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CssSize {
    pub width: f64,
    pub height: f64,
}

impl CssSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Size of a canvas pixel buffer in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl Default for PixelSize {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the presented canvas composites with whatever is behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Premultiplied,
}

/// A drawing target the surface manager owns exclusively while mounted.
///
/// The pixel buffer size is only changed through [`Canvas::set_pixel_size`];
/// [`Canvas::configure`] binds the presentation context to a device at the
/// current pixel size.
pub trait Canvas<B: GpuBackend> {
    fn css_size(&self) -> CssSize;

    fn device_pixel_ratio(&self) -> f64;

    fn pixel_size(&self) -> PixelSize;

    fn set_pixel_size(&mut self, size: PixelSize);

    /// Presentation context handed to render unit factories.
    fn context(&self) -> B::Context;

    fn configure(
        &mut self,
        device: &B::Device,
        format: B::Format,
        alpha: AlphaMode,
    ) -> Result<(), RenderError>;

    /// Releases the presentation binding when the canvas is unmounted.
    fn unconfigure(&mut self);
}
