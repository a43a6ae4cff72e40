use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use winit::dpi::PhysicalPosition;
use winit::event::ElementState;
use winit::window::Window;

use crate::canvas::{AlphaMode, Canvas, CssSize, PixelSize};
use crate::error::RenderError;

use super::backend::{GpuDevice, WgpuBackend};
use super::context::SurfaceContext;

/// A winit window acting as a canvas.
///
/// The window's logical inner size is the layout size; its scale factor is
/// the device pixel ratio.
pub struct WindowCanvas {
    window: Arc<Window>,
    context: SurfaceContext,
}

impl WindowCanvas {
    pub fn new(backend: &WgpuBackend, window: Arc<Window>) -> Result<Self> {
        let surface = backend.create_surface(window.clone())?;
        Ok(Self {
            context: SurfaceContext::new(window.clone(), surface),
            window,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn handle_cursor_moved(&self, position: PhysicalPosition<f64>) {
        self.context
            .with_pointer(|pointer| pointer.handle_cursor_moved(position));
    }

    pub fn handle_cursor_left(&self) {
        self.context.with_pointer(|pointer| pointer.handle_left());
    }

    /// Returns `true` when a press that started inside the window ends.
    pub fn handle_mouse_button(&self, state: ElementState) -> bool {
        self.context.with_pointer(|pointer| pointer.handle_button(state))
    }

    pub fn handle_dropped_file(&self, path: PathBuf) {
        tracing::debug!(path = %path.display(), "file dropped on canvas");
        self.context.push_dropped_file(path);
    }
}

impl Canvas<WgpuBackend> for WindowCanvas {
    fn css_size(&self) -> CssSize {
        let logical = self
            .window
            .inner_size()
            .to_logical::<f64>(self.window.scale_factor());
        CssSize::new(logical.width, logical.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.scale_factor()
    }

    fn pixel_size(&self) -> PixelSize {
        self.context.pixel_size()
    }

    fn set_pixel_size(&mut self, size: PixelSize) {
        self.context.set_pixel_size(size);
    }

    fn context(&self) -> SurfaceContext {
        self.context.clone()
    }

    fn configure(
        &mut self,
        device: &GpuDevice,
        format: wgpu::TextureFormat,
        alpha: AlphaMode,
    ) -> Result<(), RenderError> {
        self.context.configure(device, format, alpha)
    }

    fn unconfigure(&mut self) {
        self.context.unconfigure();
    }
}
