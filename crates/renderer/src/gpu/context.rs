use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::canvas::{AlphaMode, PixelSize};
use crate::error::{RenderError, SurfaceFault};
use crate::window::PointerState;

use super::backend::GpuDevice;
use super::pipeline::Compositor;

/// Shared handle to one window's drawing state.
///
/// Render units draw into an offscreen backing texture sized by the surface
/// manager. Submitting a [`Frame`] composites that texture onto the window's
/// swap surface, stretched to the window's physical size.
#[derive(Clone)]
pub struct SurfaceContext {
    inner: Rc<RefCell<ContextState>>,
}

struct ContextState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    binding: Option<Binding>,
    pixel_size: PixelSize,
    pointer: PointerState,
    dropped_files: Vec<PathBuf>,
}

struct Binding {
    device: GpuDevice,
    config: wgpu::SurfaceConfiguration,
    view_format: wgpu::TextureFormat,
    compositor: Compositor,
    backing: Backing,
}

struct Backing {
    size: PixelSize,
    format: wgpu::TextureFormat,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

impl Backing {
    fn new(
        device: &GpuDevice,
        compositor: &Compositor,
        size: PixelSize,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("canvas backing"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = compositor.bind(device.device(), &view);
        Self {
            size,
            format,
            _texture: texture,
            view,
            bind_group,
        }
    }
}

/// One frame's worth of recording state.
pub struct Frame {
    context: SurfaceContext,
    size: PixelSize,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl Frame {
    /// Backing buffer size in pixels.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Submits recorded work and presents the backing buffer.
    ///
    /// The recorded commands are submitted even when the swap surface cannot
    /// be acquired, so compute state stays consistent with the caller's view.
    pub fn submit(self) -> Result<(), RenderError> {
        self.context.present(self.encoder)
    }
}

impl SurfaceContext {
    pub(crate) fn new(window: Arc<Window>, surface: wgpu::Surface<'static>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ContextState {
                window,
                surface,
                binding: None,
                pixel_size: PixelSize::default(),
                pointer: PointerState::default(),
                dropped_files: Vec::new(),
            })),
        }
    }

    pub fn pixel_size(&self) -> PixelSize {
        self.inner.borrow().pixel_size
    }

    pub(crate) fn set_pixel_size(&self, size: PixelSize) {
        self.inner.borrow_mut().pixel_size = size;
    }

    pub fn is_configured(&self) -> bool {
        self.inner.borrow().binding.is_some()
    }

    /// Pointer position in backing pixels, if the cursor is over the window.
    pub fn pointer(&self) -> Option<[f32; 2]> {
        let state = self.inner.borrow();
        let position = state.pointer.position()?;
        let window = state.window.inner_size();
        if window.width == 0 || window.height == 0 {
            return None;
        }
        let size = state.pixel_size;
        let point = [
            (position.x * f64::from(size.width) / f64::from(window.width)) as f32,
            (position.y * f64::from(size.height) / f64::from(window.height)) as f32,
        ];
        Some(point)
    }

    pub fn pointer_pressed(&self) -> bool {
        self.inner.borrow().pointer.is_pressed()
    }

    pub(crate) fn with_pointer<R>(&self, f: impl FnOnce(&mut PointerState) -> R) -> R {
        let mut state = self.inner.borrow_mut();
        f(&mut state.pointer)
    }

    pub(crate) fn push_dropped_file(&self, path: PathBuf) {
        self.inner.borrow_mut().dropped_files.push(path);
    }

    /// Files dropped onto the window since the last call.
    pub fn take_dropped_files(&self) -> Vec<PathBuf> {
        std::mem::take(&mut self.inner.borrow_mut().dropped_files)
    }

    pub fn begin_frame(&self) -> Result<Frame, RenderError> {
        let state = self.inner.borrow();
        let binding = state.binding.as_ref().ok_or(RenderError::Unconfigured)?;
        let encoder = binding
            .device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("canvas frame"),
            });
        let frame = Frame {
            context: self.clone(),
            size: binding.backing.size,
            view: binding.backing.view.clone(),
            encoder,
        };
        Ok(frame)
    }

    pub(crate) fn configure(
        &self,
        device: &GpuDevice,
        format: wgpu::TextureFormat,
        alpha: AlphaMode,
    ) -> Result<(), RenderError> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;

        let caps = state.surface.get_capabilities(device.adapter());
        if caps.formats.is_empty() {
            return Err(RenderError::Allocation(
                "window surface is not compatible with the selected adapter".to_string(),
            ));
        }

        let max_dimension = device.device().limits().max_texture_dimension_2d;
        let size = state.pixel_size;
        if size.width > max_dimension || size.height > max_dimension {
            return Err(RenderError::Allocation(format!(
                "GPU max texture dimension is {max_dimension}, requested backing is {size}"
            )));
        }

        let surface_format = choose_surface_format(&caps.formats);
        let view_format = surface_format.remove_srgb_suffix();
        let window_size = clamp_size(state.window.inner_size(), max_dimension);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: window_size.width,
            height: window_size.height,
            present_mode: choose_present_mode(&caps.present_modes),
            alpha_mode: choose_alpha_mode(&caps.alpha_modes, alpha),
            view_formats: if view_format == surface_format {
                Vec::new()
            } else {
                vec![view_format]
            },
            desired_maximum_frame_latency: 2,
        };
        state.surface.configure(device.device(), &config);

        let (compositor, backing) = match state.binding.take() {
            Some(previous)
                if previous.device.is_same(device) && previous.compositor.format() == view_format =>
            {
                let backing = if previous.backing.size == size && previous.backing.format == format {
                    previous.backing
                } else {
                    Backing::new(device, &previous.compositor, size, format)
                };
                (previous.compositor, backing)
            }
            _ => {
                let compositor = Compositor::new(device.device(), view_format);
                let backing = Backing::new(device, &compositor, size, format);
                (compositor, backing)
            }
        };

        tracing::debug!(
            backing = %size,
            surface = ?config.format,
            width = config.width,
            height = config.height,
            present_mode = ?config.present_mode,
            "configured canvas surface"
        );
        state.binding = Some(Binding {
            device: device.clone(),
            config,
            view_format,
            compositor,
            backing,
        });
        Ok(())
    }

    pub(crate) fn unconfigure(&self) {
        if self.inner.borrow_mut().binding.take().is_some() {
            tracing::debug!("released canvas surface");
        }
    }

    fn present(&self, mut encoder: wgpu::CommandEncoder) -> Result<(), RenderError> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        let Some(binding) = state.binding.as_mut() else {
            return Err(RenderError::Unconfigured);
        };

        let window_size = state.window.inner_size();
        if window_size.width > 0
            && window_size.height > 0
            && (window_size.width, window_size.height)
                != (binding.config.width, binding.config.height)
        {
            let max_dimension = binding.device.device().limits().max_texture_dimension_2d;
            let size = clamp_size(window_size, max_dimension);
            binding.config.width = size.width;
            binding.config.height = size.height;
            state.surface.configure(binding.device.device(), &binding.config);
        }

        match state.surface.get_current_texture() {
            Ok(surface_texture) => {
                let target = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor {
                    format: Some(binding.view_format),
                    ..Default::default()
                });
                binding
                    .compositor
                    .draw(&mut encoder, &binding.backing.bind_group, &target);
                binding.device.queue().submit(std::iter::once(encoder.finish()));
                state.window.pre_present_notify();
                surface_texture.present();
                Ok(())
            }
            Err(err) => {
                binding.device.queue().submit(std::iter::once(encoder.finish()));
                Err(RenderError::Surface(SurfaceFault::from(err)))
            }
        }
    }
}

fn clamp_size(size: PhysicalSize<u32>, max_dimension: u32) -> PhysicalSize<u32> {
    PhysicalSize::new(
        size.width.clamp(1, max_dimension),
        size.height.clamp(1, max_dimension),
    )
}

/// Demo shaders write display-encoded values, so a non-sRGB swap format is
/// preferred. sRGB-only surfaces are drawn through a non-sRGB view.
fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> wgpu::TextureFormat {
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .unwrap_or_else(|| {
            let fallback = formats[0];
            tracing::debug!(?fallback, "no non-sRGB surface format; using an sRGB view override");
            fallback
        })
}

fn choose_present_mode(modes: &[wgpu::PresentMode]) -> wgpu::PresentMode {
    modes
        .iter()
        .copied()
        .find(|mode| *mode == wgpu::PresentMode::Fifo)
        .or_else(|| modes.first().copied())
        .unwrap_or(wgpu::PresentMode::Fifo)
}

fn choose_alpha_mode(
    modes: &[wgpu::CompositeAlphaMode],
    requested: AlphaMode,
) -> wgpu::CompositeAlphaMode {
    let wanted = match requested {
        AlphaMode::Opaque => wgpu::CompositeAlphaMode::Opaque,
        AlphaMode::Premultiplied => wgpu::CompositeAlphaMode::PreMultiplied,
    };
    if modes.contains(&wanted) {
        return wanted;
    }
    if modes.contains(&wgpu::CompositeAlphaMode::Auto) {
        return wgpu::CompositeAlphaMode::Auto;
    }
    modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_non_srgb_surface_formats() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            choose_surface_format(&formats),
            wgpu::TextureFormat::Bgra8Unorm
        );
        assert_eq!(
            choose_surface_format(&[wgpu::TextureFormat::Rgba8UnormSrgb]),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }

    #[test]
    fn present_mode_falls_back_to_first_reported() {
        assert_eq!(
            choose_present_mode(&[wgpu::PresentMode::Mailbox, wgpu::PresentMode::Fifo]),
            wgpu::PresentMode::Fifo
        );
        assert_eq!(
            choose_present_mode(&[wgpu::PresentMode::Immediate]),
            wgpu::PresentMode::Immediate
        );
        assert_eq!(choose_present_mode(&[]), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn alpha_mode_honours_request_when_available() {
        let modes = [
            wgpu::CompositeAlphaMode::Opaque,
            wgpu::CompositeAlphaMode::PreMultiplied,
        ];
        assert_eq!(
            choose_alpha_mode(&modes, AlphaMode::Premultiplied),
            wgpu::CompositeAlphaMode::PreMultiplied
        );
        assert_eq!(
            choose_alpha_mode(&[wgpu::CompositeAlphaMode::Inherit], AlphaMode::Opaque),
            wgpu::CompositeAlphaMode::Inherit
        );
    }

    #[test]
    fn clamps_window_sizes_into_texture_limits() {
        let size = clamp_size(PhysicalSize::new(0, 9000), 8192);
        assert_eq!((size.width, size.height), (1, 8192));
    }
}
