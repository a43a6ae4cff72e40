use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::window::Window;

use crate::device::{GpuBackend, LossNotifier};
use crate::error::CapabilityError;
use crate::pending::Pending;

use super::context::SurfaceContext;

/// Adapter selection knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// The negotiated adapter, device and queue, shared by every canvas.
#[derive(Clone)]
pub struct GpuDevice {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
}

impl GpuDevice {
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.inner.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.inner.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.inner.queue
    }

    pub fn info(&self) -> &wgpu::AdapterInfo {
        &self.inner.info
    }

    pub fn is_same(&self, other: &GpuDevice) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuDevice")
            .field("name", &self.inner.info.name)
            .field("backend", &self.inner.info.backend)
            .field("device_type", &self.inner.info.device_type)
            .finish()
    }
}

/// `wgpu` implementation of [`GpuBackend`].
pub struct WgpuBackend {
    instance: Arc<wgpu::Instance>,
    options: BackendOptions,
}

impl WgpuBackend {
    pub fn new(options: BackendOptions) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });
        Self {
            instance: Arc::new(instance),
            options,
        }
    }

    pub fn options(&self) -> BackendOptions {
        self.options
    }

    pub fn create_surface(&self, window: Arc<Window>) -> Result<wgpu::Surface<'static>> {
        self.instance
            .create_surface(window)
            .context("failed to create rendering surface")
    }
}

impl GpuBackend for WgpuBackend {
    type Device = GpuDevice;
    type Format = wgpu::TextureFormat;
    type Context = SurfaceContext;

    fn is_supported(&self) -> bool {
        !self.options.backends.is_empty()
    }

    fn request_device(&self, loss: LossNotifier) -> Pending<Result<GpuDevice, CapabilityError>> {
        let instance = self.instance.clone();
        let options = self.options;
        Pending::spawn("gpu-device", move || negotiate(&instance, options, loss))
    }

    fn preferred_format(&self) -> wgpu::TextureFormat {
        if cfg!(target_os = "android") {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Bgra8Unorm
        }
    }
}

fn negotiate(
    instance: &wgpu::Instance,
    options: BackendOptions,
    loss: LossNotifier,
) -> Result<GpuDevice, CapabilityError> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: options.power_preference,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_err(|err| {
        tracing::debug!(%err, "adapter request failed");
        CapabilityError::NoAdapter
    })?;

    let info = adapter.get_info();
    tracing::info!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("gallery device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .map_err(|err| CapabilityError::DeviceRequest(err.to_string()))?;

    let device_id = loss.device_id();
    device.set_device_lost_callback(move |reason, message| {
        loss.notify(format!("{reason:?}: {message}"));
    });
    tracing::debug!(device = %device_id, "GPU device created");

    Ok(GpuDevice {
        inner: Arc::new(DeviceInner {
            adapter,
            device,
            queue,
            info,
        }),
    })
}
