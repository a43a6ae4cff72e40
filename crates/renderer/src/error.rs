use thiserror::Error;

/// Why a GPU device could not be obtained.
///
/// Cloned into every canvas that was waiting on the same acquisition, so it
/// only carries strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("GPU rendering is not supported on this platform")]
    Unsupported,
    #[error("no GPU adapter available")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),
}

/// Swap surface failures surfaced while presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SurfaceFault {
    #[error("surface is outdated")]
    Outdated,
    #[error("surface was lost")]
    Lost,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("out of memory while acquiring the next surface texture")]
    OutOfMemory,
    #[error("surface reported an unspecified error")]
    Other,
}

impl From<wgpu::SurfaceError> for SurfaceFault {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Outdated => Self::Outdated,
            wgpu::SurfaceError::Lost => Self::Lost,
            wgpu::SurfaceError::Timeout => Self::Timeout,
            wgpu::SurfaceError::OutOfMemory => Self::OutOfMemory,
            _ => Self::Other,
        }
    }
}

/// Errors raised by render units, either while being created or per tick.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Surface(#[from] SurfaceFault),
    #[error("GPU device was lost")]
    DeviceLost,
    #[error("GPU resource allocation failed: {0}")]
    Allocation(String),
    #[error("canvas is not configured")]
    Unconfigured,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What the surface manager should do about a failed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDisposition {
    /// Reconfigure the canvas and keep driving.
    Reconfigure,
    /// Drop this frame and keep driving.
    SkipFrame,
    /// Stop driving this canvas.
    Fatal,
}

impl RenderError {
    pub fn disposition(&self) -> TickDisposition {
        match self {
            Self::Surface(SurfaceFault::Outdated | SurfaceFault::Lost) => {
                TickDisposition::Reconfigure
            }
            Self::Unconfigured => TickDisposition::Reconfigure,
            Self::Surface(SurfaceFault::Timeout | SurfaceFault::Other) => {
                TickDisposition::SkipFrame
            }
            Self::Surface(SurfaceFault::OutOfMemory)
            | Self::DeviceLost
            | Self::Allocation(_)
            | Self::Other(_) => TickDisposition::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_faults_map_to_dispositions() {
        assert_eq!(
            RenderError::from(SurfaceFault::Outdated).disposition(),
            TickDisposition::Reconfigure
        );
        assert_eq!(
            RenderError::from(SurfaceFault::Lost).disposition(),
            TickDisposition::Reconfigure
        );
        assert_eq!(
            RenderError::from(SurfaceFault::Timeout).disposition(),
            TickDisposition::SkipFrame
        );
        assert_eq!(
            RenderError::from(SurfaceFault::OutOfMemory).disposition(),
            TickDisposition::Fatal
        );
    }

    #[test]
    fn unit_failures_are_fatal() {
        assert_eq!(
            RenderError::Allocation("buffer".into()).disposition(),
            TickDisposition::Fatal
        );
        assert_eq!(
            RenderError::from(anyhow::anyhow!("boom")).disposition(),
            TickDisposition::Fatal
        );
    }

    #[test]
    fn wgpu_surface_errors_convert() {
        assert_eq!(
            SurfaceFault::from(wgpu::SurfaceError::Outdated),
            SurfaceFault::Outdated
        );
        assert_eq!(
            SurfaceFault::from(wgpu::SurfaceError::Timeout),
            SurfaceFault::Timeout
        );
    }
}
