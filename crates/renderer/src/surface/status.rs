use std::fmt;

use crate::error::CapabilityError;

/// Coarse lifecycle position of a surface manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Acquiring,
    /// Device bound and canvas configured; waiting on the render unit.
    Configuring,
    Running,
    Paused,
    Disposing,
    Error,
}

/// Short per-canvas status string shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Waiting,
    Unsupported,
    NoAdapter,
    Preview,
    Rendering,
    Paused,
    DeviceLost,
    Failed,
}

impl Status {
    pub fn is_rendering(&self) -> bool {
        matches!(self, Self::Preview | Self::Rendering)
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::Unsupported | Self::NoAdapter | Self::DeviceLost | Self::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "…",
            Self::Unsupported => "unsupported",
            Self::NoAdapter => "no adapter",
            Self::Preview => "preview",
            Self::Rendering => "rendering",
            Self::Paused => "paused",
            Self::DeviceLost => "device lost",
            Self::Failed => "failed",
        }
    }
}

impl From<&CapabilityError> for Status {
    fn from(err: &CapabilityError) -> Self {
        match err {
            CapabilityError::Unsupported => Self::Unsupported,
            CapabilityError::NoAdapter => Self::NoAdapter,
            CapabilityError::DeviceRequest(_) => Self::Failed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
