//! The gallery's built-in render units.
//!
//! Every demo draws into the canvas backing buffer handed out by
//! [`SurfaceContext::begin_frame`] and submits exactly one frame per tick.
//! Creation happens synchronously on the event loop thread; pipeline and
//! shader validation errors are caught and reported as
//! [`RenderError::Allocation`] rather than aborting the process.

mod clear;
mod common;
mod fullscreen;
mod mouse_ring;
mod particles;
mod petals;
mod texture;
mod triangle;

use std::fmt;

use renderer::gpu::{GpuDevice, SurfaceContext, WgpuBackend};
use renderer::{Pending, RenderError, RenderUnit, RenderUnitFactory, RenderUnitRegistry, UnitResult};

pub use clear::{clear_color, ClearColors};
pub use mouse_ring::MouseRing;
pub use particles::{FreeFallParticles, PARTICLE_COUNT};
pub use petals::Petals;
pub use texture::TextureHueShift;
pub use triangle::RotatingTriangle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoKind {
    RotatingTriangle,
    ClearColors,
    ComputeParticles,
    Petals,
    MouseRing,
    Texture,
}

impl DemoKind {
    pub const ALL: [DemoKind; 6] = [
        DemoKind::RotatingTriangle,
        DemoKind::ClearColors,
        DemoKind::ComputeParticles,
        DemoKind::Petals,
        DemoKind::MouseRing,
        DemoKind::Texture,
    ];

    /// Fallback for ids nothing else claims.
    pub const DEFAULT: DemoKind = DemoKind::RotatingTriangle;

    pub fn id(self) -> &'static str {
        match self {
            DemoKind::RotatingTriangle => "rotating-triangle",
            DemoKind::ClearColors => "clear-colors",
            DemoKind::ComputeParticles => "compute-particles-free-fall",
            DemoKind::Petals => "demo",
            DemoKind::MouseRing => "input-mouse",
            DemoKind::Texture => "texture",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    fn build(
        self,
        device: &GpuDevice,
        context: &SurfaceContext,
        format: wgpu::TextureFormat,
    ) -> Result<Box<dyn RenderUnit>, RenderError> {
        let unit: Box<dyn RenderUnit> = match self {
            DemoKind::RotatingTriangle => Box::new(RotatingTriangle::new(device, context, format)?),
            DemoKind::ClearColors => Box::new(ClearColors::new(context)),
            DemoKind::ComputeParticles => {
                Box::new(FreeFallParticles::new(device, context, format)?)
            }
            DemoKind::Petals => Box::new(Petals::new(device, context, format)?),
            DemoKind::MouseRing => Box::new(MouseRing::new(device, context, format)?),
            DemoKind::Texture => Box::new(TextureHueShift::new(device, context, format)?),
        };
        Ok(unit)
    }
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Registry entry for one [`DemoKind`].
#[derive(Debug, Clone, Copy)]
pub struct DemoFactory(pub DemoKind);

impl RenderUnitFactory<WgpuBackend> for DemoFactory {
    fn create(
        &self,
        device: &GpuDevice,
        context: &SurfaceContext,
        format: wgpu::TextureFormat,
    ) -> Pending<UnitResult> {
        let kind = self.0;
        let result = kind.build(device, context, format);
        match &result {
            Ok(_) => tracing::debug!(demo = %kind, ?format, "render unit created"),
            Err(err) => tracing::warn!(demo = %kind, %err, "render unit creation failed"),
        }
        Pending::ready(result)
    }
}

/// Registry holding every built-in demo, falling back to
/// [`DemoKind::DEFAULT`].
pub fn registry() -> RenderUnitRegistry<WgpuBackend> {
    let mut registry = RenderUnitRegistry::new(DemoKind::DEFAULT.id(), DemoFactory(DemoKind::DEFAULT));
    for kind in DemoKind::ALL {
        if kind != DemoKind::DEFAULT {
            registry.register(kind.id(), DemoFactory(kind));
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_round_trip() {
        for kind in DemoKind::ALL {
            assert_eq!(DemoKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(DemoKind::from_id("nope"), None);
        let ids: HashSet<_> = DemoKind::ALL.iter().map(|kind| kind.id()).collect();
        assert_eq!(ids.len(), DemoKind::ALL.len());
    }

    #[test]
    fn every_catalog_entry_has_a_unit() {
        for demo in catalog::builtin_demos() {
            assert!(
                DemoKind::from_id(&demo.id).is_some(),
                "{} has no render unit",
                demo.id
            );
        }
        assert_eq!(DemoKind::DEFAULT.id(), catalog::DEFAULT_DEMO_ID);
    }

    #[test]
    fn registry_resolves_unknown_ids_to_default() {
        let registry = registry();
        assert_eq!(registry.ids().count(), DemoKind::ALL.len());
        assert_eq!(registry.default_id(), "rotating-triangle");
        assert_eq!(registry.resolve_id("input-mouse"), "input-mouse");
        assert_eq!(registry.resolve_id("missing"), "rotating-triangle");
    }
}
