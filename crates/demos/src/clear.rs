use renderer::gpu::SurfaceContext;
use renderer::{RenderError, RenderUnit};

use crate::common;

/// Clear colour at `time` seconds: three sine waves with different rates and
/// phases so the hue keeps drifting.
pub fn clear_color(time: f64) -> wgpu::Color {
    wgpu::Color {
        r: 0.5 + 0.5 * (0.8 * time).sin(),
        g: 0.5 + 0.5 * (1.1 * time + 1.0).sin(),
        b: 0.5 + 0.5 * (1.4 * time + 2.0).sin(),
        a: 1.0,
    }
}

/// No pipeline at all; every tick is a single clearing pass.
pub struct ClearColors {
    context: SurfaceContext,
    time: f64,
}

impl ClearColors {
    pub fn new(context: &SurfaceContext) -> Self {
        Self {
            context: context.clone(),
            time: 0.0,
        }
    }
}

impl RenderUnit for ClearColors {
    fn tick(&mut self, delta_seconds: f32) -> Result<(), RenderError> {
        self.time += f64::from(delta_seconds);
        let mut frame = self.context.begin_frame()?;
        {
            let _pass = common::clear_pass(
                &mut frame.encoder,
                &frame.view,
                "clear colors pass",
                clear_color(self.time),
            );
        }
        frame.submit()
    }
}
