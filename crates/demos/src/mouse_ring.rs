use bytemuck::{Pod, Zeroable};
use renderer::gpu::{GpuDevice, SurfaceContext};
use renderer::{RenderError, RenderUnit};

use crate::common::{self, CHARCOAL};
use crate::fullscreen::FullscreenPass;

const FRAGMENT: &str = r#"
struct Params {
    time: f32,
    width: f32,
    height: f32,
    _pad: f32,
    mouse: vec2<f32>,
    _pad2: vec2<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let res = vec2<f32>(params.width, params.height);
    let uv = pos.xy / res;
    let m = params.mouse / res;
    let d = distance(uv, m);
    let ring = 1.0 - smoothstep(0.02, 0.03, abs(d - 0.2 + 0.05 * sin(params.time)));

    let base = vec3<f32>(0.1, 0.1, 0.12);
    let color = mix(base, vec3<f32>(0.9, 0.6, 0.2), ring);
    return vec4<f32>(color, 1.0);
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct RingParams {
    time: f32,
    width: f32,
    height: f32,
    _pad: f32,
    mouse: [f32; 2],
    _pad2: [f32; 2],
}

/// A pulsing ring centred on the last pointer position over the canvas.
pub struct MouseRing {
    gpu: GpuDevice,
    context: SurfaceContext,
    pass: FullscreenPass,
    time: f32,
    mouse: [f32; 2],
}

impl MouseRing {
    pub fn new(
        gpu: &GpuDevice,
        context: &SurfaceContext,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let pass = FullscreenPass::new(
            gpu.device(),
            "input-mouse",
            FRAGMENT,
            std::mem::size_of::<RingParams>() as u64,
            format,
        )?;
        Ok(Self {
            gpu: gpu.clone(),
            context: context.clone(),
            pass,
            time: 0.0,
            mouse: [0.0, 0.0],
        })
    }
}

impl RenderUnit for MouseRing {
    fn tick(&mut self, delta_seconds: f32) -> Result<(), RenderError> {
        self.time += delta_seconds;
        // The ring stays where the pointer last was once it leaves.
        if let Some(pointer) = self.context.pointer() {
            self.mouse = pointer;
        }

        let mut frame = self.context.begin_frame()?;
        let size = frame.size();
        let params = RingParams {
            time: self.time,
            width: size.width as f32,
            height: size.height as f32,
            _pad: 0.0,
            mouse: self.mouse,
            _pad2: [0.0; 2],
        };
        self.gpu
            .queue()
            .write_buffer(self.pass.uniform(), 0, bytemuck::bytes_of(&params));
        {
            let mut pass =
                common::clear_pass(&mut frame.encoder, &frame.view, "mouse ring pass", CHARCOAL);
            self.pass.draw(&mut pass);
        }
        frame.submit()
    }

    fn dispose(&mut self) {
        self.pass.destroy();
    }
}
