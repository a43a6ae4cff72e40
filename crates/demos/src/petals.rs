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
};
@group(0) @binding(0) var<uniform> params: Params;

fn rot(a: f32) -> mat2x2<f32> {
    let c = cos(a);
    let s = sin(a);
    return mat2x2<f32>(vec2<f32>(c, -s), vec2<f32>(s, c));
}

@fragment
fn fs(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let res = vec2<f32>(params.width, params.height);
    var p = (pos.xy / res) * 2.0 - vec2<f32>(1.0, 1.0);

    p = rot(params.time * 0.5) * p;
    let ang = atan2(p.y, p.x);
    let rad = length(p);

    let v = 0.5 + 0.5 * cos(ang * 32.0);
    let col = vec3<f32>(v, 1.0 - v, 0.5 + 0.5 * sin(params.time + rad * 10.0));
    return vec4<f32>(col * (1.0 - rad), 1.0);
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct PetalParams {
    time: f32,
    width: f32,
    height: f32,
    _pad: f32,
}

/// Polar petals rotating about the canvas centre.
pub struct Petals {
    gpu: GpuDevice,
    context: SurfaceContext,
    pass: FullscreenPass,
    time: f32,
}

impl Petals {
    pub fn new(
        gpu: &GpuDevice,
        context: &SurfaceContext,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let pass = FullscreenPass::new(
            gpu.device(),
            "petals",
            FRAGMENT,
            std::mem::size_of::<PetalParams>() as u64,
            format,
        )?;
        Ok(Self {
            gpu: gpu.clone(),
            context: context.clone(),
            pass,
            time: 0.0,
        })
    }
}

impl RenderUnit for Petals {
    fn tick(&mut self, delta_seconds: f32) -> Result<(), RenderError> {
        self.time += delta_seconds;
        let mut frame = self.context.begin_frame()?;
        let size = frame.size();
        let params = PetalParams {
            time: self.time,
            width: size.width as f32,
            height: size.height as f32,
            _pad: 0.0,
        };
        self.gpu
            .queue()
            .write_buffer(self.pass.uniform(), 0, bytemuck::bytes_of(&params));
        {
            let mut pass =
                common::clear_pass(&mut frame.encoder, &frame.view, "petals pass", CHARCOAL);
            self.pass.draw(&mut pass);
        }
        frame.submit()
    }

    fn dispose(&mut self) {
        self.pass.destroy();
    }
}
