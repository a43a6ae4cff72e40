use renderer::gpu::{GpuDevice, SurfaceContext};
use renderer::{RenderError, RenderUnit};

use crate::common::{self, PipelineDesc, DARK_SLATE};

const SHADER: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs(@builtin(vertex_index) vid: u32, @location(0) ang: f32) -> VsOut {
    var corners = array<vec2<f32>, 3>(vec2(0.0, 0.6), vec2(-0.52, -0.3), vec2(0.52, -0.3));
    var colors = array<vec3<f32>, 3>(vec3(1.0, 0.3, 0.3), vec3(0.3, 1.0, 0.5), vec3(0.3, 0.6, 1.0));
    let c = cos(ang);
    let s = sin(ang);
    let v = corners[vid];
    var out: VsOut;
    out.pos = vec4<f32>(c * v.x - s * v.y, s * v.x + c * v.y, 0.0, 1.0);
    out.color = colors[vid];
    return out;
}

@fragment
fn fs(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;

/// Three vertex-coloured corners rotating about the origin. The angle is fed
/// per vertex through a tiny vertex buffer rewritten every tick.
pub struct RotatingTriangle {
    gpu: GpuDevice,
    context: SurfaceContext,
    pipeline: wgpu::RenderPipeline,
    angles: wgpu::Buffer,
    time: f32,
}

impl RotatingTriangle {
    pub fn new(
        gpu: &GpuDevice,
        context: &SurfaceContext,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let device = gpu.device();
        let (pipeline, angles) = common::validated(device, "rotating-triangle", || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("rotating triangle shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER.into()),
            });
            let angles = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("rotating triangle angles"),
                size: (3 * std::mem::size_of::<f32>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let pipeline = common::render_pipeline(
                device,
                PipelineDesc {
                    label: "rotating triangle pipeline",
                    module: &module,
                    vertex_entry: "vs",
                    fragment_entry: "fs",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<f32>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32,
                            offset: 0,
                            shader_location: 0,
                        }],
                    }],
                    format,
                    blend: None,
                },
            );
            (pipeline, angles)
        })?;

        Ok(Self {
            gpu: gpu.clone(),
            context: context.clone(),
            pipeline,
            angles,
            time: 0.0,
        })
    }
}

impl RenderUnit for RotatingTriangle {
    fn tick(&mut self, delta_seconds: f32) -> Result<(), RenderError> {
        self.time += delta_seconds;
        let t = self.time;
        self.gpu
            .queue()
            .write_buffer(&self.angles, 0, bytemuck::cast_slice(&[t, t, t]));

        let mut frame = self.context.begin_frame()?;
        {
            let mut pass = common::clear_pass(
                &mut frame.encoder,
                &frame.view,
                "rotating triangle pass",
                DARK_SLATE,
            );
            pass.set_pipeline(&self.pipeline);
            pass.set_vertex_buffer(0, self.angles.slice(..));
            pass.draw(0..3, 0..1);
        }
        frame.submit()
    }

    fn dispose(&mut self) {
        self.angles.destroy();
    }
}
