//! Free-fall particles: a compute pass integrates gravity and wall bounces,
//! then the same storage buffer feeds an instanced quad draw.
//!
//! State lives in two storage buffers used ping-pong style. Each tick reads
//! one and writes the other, then draws from the one just written.

use bytemuck::{Pod, Zeroable};
use rand::Rng;
use renderer::gpu::{GpuDevice, SurfaceContext};
use renderer::{RenderError, RenderUnit};
use wgpu::util::DeviceExt;

use crate::common::{self, PipelineDesc, DARK_SLATE};

pub const PARTICLE_COUNT: u32 = 4096;
const WORKGROUP_SIZE: u32 = 256;
const RADIUS: f32 = 0.0125;
const GRAVITY: f32 = 0.6;

const PARTICLE_STRUCTS: &str = r#"
struct Particle { pos: vec2<f32>, vel: vec2<f32> };
struct Particles { p: array<Particle> };

struct Sim {
    dt: f32,
    aspect: f32,
    gravity: f32,
    radius: f32,
    count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};
"#;

const COMPUTE_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> particles_in: Particles;
@group(0) @binding(1) var<storage, read_write> particles_out: Particles;
@group(0) @binding(2) var<uniform> sim: Sim;

@compute @workgroup_size(256)
fn cs(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= sim.count) {
        return;
    }

    var p = particles_in.p[i];
    p.vel.y = p.vel.y - sim.gravity * sim.dt;
    p.pos = p.pos + p.vel * sim.dt;

    let max_x = 1.0 - sim.radius;
    let max_y = 1.0 - sim.radius;

    if (p.pos.x < -max_x) { p.pos.x = -max_x; p.vel.x = abs(p.vel.x) * 0.9; }
    if (p.pos.x > max_x) { p.pos.x = max_x; p.vel.x = -abs(p.vel.x) * 0.9; }
    if (p.pos.y < -max_y) { p.pos.y = -max_y; p.vel.y = abs(p.vel.y) * 0.6; }
    if (p.pos.y > max_y) { p.pos.y = max_y; p.vel.y = -abs(p.vel.y) * 0.6; }

    particles_out.p[i] = p;
}
"#;

const RENDER_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> particles: Particles;
@group(0) @binding(1) var<uniform> sim: Sim;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs(@location(0) v: vec2<f32>, @builtin(instance_index) iid: u32) -> VsOut {
    let center = particles.p[iid].pos;
    let offset = vec2<f32>(v.x * sim.radius / sim.aspect, v.y * sim.radius);
    var out: VsOut;
    out.pos = vec4<f32>(center + offset, 0.0, 1.0);
    out.uv = v;
    return out;
}

@fragment
fn fs(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let alpha = 1.0 - smoothstep(0.8, 1.0, length(uv));
    return vec4<f32>(0.3, 0.7, 1.0, alpha);
}
"#;

const QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [1.0, 1.0],
];

/// Uniform block shared by the compute and render stages.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct SimUniform {
    dt: f32,
    aspect: f32,
    gravity: f32,
    radius: f32,
    count: u32,
    _pad: [u32; 3],
}

impl SimUniform {
    fn new(dt: f32, aspect: f32) -> Self {
        Self {
            dt,
            aspect,
            gravity: GRAVITY,
            radius: RADIUS,
            count: PARTICLE_COUNT,
            _pad: [0; 3],
        }
    }
}

/// Initial state: `[x, y, vx, vy]` per particle, scattered across the upper
/// part of clip space with a slight rightward drift.
pub(crate) fn spawn_particles(rng: &mut impl Rng, count: u32) -> Vec<[f32; 4]> {
    (0..count)
        .map(|_| {
            [
                rng.gen_range(-0.8..0.8),
                rng.gen_range(0.2..1.0),
                rng.gen_range(-0.3..0.5),
                rng.gen_range(-0.05..0.05),
            ]
        })
        .collect()
}

fn workgroups(count: u32) -> u32 {
    count.div_ceil(WORKGROUP_SIZE)
}

pub struct FreeFallParticles {
    gpu: GpuDevice,
    context: SurfaceContext,
    compute: wgpu::ComputePipeline,
    render: wgpu::RenderPipeline,
    buffers: [wgpu::Buffer; 2],
    quad: wgpu::Buffer,
    sim: wgpu::Buffer,
    /// `step[i]` reads buffer `i` and writes the other one.
    step: [wgpu::BindGroup; 2],
    /// `draw[i]` reads buffer `i`.
    draw: [wgpu::BindGroup; 2],
    read_from: usize,
}

impl FreeFallParticles {
    pub fn new(
        gpu: &GpuDevice,
        context: &SurfaceContext,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let device = gpu.device();
        let initial = spawn_particles(&mut rand::thread_rng(), PARTICLE_COUNT);

        let unit = common::validated(device, "compute-particles-free-fall", || {
            let storage = |label: &str| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(&initial),
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                })
            };
            let buffers = [storage("particles a"), storage("particles b")];
            let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("particle quad"),
                contents: bytemuck::cast_slice(&QUAD),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let sim = common::uniform_buffer(
                device,
                "particle sim uniform",
                std::mem::size_of::<SimUniform>() as u64,
            );

            let compute_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("particle compute shader"),
                source: wgpu::ShaderSource::Wgsl(format!("{PARTICLE_STRUCTS}{COMPUTE_BODY}").into()),
            });
            let compute = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("particle compute pipeline"),
                layout: None,
                module: &compute_module,
                entry_point: Some("cs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

            let render_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("particle render shader"),
                source: wgpu::ShaderSource::Wgsl(format!("{PARTICLE_STRUCTS}{RENDER_BODY}").into()),
            });
            let render = common::render_pipeline(
                device,
                PipelineDesc {
                    label: "particle render pipeline",
                    module: &render_module,
                    vertex_entry: "vs",
                    fragment_entry: "fs",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                    }],
                    format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                },
            );

            let step_layout = compute.get_bind_group_layout(0);
            let step_group = |input: &wgpu::Buffer, output: &wgpu::Buffer| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("particle step bind group"),
                    layout: &step_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: input.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: output.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: sim.as_entire_binding(),
                        },
                    ],
                })
            };
            let step = [
                step_group(&buffers[0], &buffers[1]),
                step_group(&buffers[1], &buffers[0]),
            ];

            let draw_layout = render.get_bind_group_layout(0);
            let draw_group = |input: &wgpu::Buffer| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("particle draw bind group"),
                    layout: &draw_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: input.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: sim.as_entire_binding(),
                        },
                    ],
                })
            };
            let draw = [draw_group(&buffers[0]), draw_group(&buffers[1])];

            Self {
                gpu: gpu.clone(),
                context: context.clone(),
                compute,
                render,
                buffers,
                quad,
                sim,
                step,
                draw,
                read_from: 0,
            }
        })?;

        tracing::debug!(particles = PARTICLE_COUNT, "particle buffers allocated");
        Ok(unit)
    }
}

impl RenderUnit for FreeFallParticles {
    fn tick(&mut self, delta_seconds: f32) -> Result<(), RenderError> {
        let mut frame = self.context.begin_frame()?;
        let uniform = SimUniform::new(delta_seconds, frame.size().aspect());
        self.gpu
            .queue()
            .write_buffer(&self.sim, 0, bytemuck::bytes_of(&uniform));

        let input = self.read_from;
        let output = 1 - input;
        {
            let mut pass = frame
                .encoder
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("particle step"),
                    timestamp_writes: None,
                });
            pass.set_pipeline(&self.compute);
            pass.set_bind_group(0, &self.step[input], &[]);
            pass.dispatch_workgroups(workgroups(PARTICLE_COUNT), 1, 1);
        }
        {
            let mut pass = common::clear_pass(
                &mut frame.encoder,
                &frame.view,
                "particle draw",
                DARK_SLATE,
            );
            pass.set_pipeline(&self.render);
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.set_bind_group(0, &self.draw[output], &[]);
            pass.draw(0..QUAD.len() as u32, 0..PARTICLE_COUNT);
        }
        self.read_from = output;
        frame.submit()
    }

    fn dispose(&mut self) {
        for buffer in &self.buffers {
            buffer.destroy();
        }
        self.quad.destroy();
        self.sim.destroy();
    }
}
