//! Image hue shift. Files dropped onto the window are decoded on a worker
//! thread and swapped in once ready; until then a white texel is sampled.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use bytemuck::{Pod, Zeroable};
use renderer::gpu::{GpuDevice, SurfaceContext};
use renderer::{Pending, PendingPoll, RenderError, RenderUnit};
use wgpu::util::DeviceExt;

use crate::common::{self, PipelineDesc, CHARCOAL, FULLSCREEN_VS};

const FRAGMENT: &str = r#"
struct Params {
    width: f32,
    height: f32,
    _pad: vec2<f32>,
    mouse: vec2<f32>,
    _pad2: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var samp: sampler;

fn to_srgb(linear: vec3<f32>) -> vec3<f32> {
    return pow(linear, vec3<f32>(1.0 / 2.2));
}

fn rgb2hsv(c: vec3<f32>) -> vec3<f32> {
    let K = vec4<f32>(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    let p = mix(vec4<f32>(c.bg, K.wz), vec4<f32>(c.gb, K.xy), step(c.b, c.g));
    let q = mix(vec4<f32>(p.xyw, c.r), vec4<f32>(c.r, p.yzx), step(p.x, c.r));
    let d = q.x - min(q.w, q.y);
    let e = 1.0e-10;
    return vec3<f32>(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

fn hsv2rgb(c: vec3<f32>) -> vec3<f32> {
    let K = vec4<f32>(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    let p = abs(fract(vec3<f32>(c.x) + vec3<f32>(K.y, K.z, 0.0)) * 6.0 - vec3<f32>(K.w));
    return c.z * mix(vec3<f32>(K.x), clamp(p - vec3<f32>(K.x), vec3<f32>(0.0), vec3<f32>(1.0)), c.y);
}

@fragment
fn fs(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let res = vec2<f32>(params.width, params.height);
    let uv = pos.xy / res;

    var hsv = rgb2hsv(to_srgb(textureSample(tex, samp, uv).rgb));

    // Hue rotates by up to 0.2 turns within 0.25 of the pointer.
    let d = distance(uv, params.mouse / res);
    let w = 1.0 - smoothstep(0.07, 0.25, d);
    hsv.x = fract(hsv.x + 0.2 * w);

    return vec4<f32>(hsv2rgb(hsv), 1.0);
}
"#;

const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct TextureParams {
    width: f32,
    height: f32,
    _pad: [f32; 2],
    mouse: [f32; 2],
    _pad2: [f32; 2],
}

/// Decoded RGBA8 pixels ready for upload.
pub(crate) struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub(crate) fn decode_image(path: &Path) -> anyhow::Result<DecodedImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(DecodedImage {
        width,
        height,
        pixels: image.into_raw(),
    })
}

/// The most recent drop wins; earlier files from the same drop are ignored.
pub(crate) fn pick_dropped(files: Vec<PathBuf>) -> Option<PathBuf> {
    files.into_iter().last()
}

struct LoadedImage {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

pub struct TextureHueShift {
    gpu: GpuDevice,
    context: SurfaceContext,
    pipeline: wgpu::RenderPipeline,
    uniform: wgpu::Buffer,
    sampler: wgpu::Sampler,
    image: LoadedImage,
    decoding: Option<(PathBuf, Pending<anyhow::Result<DecodedImage>>)>,
    mouse: [f32; 2],
}

impl TextureHueShift {
    pub fn new(
        gpu: &GpuDevice,
        context: &SurfaceContext,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let device = gpu.device();
        let (pipeline, uniform, sampler) = common::validated(device, "texture", || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("texture hue shift shader"),
                source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_VS}{FRAGMENT}").into()),
            });
            let pipeline = common::render_pipeline(
                device,
                PipelineDesc {
                    label: "texture hue shift pipeline",
                    module: &module,
                    vertex_entry: "vs",
                    fragment_entry: "fs",
                    buffers: &[],
                    format,
                    blend: None,
                },
            );
            let uniform = common::uniform_buffer(
                device,
                "texture hue shift params",
                std::mem::size_of::<TextureParams>() as u64,
            );
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("texture hue shift sampler"),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            });
            (pipeline, uniform, sampler)
        })?;

        let white = DecodedImage {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        };
        let image = upload(gpu, &pipeline, &uniform, &sampler, &white);
        Ok(Self {
            gpu: gpu.clone(),
            context: context.clone(),
            pipeline,
            uniform,
            sampler,
            image,
            decoding: None,
            mouse: [0.0, 0.0],
        })
    }

    fn poll_drops(&mut self) {
        if let Some(path) = pick_dropped(self.context.take_dropped_files()) {
            tracing::info!(path = %path.display(), "decoding dropped image");
            let job_path = path.clone();
            let pending = Pending::spawn("texture-decode", move || decode_image(&job_path));
            self.decoding = Some((path, pending));
        }

        let Some((path, pending)) = self.decoding.as_mut() else {
            return;
        };
        let decoded = match pending.poll() {
            PendingPoll::Waiting => return,
            PendingPoll::Ready(Ok(decoded)) => decoded,
            PendingPoll::Ready(Err(err)) => {
                tracing::warn!(error = %format!("{err:#}"), "ignoring dropped file");
                self.decoding = None;
                return;
            }
            PendingPoll::Closed => {
                tracing::warn!(path = %path.display(), "image decoder went away");
                self.decoding = None;
                return;
            }
        };
        self.decoding = None;

        let limit = self.gpu.device().limits().max_texture_dimension_2d;
        if decoded.width == 0 || decoded.height == 0 || decoded.width > limit || decoded.height > limit {
            tracing::warn!(
                width = decoded.width,
                height = decoded.height,
                limit,
                "dropped image does not fit in a texture"
            );
            return;
        }

        let loaded = upload(&self.gpu, &self.pipeline, &self.uniform, &self.sampler, &decoded);
        let previous = std::mem::replace(&mut self.image, loaded);
        previous.texture.destroy();
        tracing::debug!(
            width = decoded.width,
            height = decoded.height,
            "dropped image uploaded"
        );
    }
}

fn upload(
    gpu: &GpuDevice,
    pipeline: &wgpu::RenderPipeline,
    uniform: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    image: &DecodedImage,
) -> LoadedImage {
    let device = gpu.device();
    let texture = device.create_texture_with_data(
        gpu.queue(),
        &wgpu::TextureDescriptor {
            label: Some("texture hue shift image"),
            size: wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &image.pixels,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("texture hue shift bind group"),
        layout: &pipeline.get_bind_group_layout(0),
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    LoadedImage {
        texture,
        bind_group,
    }
}

impl RenderUnit for TextureHueShift {
    fn tick(&mut self, _delta_seconds: f32) -> Result<(), RenderError> {
        self.poll_drops();
        if let Some(pointer) = self.context.pointer() {
            self.mouse = pointer;
        }

        let mut frame = self.context.begin_frame()?;
        let size = frame.size();
        let params = TextureParams {
            width: size.width as f32,
            height: size.height as f32,
            _pad: [0.0; 2],
            mouse: self.mouse,
            _pad2: [0.0; 2],
        };
        self.gpu
            .queue()
            .write_buffer(&self.uniform, 0, bytemuck::bytes_of(&params));
        {
            let mut pass =
                common::clear_pass(&mut frame.encoder, &frame.view, "texture hue shift pass", CHARCOAL);
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.image.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        frame.submit()
    }

    fn dispose(&mut self) {
        self.decoding = None;
        self.image.texture.destroy();
        self.uniform.destroy();
    }
}
