use renderer::RenderError;

use crate::common::{self, PipelineDesc, FULLSCREEN_VS};

/// A full-screen triangle whose fragment stage reads one uniform block at
/// `@group(0) @binding(0)`.
pub(crate) struct FullscreenPass {
    pipeline: wgpu::RenderPipeline,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl FullscreenPass {
    /// `fragment` is WGSL declaring the uniform and a `fs` entry point.
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        fragment: &str,
        uniform_size: u64,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        common::validated(device, label, || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_VS}{fragment}").into()),
            });
            let pipeline = common::render_pipeline(
                device,
                PipelineDesc {
                    label,
                    module: &module,
                    vertex_entry: "vs",
                    fragment_entry: "fs",
                    buffers: &[],
                    format,
                    blend: None,
                },
            );
            let uniform = common::uniform_buffer(device, label, uniform_size);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                }],
            });
            Self {
                pipeline,
                uniform,
                bind_group,
            }
        })
    }

    pub(crate) fn uniform(&self) -> &wgpu::Buffer {
        &self.uniform
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    pub(crate) fn destroy(&self) {
        self.uniform.destroy();
    }
}
