use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::config::BlendPolicy;
use crate::error::FlockingError;
use crate::gpu::GpuContext;
use crate::rendering::transfer::RenderBuffers;

// Two triangles per particle quad
const VERTICES_PER_PARTICLE: u32 = 6;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DisplayUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub point_size: f32,
    pub _padding: f32,
}

const _: () = assert!(std::mem::size_of::<DisplayUniforms>() == 80);

impl DisplayUniforms {
    pub fn new(view_projection: Mat4, viewport: [f32; 2], point_size: f32) -> Self {
        Self {
            view_projection: view_projection.to_cols_array_2d(),
            viewport,
            point_size,
            _padding: 0.0,
        }
    }
}

/// Blend state the display pipeline uses for `policy`.
pub fn blend_state(policy: BlendPolicy) -> wgpu::BlendState {
    match policy {
        // Dense regions brighten: src * alpha + dst
        BlendPolicy::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        },
        BlendPolicy::Alpha => wgpu::BlendState::ALPHA_BLENDING,
    }
}

/// Draws every particle as a screen-aligned disc of `point_size` pixels.
pub struct DisplayPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl DisplayPass {
    pub fn new(gpu: &GpuContext, surface_format: wgpu::TextureFormat, blend: BlendPolicy) -> Result<Self, FlockingError> {
        let shader_module = gpu.shader_module("Flocking Display Shader", include_str!("../../shader/display.wgsl"))?;

        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Display Uniform Buffer"),
            size: std::mem::size_of::<DisplayUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![0 => Float32x4],
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![1 => Float32x4],
            },
        ];

        let (pipeline, bind_group) = gpu.validated("display pipeline", |device| {
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Display Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Display Bind Group"),
                layout: &bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Display Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Display Render Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader_module,
                    entry_point: Some("vertex_main"),
                    buffers: &vertex_layouts,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader_module,
                    entry_point: Some("fragment_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(blend_state(blend)),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            });
            (pipeline, bind_group)
        })?;

        log::debug!("display pipeline ready ({surface_format:?}, {blend:?} blending)");
        Ok(Self {
            pipeline,
            uniform_buffer,
            bind_group,
        })
    }

    pub fn update(&self, queue: &wgpu::Queue, view_projection: Mat4, viewport: [f32; 2], point_size: f32) {
        let uniforms = DisplayUniforms::new(view_projection, viewport, point_size);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, buffers: &RenderBuffers) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, buffers.position.slice(..));
        render_pass.set_vertex_buffer(1, buffers.color.slice(..));
        render_pass.draw(0..VERTICES_PER_PARTICLE, 0..buffers.num_particles());
    }
}
