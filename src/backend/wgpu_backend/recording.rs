//! Pass recording and replay
//!
//! wgpu passes borrow every bound resource for their whole lifetime, which
//! does not fit the handle-based `GraphicsBackend` calls. Commands are
//! recorded into an [`OpenPass`] and replayed against the registry when the
//! pass ends.

use std::ops::Range;

use super::Registry;
use crate::backend::traits::*;
use crate::backend::types::{IndexFormat, RenderPassDescriptor};

pub(super) enum RenderOp {
    Pipeline(RenderPipelineHandle),
    BindGroup(u32, BindGroupHandle),
    VertexBuffer { slot: u32, buffer: BufferHandle, offset: u64 },
    IndexBuffer { buffer: BufferHandle, offset: u64, format: IndexFormat },
    Viewport([f32; 6]),
    Draw { vertices: Range<u32>, instances: Range<u32> },
    DrawIndexed { indices: Range<u32>, base_vertex: i32, instances: Range<u32> },
}

pub(super) enum ComputeOp {
    Pipeline(ComputePipelineHandle),
    BindGroup(u32, BindGroupHandle),
    Dispatch([u32; 3]),
}

/// The single pass currently being recorded
pub(super) enum OpenPass {
    Render {
        descriptor: RenderPassDescriptor,
        ops: Vec<RenderOp>,
    },
    Compute {
        label: Option<String>,
        ops: Vec<ComputeOp>,
    },
}

impl OpenPass {
    pub(super) fn render(descriptor: &RenderPassDescriptor) -> Self {
        OpenPass::Render {
            descriptor: descriptor.clone(),
            ops: Vec::new(),
        }
    }

    pub(super) fn compute(label: Option<&str>) -> Self {
        OpenPass::Compute {
            label: label.map(str::to_owned),
            ops: Vec::new(),
        }
    }

    /// Record a render command; ignored outside a render pass
    pub(super) fn push_render(&mut self, op: RenderOp) {
        if let OpenPass::Render { ops, .. } = self {
            ops.push(op);
        } else {
            log::warn!("Render command recorded outside a render pass");
        }
    }

    /// Record a compute command; ignored outside a compute pass
    pub(super) fn push_compute(&mut self, op: ComputeOp) {
        if let OpenPass::Compute { ops, .. } = self {
            ops.push(op);
        } else {
            log::warn!("Compute command recorded outside a compute pass");
        }
    }
}

/// Replay render commands; commands naming destroyed resources are skipped
pub(super) fn replay_render<'a>(
    pass: &mut wgpu::RenderPass<'a>,
    registry: &'a Registry,
    ops: &[RenderOp],
) {
    for op in ops {
        match op {
            RenderOp::Pipeline(handle) => {
                if let Some(pipeline) = registry.render_pipelines.get(&handle.0) {
                    pass.set_pipeline(pipeline);
                }
            }
            RenderOp::BindGroup(index, handle) => {
                if let Some(group) = registry.bind_groups.get(&handle.0) {
                    pass.set_bind_group(*index, group, &[]);
                }
            }
            RenderOp::VertexBuffer { slot, buffer, offset } => {
                if let Some(buffer) = registry.buffers.get(&buffer.0) {
                    pass.set_vertex_buffer(*slot, buffer.slice(*offset..));
                }
            }
            RenderOp::IndexBuffer { buffer, offset, format } => {
                if let Some(buffer) = registry.buffers.get(&buffer.0) {
                    pass.set_index_buffer(buffer.slice(*offset..), (*format).into());
                }
            }
            RenderOp::Viewport([x, y, width, height, min_depth, max_depth]) => {
                pass.set_viewport(*x, *y, *width, *height, *min_depth, *max_depth);
            }
            RenderOp::Draw { vertices, instances } => {
                pass.draw(vertices.clone(), instances.clone());
            }
            RenderOp::DrawIndexed { indices, base_vertex, instances } => {
                pass.draw_indexed(indices.clone(), *base_vertex, instances.clone());
            }
        }
    }
}

pub(super) fn replay_compute<'a>(
    pass: &mut wgpu::ComputePass<'a>,
    registry: &'a Registry,
    ops: &[ComputeOp],
) {
    for op in ops {
        match op {
            ComputeOp::Pipeline(handle) => {
                if let Some(pipeline) = registry.compute_pipelines.get(&handle.0) {
                    pass.set_pipeline(pipeline);
                }
            }
            ComputeOp::BindGroup(index, handle) => {
                if let Some(group) = registry.bind_groups.get(&handle.0) {
                    pass.set_bind_group(*index, group, &[]);
                }
            }
            ComputeOp::Dispatch([x, y, z]) => pass.dispatch_workgroups(*x, *y, *z),
        }
    }
}
