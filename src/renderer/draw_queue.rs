//! Per-frame draw batching
//!
//! Draws of the same renderable within a frame are merged into one batch
//! so every renderable costs a single instanced draw per pass.

use crate::renderer::RenderableId;
use glam::{Mat4, Vec4};
use std::collections::HashMap;

/// All instances of one renderable queued this frame
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub renderable: RenderableId,
    pub model_matrices: Vec<Mat4>,
    /// Empty for uncolored batches, parallel to `model_matrices` otherwise
    pub colors: Vec<Vec4>,
}

impl DrawCall {
    fn new(renderable: RenderableId) -> Self {
        Self {
            renderable,
            model_matrices: Vec::new(),
            colors: Vec::new(),
        }
    }

    pub fn instance_count(&self) -> usize {
        self.model_matrices.len()
    }
}

/// Uncolored and colored batches in first-queued order
#[derive(Debug, Clone, Default)]
pub struct DrawQueue {
    draws: Vec<DrawCall>,
    draw_index: HashMap<RenderableId, usize>,
    colored_draws: Vec<DrawCall>,
    colored_index: HashMap<RenderableId, usize>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, renderable: RenderableId, model: Mat4) {
        let index = *self.draw_index.entry(renderable).or_insert_with(|| {
            self.draws.push(DrawCall::new(renderable));
            self.draws.len() - 1
        });
        self.draws[index].model_matrices.push(model);
    }

    pub fn push_colored(&mut self, renderable: RenderableId, model: Mat4, color: Vec4) {
        let index = *self.colored_index.entry(renderable).or_insert_with(|| {
            self.colored_draws.push(DrawCall::new(renderable));
            self.colored_draws.len() - 1
        });
        let call = &mut self.colored_draws[index];
        call.model_matrices.push(model);
        call.colors.push(color);
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn colored_draws(&self) -> &[DrawCall] {
        &self.colored_draws
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty() && self.colored_draws.is_empty()
    }

    /// Every renderable referenced by either batch list
    pub fn renderables(&self) -> impl Iterator<Item = RenderableId> + '_ {
        self.draws
            .iter()
            .chain(&self.colored_draws)
            .map(|call| call.renderable)
    }

    pub fn clear(&mut self) {
        self.draws.clear();
        self.draw_index.clear();
        self.colored_draws.clear();
        self.colored_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn draws_of_one_renderable_merge_in_call_order() {
        let mut queue = DrawQueue::new();
        let a = Mat4::from_translation(Vec3::X);
        let b = Mat4::from_translation(Vec3::Y);
        let c = Mat4::from_translation(Vec3::Z);

        queue.push(RenderableId(5), a);
        queue.push(RenderableId(2), b);
        queue.push(RenderableId(5), c);

        let draws = queue.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].renderable, RenderableId(5));
        assert_eq!(draws[0].model_matrices, vec![a, c]);
        assert_eq!(draws[1].model_matrices, vec![b]);
        assert!(draws[0].colors.is_empty());
    }

    #[test]
    fn colored_batches_are_separate() {
        let mut queue = DrawQueue::new();
        queue.push(RenderableId(1), Mat4::IDENTITY);
        queue.push_colored(RenderableId(1), Mat4::IDENTITY, Vec4::X);
        queue.push_colored(RenderableId(1), Mat4::IDENTITY, Vec4::Y);

        assert_eq!(queue.draws().len(), 1);
        assert_eq!(queue.colored_draws().len(), 1);
        assert_eq!(queue.colored_draws()[0].colors, vec![Vec4::X, Vec4::Y]);
        assert_eq!(queue.colored_draws()[0].instance_count(), 2);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.renderables().count(), 0);
    }
}
