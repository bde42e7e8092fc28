//! Per-frame synchronization of simulation state into render state.

use crate::attachment::AttachmentRegistry;
use crate::node::Node;
use crate::segment::{SegmentGeometry, SegmentTransform};

/// Consumer of the per-segment transforms.
///
/// The renderer owns a fixed-count instanced draw. It is configured once per
/// soft body and then notified once per synchronized frame with the complete
/// transform list, never with a partial one.
pub trait SegmentRenderer {
    /// Called when a soft body is created: the primitive to instance and how
    /// many instances the transform list will hold.
    fn configure(&mut self, _geometry: &SegmentGeometry, _instance_count: usize) {}

    /// Called once per frame after every slot has been rewritten.
    fn segments_changed(&mut self, transforms: &[SegmentTransform]);
}

impl<R: SegmentRenderer + ?Sized> SegmentRenderer for &mut R {
    fn configure(&mut self, geometry: &SegmentGeometry, instance_count: usize) {
        (**self).configure(geometry, instance_count);
    }

    fn segments_changed(&mut self, transforms: &[SegmentTransform]) {
        (**self).segments_changed(transforms);
    }
}

/// A renderer that ignores everything. Use when only the simulation matters.
pub struct NoOpRenderer;

impl SegmentRenderer for NoOpRenderer {
    fn segments_changed(&mut self, _transforms: &[SegmentTransform]) {}
}

/// Rebuilds the segment transform list from node positions.
#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    transforms: Vec<SegmentTransform>,
    rest_length: f32,
    frames: u64,
}

impl FrameSynchronizer {
    /// A synchronizer with `segment_count` transform slots.
    pub fn new(segment_count: usize, rest_length: f32) -> Self {
        Self {
            transforms: vec![SegmentTransform::IDENTITY; segment_count],
            rest_length,
            frames: 0,
        }
    }

    /// An empty synchronizer, used while no soft body exists.
    pub fn empty() -> Self {
        Self::new(0, 0.0)
    }

    /// Update attachments, rewrite every transform slot, then notify `renderer`.
    pub fn synchronize<R: SegmentRenderer + ?Sized>(
        &mut self,
        nodes: &[Node],
        attachments: &mut AttachmentRegistry,
        renderer: &mut R,
    ) {
        attachments.update(|index| nodes.get(index).map(|node| node.position));

        for (slot, pair) in self.transforms.iter_mut().zip(nodes.windows(2)) {
            *slot = SegmentTransform::from_nodes(pair[0].position, pair[1].position, self.rest_length);
        }

        renderer.segments_changed(&self.transforms);
        self.frames += 1;
    }

    pub fn transforms(&self) -> &[SegmentTransform] {
        &self.transforms
    }

    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    /// Frames synchronized since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::empty()
    }
}
