//! Simulation nodes: the point masses a soft-body rope is made of.

use glam::Vec3;

/// One point mass of a soft body.
///
/// Nodes are owned by the physics world. The rope only reaches them through
/// narrow methods, and hands callers read-only [`NodeView`] copies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    /// World-space position.
    pub position: Vec3,
    /// Linear velocity in units per second.
    pub velocity: Vec3,
    /// Reciprocal of the node mass. Zero marks an immovable (pinned) node.
    pub inverse_mass: f32,
    /// Force accumulated since the last step. Cleared by the engine when it steps.
    pub force: Vec3,
}

impl Node {
    /// Create a node at rest with the given inverse mass.
    pub fn new(position: Vec3, inverse_mass: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            inverse_mass,
            force: Vec3::ZERO,
        }
    }

    /// Whether the integrator is allowed to move this node.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.inverse_mass == 0.0
    }

    /// Mass of the node, or `None` for a pinned node.
    pub fn mass(&self) -> Option<f32> {
        if self.is_pinned() {
            None
        } else {
            Some(1.0 / self.inverse_mass)
        }
    }
}

/// Read-only snapshot of a node, returned by [`Rope::node`](crate::Rope::node).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeView {
    pub index: usize,
    pub position: Vec3,
    pub velocity: Vec3,
    pub inverse_mass: f32,
    pub force: Vec3,
}

impl NodeView {
    pub(crate) fn of(index: usize, node: &Node) -> Self {
        Self {
            index,
            position: node.position,
            velocity: node.velocity,
            inverse_mass: node.inverse_mass,
            force: node.force,
        }
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.inverse_mass == 0.0
    }
}
