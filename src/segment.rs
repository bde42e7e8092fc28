//! Per-segment render transforms and the geometry they are applied to.
//!
//! Every segment is drawn as one instance of a cylinder that is `rest_length`
//! tall, rooted at the origin and extending along +Y. A segment transform moves
//! that cylinder to the start node, rotates +Y onto the direction of the next
//! node and stretches it along its axis by `current_length / rest_length`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Canonical axis of the segment geometry.
pub const SEGMENT_AXIS: Vec3 = Vec3::Y;

/// Below this length two nodes are treated as coincident.
const COINCIDENT_EPSILON: f32 = 1e-6;

/// Affine placement of one rope segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentTransform {
    /// Position of the segment's start node.
    pub origin: Vec3,
    /// Rotation taking [`SEGMENT_AXIS`] onto the segment direction.
    pub rotation: Quat,
    /// `(1, current_length / rest_length, 1)`.
    pub scale: Vec3,
}

impl SegmentTransform {
    pub const IDENTITY: Self = Self {
        origin: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Build the transform for the segment running from `start` to `end`.
    ///
    /// Coincident nodes yield an identity rotation and a zero axis scale.
    /// A non-positive `rest_length` also collapses the axis scale to zero.
    pub fn from_nodes(start: Vec3, end: Vec3, rest_length: f32) -> Self {
        let direction = end - start;
        let length = direction.length();

        if length <= COINCIDENT_EPSILON || !length.is_finite() {
            return Self {
                origin: start,
                rotation: Quat::IDENTITY,
                scale: Vec3::new(1.0, 0.0, 1.0),
            };
        }

        let stretch = if rest_length > 0.0 {
            length / rest_length
        } else {
            0.0
        };

        Self {
            origin: start,
            rotation: Quat::from_rotation_arc(SEGMENT_AXIS, direction / length),
            scale: Vec3::new(1.0, stretch, 1.0),
        }
    }

    /// Stretch factor along the segment axis.
    #[inline]
    pub fn axis_scale(&self) -> f32 {
        self.scale.y
    }

    /// World-space end point of the stretched segment for a given rest length.
    pub fn tip(&self, rest_length: f32) -> Vec3 {
        self.origin + self.rotation * (SEGMENT_AXIS * rest_length * self.scale.y)
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.origin)
    }
}

impl Default for SegmentTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// GPU layout of one instance: a column-major model matrix.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SegmentInstance {
    pub model: [[f32; 4]; 4],
}

impl From<&SegmentTransform> for SegmentInstance {
    fn from(transform: &SegmentTransform) -> Self {
        Self {
            model: transform.to_matrix().to_cols_array_2d(),
        }
    }
}

impl From<Mat4> for SegmentInstance {
    fn from(matrix: Mat4) -> Self {
        Self {
            model: matrix.to_cols_array_2d(),
        }
    }
}

/// Vertex of the segment cylinder.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SegmentVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Shape of the primitive every segment instance draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentGeometry {
    pub radius: f32,
    /// Height of the unscaled cylinder; the rope's rest segment length.
    pub length: f32,
    pub radial_segments: u32,
}

impl SegmentGeometry {
    pub fn new(radius: f32, length: f32, radial_segments: u32) -> Self {
        Self {
            radius,
            length,
            radial_segments: radial_segments.max(3),
        }
    }

    /// Triangle list for an open cylinder spanning `y = 0 ..= length`.
    pub fn cylinder_vertices(&self) -> Vec<SegmentVertex> {
        let sides = self.radial_segments.max(3);
        let mut vertices = Vec::with_capacity(sides as usize * 6);

        let ring = |i: u32| {
            let angle = i as f32 / sides as f32 * std::f32::consts::TAU;
            let (sin, cos) = angle.sin_cos();
            Vec3::new(cos, 0.0, sin)
        };

        for i in 0..sides {
            let n0 = ring(i);
            let n1 = ring(i + 1);
            let bottom0 = n0 * self.radius;
            let bottom1 = n1 * self.radius;
            let top0 = bottom0 + SEGMENT_AXIS * self.length;
            let top1 = bottom1 + SEGMENT_AXIS * self.length;

            let quad = [
                (bottom0, n0),
                (top0, n0),
                (bottom1, n1),
                (bottom1, n1),
                (top0, n0),
                (top1, n1),
            ];
            vertices.extend(quad.iter().map(|(p, n)| SegmentVertex {
                position: p.to_array(),
                normal: n.to_array(),
            }));
        }

        vertices
    }
}
