//! Configuration for ropes and the physics world.
//!
//! All configuration types use the builder pattern and carry sensible
//! defaults, so most callers only override what they need:
//!
//! ```
//! use strand::config::{RopeConfig, SolverTuning};
//!
//! let config = RopeConfig::new()
//!     .with_segments(30)
//!     .with_rope_length(4.0)
//!     .with_y_offset(1.5)
//!     .with_tuning(SolverTuning::new().with_position_iterations(10));
//!
//! assert_eq!(config.segments, 30);
//! ```

use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Solver tuning applied to a soft body when it is created.
///
/// High iteration counts keep a long, light rope from stretching under small
/// time steps.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverTuning {
    /// Velocity correction passes per step. Default: 20.
    pub velocity_iterations: u32,
    /// Position (distance constraint) passes per step. Default: 20.
    pub position_iterations: u32,
    /// Fraction of velocity removed every step, in [0, 1]. Default: 0.001.
    pub damping: f32,
    /// Linear drag coefficient resisting movement. Default: 0.001.
    pub drag: f32,
}

impl SolverTuning {
    pub fn new() -> Self {
        Self {
            velocity_iterations: 20,
            position_iterations: 20,
            damping: 0.001,
            drag: 0.001,
        }
    }

    pub fn with_velocity_iterations(mut self, iterations: u32) -> Self {
        self.velocity_iterations = iterations;
        self
    }

    pub fn with_position_iterations(mut self, iterations: u32) -> Self {
        self.position_iterations = iterations;
        self
    }

    /// Set the damping coefficient. Clamped to [0, 1].
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Set the drag coefficient. Negative values clamp to 0.
    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag = drag.max(0.0);
        self
    }
}

impl Default for SolverTuning {
    fn default() -> Self {
        Self::new()
    }
}

/// Creation parameters for a rope.
///
/// Values are not range checked beyond what the arithmetic needs; a rope with
/// fewer than two nodes is never created.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RopeConfig {
    /// Height of the straight initial chain. Default: 2.
    pub y_offset: f32,
    /// Number of nodes; the rope renders `segments - 1` segments. Default: 60.
    pub segments: usize,
    /// Rest length of the whole rope. Default: 6.
    pub rope_length: f32,
    /// X coordinates of the two endpoints. `None` spans `±rope_length / 2`.
    pub anchors: Option<(f32, f32)>,
    /// Total mass handed to the physics world. Default: 0.01.
    pub total_mass: f32,
    /// Solver tuning for the created body.
    pub tuning: SolverTuning,
    /// Radius of the rendered segment cylinder. Default: 0.02.
    pub radius: f32,
    /// Radial subdivisions of the rendered segment cylinder. Default: 8.
    pub radial_segments: u32,
}

impl RopeConfig {
    pub fn new() -> Self {
        Self {
            y_offset: 2.0,
            segments: 60,
            rope_length: 6.0,
            anchors: None,
            total_mass: 0.01,
            tuning: SolverTuning::new(),
            radius: 0.02,
            radial_segments: 8,
        }
    }

    pub fn with_y_offset(mut self, y_offset: f32) -> Self {
        self.y_offset = y_offset;
        self
    }

    /// Set the node count.
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_rope_length(mut self, rope_length: f32) -> Self {
        self.rope_length = rope_length;
        self
    }

    /// Pin the endpoints at explicit x coordinates instead of `±rope_length / 2`.
    ///
    /// A span wider than `rope_length` starts the rope stretched.
    pub fn with_anchors(mut self, start_x: f32, end_x: f32) -> Self {
        self.anchors = Some((start_x, end_x));
        self
    }

    pub fn with_total_mass(mut self, total_mass: f32) -> Self {
        self.total_mass = total_mass;
        self
    }

    pub fn with_tuning(mut self, tuning: SolverTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_radial_segments(mut self, radial_segments: u32) -> Self {
        self.radial_segments = radial_segments.max(3);
        self
    }

    /// Rest length of a single segment: `rope_length / (segments - 1)`.
    ///
    /// Zero when the node count cannot form a segment.
    pub fn rest_length(&self) -> f32 {
        if self.segments < 2 {
            return 0.0;
        }
        self.rope_length / (self.segments - 1) as f32
    }

    /// Number of rendered segments.
    pub fn segment_count(&self) -> usize {
        self.segments.saturating_sub(1)
    }

    /// World-space positions of the first and last node.
    pub fn endpoints(&self) -> (Vec3, Vec3) {
        let (start_x, end_x) = self.anchors.unwrap_or_else(|| {
            let half = self.rope_length * 0.5;
            (-half, half)
        });
        (
            Vec3::new(start_x, self.y_offset, 0.0),
            Vec3::new(end_x, self.y_offset, 0.0),
        )
    }

    /// Whether a body can be built from this configuration.
    pub fn is_buildable(&self) -> bool {
        self.segments >= 2 && self.rest_length() > 0.0 && self.rest_length().is_finite()
    }
}

impl Default for RopeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Global parameters of a [`VerletWorld`](crate::VerletWorld).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Gravity acceleration. Default: `(0, -9.81, 0)`.
    pub gravity: Vec3,
}

impl WorldConfig {
    pub fn new() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// A world without gravity.
    pub fn weightless() -> Self {
        Self { gravity: Vec3::ZERO }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::new()
    }
}
