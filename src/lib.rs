//! # strand - soft-body rope simulation
//!
//! A rope is a chain of point-mass nodes joined by distance links and pinned at
//! both ends. Each frame the physics world is stepped, objects attached to
//! nodes are moved to follow them, and a transform per segment is rebuilt so a
//! renderer can draw the rope as a row of stretched cylinders.
//!
//! ## Quick Start
//!
//! ```
//! use strand::prelude::*;
//!
//! let config = RopeConfig::new()
//!     .with_segments(60)
//!     .with_rope_length(6.0)
//!     .with_y_offset(2.0);
//!
//! let bus = ForceBus::new();
//! let mut rope = Rope::with_world(config, VerletWorld::new())
//!     .with_force_source(bus.clone());
//!
//! // Anyone holding the bus can blow on the rope.
//! bus.publish(Vec3::new(0.0, 0.0, 0.05));
//!
//! for _ in 0..60 {
//!     rope.tick(1.0 / 60.0, &mut NoOpRenderer);
//! }
//! assert_eq!(rope.transforms().len(), 59);
//! ```
//!
//! ## Pieces
//!
//! - [`Rope`] owns the soft body, its attachments and its force subscription.
//! - [`SoftBodyWorld`] is the seam to the physics engine; [`VerletWorld`] is
//!   the bundled position-based solver.
//! - [`Attachable`] objects follow a node, see [`attachment`].
//! - [`ForceBus`] carries ambient forces such as [`Gust`] wind.
//! - [`SegmentRenderer`] receives the per-segment [`SegmentTransform`]s once
//!   per frame. The `gpu` module draws them with wgpu and the [`Viewer`]
//!   wraps everything in a window.
//!
//! ## Frame Order
//!
//! 1. Forces published on the bus are added to every node.
//! 2. The world steps; accumulated forces are consumed.
//! 3. Attachments snap to their node; segment transforms are rebuilt.
//! 4. The renderer is notified once with the complete transform list.
//!
//! Nothing in the core returns an error. Calls made before a world exists,
//! or with an out-of-range node index, are ignored and logged through the
//! [`log`] facade.

pub mod attachment;
pub mod config;
pub mod error;
pub mod force;
pub mod gpu;
pub mod input;
pub mod node;
mod rope;
pub mod segment;
pub mod sync;
pub mod time;
mod verlet;
pub mod viewer;
pub mod wind;
pub mod world;

pub use attachment::{Attachable, AttachmentRegistry};
pub use config::{RopeConfig, SolverTuning, WorldConfig};
pub use error::{GpuError, ViewerError};
pub use force::{ForceBus, ForceSubscription};
pub use glam::{Mat4, Quat, Vec3};
pub use node::{Node, NodeView};
pub use rope::Rope;
pub use segment::{SegmentGeometry, SegmentInstance, SegmentTransform, SEGMENT_AXIS};
pub use sync::{FrameSynchronizer, NoOpRenderer, SegmentRenderer};
pub use time::FrameClock;
pub use verlet::VerletWorld;
pub use viewer::Viewer;
pub use wind::Gust;
pub use world::{SoftBodyId, SoftBodyWorld, WorldId};

/// Convenient re-exports for common usage.
///
/// ```
/// use strand::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attachment::Attachable;
    pub use crate::config::{RopeConfig, SolverTuning, WorldConfig};
    pub use crate::force::ForceBus;
    pub use crate::rope::Rope;
    pub use crate::segment::{SegmentGeometry, SegmentTransform};
    pub use crate::sync::{NoOpRenderer, SegmentRenderer};
    pub use crate::time::FrameClock;
    pub use crate::verlet::VerletWorld;
    pub use crate::viewer::Viewer;
    pub use crate::wind::Gust;
    pub use crate::world::SoftBodyWorld;
    pub use crate::{Quat, Vec3};
}
