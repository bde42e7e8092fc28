//! The physics world a rope lives in.
//!
//! The rope core never integrates anything itself. It configures a soft body
//! through [`SoftBodyWorld`] and reads the resulting node list back every
//! frame. [`VerletWorld`](crate::VerletWorld) is the bundled implementation.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;

use crate::config::SolverTuning;
use crate::node::Node;

/// Identity of a physics world.
///
/// A rope bound to one world must be destroyed before it is recreated
/// against a world with a different identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldId(u64);

impl WorldId {
    /// Allocate a process-unique identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        WorldId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to a soft body inside one world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoftBodyId(pub(crate) u32);

impl SoftBodyId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Soft-body capabilities the rope needs from a physics engine.
///
/// Bodies go through two phases: built by [`create_rope`](Self::create_rope)
/// (nodes exist and may be edited, nothing is simulated) and registered by
/// [`add_soft_body`](Self::add_soft_body) (stepped by [`step`](Self::step)).
/// Methods given an unknown body id do nothing and return `None`/`false`.
pub trait SoftBodyWorld {
    /// Identity of this world.
    fn id(&self) -> WorldId;

    /// Build a straight chain of `links + 1` evenly spaced nodes from `start`
    /// to `end`, each with unit inverse mass.
    fn create_rope(&mut self, start: Vec3, end: Vec3, links: usize) -> SoftBodyId;

    /// Solver parameters of a body.
    fn solver_mut(&mut self, body: SoftBodyId) -> Option<&mut SolverTuning>;

    /// Start simulating a body, distributing `total_mass` over its movable
    /// nodes. Pinned nodes keep a zero inverse mass.
    fn add_soft_body(&mut self, body: SoftBodyId, total_mass: f32);

    /// Stop simulating a body and release its nodes.
    ///
    /// Returns `false` if the body is unknown.
    fn remove_soft_body(&mut self, body: SoftBodyId) -> bool;

    /// Node list of a body.
    fn nodes(&self, body: SoftBodyId) -> Option<&[Node]>;

    /// Mutable node list of a body. The length cannot change.
    fn nodes_mut(&mut self, body: SoftBodyId) -> Option<&mut [Node]>;

    /// Acceleration applied to every movable node.
    fn set_gravity(&mut self, gravity: Vec3);

    /// Advance every registered body by `dt` seconds.
    fn step(&mut self, dt: f32);
}
