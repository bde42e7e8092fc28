//! The rope: a soft-body node chain pinned at both ends.
//!
//! A [`Rope`] owns the physics world it lives in (if any), the handle of its
//! soft body, the attachment registry, the force subscription and the frame
//! synchronizer. Every operation is safe to call before a world exists; until
//! then the rope is inert and calls are silently ignored.
//!
//! # Frame order
//!
//! [`Rope::tick`] runs, in order:
//! 1. drain forces published on the [`ForceBus`] since the last tick
//! 2. step the physics world
//! 3. synchronize attachments and segment transforms, then notify the renderer once
//!
//! Direct calls to [`Rope::set_node_position`] and [`Rope::apply_force`]
//! write into the node store immediately and are picked up by the next tick.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use strand::prelude::*;
//!
//! let config = RopeConfig::new().with_segments(5).with_rope_length(4.0);
//! let mut rope = Rope::with_world(config, VerletWorld::new());
//!
//! rope.apply_force(Vec3::new(0.0, 0.0, 0.2));
//! rope.tick(1.0 / 60.0, &mut NoOpRenderer);
//!
//! assert_eq!(rope.transforms().len(), 4);
//! ```

use glam::Vec3;

use crate::attachment::{Attachable, AttachmentRegistry};
use crate::config::{RopeConfig, SolverTuning};
use crate::force::{ForceBus, ForceSubscription};
use crate::node::{Node, NodeView};
use crate::segment::{SegmentGeometry, SegmentTransform};
use crate::sync::{FrameSynchronizer, SegmentRenderer};
use crate::world::{SoftBodyId, SoftBodyWorld, WorldId};

/// A live soft body and the world it was registered with.
#[derive(Clone, Copy, Debug)]
struct SoftBodyRope {
    body: SoftBodyId,
    world: WorldId,
    segments: usize,
}

/// A simulated rope with both endpoints pinned.
pub struct Rope<W: SoftBodyWorld> {
    config: RopeConfig,
    world: Option<W>,
    body: Option<SoftBodyRope>,
    attachments: AttachmentRegistry,
    force_source: Option<ForceBus>,
    subscription: Option<ForceSubscription>,
    sync: FrameSynchronizer,
    needs_configure: bool,
}

impl<W: SoftBodyWorld> Rope<W> {
    /// Create an inert rope. It comes alive once a world is supplied with
    /// [`set_world`](Self::set_world).
    pub fn new(config: RopeConfig) -> Self {
        Self {
            config,
            world: None,
            body: None,
            attachments: AttachmentRegistry::new(),
            force_source: None,
            subscription: None,
            sync: FrameSynchronizer::empty(),
            needs_configure: false,
        }
    }

    /// Create a rope and immediately build its soft body in `world`.
    pub fn with_world(config: RopeConfig, world: W) -> Self {
        let mut rope = Self::new(config);
        rope.set_world(Some(world));
        rope
    }

    /// Subscribe to `bus` whenever a soft body is alive.
    pub fn with_force_source(mut self, bus: ForceBus) -> Self {
        self.set_force_source(Some(bus));
        self
    }

    /// Replace the force source. Forces queued on the old source are dropped.
    pub fn set_force_source(&mut self, bus: Option<ForceBus>) {
        self.subscription = match (&bus, self.body) {
            (Some(bus), Some(_)) => Some(bus.subscribe()),
            _ => None,
        };
        self.force_source = bus;
    }

    /// Swap the physics world.
    ///
    /// The current soft body is removed from the old world first, then a new
    /// one is built in `world` (if any). Returns the previous world.
    pub fn set_world(&mut self, world: Option<W>) -> Option<W> {
        self.destroy();
        let previous = std::mem::replace(&mut self.world, world);
        self.create();
        previous
    }

    /// Detach and return the physics world, leaving the rope inert.
    pub fn take_world(&mut self) -> Option<W> {
        self.set_world(None)
    }

    fn create(&mut self) {
        if self.body.is_some() {
            return;
        }
        let Some(world) = self.world.as_mut() else {
            log::debug!("no physics world yet, rope stays inert");
            return;
        };
        if !self.config.is_buildable() {
            log::warn!(
                "rope needs at least 2 nodes and a positive length (segments = {}, length = {})",
                self.config.segments,
                self.config.rope_length
            );
            return;
        }

        let segments = self.config.segments;
        let (start, end) = self.config.endpoints();
        let body = world.create_rope(start, end, segments - 1);

        if let Some(tuning) = world.solver_mut(body) {
            *tuning = self.config.tuning;
        }
        if let Some(nodes) = world.nodes_mut(body) {
            if let Some(last) = nodes.len().checked_sub(1) {
                nodes[0].inverse_mass = 0.0;
                nodes[last].inverse_mass = 0.0;
            }
        }
        world.add_soft_body(body, self.config.total_mass);

        self.body = Some(SoftBodyRope {
            body,
            world: world.id(),
            segments,
        });
        self.sync = FrameSynchronizer::new(segments - 1, self.config.rest_length());
        self.needs_configure = true;
        self.subscription = self.force_source.as_ref().map(ForceBus::subscribe);

        log::debug!(
            "rope created in world {}: {} nodes, rest length {:.4}",
            world.id().raw(),
            segments,
            self.config.rest_length()
        );
    }

    /// Remove the soft body from its world.
    ///
    /// Idempotent: calling it again, or on a rope that never had a body, does
    /// nothing. Queued forces are discarded. Attachments stay registered and
    /// resume tracking when a new body is created.
    pub fn destroy(&mut self) {
        self.subscription = None;
        let Some(live) = self.body.take() else {
            return;
        };
        if let Some(world) = self.world.as_mut() {
            if world.id() == live.world && !world.remove_soft_body(live.body) {
                log::warn!("soft body {:?} was already gone from its world", live.body);
            }
        }
        self.sync = FrameSynchronizer::empty();
        self.needs_configure = false;
        log::debug!("rope destroyed ({} nodes)", live.segments);
    }

    /// Whether a soft body currently exists.
    pub fn is_live(&self) -> bool {
        self.body.is_some()
    }

    /// Rebuild the soft body if the held world is not the one it lives in.
    fn follow_world(&mut self) {
        let moved = match (self.body, self.world.as_ref()) {
            (Some(live), Some(world)) => world.id() != live.world,
            _ => false,
        };
        if moved {
            log::debug!("physics world changed under the rope, rebuilding");
            self.destroy();
            self.create();
        }
    }

    fn nodes(&self) -> Option<&[Node]> {
        let live = self.body?;
        let world = self.world.as_ref()?;
        if world.id() != live.world {
            return None;
        }
        world.nodes(live.body)
    }

    fn nodes_mut(&mut self) -> Option<&mut [Node]> {
        self.follow_world();
        let live = self.body?;
        self.world.as_mut()?.nodes_mut(live.body)
    }

    /// Handle of the live soft body inside [`world`](Self::world).
    ///
    /// The world is only reachable read-only; node storage is changed through
    /// the rope so the endpoints stay pinned.
    pub fn body(&self) -> Option<SoftBodyId> {
        self.body.map(|live| live.body)
    }

    /// Number of nodes, or 0 while inert.
    pub fn node_count(&self) -> usize {
        self.nodes().map_or(0, <[Node]>::len)
    }

    /// Read-only snapshot of node `index`.
    pub fn node(&self, index: usize) -> Option<NodeView> {
        self.nodes()?.get(index).map(|node| NodeView::of(index, node))
    }

    /// Current node positions in chain order. Empty while inert.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.nodes().unwrap_or(&[]).iter().map(|node| node.position)
    }

    /// Move node `index` to `position` and zero its velocity.
    ///
    /// Ignored while inert or when `index` is out of range.
    pub fn set_node_position(&mut self, index: usize, position: Vec3) {
        let Some(nodes) = self.nodes_mut() else {
            log::trace!("set_node_position({}) before the rope exists, ignored", index);
            return;
        };
        let count = nodes.len();
        match nodes.get_mut(index) {
            Some(node) => {
                node.position = position;
                node.velocity = Vec3::ZERO;
            }
            None => log::warn!("node index {} out of range (count: {})", index, count),
        }
    }

    /// Add `force` to the accumulated force of every node, endpoints included.
    ///
    /// Forces accumulate until the next physics step consumes them.
    pub fn apply_force(&mut self, force: Vec3) {
        let Some(nodes) = self.nodes_mut() else {
            return;
        };
        for node in nodes.iter_mut() {
            node.force += force;
        }
    }

    /// Make `object` follow node `index`, replacing any previous binding there.
    ///
    /// The index is not validated; an out-of-range binding is simply never
    /// updated. Returns the previous binding.
    pub fn attach_model<A: Attachable + 'static>(
        &mut self,
        object: A,
        index: usize,
    ) -> Option<Box<dyn Attachable>> {
        self.attachments.attach(index, object)
    }

    /// Stop updating whatever follows node `index`.
    pub fn detach_model(&mut self, index: usize) -> Option<Box<dyn Attachable>> {
        self.attachments.detach(index)
    }

    pub fn attachments(&self) -> &AttachmentRegistry {
        &self.attachments
    }

    /// Apply every force queued on the force source. Returns how many were applied.
    pub fn drain_forces(&mut self) -> usize {
        let forces: Vec<Vec3> = match &self.subscription {
            Some(subscription) => subscription.drain().collect(),
            None => return 0,
        };
        for &force in &forces {
            self.apply_force(force);
        }
        forces.len()
    }

    /// Run one frame: drain queued forces, step the world by `dt`, synchronize.
    ///
    /// Does nothing while inert.
    pub fn tick<R: SegmentRenderer + ?Sized>(&mut self, dt: f32, renderer: &mut R) {
        self.follow_world();
        if self.body.is_none() {
            return;
        }
        self.drain_forces();
        if let Some(world) = self.world.as_mut() {
            world.step(dt);
        }
        self.synchronize(renderer);
    }

    /// Push node positions to attachments and rebuild every segment transform.
    ///
    /// Call after the physics step and before rendering. Skipped while inert.
    pub fn synchronize<R: SegmentRenderer + ?Sized>(&mut self, renderer: &mut R) {
        self.follow_world();
        let (Some(live), Some(world)) = (self.body, self.world.as_ref()) else {
            return;
        };
        let Some(nodes) = world.nodes(live.body) else {
            return;
        };

        if self.needs_configure {
            let geometry = SegmentGeometry::new(
                self.config.radius,
                self.config.rest_length(),
                self.config.radial_segments,
            );
            renderer.configure(&geometry, live.segments - 1);
            self.needs_configure = false;
        }

        self.sync.synchronize(nodes, &mut self.attachments, renderer);
    }

    /// Segment transforms of the last synchronized frame.
    ///
    /// Holds exactly `segments - 1` entries while live and none while inert.
    pub fn transforms(&self) -> &[SegmentTransform] {
        self.sync.transforms()
    }

    /// Primitive each segment instance draws.
    pub fn geometry(&self) -> SegmentGeometry {
        SegmentGeometry::new(
            self.config.radius,
            self.config.rest_length(),
            self.config.radial_segments,
        )
    }

    pub fn rest_length(&self) -> f32 {
        self.config.rest_length()
    }

    pub fn config(&self) -> &RopeConfig {
        &self.config
    }

    pub fn world(&self) -> Option<&W> {
        self.world.as_ref()
    }

    /// Change the gravity of the held world.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        if let Some(world) = self.world.as_mut() {
            world.set_gravity(gravity);
        }
    }

    /// Solver parameters of the live soft body.
    pub fn solver_mut(&mut self) -> Option<&mut SolverTuning> {
        self.follow_world();
        let live = self.body?;
        self.world.as_mut()?.solver_mut(live.body)
    }
}

impl<W: SoftBodyWorld> Drop for Rope<W> {
    fn drop(&mut self) {
        self.destroy();
    }
}
