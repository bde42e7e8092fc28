//! Integration tests for the rope lifecycle, mutation API and frame sync.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strand::prelude::*;
use strand::{Node, SoftBodyId, WorldId};

fn weightless() -> VerletWorld {
    VerletWorld::with_config(WorldConfig::weightless())
}

fn approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < 1e-5
}

#[derive(Default)]
struct Follower {
    position: Vec3,
    updates: u32,
}

impl Attachable for Follower {
    fn update_position(&mut self, position: Vec3) {
        self.position = position;
        self.updates += 1;
    }
}

#[derive(Default)]
struct Recorder {
    configured: Vec<(SegmentGeometry, usize)>,
    frames: Vec<Vec<SegmentTransform>>,
}

impl SegmentRenderer for Recorder {
    fn configure(&mut self, geometry: &SegmentGeometry, instance_count: usize) {
        self.configured.push((*geometry, instance_count));
    }

    fn segments_changed(&mut self, transforms: &[SegmentTransform]) {
        self.frames.push(transforms.to_vec());
    }
}

/// Counts lifecycle calls reaching the engine.
#[derive(Clone, Default)]
struct Calls {
    created: Rc<Cell<u32>>,
    added: Rc<Cell<u32>>,
    removed: Rc<Cell<u32>>,
}

struct RecordingWorld {
    inner: VerletWorld,
    calls: Calls,
}

impl RecordingWorld {
    fn new(calls: &Calls) -> Self {
        Self {
            inner: weightless(),
            calls: calls.clone(),
        }
    }
}

impl SoftBodyWorld for RecordingWorld {
    fn id(&self) -> WorldId {
        self.inner.id()
    }

    fn create_rope(&mut self, start: Vec3, end: Vec3, links: usize) -> SoftBodyId {
        self.calls.created.set(self.calls.created.get() + 1);
        self.inner.create_rope(start, end, links)
    }

    fn solver_mut(&mut self, body: SoftBodyId) -> Option<&mut SolverTuning> {
        self.inner.solver_mut(body)
    }

    fn add_soft_body(&mut self, body: SoftBodyId, total_mass: f32) {
        self.calls.added.set(self.calls.added.get() + 1);
        self.inner.add_soft_body(body, total_mass)
    }

    fn remove_soft_body(&mut self, body: SoftBodyId) -> bool {
        self.calls.removed.set(self.calls.removed.get() + 1);
        self.inner.remove_soft_body(body)
    }

    fn nodes(&self, body: SoftBodyId) -> Option<&[Node]> {
        self.inner.nodes(body)
    }

    fn nodes_mut(&mut self, body: SoftBodyId) -> Option<&mut [Node]> {
        self.inner.nodes_mut(body)
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.inner.set_gravity(gravity)
    }

    fn step(&mut self, dt: f32) {
        self.inner.step(dt)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_create_builds_pinned_chain() {
    let config = RopeConfig::new().with_segments(12).with_rope_length(5.5);
    let rope = Rope::with_world(config, VerletWorld::new());

    assert!(rope.is_live());
    assert_eq!(rope.node_count(), 12);
    assert!(rope.node(0).unwrap().is_pinned());
    assert!(rope.node(11).unwrap().is_pinned());
    assert!(rope.node(12).is_none());
    assert!((rope.rest_length() - 0.5).abs() < 1e-6);
    assert_eq!(rope.world().unwrap().body_count(), 1);
}

#[test]
fn test_create_applies_solver_tuning_and_mass() {
    let tuning = SolverTuning::new().with_position_iterations(7).with_damping(0.05);
    let config = RopeConfig::new().with_segments(6).with_total_mass(2.0).with_tuning(tuning);
    let mut rope = Rope::with_world(config, VerletWorld::new());

    let movable: f32 = (0..6)
        .filter_map(|i| rope.node(i))
        .filter(|n| !n.is_pinned())
        .map(|n| 1.0 / n.inverse_mass)
        .sum();
    assert!((movable - 2.0).abs() < 1e-4);

    let body = rope.body().unwrap();
    assert_eq!(*rope.solver_mut().unwrap(), tuning);
    assert!(rope.world().unwrap().is_registered(body));
}

#[test]
fn test_endpoints_stay_pinned_under_load() {
    let bus = ForceBus::new();
    let config = RopeConfig::new().with_segments(20);
    let (start, end) = config.endpoints();
    let mut rope = Rope::with_world(config, VerletWorld::new()).with_force_source(bus.clone());

    for _ in 0..240 {
        bus.publish(Vec3::new(0.3, 0.0, 0.5));
        rope.tick(1.0 / 60.0, &mut NoOpRenderer);
    }

    assert_eq!(rope.node(0).unwrap().position, start);
    assert_eq!(rope.node(19).unwrap().position, end);
    assert!(rope.node(0).unwrap().is_pinned());
    assert!(rope.node(19).unwrap().is_pinned());
    assert!(rope.positions().all(|p| p.is_finite()));
}

#[test]
fn test_inert_rope_without_world() {
    let follower = Rc::new(RefCell::new(Follower::default()));
    let mut rope: Rope<VerletWorld> = Rope::new(RopeConfig::default());
    rope.attach_model(Rc::clone(&follower), 3);
    rope.set_node_position(3, Vec3::ONE);
    rope.apply_force(Vec3::X);

    let mut recorder = Recorder::default();
    rope.tick(1.0 / 60.0, &mut recorder);

    assert!(!rope.is_live());
    assert!(recorder.frames.is_empty());
    assert!(recorder.configured.is_empty());
    assert_eq!(follower.borrow().updates, 0);
}

#[test]
fn test_unbuildable_config_stays_inert() {
    let rope = Rope::with_world(RopeConfig::new().with_segments(1), VerletWorld::new());
    assert!(!rope.is_live());
    assert_eq!(rope.world().unwrap().body_count(), 0);

    let rope = Rope::with_world(RopeConfig::new().with_rope_length(0.0), VerletWorld::new());
    assert!(!rope.is_live());
}

#[test]
fn test_destroy_never_created_rope() {
    let bus = ForceBus::new();
    let mut rope: Rope<VerletWorld> = Rope::new(RopeConfig::default()).with_force_source(bus.clone());
    rope.destroy();
    rope.destroy();

    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(bus.publish(Vec3::ONE), 0);
    assert!(rope.transforms().is_empty());
}

#[test]
fn test_destroy_removes_body_and_subscription() {
    let bus = ForceBus::new();
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(5), weightless())
        .with_force_source(bus.clone());
    assert_eq!(bus.subscriber_count(), 1);

    rope.destroy();
    assert!(!rope.is_live());
    assert_eq!(rope.world().unwrap().body_count(), 0);
    assert_eq!(bus.subscriber_count(), 0);
    assert!(rope.transforms().is_empty());

    // Dropped silently.
    assert_eq!(bus.publish(Vec3::X), 0);
    rope.tick(1.0 / 60.0, &mut NoOpRenderer);
}

#[test]
fn test_world_change_destroys_then_recreates() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(8), weightless());
    let first_id = rope.world().unwrap().id();

    let old = rope.set_world(Some(weightless())).unwrap();
    assert_eq!(old.id(), first_id);
    assert_eq!(old.body_count(), 0);

    assert!(rope.is_live());
    assert_ne!(rope.world().unwrap().id(), first_id);
    assert_eq!(rope.world().unwrap().body_count(), 1);
    assert_eq!(rope.node_count(), 8);
}

#[test]
fn test_take_world_leaves_rope_inert() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(4), weightless());
    let world = rope.take_world().unwrap();
    assert_eq!(world.body_count(), 0);
    assert!(!rope.is_live());
    assert!(rope.world().is_none());
}

#[test]
fn test_drop_removes_body_once() {
    let calls = Calls::default();
    {
        let mut rope = Rope::with_world(RopeConfig::new().with_segments(6), RecordingWorld::new(&calls));
        rope.destroy();
        rope.destroy();
    }
    assert_eq!(calls.removed.get(), 1);

    {
        let _rope = Rope::with_world(RopeConfig::new().with_segments(6), RecordingWorld::new(&calls));
    }
    assert_eq!(calls.created.get(), 2);
    assert_eq!(calls.added.get(), 2);
    assert_eq!(calls.removed.get(), 2);
}

#[test]
fn test_renderer_reconfigured_after_world_change() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(5).with_rope_length(4.0), weightless());
    let mut recorder = Recorder::default();

    rope.tick(0.0, &mut recorder);
    rope.set_world(Some(weightless()));
    rope.tick(0.0, &mut recorder);

    assert_eq!(recorder.configured.len(), 2);
    let (geometry, count) = recorder.configured[0];
    assert_eq!(count, 4);
    assert!((geometry.length - 1.0).abs() < 1e-6);
    assert_eq!(geometry.radius, 0.02);
    assert_eq!(geometry.radial_segments, 8);
}

// ============================================================================
// Mutation API
// ============================================================================

#[test]
fn test_set_node_position_read_back() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(10), VerletWorld::new());
    for _ in 0..10 {
        rope.tick(1.0 / 60.0, &mut NoOpRenderer);
    }

    let target = Vec3::new(1.0, -2.0, 0.5);
    rope.set_node_position(4, target);
    let node = rope.node(4).unwrap();
    assert_eq!(node.position, target);
    assert_eq!(node.velocity, Vec3::ZERO);
}

#[test]
fn test_moving_a_pinned_endpoint() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(10), VerletWorld::new());
    let target = Vec3::new(-2.5, 3.0, 1.0);
    rope.set_node_position(0, target);
    rope.tick(1.0 / 60.0, &mut NoOpRenderer);

    let node = rope.node(0).unwrap();
    assert_eq!(node.position, target);
    assert!(node.is_pinned());
    assert_eq!(rope.transforms()[0].origin, target);
}

#[test]
fn test_out_of_range_index_is_noop() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(5), weightless());
    let before: Vec<Vec3> = rope.positions().collect();
    rope.set_node_position(5, Vec3::splat(9.0));
    rope.set_node_position(usize::MAX, Vec3::splat(9.0));
    assert_eq!(rope.positions().collect::<Vec<_>>(), before);
}

#[test]
fn test_forces_accumulate_on_every_node() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(9), weightless());

    let mut expected = Vec3::ZERO;
    for _ in 0..25 {
        let force = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        expected += force;
        rope.apply_force(force);
    }

    for i in 0..9 {
        assert_eq!(rope.node(i).unwrap().force, expected, "node {}", i);
    }

    rope.tick(1.0 / 60.0, &mut NoOpRenderer);
    for i in 0..9 {
        assert_eq!(rope.node(i).unwrap().force, Vec3::ZERO);
    }
}

#[test]
fn test_zero_dt_keeps_forces_accumulated() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(4), weightless());
    rope.apply_force(Vec3::Z);
    rope.tick(0.0, &mut NoOpRenderer);
    assert_eq!(rope.node(2).unwrap().force, Vec3::Z);
}

#[test]
fn test_bus_forces_drained_before_step() {
    let bus = ForceBus::new();
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(6), weightless())
        .with_force_source(bus.clone());

    bus.publish(Vec3::new(0.0, 0.0, 0.5));
    bus.publish(Vec3::new(0.0, 0.0, 0.25));
    assert_eq!(rope.drain_forces(), 2);
    assert_eq!(rope.node(3).unwrap().force, Vec3::new(0.0, 0.0, 0.75));

    bus.publish(Vec3::new(0.0, 0.0, 1.0));
    rope.tick(1.0 / 60.0, &mut NoOpRenderer);
    assert!(rope.node(3).unwrap().position.z > 0.0);
    assert_eq!(rope.node(3).unwrap().force, Vec3::ZERO);
}

#[test]
fn test_force_source_swap() {
    let first = ForceBus::new();
    let second = ForceBus::new();
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(4), weightless())
        .with_force_source(first.clone());

    rope.set_force_source(Some(second.clone()));
    assert_eq!(first.subscriber_count(), 0);
    assert_eq!(second.subscriber_count(), 1);

    rope.set_force_source(None);
    assert_eq!(second.subscriber_count(), 0);
}

// ============================================================================
// Attachments
// ============================================================================

#[test]
fn test_attachments_follow_nodes() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(10), VerletWorld::new());
    let middle = Rc::new(RefCell::new(Follower::default()));
    let stray = Rc::new(RefCell::new(Follower::default()));
    rope.attach_model(Rc::clone(&middle), 5);
    rope.attach_model(Rc::clone(&stray), 40);

    for _ in 0..30 {
        rope.tick(1.0 / 60.0, &mut NoOpRenderer);
    }

    assert_eq!(middle.borrow().updates, 30);
    assert_eq!(middle.borrow().position, rope.node(5).unwrap().position);
    assert_eq!(stray.borrow().updates, 0);
    assert!(rope.attachments().contains(40));
}

#[test]
fn test_reattach_overwrites_and_detach_stops_updates() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(6), weightless());
    let first = Rc::new(RefCell::new(Follower::default()));
    let second = Rc::new(RefCell::new(Follower::default()));

    rope.attach_model(Rc::clone(&first), 2);
    assert!(rope.attach_model(Rc::clone(&second), 2).is_some());
    rope.synchronize(&mut NoOpRenderer);
    assert_eq!(first.borrow().updates, 0);
    assert_eq!(second.borrow().updates, 1);

    assert!(rope.detach_model(2).is_some());
    rope.synchronize(&mut NoOpRenderer);
    assert_eq!(second.borrow().updates, 1);
    assert!(rope.attachments().is_empty());
}

#[test]
fn test_attachments_survive_world_change() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(6), weightless());
    let follower = Rc::new(RefCell::new(Follower::default()));
    rope.attach_model(Rc::clone(&follower), 1);

    rope.set_world(Some(weightless()));
    rope.set_node_position(1, Vec3::new(0.0, 7.0, 0.0));
    rope.synchronize(&mut NoOpRenderer);
    assert_eq!(follower.borrow().position, Vec3::new(0.0, 7.0, 0.0));
}

// ============================================================================
// Frame synchronization
// ============================================================================

#[test]
fn test_end_to_end_rest_chain() {
    let config = RopeConfig::new().with_segments(5).with_rope_length(4.0);
    let (start, end) = config.endpoints();
    let mut rope = Rope::with_world(config, VerletWorld::new());
    let mut recorder = Recorder::default();

    rope.tick(0.0, &mut recorder);

    assert_eq!(recorder.frames.len(), 1);
    let transforms = &recorder.frames[0];
    assert_eq!(transforms.len(), 4);
    for (i, t) in transforms.iter().enumerate() {
        assert!((t.axis_scale() - 1.0).abs() < 1e-6, "segment {}", i);
        let along = (t.origin - start).cross(end - start);
        assert!(along.length() < 1e-5, "origin {} off the line", i);
        assert!(approx(t.tip(1.0), start + (end - start) * ((i + 1) as f32 / 4.0)));
    }
}

#[test]
fn test_transform_count_matches_segments() {
    for segments in [2, 3, 17, 60] {
        let mut rope = Rope::with_world(RopeConfig::new().with_segments(segments), VerletWorld::new());
        let mut recorder = Recorder::default();
        rope.tick(1.0 / 60.0, &mut recorder);
        rope.tick(1.0 / 60.0, &mut recorder);
        assert_eq!(recorder.frames.len(), 2);
        assert!(recorder.frames.iter().all(|f| f.len() == segments - 1));
        assert_eq!(rope.transforms().len(), segments - 1);
    }
}

#[test]
fn test_transforms_track_node_positions() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(30), VerletWorld::new());
    for _ in 0..90 {
        rope.tick(1.0 / 60.0, &mut NoOpRenderer);
    }

    let rest = rope.rest_length();
    let positions: Vec<Vec3> = rope.positions().collect();
    for (i, t) in rope.transforms().iter().enumerate() {
        assert_eq!(t.origin, positions[i]);
        assert!((t.tip(rest) - positions[i + 1]).length() < 1e-4);
        assert!(t.to_matrix().is_finite());
    }
}

#[test]
fn test_coincident_nodes_stay_finite() {
    let mut rope = Rope::with_world(RopeConfig::new().with_segments(5).with_rope_length(4.0), weightless());
    let p = rope.node(2).unwrap().position;
    rope.set_node_position(3, p);
    rope.synchronize(&mut NoOpRenderer);

    let t = rope.transforms()[2];
    assert_eq!(t.axis_scale(), 0.0);
    assert_eq!(t.rotation, Quat::IDENTITY);
    assert!(rope.transforms().iter().all(|t| t.to_matrix().is_finite()));
}

#[test]
fn test_original_anchor_span() {
    let config = RopeConfig::new().with_anchors(-8.0, 8.0).with_y_offset(3.0);
    let mut rope = Rope::with_world(config, weightless());
    rope.synchronize(&mut NoOpRenderer);

    assert_eq!(rope.node(0).unwrap().position, Vec3::new(-8.0, 3.0, 0.0));
    assert_eq!(rope.node(59).unwrap().position, Vec3::new(8.0, 3.0, 0.0));
    // 16 units of chain over a 6-unit rope: every segment starts stretched.
    let stretch = 16.0 / 6.0;
    assert!(rope
        .transforms()
        .iter()
        .all(|t| (t.axis_scale() - stretch).abs() < 1e-4));
}
