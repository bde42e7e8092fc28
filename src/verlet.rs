//! Position-based soft-body engine bundled with the crate.
//!
//! Each step integrates velocities with gravity and accumulated forces,
//! predicts positions, projects link distance constraints, derives velocities
//! from the corrected positions and finally relaxes relative velocity along
//! each link. Nodes with zero inverse mass never move on their own.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::config::{SolverTuning, WorldConfig};
use crate::node::Node;
use crate::world::{SoftBodyId, SoftBodyWorld, WorldId};

const DEGENERATE_LENGTH: f32 = 1e-10;

/// Distance constraint between two consecutive nodes.
#[derive(Clone, Copy, Debug)]
struct Link {
    a: usize,
    b: usize,
    rest_length: f32,
}

#[derive(Debug)]
struct SoftBody {
    nodes: Vec<Node>,
    links: Vec<Link>,
    tuning: SolverTuning,
    registered: bool,
    // Reused between steps to avoid reallocating.
    predicted: Vec<Vec3>,
}

impl SoftBody {
    fn rope(start: Vec3, end: Vec3, links: usize) -> Self {
        let links = links.max(1);
        let rest_length = start.distance(end) / links as f32;

        let nodes: Vec<Node> = (0..=links)
            .map(|i| Node::new(start.lerp(end, i as f32 / links as f32), 1.0))
            .collect();
        let links = (0..links)
            .map(|i| Link { a: i, b: i + 1, rest_length })
            .collect();

        Self {
            predicted: Vec::with_capacity(nodes.len()),
            nodes,
            links,
            tuning: SolverTuning::default(),
            registered: false,
        }
    }

    /// Scale movable inverse masses so the movable nodes weigh `total_mass`.
    fn set_total_mass(&mut self, total_mass: f32) {
        if total_mass <= 0.0 || !total_mass.is_finite() {
            return;
        }
        let current: f32 = self
            .nodes
            .iter()
            .filter(|n| !n.is_pinned())
            .map(|n| 1.0 / n.inverse_mass)
            .sum();
        if current <= 0.0 {
            return;
        }
        let factor = current / total_mass;
        for node in self.nodes.iter_mut().filter(|n| !n.is_pinned()) {
            node.inverse_mass *= factor;
        }
    }

    fn step(&mut self, gravity: Vec3, dt: f32) {
        let tuning = self.tuning;
        let keep = 1.0 - tuning.damping;
        let drag = 1.0 / (1.0 + tuning.drag * dt);

        // 1. Integrate velocities and predict positions
        self.predicted.clear();
        for node in self.nodes.iter_mut() {
            if node.is_pinned() {
                self.predicted.push(node.position);
                continue;
            }
            let acceleration = gravity + node.force * node.inverse_mass;
            node.velocity = (node.velocity + acceleration * dt) * keep * drag;
            self.predicted.push(node.position + node.velocity * dt);
        }

        // 2. Project distance constraints
        for _ in 0..tuning.position_iterations {
            for link in &self.links {
                let wa = self.nodes[link.a].inverse_mass;
                let wb = self.nodes[link.b].inverse_mass;
                let w_total = wa + wb;
                if w_total <= 0.0 {
                    continue;
                }
                let delta = self.predicted[link.b] - self.predicted[link.a];
                let dist = delta.length();
                if dist < DEGENERATE_LENGTH {
                    continue;
                }
                let correction = delta * ((dist - link.rest_length) / dist);
                self.predicted[link.a] += correction * (wa / w_total);
                self.predicted[link.b] -= correction * (wb / w_total);
            }
        }

        // 3. Commit positions, derive velocities
        let inv_dt = 1.0 / dt;
        for (node, predicted) in self.nodes.iter_mut().zip(&self.predicted) {
            if node.is_pinned() {
                continue;
            }
            node.velocity = (*predicted - node.position) * inv_dt;
            node.position = *predicted;
        }

        // 4. Relax stretching velocity along links
        for _ in 0..tuning.velocity_iterations {
            for link in &self.links {
                let wa = self.nodes[link.a].inverse_mass;
                let wb = self.nodes[link.b].inverse_mass;
                let w_total = wa + wb;
                if w_total <= 0.0 {
                    continue;
                }
                let axis = (self.nodes[link.b].position - self.nodes[link.a].position)
                    .normalize_or_zero();
                let relative = (self.nodes[link.b].velocity - self.nodes[link.a].velocity).dot(axis);
                let impulse = axis * relative;
                self.nodes[link.a].velocity += impulse * (wa / w_total);
                self.nodes[link.b].velocity -= impulse * (wb / w_total);
            }
        }

        for node in self.nodes.iter_mut() {
            node.force = Vec3::ZERO;
        }
    }
}

/// A physics world of position-based soft bodies.
///
/// ```
/// use strand::{SoftBodyWorld, VerletWorld};
/// use glam::Vec3;
///
/// let mut world = VerletWorld::new();
/// let body = world.create_rope(Vec3::ZERO, Vec3::X * 4.0, 4);
/// world.add_soft_body(body, 1.0);
/// world.step(1.0 / 60.0);
/// assert_eq!(world.nodes(body).map(|n| n.len()), Some(5));
/// ```
#[derive(Debug)]
pub struct VerletWorld {
    id: WorldId,
    config: WorldConfig,
    bodies: BTreeMap<SoftBodyId, SoftBody>,
    next_body: u32,
}

impl VerletWorld {
    /// Create a world with default gravity.
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            id: WorldId::next(),
            config,
            bodies: BTreeMap::new(),
            next_body: 0,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of bodies currently being simulated.
    pub fn body_count(&self) -> usize {
        self.bodies.values().filter(|b| b.registered).count()
    }

    /// Whether `body` exists and is being simulated.
    pub fn is_registered(&self, body: SoftBodyId) -> bool {
        self.bodies.get(&body).is_some_and(|b| b.registered)
    }
}

impl Default for VerletWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftBodyWorld for VerletWorld {
    fn id(&self) -> WorldId {
        self.id
    }

    fn create_rope(&mut self, start: Vec3, end: Vec3, links: usize) -> SoftBodyId {
        let id = SoftBodyId(self.next_body);
        self.next_body += 1;
        self.bodies.insert(id, SoftBody::rope(start, end, links));
        id
    }

    fn solver_mut(&mut self, body: SoftBodyId) -> Option<&mut SolverTuning> {
        self.bodies.get_mut(&body).map(|b| &mut b.tuning)
    }

    fn add_soft_body(&mut self, body: SoftBodyId, total_mass: f32) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.registered = true;
            b.set_total_mass(total_mass);
        }
    }

    fn remove_soft_body(&mut self, body: SoftBodyId) -> bool {
        self.bodies.remove(&body).is_some()
    }

    fn nodes(&self, body: SoftBodyId) -> Option<&[Node]> {
        self.bodies.get(&body).map(|b| b.nodes.as_slice())
    }

    fn nodes_mut(&mut self, body: SoftBodyId) -> Option<&mut [Node]> {
        self.bodies.get_mut(&body).map(|b| b.nodes.as_mut_slice())
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    fn step(&mut self, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let gravity = self.config.gravity;
        for body in self.bodies.values_mut().filter(|b| b.registered) {
            body.step(gravity, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinned_rope(world: &mut VerletWorld, links: usize) -> SoftBodyId {
        let body = world.create_rope(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), links);
        let nodes = world.nodes_mut(body).unwrap();
        let last = nodes.len() - 1;
        nodes[0].inverse_mass = 0.0;
        nodes[last].inverse_mass = 0.0;
        world.add_soft_body(body, 0.01);
        body
    }

    #[test]
    fn test_create_rope_spacing() {
        let mut world = VerletWorld::new();
        let body = world.create_rope(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), 3);
        let nodes = world.nodes(body).unwrap();
        assert_eq!(nodes.len(), 4);
        for (i, node) in nodes.iter().enumerate() {
            assert!((node.position.x - i as f32).abs() < 1e-6);
        }
        assert!(!world.is_registered(body));
    }

    #[test]
    fn test_total_mass_skips_pinned_nodes() {
        let mut world = VerletWorld::new();
        let body = pinned_rope(&mut world, 4);
        let nodes = world.nodes(body).unwrap();
        assert_eq!(nodes[0].inverse_mass, 0.0);
        assert_eq!(nodes[4].inverse_mass, 0.0);

        let movable: f32 = nodes.iter().filter_map(|n| n.mass()).sum();
        assert!((movable - 0.01).abs() < 1e-6, "movable mass = {}", movable);
    }

    #[test]
    fn test_rope_sags_between_pins() {
        let mut world = VerletWorld::new();
        let body = pinned_rope(&mut world, 8);
        {
            // Bring the pins closer so the rope hangs slack
            let nodes = world.nodes_mut(body).unwrap();
            nodes[0].position.x = -1.5;
            nodes[8].position.x = 1.5;
        }
        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }
        let nodes = world.nodes(body).unwrap();
        assert_eq!(nodes[0].position, Vec3::new(-1.5, 0.0, 0.0));
        assert_eq!(nodes[8].position, Vec3::new(1.5, 0.0, 0.0));
        assert!(nodes[4].position.y < 0.0, "middle should sag, y = {}", nodes[4].position.y);
        assert!(nodes.iter().all(|n| n.position.is_finite()));
    }

    #[test]
    fn test_step_clears_forces() {
        let mut world = VerletWorld::new();
        let body = pinned_rope(&mut world, 4);
        for node in world.nodes_mut(body).unwrap() {
            node.force = Vec3::new(0.0, 0.0, 1.0);
        }
        world.step(1.0 / 60.0);
        assert!(world.nodes(body).unwrap().iter().all(|n| n.force == Vec3::ZERO));
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let mut world = VerletWorld::new();
        let body = pinned_rope(&mut world, 4);
        let force = Vec3::new(1.0, 0.0, 0.0);
        for node in world.nodes_mut(body).unwrap() {
            node.force = force;
        }
        let before: Vec<Node> = world.nodes(body).unwrap().to_vec();
        world.step(0.0);
        world.step(f32::NAN);
        assert_eq!(world.nodes(body).unwrap(), before.as_slice());
    }

    #[test]
    fn test_unregistered_body_is_not_stepped() {
        let mut world = VerletWorld::new();
        let body = world.create_rope(Vec3::ZERO, Vec3::X, 2);
        let before: Vec<Node> = world.nodes(body).unwrap().to_vec();
        world.step(1.0 / 60.0);
        assert_eq!(world.nodes(body).unwrap(), before.as_slice());
    }

    #[test]
    fn test_remove_soft_body() {
        let mut world = VerletWorld::new();
        let body = pinned_rope(&mut world, 2);
        assert_eq!(world.body_count(), 1);
        assert!(world.remove_soft_body(body));
        assert!(!world.remove_soft_body(body));
        assert!(world.nodes(body).is_none());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_world_ids_are_unique() {
        assert_ne!(VerletWorld::new().id(), VerletWorld::new().id());
    }
}
