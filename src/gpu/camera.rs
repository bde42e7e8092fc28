//! Orbit camera for the rope viewer.

use glam::{Mat4, Vec2, Vec3};

const FOV_Y_DEGREES: f32 = 45.0;
const PITCH_LIMIT: f32 = 1.5;
const ORBIT_SPEED: f32 = 0.005;
const ZOOM_STEP: f32 = 0.1;

pub struct Camera {
    /// Horizontal angle in radians.
    pub yaw: f32,
    /// Vertical angle in radians, kept within ±1.5.
    pub pitch: f32,
    pub distance: f32,
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.2,
            distance: 10.0,
            target: Vec3::ZERO,
            min_distance: 0.5,
            max_distance: 60.0,
        }
    }

    /// Frame a rope spanning `span` world units and hanging around `center`.
    pub fn framing(center: Vec3, span: f32) -> Self {
        let mut camera = Self::new();
        camera.target = center;
        camera.distance = (span * 1.4).clamp(camera.min_distance, camera.max_distance);
        camera
    }

    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let far = (self.distance * 4.0).max(100.0);
        Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, 0.05, far) * self.view_matrix()
    }

    /// Rotate by a cursor drag of `delta` pixels.
    pub fn orbit(&mut self, delta: Vec2) {
        self.yaw -= delta.x * ORBIT_SPEED;
        self.pitch = (self.pitch + delta.y * ORBIT_SPEED).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Zoom by `lines` wheel lines; positive moves closer.
    pub fn zoom(&mut self, lines: f32) {
        let factor = (1.0 - ZOOM_STEP).powf(lines);
        self.distance = (self.distance * factor).clamp(self.min_distance, self.max_distance);
    }

    /// Screen-aligned right and up vectors projected onto the ground plane
    /// and the vertical axis, for moving things with the arrow keys.
    pub fn screen_axes(&self) -> (Vec3, Vec3) {
        let right = Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin());
        (right, Vec3::Y)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
