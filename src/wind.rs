//! A smoothly varying wind source that publishes on a [`ForceBus`].

use glam::Vec3;

use crate::force::ForceBus;

/// Periodic gusting wind.
///
/// The published force is `direction * strength * envelope(t)` plus a small
/// crosswind wobble, where the envelope swings between `calm` and 1.
#[derive(Clone, Debug)]
pub struct Gust {
    direction: Vec3,
    strength: f32,
    calm: f32,
    frequency: f32,
    wobble: f32,
    enabled: bool,
    time: f32,
}

impl Gust {
    /// Wind blowing along `direction`. A zero direction yields no wind.
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            strength: 0.02,
            calm: 0.2,
            frequency: 0.7,
            wobble: 0.25,
            enabled: true,
            time: 0.0,
        }
    }

    /// Peak force per node.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.max(0.0);
        self
    }

    /// Fraction of the peak still blowing at the quietest point, `0..=1`.
    pub fn with_calm(mut self, calm: f32) -> Self {
        self.calm = calm.clamp(0.0, 1.0);
        self
    }

    /// Gust cycles per second.
    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency.max(0.0);
        self
    }

    /// Relative size of the crosswind component.
    pub fn with_wobble(mut self, wobble: f32) -> Self {
        self.wobble = wobble.max(0.0);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        log::debug!("wind {}", if self.enabled { "on" } else { "off" });
        self.enabled
    }

    /// Wind force at time `t` seconds.
    pub fn force_at(&self, t: f32) -> Vec3 {
        let phase = t * self.frequency * std::f32::consts::TAU;
        let envelope = self.calm + (1.0 - self.calm) * (0.5 + 0.5 * phase.sin());
        let cross = self.direction.cross(Vec3::Y).normalize_or_zero();
        let sway = cross * self.wobble * (phase * 1.7).sin();
        (self.direction + sway) * self.strength * envelope
    }

    /// Advance by `dt` and publish the current force. Returns the force sent,
    /// or `None` while disabled.
    pub fn blow(&mut self, dt: f32, bus: &ForceBus) -> Option<Vec3> {
        if dt.is_finite() && dt > 0.0 {
            self.time += dt;
        }
        if !self.enabled {
            return None;
        }
        let force = self.force_at(self.time);
        bus.publish(force);
        Some(force)
    }
}

impl Default for Gust {
    fn default() -> Self {
        Self::new(Vec3::Z)
    }
}
