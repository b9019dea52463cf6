//! Joystick input adapter.
//!
//! The widgets report normalized deflection in [-1, 1] per axis. This adapter
//! is the only place that range is enforced; the store downstream trusts it.

use super::store::{AxisGroup, SharedControl};
use crate::config::LimitsConfig;

/// Clamp a raw stick value to [-1, 1]; NaN and infinities count as centered.
#[inline]
pub fn clamp_unit(raw: f32) -> f32 {
    if raw.is_finite() {
        raw.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Maps normalized stick deflection into the control store.
#[derive(Clone, Debug)]
pub struct InputAdapter {
    store: SharedControl,
    max_linear_mps: f32,
    max_angular_dps: f32,
}

impl InputAdapter {
    pub fn new(store: SharedControl, limits: &LimitsConfig) -> Self {
        Self {
            store,
            max_linear_mps: limits.max_linear_mps,
            max_angular_dps: limits.max_angular_dps,
        }
    }

    /// Planar stick: `x` forward drives `vx`, `y` right drives `vy`.
    pub fn planar(&self, x: f32, y: f32) {
        self.store.update(AxisGroup::Planar {
            vx: clamp_unit(x) * self.max_linear_mps,
            vy: clamp_unit(y) * self.max_linear_mps,
        });
    }

    /// Vertical slider drives `vz`.
    pub fn vertical(&self, v: f32) {
        self.store.update(AxisGroup::Vertical {
            vz: clamp_unit(v) * self.max_linear_mps,
        });
    }

    /// Attitude stick: pushing up is positive pitch, pushing right positive yaw.
    pub fn pitch_yaw(&self, x: f32, y: f32) {
        self.store.update(AxisGroup::PitchYaw {
            pitch: clamp_unit(y) * self.max_angular_dps,
            yaw: clamp_unit(x) * self.max_angular_dps,
        });
    }

    /// Roll slider drives `roll`.
    pub fn roll(&self, v: f32) {
        self.store.update(AxisGroup::Roll {
            roll: clamp_unit(v) * self.max_angular_dps,
        });
    }

    /// Release every stick.
    pub fn center(&self) {
        self.store.reset();
    }

    pub fn store(&self) -> &SharedControl {
        &self.store
    }
}
