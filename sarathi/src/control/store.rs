//! Shared control state between the input thread and the control link.
//!
//! The six fields are only ever written and read as a unit under one lock, so
//! the link thread can never observe a half-applied stick update (e.g. a new
//! `vx` paired with a stale `vy`).

use parking_lot::Mutex;
use std::sync::Arc;

/// Current motion intent.
///
/// Linear velocities are in m/s, angular rates in deg/s.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlVector {
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl ControlVector {
    pub const ZERO: Self = Self {
        vx: 0.0,
        vy: 0.0,
        vz: 0.0,
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };

    pub fn new(vx: f32, vy: f32, vz: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            vx,
            vy,
            vz,
            roll,
            pitch,
            yaw,
        }
    }
}

/// Subset of the control vector written by one stick, in physical units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisGroup {
    /// Planar translation stick: `vx`, `vy`
    Planar { vx: f32, vy: f32 },
    /// Vertical slider: `vz`
    Vertical { vz: f32 },
    /// Attitude stick: `pitch`, `yaw`
    PitchYaw { pitch: f32, yaw: f32 },
    /// Roll slider: `roll`
    Roll { roll: f32 },
}

/// Lock-guarded control vector.
///
/// No range checks happen here: the store holds whatever was last written.
#[derive(Debug, Default)]
pub struct ControlStateStore {
    vector: Mutex<ControlVector>,
}

/// Store handle shared between the input side and the link thread.
pub type SharedControl = Arc<ControlStateStore>;

impl ControlStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already wrapped for sharing.
    pub fn shared() -> SharedControl {
        Arc::new(Self::new())
    }

    /// Overwrite the fields belonging to one axis group.
    pub fn update(&self, group: AxisGroup) {
        let mut v = self.vector.lock();
        match group {
            AxisGroup::Planar { vx, vy } => {
                v.vx = vx;
                v.vy = vy;
            }
            AxisGroup::Vertical { vz } => v.vz = vz,
            AxisGroup::PitchYaw { pitch, yaw } => {
                v.pitch = pitch;
                v.yaw = yaw;
            }
            AxisGroup::Roll { roll } => v.roll = roll,
        }
    }

    /// Overwrite the whole vector.
    pub fn set(&self, vector: ControlVector) {
        *self.vector.lock() = vector;
    }

    /// Zero every axis.
    pub fn reset(&self) {
        self.set(ControlVector::ZERO);
    }

    /// Copy of the full vector taken under the lock.
    pub fn snapshot(&self) -> ControlVector {
        *self.vector.lock()
    }
}
