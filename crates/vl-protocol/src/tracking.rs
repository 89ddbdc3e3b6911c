//! Tracking pose payloads carried by `trackingData` frames

use serde::{Deserialize, Serialize};

/// Position and orientation of one tracked device.
///
/// `quat` uses the scalar-last convention `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters
    pub pos: [f64; 3],
    /// Orientation as a unit quaternion, scalar last
    pub quat: [f64; 4],
}

impl Pose {
    /// Pose at the origin with identity orientation
    pub const IDENTITY: Pose = Pose {
        pos: [0.0, 0.0, 0.0],
        quat: [0.0, 0.0, 0.0, 1.0],
    };

    /// Create a new pose
    pub fn new(pos: [f64; 3], quat: [f64; 4]) -> Self {
        Self { pos, quat }
    }

    /// Position component
    pub fn position(&self) -> [f64; 3] {
        self.pos
    }

    /// Orientation component `[x, y, z, w]`
    pub fn orientation(&self) -> [f64; 4] {
        self.quat
    }

    /// Whether the orientation has unit length within `epsilon`
    pub fn is_unit_quaternion(&self, epsilon: f64) -> bool {
        let norm_sq: f64 = self.quat.iter().map(|c| c * c).sum();
        (norm_sq.sqrt() - 1.0).abs() <= epsilon
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Head-mounted display pose plus any number of tracker poses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    /// Headset pose
    pub hmd: Pose,
    /// Additional trackers (controllers, gloves, pucks)
    pub trackers: Vec<Pose>,
}

impl TrackingState {
    /// Number of trackers reported alongside the headset
    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }
}
