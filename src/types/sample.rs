//! Outbound telemetry sample

use serde::{Deserialize, Serialize};

use super::{MotorPowers, Quaternion, Vector3};

/// One telemetry report: motor state plus orientation and motion readings.
///
/// Built by the control layer for each report and consumed once when the
/// Info packet is encoded. The packet number is not part of the sample; the
/// connection stamps it at send time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoSample {
    /// Current power of motors 1 through 4
    pub motors: MotorPowers,
    /// Acceleration along X, Y, Z
    pub acceleration: Vector3,
    /// Compass reading along X, Y, Z
    pub compass: Vector3,
    /// Gyroscope orientation
    pub orientation: Quaternion,
}

impl InfoSample {
    pub fn new(
        motors: impl Into<MotorPowers>,
        acceleration: impl Into<Vector3>,
        compass: impl Into<Vector3>,
        orientation: impl Into<Quaternion>,
    ) -> Self {
        Self {
            motors: motors.into(),
            acceleration: acceleration.into(),
            compass: compass.into(),
            orientation: orientation.into(),
        }
    }
}
