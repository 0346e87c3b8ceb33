//! Inbound motor commands

use serde::{Deserialize, Serialize};
use std::fmt;

/// Power values for the robot's four motors, in wire order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MotorPowers(pub [i32; 4]);

impl MotorPowers {
    pub const fn new(motor1: i32, motor2: i32, motor3: i32, motor4: i32) -> Self {
        Self([motor1, motor2, motor3, motor4])
    }

    /// Power of motor `n`, numbered from 1 as on the robot.
    pub fn motor(&self, n: usize) -> Option<i32> {
        n.checked_sub(1).and_then(|index| self.0.get(index)).copied()
    }

    pub fn as_array(&self) -> [i32; 4] {
        self.0
    }
}

impl From<[i32; 4]> for MotorPowers {
    fn from(values: [i32; 4]) -> Self {
        Self(values)
    }
}

impl fmt::Display for MotorPowers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [m1, m2, m3, m4] = self.0;
        write!(f, "[{m1}, {m2}, {m3}, {m4}]")
    }
}

/// A decoded actuation instruction from the controller.
///
/// Ownership passes to the command handler; the connection keeps nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub motors: MotorPowers,
}

impl Command {
    pub const fn new(motor1: i32, motor2: i32, motor3: i32, motor4: i32) -> Self {
        Self { motors: MotorPowers::new(motor1, motor2, motor3, motor4) }
    }

    pub fn motor(&self, n: usize) -> Option<i32> {
        self.motors.motor(n)
    }
}

impl From<MotorPowers> for Command {
    fn from(motors: MotorPowers) -> Self {
        Self { motors }
    }
}
