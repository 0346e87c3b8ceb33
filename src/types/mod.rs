//! Value types exchanged with the controller.
//!
//! - [`InfoSample`] is what the robot reports: four motor powers plus
//!   acceleration, compass and orientation readings.
//! - [`Command`] is what the controller sends back: four motor powers.
//! - [`PacketNumber`] orders packets; see [`crate::sequencer`].
//!
//! Both samples and commands are plain `Copy` values. Nothing in the crate
//! retains one after it has been encoded or delivered.

mod command;
mod report_rate;
mod sample;
mod vector;

pub use command::{Command, MotorPowers};
pub use report_rate::ReportRate;
pub use sample::InfoSample;
pub use vector::{Quaternion, Vector3};

/// Packet ordering number carried by Info and Command packets.
pub type PacketNumber = i64;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn motors_are_numbered_from_one() {
        let command = Command::new(100, -50, 0, 255);
        assert_eq!(command.motor(1), Some(100));
        assert_eq!(command.motor(2), Some(-50));
        assert_eq!(command.motor(4), Some(255));
        assert_eq!(command.motor(0), None);
        assert_eq!(command.motor(5), None);
    }

    #[test]
    fn motor_powers_display() {
        assert_eq!(MotorPowers::new(1, -2, 3, -4).to_string(), "[1, -2, 3, -4]");
    }

    #[test]
    fn sample_from_tuples() {
        let sample = InfoSample::new(
            [1, 2, 3, 4],
            (0.1, 0.2, 9.8),
            (1.0, 0.0, 0.0),
            (0.0, 0.0, 0.0, 1.0),
        );
        assert_eq!(sample.motors.as_array(), [1, 2, 3, 4]);
        assert_eq!(sample.acceleration.z, 9.8);
        assert_eq!(sample.orientation, Quaternion::IDENTITY);
    }

    #[test]
    fn default_sample_has_identity_orientation() {
        let sample = InfoSample::default();
        assert_eq!(sample.motors, MotorPowers::default());
        assert_eq!(sample.orientation.w, 1.0);
    }

    #[test]
    fn report_rate_intervals() {
        assert_eq!(ReportRate::Immediate.interval(), None);
        assert_eq!(ReportRate::Hz(0).interval(), None);
        assert_eq!(ReportRate::Hz(10).interval(), Some(Duration::from_millis(100)));
        assert_eq!(ReportRate::default(), ReportRate::Hz(20));
    }
}
