//! Hardware capabilities used by the producer loop.
//!
//! Sensors and the alert actuator are external collaborators; the loop only
//! sees these traits. Implementations:
//! - `simulated` - seedable stand-ins and scripted doubles, no hardware needed
//! - `buzzer` - Linux sysfs GPIO buzzer

pub mod buzzer;
pub mod simulated;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{MotionSample, OpticalSample};

pub use buzzer::SysfsBuzzer;
pub use simulated::{LogActuator, ScriptedImu, ScriptedOximeter, SimulatedImu, SimulatedOximeter};

/// Pulse oximeter: raw IR and red photodiode counts.
#[async_trait]
pub trait Oximeter: Send {
    async fn read_optical(&mut self) -> Result<OpticalSample>;

    fn name(&self) -> &'static str {
        "oximeter"
    }
}

/// Accelerometer + gyroscope.
#[async_trait]
pub trait MotionSensor: Send {
    async fn read_motion(&mut self) -> Result<MotionSample>;

    fn name(&self) -> &'static str {
        "imu"
    }
}

/// Physical alert output (buzzer, vibration motor, LED...).
#[async_trait]
pub trait Actuator: Send {
    /// Play a pattern. Returns once the pattern has finished.
    async fn signal(&mut self, pattern: AlertPattern) -> Result<()>;

    /// Drive the output to its idle state and give the hardware back.
    async fn release(&mut self) -> Result<()>;
}

/// On/off pulse train played by an actuator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertPattern {
    pub pulses: u8,
    pub on: Duration,
    pub off: Duration,
}

impl AlertPattern {
    /// Two brief pulses (blood-pressure warnings).
    pub const SHORT_DOUBLE: AlertPattern = AlertPattern {
        pulses: 2,
        on: Duration::from_millis(300),
        off: Duration::from_millis(300),
    };

    /// One extended pulse (fall).
    pub const LONG_SINGLE: AlertPattern = AlertPattern {
        pulses: 1,
        on: Duration::from_secs(1),
        off: Duration::from_secs(1),
    };

    pub fn total_duration(&self) -> Duration {
        (self.on + self.off) * u32::from(self.pulses)
    }
}
