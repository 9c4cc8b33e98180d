//! Simulated and scripted devices.
//!
//! `SimulatedOximeter` and `SimulatedImu` let the producer run on a desk with
//! no sensors attached. The scripted variants replay fixed samples and then
//! report the sensor as gone, which is what the tests drive the loop with.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use super::{Actuator, AlertPattern, MotionSensor, Oximeter};
use crate::error::{Result, VitalinkError};
use crate::types::{MotionSample, OpticalSample, Vector3};

const GRAVITY: f64 = 9.81;

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Random photodiode counts.
///
/// Counts are shaped so that `ir mod 100` falls in 50..=105 and the
/// placeholder vitals model yields plausible numbers.
pub struct SimulatedOximeter {
    rng: StdRng,
}

impl SimulatedOximeter {
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: rng_from(seed) }
    }
}

#[async_trait]
impl Oximeter for SimulatedOximeter {
    async fn read_optical(&mut self) -> Result<OpticalSample> {
        let pulse: u32 = self.rng.gen_range(50..=99);
        let ir = self.rng.gen_range(400..600) * 100 + pulse;
        let red = ir - self.rng.gen_range(0..2_000);
        Ok(OpticalSample { ir, red })
    }

    fn name(&self) -> &'static str {
        "simulated-oximeter"
    }
}

/// IMU at rest under gravity with small noise, plus an optional impact spike.
pub struct SimulatedImu {
    rng: StdRng,
    cycle: u64,
    fall_at: Option<u64>,
}

impl SimulatedImu {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: rng_from(seed),
            cycle: 0,
            fall_at: None,
        }
    }

    /// Inject an impact on the given (zero-based) read.
    pub fn with_fall_at(mut self, cycle: u64) -> Self {
        self.fall_at = Some(cycle);
        self
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        self.rng.gen_range(-amplitude..=amplitude)
    }
}

#[async_trait]
impl MotionSensor for SimulatedImu {
    async fn read_motion(&mut self) -> Result<MotionSample> {
        let impact = self.fall_at == Some(self.cycle);
        self.cycle += 1;

        let accel = if impact {
            Vector3::new(
                self.noise(4.0) + 6.0,
                self.noise(4.0),
                GRAVITY * 2.5 + self.noise(1.0),
            )
        } else {
            Vector3::new(self.noise(0.05), self.noise(0.05), GRAVITY + self.noise(0.05))
        };
        let gyro = Vector3::new(self.noise(0.5), self.noise(0.5), self.noise(0.5));

        Ok(MotionSample { accel, gyro })
    }

    fn name(&self) -> &'static str {
        "simulated-imu"
    }
}

/// Replays queued samples, then reports the sensor unavailable.
pub struct ScriptedOximeter {
    samples: VecDeque<OpticalSample>,
}

impl ScriptedOximeter {
    pub fn new(samples: impl IntoIterator<Item = OpticalSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Oximeter for ScriptedOximeter {
    async fn read_optical(&mut self) -> Result<OpticalSample> {
        self.samples.pop_front().ok_or(VitalinkError::SensorUnavailable {
            sensor: "scripted-oximeter",
            reason: "script exhausted".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "scripted-oximeter"
    }
}

pub struct ScriptedImu {
    samples: VecDeque<MotionSample>,
}

impl ScriptedImu {
    pub fn new(samples: impl IntoIterator<Item = MotionSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    /// Acceleration-only script with a still gyroscope.
    pub fn from_accel(accel: impl IntoIterator<Item = Vector3>) -> Self {
        Self::new(accel.into_iter().map(|accel| MotionSample {
            accel,
            gyro: Vector3::default(),
        }))
    }
}

#[async_trait]
impl MotionSensor for ScriptedImu {
    async fn read_motion(&mut self) -> Result<MotionSample> {
        self.samples.pop_front().ok_or(VitalinkError::SensorUnavailable {
            sensor: "scripted-imu",
            reason: "script exhausted".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "scripted-imu"
    }
}

/// Actuator that only logs, for hosts without a buzzer.
#[derive(Default)]
pub struct LogActuator {
    signalled: Vec<AlertPattern>,
    released: bool,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signalled(&self) -> &[AlertPattern] {
        &self.signalled
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

#[async_trait]
impl Actuator for LogActuator {
    async fn signal(&mut self, pattern: AlertPattern) -> Result<()> {
        log::info!(
            "[Alert] buzz x{} ({} ms on / {} ms off)",
            pattern.pulses,
            pattern.on.as_millis(),
            pattern.off.as_millis()
        );
        self.signalled.push(pattern);
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_oximeter_is_seeded() {
        let mut a = SimulatedOximeter::new(Some(7));
        let mut b = SimulatedOximeter::new(Some(7));
        for _ in 0..5 {
            let sa = a.read_optical().await.unwrap();
            let sb = b.read_optical().await.unwrap();
            assert_eq!(sa, sb);
            assert!(sa.red <= sa.ir);
            assert!((50..=99).contains(&(sa.ir % 100)));
        }
    }

    #[tokio::test]
    async fn test_simulated_imu_injects_fall() {
        let mut imu = SimulatedImu::new(Some(1)).with_fall_at(2);
        let quiet = imu.read_motion().await.unwrap().accel.magnitude();
        imu.read_motion().await.unwrap();
        let impact = imu.read_motion().await.unwrap().accel.magnitude();
        assert!((quiet - GRAVITY).abs() < 0.2);
        assert!(impact - quiet > 2.5);
    }

    #[tokio::test]
    async fn test_scripted_sensor_runs_dry() {
        let mut oxi = ScriptedOximeter::new([OpticalSample { ir: 1, red: 1 }]);
        assert!(oxi.read_optical().await.is_ok());
        assert!(matches!(
            oxi.read_optical().await,
            Err(VitalinkError::SensorUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_log_actuator_records_patterns() {
        let mut actuator = LogActuator::new();
        actuator.signal(AlertPattern::SHORT_DOUBLE).await.unwrap();
        actuator.signal(AlertPattern::LONG_SINGLE).await.unwrap();
        actuator.release().await.unwrap();
        assert_eq!(
            actuator.signalled(),
            &[AlertPattern::SHORT_DOUBLE, AlertPattern::LONG_SINGLE]
        );
        assert!(actuator.is_released());
    }
}
