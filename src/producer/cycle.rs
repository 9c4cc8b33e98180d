//! The fixed-delay sampling loop.
//!
//! Each cycle: read sensors -> derive vitals -> fall check -> alerts -> send.
//! Cycles never overlap. Sensor, serialization and send failures end the run;
//! actuator failures are logged and the cycle carries on.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::time::{sleep, timeout};

use super::alerts::{AlertDescriptor, AlertEvaluator};
use super::fall::FallDetector;
use super::link::TelemetryLink;
use super::vitals::{PlaceholderVitals, VitalsModel};
use crate::config::ProducerConfig;
use crate::devices::{Actuator, MotionSensor, Oximeter};
use crate::error::{Result, VitalinkError};
use crate::types::{SensorReading, TelemetryRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProducerState {
    Idle,
    Sampling,
    Evaluating,
    Transmitting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// `max_cycles` reached.
    CycleLimit,
    /// The shutdown future resolved.
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProducerSummary {
    pub cycles: u64,
    pub alerts: u64,
    pub stop: StopReason,
}

pub struct ProducerLoop {
    oximeter: Box<dyn Oximeter>,
    imu: Box<dyn MotionSensor>,
    actuator: Box<dyn Actuator>,
    vitals: Box<dyn VitalsModel>,
    detector: FallDetector,
    evaluator: AlertEvaluator,
    state: ProducerState,
    period: Duration,
    sensor_timeout: Duration,
    actuator_timeout: Duration,
    max_cycles: Option<u64>,
    cycles: u64,
    alerts: u64,
}

impl ProducerLoop {
    pub fn new(
        config: &ProducerConfig,
        oximeter: Box<dyn Oximeter>,
        imu: Box<dyn MotionSensor>,
        actuator: Box<dyn Actuator>,
    ) -> Self {
        Self {
            oximeter,
            imu,
            actuator,
            vitals: Box::new(PlaceholderVitals),
            detector: FallDetector::new(config.fall_threshold),
            evaluator: AlertEvaluator::new(config.thresholds),
            state: ProducerState::Idle,
            period: config.period(),
            sensor_timeout: config.sensor_timeout(),
            actuator_timeout: config.actuator_timeout(),
            max_cycles: config.max_cycles,
            cycles: 0,
            alerts: 0,
        }
    }

    /// Replace the heart-rate/SpO2 conversion.
    pub fn with_vitals_model(mut self, model: impl VitalsModel + 'static) -> Self {
        self.vitals = Box::new(model);
        self
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    /// Run until the cycle limit, a fatal error, or `shutdown` resolves.
    ///
    /// `shutdown` is honoured while sampling or waiting for the next cycle,
    /// never in the middle of a send. The actuator is released and the link
    /// closed on every path.
    pub async fn run_until<S, F>(mut self, mut link: TelemetryLink<S>, shutdown: F) -> Result<ProducerSummary>
    where
        S: AsyncWrite + Unpin + Send,
        F: Future<Output = ()>,
    {
        log::info!("[Producer] Streaming to {} every {:?}", link.peer(), self.period);

        tokio::pin!(shutdown);
        let result = self.run_cycles(&mut link, shutdown.as_mut()).await;

        if let Err(e) = self.actuator.release().await {
            log::warn!("[Producer] Failed to release actuator: {}", e);
        }
        if let Err(e) = link.close().await {
            log::warn!("[Producer] Failed to close link: {}", e);
        }
        self.state = ProducerState::Idle;

        match result {
            Ok(stop) => {
                if stop == StopReason::Interrupted {
                    log::info!("[Producer] Interrupted by user");
                }
                Ok(ProducerSummary {
                    cycles: self.cycles,
                    alerts: self.alerts,
                    stop,
                })
            }
            Err(e) => {
                log::error!("[Producer] Stopping after {} cycles: {}", self.cycles, e);
                Err(e)
            }
        }
    }

    async fn run_cycles<S, F>(&mut self, link: &mut TelemetryLink<S>, mut shutdown: Pin<&mut F>) -> Result<StopReason>
    where
        S: AsyncWrite + Unpin + Send,
        F: Future<Output = ()>,
    {
        loop {
            if self.limit_reached() {
                return Ok(StopReason::CycleLimit);
            }

            let prepared = tokio::select! {
                biased;
                _ = shutdown.as_mut() => None,
                record = self.prepare() => Some(record?),
            };
            let Some(record) = prepared else {
                return Ok(StopReason::Interrupted);
            };
            self.transmit(link, &record).await?;

            if self.limit_reached() {
                return Ok(StopReason::CycleLimit);
            }
            let interrupted = tokio::select! {
                biased;
                _ = shutdown.as_mut() => true,
                _ = sleep(self.period) => false,
            };
            if interrupted {
                return Ok(StopReason::Interrupted);
            }
        }
    }

    fn limit_reached(&self) -> bool {
        self.max_cycles.is_some_and(|max| self.cycles >= max)
    }

    /// One full sampling cycle. Returns the record that was sent.
    pub async fn cycle<S>(&mut self, link: &mut TelemetryLink<S>) -> Result<TelemetryRecord>
    where
        S: AsyncWrite + Unpin + Send,
    {
        let record = self.prepare().await?;
        self.transmit(link, &record).await?;
        Ok(record)
    }

    /// Sample, evaluate and actuate; everything in a cycle before the send.
    async fn prepare(&mut self) -> Result<TelemetryRecord> {
        self.state = ProducerState::Sampling;
        let reading = self.sample().await?;

        self.state = ProducerState::Evaluating;
        let fall_detected = self.detector.observe(reading.accel);
        let outcome = self.evaluator.evaluate(reading.heart_rate, fall_detected);
        for alert in outcome.descriptors() {
            self.actuate(alert).await;
        }

        let record = TelemetryRecord::from_reading(
            &reading,
            fall_detected,
            outcome.bp_warning(),
            outcome.fall_warning(),
        );
        log::info!(
            "[Producer] {} HR={} bpm SpO2={}% accel=({:.2}, {:.2}, {:.2}) gyro=({:.2}, {:.2}, {:.2}) fall={} BP warning: {} | Fall warning: {}",
            record.timestamp,
            record.heart_rate,
            record.spo2,
            record.accel_x,
            record.accel_y,
            record.accel_z,
            record.gyro_x,
            record.gyro_y,
            record.gyro_z,
            record.fall_detected,
            record.bp_warning_text(),
            record.fall_warning_text(),
        );
        Ok(record)
    }

    async fn transmit<S>(&mut self, link: &mut TelemetryLink<S>, record: &TelemetryRecord) -> Result<()>
    where
        S: AsyncWrite + Unpin + Send,
    {
        self.state = ProducerState::Transmitting;
        link.send(record).await?;
        log::debug!("[Producer] Record {} sent", link.records_sent());

        self.cycles += 1;
        self.state = ProducerState::Idle;
        Ok(())
    }

    async fn sample(&mut self) -> Result<SensorReading> {
        let sensor = self.oximeter.name();
        let optical = timeout(self.sensor_timeout, self.oximeter.read_optical())
            .await
            .map_err(|_| sensor_timed_out(sensor, self.sensor_timeout))?
            .map_err(|e| as_sensor_error(sensor, e))?;

        let sensor = self.imu.name();
        let motion = timeout(self.sensor_timeout, self.imu.read_motion())
            .await
            .map_err(|_| sensor_timed_out(sensor, self.sensor_timeout))?
            .map_err(|e| as_sensor_error(sensor, e))?;

        let vitals = self.vitals.convert(optical);
        Ok(SensorReading::new(vitals.heart_rate, vitals.spo2, motion))
    }

    async fn actuate(&mut self, alert: AlertDescriptor) {
        self.alerts += 1;
        match timeout(self.actuator_timeout, self.actuator.signal(alert.pattern())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("[Producer] {:?} alert not played: {}", alert, e),
            Err(_) => log::warn!(
                "[Producer] {:?} alert cut off after {:?}",
                alert,
                self.actuator_timeout
            ),
        }
    }
}

fn sensor_timed_out(sensor: &'static str, after: Duration) -> VitalinkError {
    VitalinkError::SensorUnavailable {
        sensor,
        reason: format!("no reading within {:?}", after),
    }
}

fn as_sensor_error(sensor: &'static str, err: VitalinkError) -> VitalinkError {
    match err {
        VitalinkError::SensorUnavailable { .. } => err,
        other => VitalinkError::SensorUnavailable {
            sensor,
            reason: other.to_string(),
        },
    }
}
