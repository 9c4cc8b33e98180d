//! Threshold rules turning a cycle's vitals into alerts.

use serde::{Deserialize, Serialize};

use crate::devices::AlertPattern;

pub const BP_LOW_MESSAGE: &str =
    "BP too low – Stay hydrated and consult a doctor if symptoms persist.";
pub const BP_HIGH_MESSAGE: &str = "BP too high – Relax and monitor again soon.";
pub const FALL_MESSAGE: &str = "Fall detected – Check surroundings and ensure safety.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertDescriptor {
    BpLow,
    BpHigh,
    Fall,
}

impl AlertDescriptor {
    pub fn recommendation(&self) -> &'static str {
        match self {
            AlertDescriptor::BpLow => BP_LOW_MESSAGE,
            AlertDescriptor::BpHigh => BP_HIGH_MESSAGE,
            AlertDescriptor::Fall => FALL_MESSAGE,
        }
    }

    pub fn pattern(&self) -> AlertPattern {
        match self {
            AlertDescriptor::BpLow | AlertDescriptor::BpHigh => AlertPattern::SHORT_DOUBLE,
            AlertDescriptor::Fall => AlertPattern::LONG_SINGLE,
        }
    }
}

/// Heart-rate band outside of which a BP warning is raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Below this is low.
    pub heart_rate_low: u32,
    /// Above this is high.
    pub heart_rate_high: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heart_rate_low: 60,
            heart_rate_high: 100,
        }
    }
}

/// Alerts raised in one cycle. The two branches are independent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlertOutcome {
    pub bp: Option<AlertDescriptor>,
    pub fall: Option<AlertDescriptor>,
}

impl AlertOutcome {
    pub fn bp_warning(&self) -> Option<&'static str> {
        self.bp.map(|a| a.recommendation())
    }

    pub fn fall_warning(&self) -> Option<&'static str> {
        self.fall.map(|a| a.recommendation())
    }

    /// BP alert first, then fall.
    pub fn descriptors(&self) -> impl Iterator<Item = AlertDescriptor> {
        self.bp.into_iter().chain(self.fall)
    }

    pub fn is_empty(&self) -> bool {
        self.bp.is_none() && self.fall.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, heart_rate: u32, fall_detected: bool) -> AlertOutcome {
        let bp = if heart_rate < self.thresholds.heart_rate_low {
            Some(AlertDescriptor::BpLow)
        } else if heart_rate > self.thresholds.heart_rate_high {
            Some(AlertDescriptor::BpHigh)
        } else {
            None
        };

        AlertOutcome {
            bp,
            fall: fall_detected.then_some(AlertDescriptor::Fall),
        }
    }
}
