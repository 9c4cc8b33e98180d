//! Fall heuristic over consecutive acceleration vectors.

use crate::types::Vector3;

/// Default magnitude jump (device units) that counts as a fall.
pub const DEFAULT_FALL_THRESHOLD: f64 = 2.5;

/// What the detector carries between cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FallDetectorState {
    pub previous: Option<Vector3>,
}

#[derive(Clone, Debug)]
pub struct FallDetector {
    state: FallDetectorState,
    threshold: f64,
}

impl FallDetector {
    pub fn new(threshold: f64) -> Self {
        Self::with_state(FallDetectorState::default(), threshold)
    }

    /// Resume from a previously captured state.
    pub fn with_state(state: FallDetectorState, threshold: f64) -> Self {
        Self { state, threshold }
    }

    /// Feed one acceleration vector. Returns true when the magnitude changed by
    /// strictly more than the threshold since the previous call. The first call
    /// only records the baseline.
    pub fn observe(&mut self, accel: Vector3) -> bool {
        let previous = self.state.previous.replace(accel);
        match previous {
            None => false,
            Some(prev) => (accel.magnitude() - prev.magnitude()).abs() > self.threshold,
        }
    }

    pub fn state(&self) -> FallDetectorState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = FallDetectorState::default();
    }
}

impl Default for FallDetector {
    fn default() -> Self {
        Self::new(DEFAULT_FALL_THRESHOLD)
    }
}
