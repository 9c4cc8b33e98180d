//! Conversion from raw oximeter counts to heart rate and SpO2.
//!
//! The only model shipped is a placeholder. It is not a physiological
//! algorithm; a calibrated model plugs in through `VitalsModel`.

use crate::types::OpticalSample;

/// Derived vitals for one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vitals {
    pub heart_rate: u32,
    pub spo2: u32,
}

pub trait VitalsModel: Send {
    fn convert(&self, sample: OpticalSample) -> Vitals;
}

/// `heart_rate = ir mod 100`, `spo2 = 95 + ((red - ir) mod 5)` (euclidean modulo).
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderVitals;

impl VitalsModel for PlaceholderVitals {
    fn convert(&self, sample: OpticalSample) -> Vitals {
        let heart_rate = sample.ir % 100;
        let diff = i64::from(sample.red) - i64::from(sample.ir);
        let spo2 = 95 + diff.rem_euclid(5) as u32;
        Vitals { heart_rate, spo2 }
    }
}
