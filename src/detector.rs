//! Threshold-based anomaly detection for power readings.
//!
//! A reading is anomalous when its voltage strays more than
//! [`VOLTAGE_TOLERANCE`] volts from nominal, its current exceeds the
//! configured limit, or its frequency leaves [`FREQUENCY_BAND`]. Anomalies
//! are then graded by how far voltage and current overshoot. The detector is
//! pure; persisting the resulting alert is the caller's job.

use std::ops::RangeInclusive;

use crate::models::{NewPowerReading, Severity};

/// Absolute voltage deviation (volts) tolerated around nominal.
pub const VOLTAGE_TOLERANCE: f64 = 10.0;

/// Acceptable mains frequency in hertz, bounds included.
pub const FREQUENCY_BAND: RangeInclusive<f64> = 45.0..=65.0;

/// Detector thresholds, loaded once into [`crate::Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Nominal line voltage in volts.
    pub nominal_voltage: f64,
    /// Current limit in amperes.
    pub current_limit: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            nominal_voltage: 230.0,
            current_limit: 100.0,
        }
    }
}

/// Classification of an anomalous reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Evaluate one reading. `None` means the reading is within limits.
    pub fn evaluate(&self, reading: &NewPowerReading) -> Option<Anomaly> {
        // ---
        let mut issues = Vec::new();

        if self.voltage_deviation(reading.voltage) > VOLTAGE_TOLERANCE {
            issues.push(format!("Voltage deviation: {:?}V", reading.voltage));
        }
        if reading.current > self.config.current_limit {
            issues.push(format!("High current: {:?}A", reading.current));
        }
        if !FREQUENCY_BAND.contains(&reading.frequency) {
            issues.push(format!("Frequency issue: {:?}Hz", reading.frequency));
        }

        if issues.is_empty() {
            return None;
        }

        Some(Anomaly {
            severity: self.severity(reading),
            description: format!("Issues detected: {}", issues.join("; ")),
        })
    }

    /// Grade an anomalous reading. Every tier uses strict `>`.
    fn severity(&self, reading: &NewPowerReading) -> Severity {
        // ---
        let deviation_pct =
            self.voltage_deviation(reading.voltage) / self.config.nominal_voltage * 100.0;
        let limit = self.config.current_limit;

        if deviation_pct > 20.0 || reading.current > limit * 1.5 {
            Severity::Critical
        } else if deviation_pct > 15.0 || reading.current > limit * 1.2 {
            Severity::High
        } else if deviation_pct > 10.0 || reading.current > limit {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    fn voltage_deviation(&self, voltage: f64) -> f64 {
        (voltage - self.config.nominal_voltage).abs()
    }
}
