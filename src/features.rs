//! Feature-engine boundary.
//!
//! The engine that turns a windowed trace into named scalar features is an
//! external collaborator; [`FeatureEngine`] mirrors its settings/compute
//! surface. Settings travel with the call (through a `&mut` engine handed to
//! each extraction pass) instead of living in process-wide state, so one
//! cell's pass cannot leak configuration into another's.
//!
//! [`SpikeFeatureEngine`] is the built-in implementation: threshold-crossing
//! spike detection plus a small set of common timing/voltage features.
//! Unknown feature names yield `None`, never an error.
use std::collections::HashMap;

use anyhow::Result;
use ndarray::ArrayView1;

/// A windowed trace handed to the feature engine.
pub struct EfelTrace<'a> {
    /// Time vector (ms).
    pub t: ArrayView1<'a, f64>,
    /// Voltage trace (mV).
    pub v: ArrayView1<'a, f64>,
    /// Stimulus start times (ms); the first entry bounds the feature window.
    pub stim_start: Vec<f64>,
    /// Stimulus end times (ms).
    pub stim_end: Vec<f64>,
}

/// The feature-computation contract.
///
/// `feature_values` returns, per trace, a map from feature name to the raw
/// per-event value series; `None` marks a feature the engine could not
/// define for that trace.
pub trait FeatureEngine {
    fn set_double_setting(&mut self, name: &str, value: f64);
    fn set_int_setting(&mut self, name: &str, value: i64);
    fn set_threshold(&mut self, value: f64);
    fn feature_values(
        &mut self,
        traces: &[EfelTrace<'_>],
        feature_names: &[&str],
        raise_warnings: bool,
    ) -> Result<Vec<HashMap<String, Option<Vec<f64>>>>>;
}

/// Built-in spike-based feature engine.
#[derive(Debug, Clone)]
pub struct SpikeFeatureEngine {
    threshold: f64,
    strict_stiminterval: bool,
    double_settings: HashMap<String, f64>,
    int_settings: HashMap<String, i64>,
}

impl Default for SpikeFeatureEngine {
    fn default() -> Self {
        SpikeFeatureEngine {
            threshold: -20.0,
            strict_stiminterval: true,
            double_settings: HashMap::new(),
            int_settings: HashMap::new(),
        }
    }
}

impl SpikeFeatureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value stored for a named double setting.
    pub fn double_setting(&self, name: &str) -> Option<f64> {
        self.double_settings.get(name).copied()
    }

    /// Last value stored for a named integer setting.
    pub fn int_setting(&self, name: &str) -> Option<i64> {
        self.int_settings.get(name).copied()
    }

    fn compute(&self, trace: &EfelTrace<'_>, name: &str) -> Option<Vec<f64>> {
        let start = trace.stim_start.first().copied()?;
        let end = trace.stim_end.first().copied()?;
        let peaks = self.detect_peaks(trace, start, end);

        match name {
            "peak_time" => Some(peaks.iter().map(|&i| trace.t[i]).collect()),
            "peak_voltage" => {
                if peaks.is_empty() {
                    None
                } else {
                    Some(peaks.iter().map(|&i| trace.v[i]).collect())
                }
            }
            "time_to_first_spike" => {
                peaks.first().map(|&i| vec![trace.t[i] - start])
            }
            "mean_frequency" => {
                if peaks.is_empty() || end <= start {
                    None
                } else {
                    // Spikes per second over the stimulus window (times in ms).
                    Some(vec![peaks.len() as f64 / (end - start) * 1e3])
                }
            }
            "voltage_base" => {
                let vals: Vec<f64> = trace
                    .t
                    .iter()
                    .zip(trace.v.iter())
                    .filter(|(&t, _)| t < start)
                    .map(|(_, &v)| v)
                    .collect();
                mean_of(&vals).map(|m| vec![m])
            }
            "steady_state_voltage_stimend" => {
                // Mean voltage over the last 10 % of the stimulus window.
                let tail_start = end - 0.1 * (end - start);
                let vals: Vec<f64> = trace
                    .t
                    .iter()
                    .zip(trace.v.iter())
                    .filter(|(&t, _)| t >= tail_start && t < end)
                    .map(|(_, &v)| v)
                    .collect();
                mean_of(&vals).map(|m| vec![m])
            }
            _ => None,
        }
    }

    /// Indices of spike peaks: upward threshold crossing, then the voltage
    /// maximum until the trace falls back below threshold.
    fn detect_peaks(&self, trace: &EfelTrace<'_>, start: f64, end: f64) -> Vec<usize> {
        let mut peaks = Vec::new();
        let mut above = false;
        let mut peak_idx = 0usize;
        let mut peak_v = f64::NEG_INFINITY;

        for (i, (&t, &v)) in trace.t.iter().zip(trace.v.iter()).enumerate() {
            if self.strict_stiminterval && (t < start || t > end) {
                continue;
            }
            if v >= self.threshold {
                if !above {
                    above = true;
                    peak_idx = i;
                    peak_v = v;
                } else if v > peak_v {
                    peak_idx = i;
                    peak_v = v;
                }
            } else if above {
                above = false;
                peaks.push(peak_idx);
                peak_v = f64::NEG_INFINITY;
            }
        }
        if above {
            peaks.push(peak_idx);
        }
        peaks
    }
}

impl FeatureEngine for SpikeFeatureEngine {
    fn set_double_setting(&mut self, name: &str, value: f64) {
        self.double_settings.insert(name.to_string(), value);
    }

    fn set_int_setting(&mut self, name: &str, value: i64) {
        if name == "strict_stiminterval" {
            self.strict_stiminterval = value != 0;
        }
        self.int_settings.insert(name.to_string(), value);
    }

    fn set_threshold(&mut self, value: f64) {
        self.threshold = value;
    }

    fn feature_values(
        &mut self,
        traces: &[EfelTrace<'_>],
        feature_names: &[&str],
        _raise_warnings: bool,
    ) -> Result<Vec<HashMap<String, Option<Vec<f64>>>>> {
        Ok(traces
            .iter()
            .map(|trace| {
                feature_names
                    .iter()
                    .map(|&name| (name.to_string(), self.compute(trace, name)))
                    .collect()
            })
            .collect())
    }
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
