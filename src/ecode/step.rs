//! Square-pulse (step) eCode.
//!
//! The current sits at the holding level, jumps to `hypamp + amp` at `ton`
//! and back at `toff`. Onset/offset are detected at half of the maximum
//! deviation of the smoothed trace from the holding current; the amplitude
//! is the plateau median, which is insensitive to spikes bleeding into the
//! current channel.
use anyhow::{bail, ensure, Result};
use log::warn;
use ndarray::Array1;

use crate::signal::{base_current, smooth};

use super::{sampling_interval, time_axis, time_index, StimOverrides, StimParams, SMOOTH_WIDTH};

/// Fallback onset when detection fails and no metadata is given.
const DEFAULT_TON_MS: f64 = 250.0;
/// Fallback offset when detection fails and no metadata is given.
const DEFAULT_TOFF_MS: f64 = 1250.0;
/// Smallest deviation from holding considered a real step.
const MIN_STEP_DEVIATION: f64 = 1e-4;

/// Recover step parameters from a recorded current trace.
pub fn interpret(
    protocol_name: &str,
    t: &Array1<f64>,
    current: Option<&Array1<f64>>,
    overrides: &StimOverrides,
) -> Result<StimParams> {
    let dt = sampling_interval(t)?;
    let n = t.len();
    let smoothed = current.map(|c| smooth(c, SMOOTH_WIDTH));

    let hypamp = match (overrides.hypamp, current) {
        (Some(v), _) => v,
        (None, Some(c)) => base_current(c),
        (None, None) => bail!(
            "protocol {protocol_name}: no current trace and no 'hypamp' in the metadata"
        ),
    };

    let window = smoothed.as_ref().and_then(|s| detect_window(s, hypamp));

    let ton_idx = match overrides.ton {
        Some(ms) => time_index(ms, dt, n)?,
        None => match &window {
            Some(w) => w.onset,
            None => {
                warn!(
                    "as ton was not specified for protocol {protocol_name} and no step \
                     was detected, it will be set to {DEFAULT_TON_MS} ms"
                );
                time_index(DEFAULT_TON_MS, dt, n)?
            }
        },
    };

    let toff_idx = match overrides.toff {
        Some(ms) => time_index(ms, dt, n)?,
        None => match &window {
            Some(w) => w.offset,
            None => {
                warn!(
                    "as toff was not specified for protocol {protocol_name} and no step \
                     was detected, it will be set to {DEFAULT_TOFF_MS} ms"
                );
                time_index(DEFAULT_TOFF_MS, dt, n)?
            }
        },
    };
    ensure!(
        ton_idx <= toff_idx,
        "protocol {protocol_name}: stimulus onset ({ton_idx}) is after its offset ({toff_idx})"
    );

    let amp = match (overrides.amp, &smoothed) {
        (Some(v), _) => v,
        (None, Some(s)) => plateau_amplitude(s, hypamp, ton_idx, toff_idx),
        (None, None) => bail!(
            "protocol {protocol_name}: no current trace and no 'amp' in the metadata"
        ),
    };

    Ok(StimParams {
        ton: t[ton_idx],
        toff: t[toff_idx],
        tend: n as f64 * dt,
        amp,
        hypamp,
        dt,
    })
}

/// Rebuild the clean step stimulus from its parameters.
pub fn generate(params: &StimParams) -> (Array1<f64>, Array1<f64>) {
    let t = time_axis(params.tend, params.dt);
    let ton_idx = (params.ton / params.dt).round() as usize;
    let toff_idx = (params.toff / params.dt).round() as usize;

    let mut current = Array1::from_elem(t.len(), params.hypamp);
    for i in ton_idx..toff_idx.min(t.len()) {
        current[i] += params.amp;
    }
    (t, current)
}

pub(super) struct DetectedWindow {
    pub onset: usize,
    pub offset: usize,
}

/// Half-maximum threshold detection on the smoothed deviation from holding.
///
/// Returns `None` when the trace never deviates enough from the holding
/// current to look like a stimulus.
pub(super) fn detect_window(smoothed: &Array1<f64>, hypamp: f64) -> Option<DetectedWindow> {
    let max_dev = smoothed
        .iter()
        .map(|&v| (v - hypamp).abs())
        .fold(0.0_f64, f64::max);
    if max_dev < MIN_STEP_DEVIATION {
        return None;
    }

    let threshold = max_dev / 2.0;
    let mut onset = None;
    let mut last_active = None;
    for (i, &v) in smoothed.iter().enumerate() {
        if (v - hypamp).abs() >= threshold {
            if onset.is_none() {
                onset = Some(i);
            }
            last_active = Some(i);
        }
    }
    let onset = onset?;
    // First sample back at holding; clamped for stimuli running to the end.
    let offset = (last_active? + 1).min(smoothed.len() - 1);
    Some(DetectedWindow { onset, offset })
}

/// Median deviation from holding over the active window.
fn plateau_amplitude(smoothed: &Array1<f64>, hypamp: f64, ton_idx: usize, toff_idx: usize) -> f64 {
    let mut dev: Vec<f64> = smoothed
        .iter()
        .skip(ton_idx)
        .take(toff_idx.saturating_sub(ton_idx))
        .map(|&v| v - hypamp)
        .collect();
    if dev.is_empty() {
        return 0.0;
    }
    dev.sort_by(|a, b| a.total_cmp(b));
    dev[dev.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_step(n: usize, dt: f64, ton_idx: usize, toff_idx: usize, hypamp: f64, amp: f64) -> (Array1<f64>, Array1<f64>) {
        let t = Array1::from_shape_fn(n, |i| i as f64 * dt);
        let current = Array1::from_shape_fn(n, |i| {
            if i >= ton_idx && i < toff_idx { hypamp + amp } else { hypamp }
        });
        (t, current)
    }

    #[test]
    fn detects_onset_offset_and_amplitude() {
        let (t, current) = clean_step(20_000, 0.1, 5000, 12_000, -0.02, 0.15);
        let params =
            interpret("IDRest", &t, Some(&current), &StimOverrides::default()).unwrap();
        approx::assert_abs_diff_eq!(params.ton, 500.0, epsilon = 0.2);
        approx::assert_abs_diff_eq!(params.toff, 1200.0, epsilon = 0.2);
        approx::assert_abs_diff_eq!(params.amp, 0.15, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(params.hypamp, -0.02, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(params.dt, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn metadata_overrides_win_over_detection() {
        let (t, current) = clean_step(20_000, 0.1, 5000, 15_000, 0.0, 0.1);
        let overrides = StimOverrides {
            ton: Some(400.0),
            toff: Some(1600.0),
            amp: Some(0.42),
            hypamp: Some(0.01),
        };
        let params = interpret("IDRest", &t, Some(&current), &overrides).unwrap();
        approx::assert_abs_diff_eq!(params.ton, 400.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(params.toff, 1600.0, epsilon = 1e-9);
        assert_eq!(params.amp, 0.42);
        assert_eq!(params.hypamp, 0.01);
    }

    #[test]
    fn flat_trace_falls_back_with_defaults() {
        let t = Array1::from_shape_fn(20_000, |i| i as f64 * 0.1);
        let current = Array1::from_elem(20_000, 0.03_f64);
        let params =
            interpret("IDRest", &t, Some(&current), &StimOverrides::default()).unwrap();
        approx::assert_abs_diff_eq!(params.ton, DEFAULT_TON_MS, epsilon = 0.2);
        approx::assert_abs_diff_eq!(params.toff, DEFAULT_TOFF_MS, epsilon = 0.2);
        approx::assert_abs_diff_eq!(params.hypamp, 0.03, epsilon = 1e-9);
    }

    #[test]
    fn fallback_outside_short_trace_is_an_error() {
        // 100 samples at 0.1 ms = 10 ms trace; the 250 ms fallback cannot fit.
        let t = Array1::from_shape_fn(100, |i| i as f64 * 0.1);
        let current = Array1::from_elem(100, 0.0_f64);
        assert!(interpret("IDRest", &t, Some(&current), &StimOverrides::default()).is_err());
    }

    #[test]
    fn missing_current_needs_full_metadata() {
        let t = Array1::from_shape_fn(20_000, |i| i as f64 * 0.1);
        let partial = StimOverrides { ton: Some(100.0), toff: Some(200.0), ..Default::default() };
        assert!(interpret("IDRest", &t, None, &partial).is_err());

        let full = StimOverrides {
            ton: Some(100.0),
            toff: Some(200.0),
            amp: Some(0.1),
            hypamp: Some(0.0),
        };
        let params = interpret("IDRest", &t, None, &full).unwrap();
        assert_eq!(params.amp, 0.1);
    }

    #[test]
    fn generate_is_flat_outside_window() {
        let params = StimParams {
            ton: 100.0,
            toff: 300.0,
            tend: 500.0,
            amp: 0.2,
            hypamp: -0.05,
            dt: 0.5,
        };
        let (t, current) = generate(&params);
        assert_eq!(t.len(), current.len());
        for (i, (&time, &c)) in t.iter().zip(current.iter()).enumerate() {
            if time < 100.0 || time >= 300.0 {
                assert_eq!(c, -0.05, "sample {i} at {time} ms");
            } else {
                approx::assert_abs_diff_eq!(c, 0.15, epsilon = 1e-12);
            }
        }
    }
}
