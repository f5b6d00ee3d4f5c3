//! Ramp eCode.
//!
//! The current rises linearly from the holding level at `ton` to
//! `hypamp + amp` at `toff`, then drops back to holding. Because the rise is
//! gradual, onset detection uses a low fraction of the peak deviation and
//! the offset is taken at the deviation maximum.
use anyhow::{bail, ensure, Result};
use log::warn;
use ndarray::Array1;

use crate::signal::{base_current, smooth};

use super::{sampling_interval, time_axis, time_index, StimOverrides, StimParams, SMOOTH_WIDTH};

/// Fallback onset when detection fails and no metadata is given.
const DEFAULT_TON_MS: f64 = 250.0;
/// Fallback offset when detection fails and no metadata is given.
const DEFAULT_TOFF_MS: f64 = 1250.0;
/// Smallest peak deviation from holding considered a real ramp.
const MIN_RAMP_DEVIATION: f64 = 1e-4;
/// Fraction of the peak deviation at which the onset is declared.
const ONSET_FRACTION: f64 = 0.05;

/// Recover ramp parameters from a recorded current trace.
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

    let ramp = smoothed.as_ref().and_then(|s| detect_ramp(s, hypamp));

    let ton_idx = match overrides.ton {
        Some(ms) => time_index(ms, dt, n)?,
        None => match &ramp {
            Some(r) => r.onset,
            None => {
                warn!(
                    "as ton was not specified for protocol {protocol_name} and no ramp \
                     was detected, it will be set to {DEFAULT_TON_MS} ms"
                );
                time_index(DEFAULT_TON_MS, dt, n)?
            }
        },
    };

    let toff_idx = match overrides.toff {
        Some(ms) => time_index(ms, dt, n)?,
        None => match &ramp {
            Some(r) => r.peak,
            None => {
                warn!(
                    "as toff was not specified for protocol {protocol_name} and no ramp \
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
        (None, Some(s)) => {
            // Deviation at the ramp top.
            s.iter().map(|&v| v - hypamp).fold(0.0_f64, |m, d| if d.abs() > m.abs() { d } else { m })
        }
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

/// Rebuild the clean ramp stimulus from its parameters.
pub fn generate(params: &StimParams) -> (Array1<f64>, Array1<f64>) {
    let t = time_axis(params.tend, params.dt);
    let ton_idx = (params.ton / params.dt).round() as usize;
    let toff_idx = ((params.toff / params.dt).round() as usize).min(t.len());

    let mut current = Array1::from_elem(t.len(), params.hypamp);
    let span = toff_idx.saturating_sub(ton_idx);
    for i in ton_idx..toff_idx {
        current[i] += params.amp * (i - ton_idx) as f64 / span as f64;
    }
    (t, current)
}

struct DetectedRamp {
    onset: usize,
    peak: usize,
}

/// Onset at `ONSET_FRACTION` of the peak deviation, offset at the peak.
fn detect_ramp(smoothed: &Array1<f64>, hypamp: f64) -> Option<DetectedRamp> {
    let mut peak = 0usize;
    let mut max_dev = 0.0_f64;
    for (i, &v) in smoothed.iter().enumerate() {
        let dev = (v - hypamp).abs();
        if dev > max_dev {
            max_dev = dev;
            peak = i;
        }
    }
    if max_dev < MIN_RAMP_DEVIATION {
        return None;
    }

    let threshold = ONSET_FRACTION * max_dev;
    let onset = smoothed
        .iter()
        .position(|&v| (v - hypamp).abs() >= threshold)?;
    Some(DetectedRamp { onset, peak })
}
