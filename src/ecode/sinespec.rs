//! SineSpec (swept-frequency sinusoid) eCode.
//!
//! Inside `[ton, toff)` the current follows a fixed chirp law whose
//! instantaneous frequency grows with elapsed time:
//!
//! ```text
//! I(t) = amp * sin(2π * (1 + 1 / (5.15 - (ts - 0.1))) * (ts - 0.1))
//! ```
//!
//! with `ts` the time in seconds. Outside the window the current is zero;
//! the holding current offsets the whole trace. Timing is not detectable
//! from the oscillating trace itself, so `ton`/`toff` come from metadata or
//! fixed fallbacks; the amplitude falls back to the smoothed-trace maximum
//! above holding.
use anyhow::{bail, ensure, Result};
use log::warn;
use ndarray::Array1;

use crate::signal::{base_current, smooth};

use super::{sampling_interval, time_axis, time_index, StimOverrides, StimParams, SMOOTH_WIDTH};

/// Fallback onset when `ton` is missing from the metadata.
const DEFAULT_TON_MS: f64 = 150.0;
/// Fallback offset when `toff` is missing from the metadata.
const DEFAULT_TOFF_MS: f64 = 5100.0;

/// Recover SineSpec parameters from a recorded current trace.
pub fn interpret(
    protocol_name: &str,
    t: &Array1<f64>,
    current: Option<&Array1<f64>>,
    overrides: &StimOverrides,
) -> Result<StimParams> {
    let dt = sampling_interval(t)?;
    let n = t.len();
    let smoothed = current.map(|c| smooth(c, SMOOTH_WIDTH));

    let ton_idx = match overrides.ton {
        Some(ms) => time_index(ms, dt, n)?,
        None => {
            warn!(
                "as ton was not specified for protocol {protocol_name}, it will be \
                 set to {DEFAULT_TON_MS} ms"
            );
            time_index(DEFAULT_TON_MS, dt, n)?
        }
    };

    let toff_idx = match overrides.toff {
        Some(ms) => time_index(ms, dt, n)?,
        None => {
            warn!(
                "as toff was not specified for protocol {protocol_name}, it will be \
                 set to {DEFAULT_TOFF_MS} ms"
            );
            time_index(DEFAULT_TOFF_MS, dt, n)?
        }
    };
    ensure!(
        ton_idx <= toff_idx,
        "protocol {protocol_name}: stimulus onset ({ton_idx}) is after its offset ({toff_idx})"
    );

    let hypamp = match (overrides.hypamp, current) {
        (Some(v), _) => v,
        (None, Some(c)) => base_current(c),
        (None, None) => bail!(
            "protocol {protocol_name}: no current trace and no 'hypamp' in the metadata"
        ),
    };

    let amp = match (overrides.amp, &smoothed) {
        (Some(v), _) => v,
        (None, Some(s)) => s.iter().copied().fold(f64::NEG_INFINITY, f64::max) - hypamp,
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

/// Rebuild the clean SineSpec stimulus from its parameters.
pub fn generate(params: &StimParams) -> (Array1<f64>, Array1<f64>) {
    let t = time_axis(params.tend, params.dt);
    let ton_idx = (params.ton / params.dt).round() as usize;
    let toff_idx = ((params.toff / params.dt).round() as usize).min(t.len());

    let mut current = Array1::from_elem(t.len(), params.hypamp);
    for i in ton_idx..toff_idx {
        let ts = t[i] / 1e3 - 0.1;
        current[i] += params.amp * (2.0 * std::f64::consts::PI * (1.0 + 1.0 / (5.15 - ts)) * ts).sin();
    }
    (t, current)
}
