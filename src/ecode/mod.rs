//! eCode stimulus family.
//!
//! One module per stimulus shape. Every variant works on the same
//! [`StimParams`] parameter set and implements the same two operations:
//!
//! * `interpret(t, current, overrides)` — recover the stimulus parameters
//!   from a recorded (noisy) current trace, honouring metadata overrides
//!   first and falling back to documented defaults with a warning.
//! * `generate(&StimParams)` — rebuild a clean synthetic stimulus from the
//!   stored parameters only.
//!
//! Protocol names map to variants through the closed registry in
//! [`ecode_for_protocol`]; an unregistered name is a configuration error,
//! never a silent skip.
pub mod ramp;
pub mod sinespec;
pub mod step;

use anyhow::{bail, Result};
use ndarray::Array1;
use serde::Serialize;

/// Median-filter width (samples) used by every variant before detection.
pub(crate) const SMOOTH_WIDTH: usize = 85;

/// Registered stimulus shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcodeKind {
    Step,
    Ramp,
    SineSpec,
}

/// Resolve a protocol name (case-insensitive) to its eCode variant.
///
/// The aliases follow the usual eCode naming: the square-pulse protocols
/// (IDRest, IDThres, IV, APWaveform, FirePattern) all share the step shape.
pub fn ecode_for_protocol(protocol_name: &str) -> Result<EcodeKind> {
    match protocol_name.to_lowercase().as_str() {
        "step" | "idrest" | "idthres" | "iv" | "apwaveform" | "firepattern" => {
            Ok(EcodeKind::Step)
        }
        "ramp" | "apthresh" => Ok(EcodeKind::Ramp),
        "sinespec" => Ok(EcodeKind::SineSpec),
        other => bail!(
            "there is no eCode linked to the stimulus name {other:?}; \
             see ecode::ecode_for_protocol for the registered names"
        ),
    }
}

/// Stimulus parameters shared by every eCode variant.
///
/// Times are in ms (same unit and grid as the recording's time vector);
/// currents are in the recording's current unit (typically nA).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StimParams {
    /// Stimulus onset.
    pub ton: f64,
    /// Stimulus offset.
    pub toff: f64,
    /// Total trace duration.
    pub tend: f64,
    /// Stimulus amplitude above the holding current.
    pub amp: f64,
    /// Holding current.
    pub hypamp: f64,
    /// Sampling interval.
    pub dt: f64,
}

/// Metadata overrides for the interpretation step.
///
/// Missing keys in the per-file or reader metadata simply stay `None`;
/// resolution order is config metadata, then reader metadata, then
/// inference from the trace, then a documented fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct StimOverrides {
    pub ton: Option<f64>,
    pub toff: Option<f64>,
    pub amp: Option<f64>,
    pub hypamp: Option<f64>,
}

impl StimOverrides {
    /// Field-wise merge, `self` taking precedence.
    pub fn or(self, fallback: StimOverrides) -> StimOverrides {
        StimOverrides {
            ton: self.ton.or(fallback.ton),
            toff: self.toff.or(fallback.toff),
            amp: self.amp.or(fallback.amp),
            hypamp: self.hypamp.or(fallback.hypamp),
        }
    }
}

/// Dispatch `interpret` for a variant.
pub fn interpret(
    kind: EcodeKind,
    protocol_name: &str,
    t: &Array1<f64>,
    current: Option<&Array1<f64>>,
    overrides: &StimOverrides,
) -> Result<StimParams> {
    match kind {
        EcodeKind::Step => step::interpret(protocol_name, t, current, overrides),
        EcodeKind::Ramp => ramp::interpret(protocol_name, t, current, overrides),
        EcodeKind::SineSpec => sinespec::interpret(protocol_name, t, current, overrides),
    }
}

/// Dispatch `generate` for a variant.
pub fn generate(kind: EcodeKind, params: &StimParams) -> (Array1<f64>, Array1<f64>) {
    match kind {
        EcodeKind::Step => step::generate(params),
        EcodeKind::Ramp => ramp::generate(params),
        EcodeKind::SineSpec => sinespec::generate(params),
    }
}

// ── Shared interpretation helpers ────────────────────────────────────────────

/// Sampling interval of a time vector; at least two samples are required.
pub(crate) fn sampling_interval(t: &Array1<f64>) -> Result<f64> {
    if t.len() < 2 {
        bail!("time vector has {} sample(s), need at least 2", t.len());
    }
    let dt = t[1] - t[0];
    if dt <= 0.0 {
        bail!("time vector is not increasing (dt = {dt})");
    }
    Ok(dt)
}

/// Snap a time (ms) onto the sample grid, erroring when it falls outside
/// the trace. Fallback constants that do not fit the trace surface here
/// instead of panicking at an index.
pub(crate) fn time_index(value_ms: f64, dt: f64, n_samples: usize) -> Result<usize> {
    let idx = (value_ms / dt).round();
    if idx < 0.0 || idx as usize >= n_samples {
        bail!(
            "stimulus time {value_ms} ms maps to sample {idx} which is outside \
             the {n_samples}-sample trace"
        );
    }
    Ok(idx as usize)
}

/// Time axis `[0, tend)` at step `dt`, matching `numpy.arange`.
pub(crate) fn time_axis(tend: f64, dt: f64) -> Array1<f64> {
    let n = (tend / dt).ceil() as usize;
    Array1::from_shape_fn(n, |i| i as f64 * dt)
}
