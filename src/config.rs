//! Per-file recording metadata and feature-engine settings.
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ecode::StimOverrides;

/// Metadata describing one recording file of a protocol.
///
/// Every field is optional: missing stimulus values are inferred from the
/// current trace (or defaulted with a warning) during interpretation.
/// Times are in ms, currents in the recording's current unit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Path of the voltage file.
    pub v_file: Option<PathBuf>,
    /// Generic file path, used when `v_file` is absent.
    pub filepath: Option<PathBuf>,
    /// Stimulus onset override (ms).
    pub ton: Option<f64>,
    /// Stimulus offset override (ms).
    pub toff: Option<f64>,
    /// Stimulus amplitude override.
    pub amp: Option<f64>,
    /// Holding current override.
    pub hypamp: Option<f64>,
}

impl ProtocolConfig {
    /// The file this entry points at: `v_file` first, then `filepath`.
    pub fn file(&self) -> Option<&Path> {
        self.v_file.as_deref().or(self.filepath.as_deref())
    }

    /// Stimulus parameter overrides carried by this entry.
    pub fn stim_overrides(&self) -> StimOverrides {
        StimOverrides {
            ton: self.ton,
            toff: self.toff,
            amp: self.amp,
            hypamp: self.hypamp,
        }
    }
}

/// Spike-detection settings handed to the feature engine before every
/// extraction pass. Passed explicitly per call, never ambient state.
#[derive(Debug, Clone, Copy)]
pub struct EfelSettings {
    /// Action-potential detection threshold (mV).
    pub ap_threshold: f64,
    /// Restrict spike detection to the stimulus interval.
    pub strict_stiminterval: bool,
}

impl Default for EfelSettings {
    fn default() -> Self {
        EfelSettings {
            ap_threshold: -20.0,
            strict_stiminterval: true,
        }
    }
}
