//! Reader dispatch for recording files.
//!
//! Format parsers are external collaborators: a reader is any function that
//! turns one metadata entry into a list of raw sweeps ([`ReaderRecord`]).
//! Dispatch order is: explicit custom reader, then the file suffix, then a
//! hard "unknown format" error. A JSON sweep reader ships as the built-in
//! format.
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ndarray::Array1;
use serde::Deserialize;

use crate::config::ProtocolConfig;
use crate::ecode::StimOverrides;

/// One raw sweep produced by a reader: the data contract every format
/// parser must satisfy.
#[derive(Debug, Clone)]
pub struct ReaderRecord {
    /// Time vector (ms, fixed sampling interval).
    pub t: Array1<f64>,
    /// Membrane voltage trace, same length as `t`.
    pub voltage: Array1<f64>,
    /// Injected current trace, when the file carries one.
    pub current: Option<Array1<f64>>,
    /// Stimulus amplitude reported by the acquisition software.
    pub amp: Option<f64>,
    /// Holding current reported by the acquisition software.
    pub hypamp: Option<f64>,
}

impl ReaderRecord {
    /// Stimulus overrides supplied by the file itself (never timing).
    pub fn stim_overrides(&self) -> StimOverrides {
        StimOverrides {
            ton: None,
            toff: None,
            amp: self.amp,
            hypamp: self.hypamp,
        }
    }
}

/// A custom recording reader supplied by the caller.
pub type RecordingReader = dyn Fn(&ProtocolConfig) -> Result<Vec<ReaderRecord>>;

/// Select and run the reader for one metadata entry.
pub fn dispatch(
    config: &ProtocolConfig,
    custom_reader: Option<&RecordingReader>,
) -> Result<Vec<ReaderRecord>> {
    if let Some(reader) = custom_reader {
        return reader(config);
    }

    let path = config
        .file()
        .context("recording metadata carries neither 'v_file' nor 'filepath'")?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => read_json_sweeps(path),
        _ => bail!(
            "the format of the file {} is unknown and no custom reader was provided",
            path.display()
        ),
    }
}

// ── Built-in JSON sweep format ───────────────────────────────────────────────

#[derive(Deserialize)]
struct JsonSweep {
    t: Vec<f64>,
    v: Vec<f64>,
    #[serde(default)]
    i: Option<Vec<f64>>,
    #[serde(default)]
    amp: Option<f64>,
    #[serde(default)]
    hypamp: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonTraceFile {
    MultiSweep { sweeps: Vec<JsonSweep> },
    SingleSweep(JsonSweep),
}

/// Read a `.json` trace file: either a single sweep object or
/// `{"sweeps": [...]}` for multi-sweep files (one entry can fan out into
/// several recordings).
pub fn read_json_sweeps(path: &Path) -> Result<Vec<ReaderRecord>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading trace file {}", path.display()))?;
    let parsed: JsonTraceFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing trace file {}", path.display()))?;

    let sweeps = match parsed {
        JsonTraceFile::MultiSweep { sweeps } => sweeps,
        JsonTraceFile::SingleSweep(sweep) => vec![sweep],
    };

    sweeps
        .into_iter()
        .enumerate()
        .map(|(i, sweep)| {
            ensure!(
                sweep.t.len() == sweep.v.len(),
                "sweep {i} of {}: time and voltage lengths differ ({} vs {})",
                path.display(),
                sweep.t.len(),
                sweep.v.len()
            );
            if let Some(current) = &sweep.i {
                ensure!(
                    current.len() == sweep.t.len(),
                    "sweep {i} of {}: time and current lengths differ ({} vs {})",
                    path.display(),
                    sweep.t.len(),
                    current.len()
                );
            }
            Ok(ReaderRecord {
                t: Array1::from_vec(sweep.t),
                voltage: Array1::from_vec(sweep.v),
                current: sweep.i.map(Array1::from_vec),
                amp: sweep.amp,
                hypamp: sweep.hypamp,
            })
        })
        .collect()
}
