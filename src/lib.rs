//! # efex — eCode feature extraction for intracellular recordings
//!
//! `efex` extracts electrophysiological features from intracellular
//! recordings of neurons stimulated with parametrized current injections
//! (eCodes). It classifies recordings by stimulus protocol, reconstructs
//! the stimulus parameters from the recorded current trace, computes
//! scalar features over stimulus windows and derives the per-cell
//! normalization quantities (rheobase, relative amplitudes) needed to
//! compare cells across absolute current levels.
//!
//! ## Pipeline overview
//!
//! ```text
//! per-file metadata (ProtocolConfig)
//!   │
//!   ├─ reader::dispatch()        custom reader | suffix match | hard error
//!   ├─ ecode_for_protocol()      protocol name → eCode variant (registry)
//!   ├─ Recording::from_reader()  interpret() runs in the constructor:
//!   │                            metadata ▸ reader ▸ trace ▸ default+warn
//!   ├─ Cell::extract_efeatures() windowed features via a FeatureEngine
//!   ├─ Cell::compute_rheobase()  min spiking amplitude over designated
//!   │                            protocols (None when nothing spikes)
//!   └─ Cell::compute_relative_amp()  amp_rel = 100 · amp / rheobase
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use efex::{Cell, EfelSettings, FeatureRequests, SpikeFeatureEngine, ProtocolConfig};
//!
//! let mut cell = Cell::new("B6-38216");
//!
//! // Per-file metadata; every stimulus field is optional.
//! let files = vec![ProtocolConfig {
//!     filepath: Some("data/B6-38216_IDRest_01.json".into()),
//!     ..Default::default()
//! }];
//! cell.read_recordings(&files, "IDRest", None).unwrap();
//!
//! // Feature extraction: None = default [ton, toff] window.
//! let mut features = FeatureRequests::new();
//! features.insert("voltage_base".into(), None);
//! features.insert("steady_state_voltage_stimend".into(), Some((800.0, 1300.0)));
//!
//! let mut engine = SpikeFeatureEngine::new();
//! cell.extract_efeatures(&mut engine, "IDRest", &features, &EfelSettings::default())
//!     .unwrap();
//!
//! cell.compute_rheobase(&["IDRest"]);
//! cell.compute_relative_amp();
//!
//! for rec in &cell.recordings {
//!     println!("{} amp={} rel={:?}", rec.protocol_name, rec.params.amp, rec.amp_rel);
//! }
//! ```
//!
//! ## eCode interpretation
//!
//! Each variant resolves every stimulus parameter in the same order:
//! explicit value in the per-file metadata, explicit value from the reader,
//! inference from the smoothed current trace, and finally a documented
//! fallback constant logged as a warning. Timing arrives in ms and is
//! snapped once to the sample grid; fallbacks that do not fit the trace
//! surface as errors instead of indexing out of bounds.

pub mod cell;
pub mod config;
pub mod ecode;
pub mod features;
pub mod reader;
pub mod recording;
pub mod signal;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `efex::Foo` without having to know the internal module layout.

// cell
pub use cell::{Cell, FeatureRequests};

// config
pub use config::{EfelSettings, ProtocolConfig};

// ecode — registry, shared parameter set, per-variant interpret/generate
pub use ecode::{ecode_for_protocol, EcodeKind, StimOverrides, StimParams};

// features — engine boundary + built-in engine
pub use features::{EfelTrace, FeatureEngine, SpikeFeatureEngine};

// reader — dispatch + data contract
pub use reader::{dispatch, read_json_sweeps, ReaderRecord, RecordingReader};

// recording
pub use recording::{Recording, StimulusParameters};

// signal — numeric helpers
pub use signal::{base_current, nanmean, smooth};
