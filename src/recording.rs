//! A single stimulus/response trial.
//!
//! A [`Recording`] owns the raw trace handed over by a reader, plus the
//! stimulus parameters interpreted from it at construction time. Feature
//! values and relative amplitudes are filled in later by [`crate::cell::Cell`].
use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use ndarray::Array1;
use serde::Serialize;

use crate::config::ProtocolConfig;
use crate::ecode::{self, EcodeKind, StimParams};
use crate::reader::ReaderRecord;

/// Normalized stimulus description shared by every eCode variant, used for
/// uniform reporting and stimulus regeneration regardless of shape.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StimulusParameters {
    /// Stimulus onset (ms).
    pub delay: f64,
    /// Stimulus amplitude.
    pub amp: f64,
    /// Amplitude as a percentage of the cell rheobase, when known.
    pub thresh_perc: Option<f64>,
    /// Active stimulus duration (ms).
    pub duration: f64,
    /// Total trace duration (ms).
    pub totduration: f64,
}

/// One recorded trial of a parametrized current injection.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Protocol the trial belongs to; decides the eCode variant.
    pub protocol_name: String,
    /// Stimulus shape resolved from the protocol name.
    pub kind: EcodeKind,
    /// Time vector (ms, fixed sampling interval).
    pub t: Array1<f64>,
    /// Membrane voltage trace.
    pub voltage: Array1<f64>,
    /// Injected current trace, when the file carried one.
    pub current: Option<Array1<f64>>,
    /// Stimulus parameters interpreted at construction.
    pub params: StimParams,
    /// Amplitude as percent of rheobase; set by the owning cell.
    pub amp_rel: Option<f64>,
    /// Holding current as percent of rheobase; set by the owning cell.
    pub hypamp_rel: Option<f64>,
    /// Number of detected spikes; `None` until features are extracted.
    pub spikecount: Option<usize>,
    /// Extracted feature values; `None` marks an explicitly undefined result.
    pub efeatures: HashMap<String, Option<f64>>,
}

impl Recording {
    /// Build a recording from reader output, interpreting the stimulus
    /// parameters immediately. Config metadata wins over reader metadata,
    /// which wins over trace inference.
    pub fn from_reader(
        kind: EcodeKind,
        protocol_name: &str,
        config: &ProtocolConfig,
        record: ReaderRecord,
    ) -> Result<Self> {
        let overrides = config.stim_overrides().or(record.stim_overrides());
        let params = ecode::interpret(
            kind,
            protocol_name,
            &record.t,
            record.current.as_ref(),
            &overrides,
        )?;

        Ok(Recording {
            protocol_name: protocol_name.to_string(),
            kind,
            t: record.t,
            voltage: record.voltage,
            current: record.current,
            params,
            amp_rel: None,
            hypamp_rel: None,
            spikecount: None,
            efeatures: HashMap::new(),
        })
    }

    /// Rebuild the clean synthetic stimulus from the stored parameters.
    pub fn generate(&self) -> (Array1<f64>, Array1<f64>) {
        ecode::generate(self.kind, &self.params)
    }

    /// Full derived-parameter set by name, for export and plotting.
    pub fn params_map(&self) -> BTreeMap<&'static str, Option<f64>> {
        BTreeMap::from([
            ("ton", Some(self.params.ton)),
            ("toff", Some(self.params.toff)),
            ("tend", Some(self.params.tend)),
            ("amp", Some(self.params.amp)),
            ("hypamp", Some(self.params.hypamp)),
            ("dt", Some(self.params.dt)),
            ("amp_rel", self.amp_rel),
            ("hypamp_rel", self.hypamp_rel),
        ])
    }

    /// Normalized stimulus subset with vocabulary common to all variants.
    pub fn stimulus_parameters(&self) -> StimulusParameters {
        StimulusParameters {
            delay: self.params.ton,
            amp: self.params.amp,
            thresh_perc: self.amp_rel,
            duration: self.params.toff - self.params.ton,
            totduration: self.params.tend,
        }
    }

    /// Express the stimulus amplitudes as percentages of `reference_amp`
    /// (the cell rheobase). Callers guard against a zero reference.
    pub fn compute_relative_amp(&mut self, reference_amp: f64) {
        self.amp_rel = Some(100.0 * self.params.amp / reference_amp);
        self.hypamp_rel = Some(100.0 * self.params.hypamp / reference_amp);
    }

    /// Whether the recording's relative amplitude lies strictly within
    /// `tolerance` of `target` (percent of rheobase). `false` when the
    /// relative amplitude has not been computed.
    pub fn in_target(&self, target: f64, tolerance: f64) -> bool {
        match self.amp_rel {
            Some(amp_rel) => (target - amp_rel).abs() < tolerance,
            None => false,
        }
    }
}
