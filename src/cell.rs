//! Per-cell orchestration: reading recordings, feature extraction and
//! cross-protocol aggregation (rheobase, relative amplitudes).
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use log::warn;

use crate::config::{EfelSettings, ProtocolConfig};
use crate::ecode::ecode_for_protocol;
use crate::features::{EfelTrace, FeatureEngine};
use crate::reader::{self, RecordingReader};
use crate::recording::Recording;
use crate::signal::nanmean;

/// A spiking amplitude below this usually means a misconfigured stimulus
/// window rather than a genuinely low-threshold cell.
const SUSPICIOUS_AMP: f64 = 0.01;

/// Requested features: name → optional custom `[start, end]` window (ms).
/// Features without a window are computed over `[ton, toff]`.
pub type FeatureRequests = BTreeMap<String, Option<(f64, f64)>>;

/// One biological cell and everything recorded from it.
#[derive(Default)]
pub struct Cell {
    /// Cell name, unique per experiment.
    pub name: String,
    /// Recordings in read order.
    pub recordings: Vec<Recording>,
    /// Smallest spiking amplitude across the rheobase protocols; `None`
    /// until computed or when nothing spiked.
    pub rheobase: Option<f64>,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Self {
        Cell {
            name: name.into(),
            recordings: Vec::new(),
            rheobase: None,
        }
    }

    /// Distinct protocol names present in the recordings.
    pub fn protocol_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .recordings
            .iter()
            .map(|rec| rec.protocol_name.as_str())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Recordings belonging to `protocol_name`.
    pub fn recordings_by_protocol(&self, protocol_name: &str) -> Vec<&Recording> {
        self.recordings
            .iter()
            .filter(|rec| rec.protocol_name == protocol_name)
            .collect()
    }

    fn recording_ids_by_protocol(&self, protocol_name: &str) -> Vec<usize> {
        self.recordings
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.protocol_name == protocol_name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Read every metadata entry of a protocol and append the resulting
    /// recordings. One entry may fan out into several sweeps. Unregistered
    /// protocol names and unreadable formats are hard errors.
    pub fn read_recordings(
        &mut self,
        protocol_data: &[ProtocolConfig],
        protocol_name: &str,
        custom_reader: Option<&RecordingReader>,
    ) -> Result<()> {
        let kind = ecode_for_protocol(protocol_name)?;

        for config in protocol_data {
            for record in reader::dispatch(config, custom_reader)? {
                let rec = Recording::from_reader(kind, protocol_name, config, record)?;
                self.recordings.push(rec);
            }
        }
        Ok(())
    }

    /// Extract the requested features for every recording of a protocol.
    ///
    /// The engine threshold and interval strictness are (re)applied at the
    /// start of every pass; taking the engine by `&mut` keeps one cell's
    /// settings from bleeding into a concurrent extraction. Re-running
    /// overwrites previous values idempotently.
    pub fn extract_efeatures(
        &mut self,
        engine: &mut dyn FeatureEngine,
        protocol_name: &str,
        efeatures: &FeatureRequests,
        settings: &EfelSettings,
    ) -> Result<()> {
        engine.set_threshold(settings.ap_threshold);
        engine.set_int_setting("strict_stiminterval", settings.strict_stiminterval as i64);

        for i in self.recording_ids_by_protocol(protocol_name) {
            efeatures_from_recording(engine, &mut self.recordings[i], efeatures)?;
        }
        Ok(())
    }

    /// Smallest stimulus amplitude that triggered at least one spike among
    /// the designated protocols. Leaves `rheobase` untouched (`None`) when
    /// nothing spiked.
    pub fn compute_rheobase(&mut self, protocols_rheobase: &[&str]) {
        let mut amps = Vec::new();

        for rec in &self.recordings {
            if !protocols_rheobase.contains(&rec.protocol_name.as_str()) {
                continue;
            }
            if rec.spikecount.is_some_and(|count| count > 0) {
                if rec.params.amp < SUSPICIOUS_AMP {
                    warn!(
                        "a recording of cell {} protocol {} shows spikes at a \
                         suspiciously low current; check ton and toff",
                        self.name, rec.protocol_name
                    );
                }
                amps.push(rec.params.amp);
            }
        }

        if !amps.is_empty() {
            self.rheobase = amps.iter().copied().reduce(f64::min);
        }
    }

    /// Express every recording's amplitudes as a percentage of the rheobase.
    ///
    /// With an undefined or non-positive rheobase the relative amplitudes
    /// stay unset for the whole cell and the rheobase is reset to `None`;
    /// normalizing against a degenerate reference would be meaningless.
    pub fn compute_relative_amp(&mut self) {
        match self.rheobase {
            Some(rheobase) if rheobase > 0.0 && rheobase.is_finite() => {
                for rec in &mut self.recordings {
                    rec.compute_relative_amp(rheobase);
                }
            }
            _ => {
                warn!(
                    "cannot compute the relative current amplitude for the \
                     recordings of cell {} because its rheobase is {:?}",
                    self.name, self.rheobase
                );
                self.rheobase = None;
            }
        }
    }
}

/// Two-pass feature computation for one recording: everything without a
/// custom window over `[ton, toff]` (always including `peak_time`, which
/// yields the spike count), then one single-feature pass per custom window.
fn efeatures_from_recording(
    engine: &mut dyn FeatureEngine,
    rec: &mut Recording,
    efeatures: &FeatureRequests,
) -> Result<()> {
    engine.set_double_setting("stimulus_current", rec.params.amp);

    let mut full_window_names: Vec<&str> = efeatures
        .iter()
        .filter(|(_, window)| window.is_none())
        .map(|(name, _)| name.as_str())
        .collect();
    full_window_names.push("peak_time");

    let values = {
        let trace = EfelTrace {
            t: rec.t.view(),
            v: rec.voltage.view(),
            stim_start: vec![rec.params.ton],
            stim_end: vec![rec.params.toff],
        };
        engine.feature_values(&[trace], &full_window_names, false)?
    };
    let by_name = values
        .first()
        .context("feature engine returned no result for the trace")?;

    rec.spikecount = Some(
        by_name
            .get("peak_time")
            .and_then(|peaks| peaks.as_ref())
            .map_or(0, |peaks| peaks.len()),
    );

    for name in &full_window_names {
        if *name == "peak_time" {
            continue;
        }
        let value = by_name
            .get(*name)
            .and_then(|series| series.as_deref())
            .and_then(nanmean);
        rec.efeatures.insert((*name).to_string(), value);
    }

    for (name, window) in efeatures {
        let Some((start, end)) = window else { continue };
        let values = {
            let trace = EfelTrace {
                t: rec.t.view(),
                v: rec.voltage.view(),
                stim_start: vec![*start],
                stim_end: vec![*end],
            };
            engine.feature_values(&[trace], &[name.as_str()], false)?
        };
        let value = values
            .first()
            .and_then(|by_name| by_name.get(name.as_str()))
            .and_then(|series| series.as_deref())
            .and_then(nanmean);
        rec.efeatures.insert(name.clone(), value);
    }

    Ok(())
}
