/// Shared helpers for building synthetic recordings and trace files.
use std::collections::HashMap;
use std::path::PathBuf;

use ndarray::Array1;

use efex::ecode::{self, EcodeKind, StimParams};
use efex::Recording;

#[allow(unused)]
/// Write a JSON trace file into the temp directory; caller removes it.
pub fn write_temp_json(tag: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("efex_{tag}_{}.json", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[allow(unused)]
/// A step recording built from its own generator, with a flat voltage trace
/// and the spike count preset (rheobase tests do not need real spikes).
pub fn step_recording(amp: f64, spikecount: Option<usize>) -> Recording {
    let params = StimParams {
        ton: 100.0,
        toff: 600.0,
        tend: 1000.0,
        amp,
        hypamp: -0.02,
        dt: 0.1,
    };
    let (t, current) = ecode::generate(EcodeKind::Step, &params);
    let n = t.len();
    Recording {
        protocol_name: "IDRest".to_string(),
        kind: EcodeKind::Step,
        t,
        voltage: Array1::from_elem(n, -70.0),
        current: Some(current),
        params,
        amp_rel: None,
        hypamp_rel: None,
        spikecount,
        efeatures: HashMap::new(),
    }
}

#[allow(unused)]
/// Resting trace at -70 mV with triangular spikes to +20 mV at `spike_times_ms`.
pub fn spiking_voltage(n: usize, dt: f64, spike_times_ms: &[f64]) -> Vec<f64> {
    let mut v = vec![-70.0_f64; n];
    for &ts in spike_times_ms {
        let center = (ts / dt).round() as usize;
        let half = (1.0 / dt).round() as usize; // 1 ms rise and fall
        for i in center.saturating_sub(half)..(center + half + 1).min(n) {
            let frac = 1.0 - (i as f64 - center as f64).abs() / half as f64;
            v[i] = v[i].max(-70.0 + 90.0 * frac);
        }
    }
    v
}
