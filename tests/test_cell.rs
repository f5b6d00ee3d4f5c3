mod common;
use common::{spiking_voltage, step_recording, write_temp_json};

use efex::ecode::{self, EcodeKind, StimParams};
use efex::{Cell, EfelSettings, FeatureRequests, ProtocolConfig, SpikeFeatureEngine};

#[test]
fn rheobase_is_the_smallest_spiking_amplitude() {
    let mut cell = Cell::new("cell-a");
    for (amp, count) in [(0.02, 0), (0.05, 1), (0.1, 2)] {
        cell.recordings.push(step_recording(amp, Some(count)));
    }
    cell.compute_rheobase(&["IDRest"]);
    approx::assert_abs_diff_eq!(cell.rheobase.unwrap(), 0.05, epsilon = 1e-12);
}

#[test]
fn rheobase_stays_none_without_spikes() {
    let mut cell = Cell::new("cell-b");
    for amp in [0.02, 0.05, 0.1] {
        cell.recordings.push(step_recording(amp, Some(0)));
    }
    cell.compute_rheobase(&["IDRest"]);
    assert!(cell.rheobase.is_none());
}

#[test]
fn rheobase_ignores_undesignated_protocols() {
    let mut cell = Cell::new("cell-c");
    cell.recordings.push(step_recording(0.05, Some(3)));
    cell.compute_rheobase(&["SineSpec"]);
    assert!(cell.rheobase.is_none());
}

#[test]
fn rheobase_skips_recordings_without_extracted_features() {
    let mut cell = Cell::new("cell-d");
    cell.recordings.push(step_recording(0.05, None));
    cell.recordings.push(step_recording(0.2, Some(1)));
    cell.compute_rheobase(&["IDRest"]);
    approx::assert_abs_diff_eq!(cell.rheobase.unwrap(), 0.2, epsilon = 1e-12);
}

#[test]
fn relative_amp_without_rheobase_leaves_fields_unset() {
    let mut cell = Cell::new("cell-e");
    cell.recordings.push(step_recording(0.1, Some(0)));
    cell.compute_rheobase(&["IDRest"]);
    cell.compute_relative_amp(); // warns, must not panic

    assert!(cell.rheobase.is_none());
    assert!(cell.recordings[0].amp_rel.is_none());
    assert!(cell.recordings[0].hypamp_rel.is_none());
}

#[test]
fn relative_amp_normalizes_every_recording() {
    let mut cell = Cell::new("cell-f");
    cell.recordings.push(step_recording(0.05, Some(1)));
    cell.recordings.push(step_recording(0.1, Some(4)));
    cell.compute_rheobase(&["IDRest"]);
    cell.compute_relative_amp();

    approx::assert_abs_diff_eq!(cell.recordings[0].amp_rel.unwrap(), 100.0, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(cell.recordings[1].amp_rel.unwrap(), 200.0, epsilon = 1e-9);
    assert!(cell.recordings[1].in_target(195.0, 10.0));
    assert!(!cell.recordings[1].in_target(210.0, 10.0));
}

#[test]
fn unknown_protocol_is_a_lookup_error_naming_it() {
    let mut cell = Cell::new("cell-g");
    let files = vec![ProtocolConfig {
        filepath: Some("whatever.json".into()),
        ..Default::default()
    }];
    let err = cell.read_recordings(&files, "zap3", None).unwrap_err();
    assert!(err.to_string().contains("zap3"), "message: {err}");
    assert!(cell.recordings.is_empty());
}

#[test]
fn unknown_file_format_is_a_hard_error() {
    let mut cell = Cell::new("cell-h");
    let files = vec![ProtocolConfig {
        v_file: Some("sweep.ibw".into()),
        ..Default::default()
    }];
    let err = cell.read_recordings(&files, "IDRest", None).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("unknown"), "message: {msg}");
    assert!(msg.contains("sweep.ibw"), "message: {msg}");
}

#[test]
fn read_extract_and_aggregate_end_to_end() {
    // Two sweeps in one file: a subthreshold one and a spiking one.
    let params = StimParams {
        ton: 500.0,
        toff: 1500.0,
        tend: 3000.0,
        amp: 0.05,
        hypamp: -0.02,
        dt: 0.1,
    };
    let (t, current_lo) = ecode::generate(EcodeKind::Step, &params);
    let current_hi = ecode::generate(
        EcodeKind::Step,
        &StimParams { amp: 0.15, ..params },
    )
    .1;
    let n = t.len();

    let quiet = vec![-70.0_f64; n];
    let firing = spiking_voltage(n, 0.1, &[700.0, 900.0, 1100.0]);

    let file = serde_json::json!({
        "sweeps": [
            { "t": t.to_vec(), "v": quiet, "i": current_lo.to_vec() },
            { "t": t.to_vec(), "v": firing, "i": current_hi.to_vec() },
        ]
    });
    let path = write_temp_json("end_to_end", &file.to_string());

    let mut cell = Cell::new("cell-i");
    let files = vec![ProtocolConfig {
        filepath: Some(path.clone()),
        ..Default::default()
    }];
    cell.read_recordings(&files, "IDRest", None).unwrap();
    assert_eq!(cell.recordings.len(), 2); // one metadata entry fans out

    approx::assert_abs_diff_eq!(cell.recordings[0].params.amp, 0.05, epsilon = 1e-3);
    approx::assert_abs_diff_eq!(cell.recordings[1].params.amp, 0.15, epsilon = 1e-3);
    approx::assert_abs_diff_eq!(cell.recordings[1].params.ton, 500.0, epsilon = 0.5);

    let mut features = FeatureRequests::new();
    features.insert("voltage_base".into(), None);
    features.insert("made_up_feature".into(), None);
    features.insert("steady_state_voltage_stimend".into(), Some((1400.0, 1500.0)));

    let mut engine = SpikeFeatureEngine::new();
    cell.extract_efeatures(&mut engine, "IDRest", &features, &EfelSettings::default())
        .unwrap();

    assert_eq!(cell.recordings[0].spikecount, Some(0));
    assert_eq!(cell.recordings[1].spikecount, Some(3));
    // The per-recording stimulus current was threaded through the engine.
    assert_eq!(engine.double_setting("stimulus_current"), Some(cell.recordings[1].params.amp));
    assert_eq!(engine.int_setting("strict_stiminterval"), Some(1));

    let quiet_rec = &cell.recordings[0];
    approx::assert_abs_diff_eq!(
        quiet_rec.efeatures["voltage_base"].unwrap(),
        -70.0,
        epsilon = 1e-9
    );
    // Undefined results are recorded explicitly, not as a number.
    assert!(quiet_rec.efeatures["made_up_feature"].is_none());
    assert!(quiet_rec.efeatures["steady_state_voltage_stimend"].is_some());

    cell.compute_rheobase(&["IDRest"]);
    approx::assert_abs_diff_eq!(cell.rheobase.unwrap(), 0.15, epsilon = 1e-3);

    cell.compute_relative_amp();
    let rel = cell.recordings[0].amp_rel.unwrap();
    assert!((rel - 33.3).abs() < 1.0, "amp_rel = {rel}");

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn custom_reader_fans_into_recordings() {
    let mut cell = Cell::new("cell-j");
    let reader = |_: &ProtocolConfig| -> anyhow::Result<Vec<efex::ReaderRecord>> {
        let params = StimParams {
            ton: 100.0,
            toff: 600.0,
            tend: 1000.0,
            amp: 0.1,
            hypamp: 0.0,
            dt: 0.1,
        };
        let (t, current) = ecode::generate(EcodeKind::Step, &params);
        let n = t.len();
        Ok(vec![efex::ReaderRecord {
            t,
            voltage: ndarray::Array1::from_elem(n, -70.0),
            current: Some(current),
            amp: None,
            hypamp: None,
        }])
    };

    let files = vec![ProtocolConfig {
        filepath: Some("proprietary.wav3".into()),
        ..Default::default()
    }];
    cell.read_recordings(&files, "IDRest", Some(&reader)).unwrap();
    assert_eq!(cell.recordings.len(), 1);
    approx::assert_abs_diff_eq!(cell.recordings[0].params.amp, 0.1, epsilon = 1e-3);
}

#[test]
fn protocol_names_are_deduplicated() {
    let mut cell = Cell::new("cell-k");
    cell.recordings.push(step_recording(0.05, None));
    cell.recordings.push(step_recording(0.1, None));
    assert_eq!(cell.protocol_names(), vec!["IDRest".to_string()]);
    assert_eq!(cell.recordings_by_protocol("IDRest").len(), 2);
    assert!(cell.recordings_by_protocol("Ramp").is_empty());
}
