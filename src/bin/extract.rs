use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

use efex::{Cell, EfelSettings, FeatureRequests, ProtocolConfig, SpikeFeatureEngine};

#[derive(Parser)]
#[command(name = "extract", about = "eCode feature extraction for one cell")]
struct Args {
    /// Extraction plan (JSON): cell name, protocols, files, features
    #[arg(long)]
    plan: PathBuf,

    /// Report output path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Spike detection threshold in mV
    #[arg(long, default_value_t = -20.0)]
    ap_threshold: f64,

    /// Count spikes outside the stimulus interval too
    #[arg(long)]
    relaxed_stiminterval: bool,
}

#[derive(Deserialize)]
struct ExtractionPlan {
    cell: String,
    protocols: Vec<ProtocolPlan>,
    #[serde(default)]
    protocols_rheobase: Vec<String>,
    #[serde(default)]
    efeatures: FeatureRequests,
}

#[derive(Deserialize)]
struct ProtocolPlan {
    name: String,
    files: Vec<ProtocolConfig>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let bytes = std::fs::read(&args.plan)
        .with_context(|| format!("reading plan {}", args.plan.display()))?;
    let plan: ExtractionPlan = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing plan {}", args.plan.display()))?;

    let settings = EfelSettings {
        ap_threshold: args.ap_threshold,
        strict_stiminterval: !args.relaxed_stiminterval,
    };

    let mut cell = Cell::new(plan.cell.clone());
    for protocol in &plan.protocols {
        cell.read_recordings(&protocol.files, &protocol.name, None)?;
    }
    println!("Read {} recordings for cell {}", cell.recordings.len(), plan.cell);

    let mut engine = SpikeFeatureEngine::new();
    for name in cell.protocol_names() {
        cell.extract_efeatures(&mut engine, &name, &plan.efeatures, &settings)?;
    }

    let rheobase_protocols: Vec<&str> =
        plan.protocols_rheobase.iter().map(String::as_str).collect();
    cell.compute_rheobase(&rheobase_protocols);
    cell.compute_relative_amp();
    match cell.rheobase {
        Some(rheobase) => println!("Rheobase: {rheobase}"),
        None => println!("Rheobase: undefined (no spiking recording)"),
    }

    let report = json!({
        "cell": cell.name,
        "rheobase": cell.rheobase,
        "recordings": cell
            .recordings
            .iter()
            .map(|rec| {
                json!({
                    "protocol": rec.protocol_name,
                    "params": rec.params_map(),
                    "stimulus": rec.stimulus_parameters(),
                    "spikecount": rec.spikecount,
                    "efeatures": rec.efeatures,
                })
            })
            .collect::<Vec<_>>(),
    });

    let rendered = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing report {}", path.display()))?;
            println!("Written → {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
