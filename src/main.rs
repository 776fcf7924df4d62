// ptmidi command-line front end
// Reads a feature response, converts it, and writes the MIDI file

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ptmidi_lib::commands::{self, ConvertInput, ExportMidiInput, SaveMidiInput};
use ptmidi_lib::config::{self, AppConfig};
use ptmidi_lib::pipeline::{Pipeline, TraceWriter};
use ptmidi_lib::state::SessionState;

#[derive(Debug, Parser)]
#[command(name = "ptmidi", version, about = "Convert a feature-path response into a Standard MIDI File")]
struct Cli {
    /// Feature response JSON file, or `-` for stdin
    input: String,

    /// Output .mid path (defaults to the configured filename)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ticks per quarter note
    #[arg(long)]
    ppq: Option<u16>,

    /// JSON config file (defaults to $PTMIDI_CONFIG, then ./ptmidi.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the converted event list as JSON
    #[arg(long)]
    events: bool,

    /// Print a data: URI for the encoded file instead of writing it
    #[arg(long)]
    uri: bool,

    /// Append a JSONL stage trace to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Leave note tracks unnamed
    #[arg(long)]
    no_instrument_names: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::configured_path);
    let config = config::load_or_default(&config_path)?;
    init_logging(&config);

    let feature_response = read_input(&cli.input)?;
    let pipeline = match &cli.trace {
        Some(path) => Pipeline::with_trace(TraceWriter::new(path.clone())),
        None => Pipeline::new(),
    };
    let session = SessionState::new();

    let converted = commands::convert_command(&session, &pipeline, ConvertInput { feature_response })
        .map_err(|e| anyhow::anyhow!("{}", e.message()))?;

    for decision in &converted.decisions {
        log::debug!("{}: {}", decision.prefix, decision.reasoning);
    }

    if cli.events {
        println!("{}", serde_json::to_string_pretty(&converted.events)?);
    }

    let export = ExportMidiInput {
        ppq: cli.ppq,
        instrument_names: cli.no_instrument_names.then_some(false),
        ..Default::default()
    };

    if cli.uri {
        let uri = commands::midi_uri_command(&session, &pipeline, &config.export, &export)
            .map_err(|e| anyhow::anyhow!("{}", e.message()))?;
        println!("{}", uri);
        return Ok(());
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.filename));
    let save = SaveMidiInput {
        directory: output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        filename: output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("output path {} has no file name", output.display()))?,
        export,
    };

    let saved = commands::save_midi_command(&session, &pipeline, &config.export, &save)
        .map_err(|e| anyhow::anyhow!("{}", e.message()))?;
    log::info!(
        "Wrote {} notes to {} ({} bytes)",
        converted.note_count,
        saved.path.display(),
        saved.size
    );

    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn read_input(input: &str) -> Result<serde_json::Value> {
    let text = if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed reading feature response from stdin")?;
        text
    } else {
        fs::read_to_string(input).with_context(|| format!("failed reading {}", input))?
    };

    serde_json::from_str(&text).context("feature response is not valid JSON")
}
