// Command API
// Entry points for whatever drives conversions (CLI, file watcher, UI shell)
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::events::{BucketDecision, Event};
use crate::pipeline::Pipeline;
use crate::smf::MidiExportOptions;
use crate::state::{storage, ConversionResult, SessionState};

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

// ==================== CONVERSION COMMANDS ====================

#[derive(Debug, Deserialize)]
pub struct ConvertInput {
    /// Array of `{feature_path, data}` records
    pub feature_response: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ConvertOutput {
    pub id: Uuid,
    pub events: Vec<Event>,
    pub decisions: Vec<BucketDecision>,
    pub note_count: usize,
    pub skipped: Vec<String>,
}

/// Convert a feature response and make it the session's latest result.
///
/// On malformed input the session keeps its previous result.
pub fn convert_command(
    session: &SessionState,
    pipeline: &Pipeline,
    input: ConvertInput,
) -> CommandResult<ConvertOutput> {
    let assembly = pipeline
        .convert_value(&input.feature_response)
        .map_err(|e| CommandError {
            message: format!("Invalid feature response: {}", e),
        })?;

    let result = ConversionResult::from_assembly(assembly);
    let output = ConvertOutput {
        id: result.id,
        events: result.events.clone(),
        decisions: result.decisions.clone(),
        note_count: result.note_count(),
        skipped: result
            .decisions
            .iter()
            .filter(|d| d.is_skipped())
            .map(|d| d.prefix.clone())
            .collect(),
    };

    let replaced = session.store(result)?;
    log::info!(
        "Converted feature response: {} events, {} notes, {} buckets skipped{}",
        output.events.len(),
        output.note_count,
        output.skipped.len(),
        replaced
            .map(|id| format!(" (replaced {})", id))
            .unwrap_or_default()
    );

    Ok(output)
}

// ==================== EXPORT COMMANDS ====================

#[derive(Debug, Default, Deserialize)]
pub struct ExportMidiInput {
    /// Events to encode; the session's latest result when absent
    pub events: Option<Vec<Event>>,
    pub ppq: Option<u16>,
    pub sequence_name: Option<String>,
    pub instrument_names: Option<bool>,
}

impl ExportMidiInput {
    /// Overlay the per-call overrides on the configured options
    pub fn options(&self, base: &MidiExportOptions) -> MidiExportOptions {
        let mut options = base.clone();
        if let Some(ppq) = self.ppq {
            options.ppq = ppq;
        }
        if let Some(sequence_name) = &self.sequence_name {
            options.sequence_name = sequence_name.clone();
        }
        if let Some(instrument_names) = self.instrument_names {
            options.instrument_names = instrument_names;
        }
        options
    }

    fn events(&self, session: &SessionState) -> CommandResult<Vec<Event>> {
        match &self.events {
            Some(events) => Ok(events.clone()),
            None => Ok(session.latest_events()?),
        }
    }
}

/// Encode as MIDI file bytes
pub fn export_midi_command(
    session: &SessionState,
    pipeline: &Pipeline,
    base: &MidiExportOptions,
    input: &ExportMidiInput,
) -> CommandResult<Vec<u8>> {
    let events = input.events(session)?;
    let options = input.options(base);

    let midi_bytes = pipeline
        .encode(&events, &options)
        .map_err(|e| CommandError {
            message: format!("Failed to export MIDI: {}", e),
        })?;

    Ok(midi_bytes)
}

/// Encode as a `data:audio/midi;base64,...` URI for a player widget
pub fn midi_uri_command(
    session: &SessionState,
    pipeline: &Pipeline,
    base: &MidiExportOptions,
    input: &ExportMidiInput,
) -> CommandResult<String> {
    let bytes = export_midi_command(session, pipeline, base, input)?;
    Ok(storage::to_data_uri(&bytes))
}

#[derive(Debug, Deserialize)]
pub struct SaveMidiInput {
    pub directory: PathBuf,
    pub filename: String,
    #[serde(default)]
    pub export: ExportMidiInput,
}

#[derive(Debug, Serialize)]
pub struct SavedMidi {
    pub path: PathBuf,
    pub sha256: String,
    pub size: usize,
}

/// Encode and write the file to disk
pub fn save_midi_command(
    session: &SessionState,
    pipeline: &Pipeline,
    base: &MidiExportOptions,
    input: &SaveMidiInput,
) -> CommandResult<SavedMidi> {
    let bytes = export_midi_command(session, pipeline, base, &input.export)?;
    let (path, sha256) = storage::store_midi(&input.directory, &input.filename, &bytes)?;

    log::info!("Saved {} ({} bytes, sha256 {})", path.display(), bytes.len(), sha256);

    Ok(SavedMidi {
        path,
        sha256,
        size: bytes.len(),
    })
}
