// Conversion pipeline
// Grouper -> assembler -> encoder, each stage a pure function of its input

use serde_json::{json, Value};
use thiserror::Error;

use super::trace::{PipelineStage, TraceEntry, TraceWriter};
use crate::events::{assemble_with_report, Assembly, Event};
use crate::features::{group, parse_records, records_from_value, FlattenedRecord, InputError};
use crate::smf::{encode_with_options, EncodeError, MidiExportOptions};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed feature response: {0}")]
    Input(#[from] InputError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Convert a decoded feature response into a sorted event timeline
pub fn convert(input: &Value) -> Result<Vec<Event>, InputError> {
    Ok(Pipeline::new().convert_value(input)?.events)
}

/// Encode a timeline as a Type-1 SMF at the given resolution
pub fn encode(events: &[Event], ppq: u16) -> Result<Vec<u8>, EncodeError> {
    crate::smf::encode(events, ppq)
}

/// Runs conversions, optionally tracing each stage
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    trace: Option<TraceWriter>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { trace: None }
    }

    pub fn with_trace(trace: TraceWriter) -> Self {
        Pipeline { trace: Some(trace) }
    }

    /// Parse, group and assemble a feature response given as JSON text
    pub fn convert_json(&self, json: &str) -> Result<Assembly, InputError> {
        let records = parse_records(json)?;
        Ok(self.convert_records(&records))
    }

    pub fn convert_value(&self, input: &Value) -> Result<Assembly, InputError> {
        let records = records_from_value(input)?;
        Ok(self.convert_records(&records))
    }

    pub fn convert_records(&self, records: &[FlattenedRecord]) -> Assembly {
        let buckets = group(records);
        self.record(
            TraceEntry::completed(PipelineStage::Group, "Grouped feature records").with_data(json!({
                "records": records.len(),
                "buckets": buckets.len(),
            })),
        );

        let assembly = assemble_with_report(&buckets);
        let skipped: Vec<&str> = assembly.skipped().map(|d| d.prefix.as_str()).collect();
        self.record(
            TraceEntry::completed(PipelineStage::Assemble, "Assembled event timeline").with_data(json!({
                "events": assembly.events.len(),
                "tracks": assembly.track_count(),
                "skipped": skipped,
            })),
        );

        assembly
    }

    pub fn encode(&self, events: &[Event], options: &MidiExportOptions) -> Result<Vec<u8>, EncodeError> {
        let bytes = encode_with_options(events, options)?;
        self.record(
            TraceEntry::completed(PipelineStage::Encode, "Encoded Standard MIDI File").with_data(json!({
                "events": events.len(),
                "bytes": bytes.len(),
                "ppq": options.ppq,
            })),
        );
        Ok(bytes)
    }

    /// Convert and encode in one call
    pub fn run(&self, json: &str, options: &MidiExportOptions) -> Result<(Assembly, Vec<u8>), PipelineError> {
        let assembly = self.convert_json(json)?;
        let bytes = self.encode(&assembly.events, options)?;
        Ok((assembly, bytes))
    }

    fn record(&self, entry: TraceEntry) {
        if let Some(trace) = &self.trace {
            trace.record(entry);
        }
    }
}
