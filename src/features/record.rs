// Flattened feature records
// Validates the raw feature response into path-addressed numeric arrays

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::path::{split_segments, FeaturePath};

/// Errors for feature responses that are not an array of `{feature_path, data}`
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feature response must be an array of records")]
    NotAnArray,

    #[error("Record {index} is not an object")]
    NotAnObject { index: usize },

    #[error("Record {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("Record {index} has a non-string `feature_path`")]
    InvalidPath { index: usize },

    #[error("Record {index} has a non-array `data`")]
    DataNotArray { index: usize },

    #[error("Record {index} has a non-numeric value at data[{position}]")]
    NonNumericData { index: usize, position: usize },
}

pub type InputResult<T> = Result<T, InputError>;

/// One flattened array from the feature response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedRecord {
    /// Non-empty path segments, in order
    pub path: Vec<String>,

    /// Numeric payload
    pub data: Vec<f64>,
}

impl FlattenedRecord {
    /// Create a record from a raw slash-delimited path
    pub fn new(feature_path: &str, data: Vec<f64>) -> Self {
        FlattenedRecord {
            path: split_segments(feature_path),
            data,
        }
    }

    /// Parsed root / prefix / field, or `None` for paths under two segments
    pub fn feature_path(&self) -> Option<FeaturePath> {
        FeaturePath::from_segments(&self.path)
    }
}

/// Parse a feature response from JSON text
pub fn parse_records(json: &str) -> InputResult<Vec<FlattenedRecord>> {
    let value: Value = serde_json::from_str(json)?;
    records_from_value(&value)
}

/// Validate an already-decoded feature response
///
/// Every record must be an object with a string `feature_path` and an array
/// of numbers in `data`; any other keys are ignored. The first violation
/// aborts the whole call.
pub fn records_from_value(value: &Value) -> InputResult<Vec<FlattenedRecord>> {
    let items = value.as_array().ok_or(InputError::NotAnArray)?;
    let mut records = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or(InputError::NotAnObject { index })?;

        let feature_path = object
            .get("feature_path")
            .ok_or(InputError::MissingField {
                index,
                field: "feature_path",
            })?
            .as_str()
            .ok_or(InputError::InvalidPath { index })?;

        let data = object
            .get("data")
            .ok_or(InputError::MissingField {
                index,
                field: "data",
            })?
            .as_array()
            .ok_or(InputError::DataNotArray { index })?;

        let data = data
            .iter()
            .enumerate()
            .map(|(position, v)| {
                v.as_f64()
                    .ok_or(InputError::NonNumericData { index, position })
            })
            .collect::<InputResult<Vec<f64>>>()?;

        records.push(FlattenedRecord::new(feature_path, data));
    }

    Ok(records)
}
