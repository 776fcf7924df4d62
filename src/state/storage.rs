// File output for encoded MIDI
// Writes .mid files, fingerprints them, and builds data URIs for players
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// MIME type used for MIDI data URIs
pub const MIDI_MIME: &str = "audio/midi";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid output filename: {0:?}")]
    InvalidFilename(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Write MIDI bytes to `dir/filename` and return the path and SHA256 hash
pub fn store_midi(dir: &Path, filename: &str, data: &[u8]) -> StorageResult<(PathBuf, String)> {
    if filename.is_empty() || filename.contains(['/', '\\']) {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }

    fs::create_dir_all(dir)?;
    let file_path = dir.join(filename);
    let mut file = fs::File::create(&file_path)?;
    file.write_all(data)?;

    Ok((file_path, calculate_sha256(data)))
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// `data:audio/midi;base64,...` URI for players and visualizers
pub fn to_data_uri(data: &[u8]) -> String {
    format!("data:{};base64,{}", MIDI_MIME, BASE64.encode(data))
}
