// Conversion session
// Caller-owned holder for the most recent conversion result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use crate::events::{Assembly, BucketDecision, Event};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session state lock poisoned")]
    Poisoned,

    #[error("No conversion has completed in this session")]
    Empty,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One completed conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub events: Vec<Event>,
    pub decisions: Vec<BucketDecision>,
}

impl ConversionResult {
    pub fn from_assembly(assembly: Assembly) -> Self {
        ConversionResult {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            events: assembly.events,
            decisions: assembly.decisions,
        }
    }

    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_note()).count()
    }
}

/// Latest conversion result, shared with whatever drives re-conversion.
///
/// Storing replaces the previous result outright (last write wins). A failed
/// conversion never reaches [`SessionState::store`], so the previous result
/// stays available for export.
#[derive(Debug, Default)]
pub struct SessionState {
    latest: Mutex<Option<ConversionResult>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SessionResult<MutexGuard<'_, Option<ConversionResult>>> {
        self.latest.lock().map_err(|_| SessionError::Poisoned)
    }

    /// Replace the latest result, returning the id of the one replaced
    pub fn store(&self, result: ConversionResult) -> SessionResult<Option<Uuid>> {
        let mut latest = self.lock()?;
        let replaced = latest.as_ref().map(|r| r.id);
        *latest = Some(result);
        Ok(replaced)
    }

    pub fn latest(&self) -> SessionResult<Option<ConversionResult>> {
        Ok(self.lock()?.clone())
    }

    /// Events of the latest result; errors when nothing has been converted
    pub fn latest_events(&self) -> SessionResult<Vec<Event>> {
        self.lock()?
            .as_ref()
            .map(|r| r.events.clone())
            .ok_or(SessionError::Empty)
    }

    pub fn clear(&self) -> SessionResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}
