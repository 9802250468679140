//! Session data model.
//!
//! A session is one contiguous interval during which the target process was
//! seen running on every tick. It lives only inside the recorder and is
//! discarded once its calendar event has been emitted (or dropped).

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub start: DateTime<FixedOffset>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl Session {
    pub fn open(start: DateTime<FixedOffset>) -> Self {
        Self { start, end: None }
    }

    /// Closes the session at `end`. The recorded end is kept as observed;
    /// clamping of degenerate intervals happens when the event is built.
    pub fn close(self, end: DateTime<FixedOffset>) -> Self {
        Self {
            start: self.start,
            end: Some(end),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }

    /// Observed length; `None` while the session is still open.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end.signed_duration_since(self.start))
    }
}

/// Recorder state. `Active` owns the open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Active(Session),
}

impl RecorderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecorderState::Idle => "idle",
            RecorderState::Active(_) => "active",
        }
    }
}
