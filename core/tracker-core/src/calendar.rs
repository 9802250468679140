//! Calendar-write capability and event construction.
//!
//! The recorder only knows `CalendarWriter`; authentication and transport
//! belong to whoever implements it. `EventTemplate` turns a closed session
//! into the event body, including the clamp for degenerate intervals.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

use crate::config::TrackerConfig;
use crate::error::CalendarError;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub calendar_id: String,
    pub summary: String,
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end.signed_duration_since(self.start)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: Option<String>,
    pub html_link: Option<String>,
}

pub trait CalendarWriter {
    fn create_event(&mut self, event: &CalendarEvent) -> Result<CreatedEvent, CalendarError>;
}

impl<W: CalendarWriter + ?Sized> CalendarWriter for &mut W {
    fn create_event(&mut self, event: &CalendarEvent) -> Result<CreatedEvent, CalendarError> {
        (**self).create_event(event)
    }
}

impl<W: CalendarWriter + ?Sized> CalendarWriter for Box<W> {
    fn create_event(&mut self, event: &CalendarEvent) -> Result<CreatedEvent, CalendarError> {
        (**self).create_event(event)
    }
}

/// Fixed parts of every emitted event.
///
/// Summary placeholders: `{process}` (target executable) and `{duration}`
/// (observed length, before clamping).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    pub calendar_id: String,
    pub summary: String,
    pub description: String,
    pub time_zone: Option<String>,
    pub process_name: String,
    pub min_duration: Duration,
}

impl EventTemplate {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            calendar_id: config.calendar_id.clone(),
            summary: config.summary.clone(),
            description: config.description.clone(),
            time_zone: config.time_zone.clone(),
            process_name: config.process_name.clone(),
            min_duration: config.min_event_duration(),
        }
    }

    /// Builds the event for a closed session. Returns `None` for a session
    /// that has not been closed yet.
    ///
    /// A session whose end is not after its start (seen on a single tick, or
    /// a clock step backwards) is clamped to `start + min_duration`.
    pub fn build(&self, session: &Session) -> Option<CalendarEvent> {
        let observed_end = session.end?;
        let observed = observed_end.signed_duration_since(session.start);

        let end = if observed <= Duration::zero() {
            session.start + self.min_duration
        } else {
            observed_end
        };

        Some(CalendarEvent {
            calendar_id: self.calendar_id.clone(),
            summary: self.render_summary(observed),
            description: self.description.clone(),
            start: session.start,
            end,
            time_zone: self.time_zone.clone(),
        })
    }

    fn render_summary(&self, observed: Duration) -> String {
        self.summary
            .replace("{process}", &self.process_name)
            .replace("{duration}", &format_duration(observed))
    }
}

/// Formats a duration as `1h 05m 12s`, `5m 03s` or `42s`. Negative values
/// render as `0s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
