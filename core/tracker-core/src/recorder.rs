//! Session recorder: the polling loop's state machine.
//!
//! ## State Machine
//!
//! ```text
//! Idle   --present-->  Active   record start = now
//! Active --present-->  Active   no-op
//! Active --absent--->  Idle     record end = now, emit one event
//! Idle   --absent--->  Idle     no-op
//! ```
//!
//! Detection is sampled, not event-driven: a run shorter than the poll
//! interval can fall entirely between two ticks and is never seen.
//!
//! ## Emission policy
//!
//! A failed calendar write is buffered and retried once at the start of the
//! next tick; if the retry fails too the event is dropped and logged. The
//! buffer holds one event, and it is always drained (retried) before a new
//! session can end on the same tick, so nothing is evicted unretried.
//!
//! On shutdown an open session is closed at the current time and emitted
//! when `flush_on_shutdown` is set; otherwise it is discarded.

use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info, warn};

use crate::calendar::{
    format_duration, CalendarEvent, CalendarWriter, CreatedEvent, EventTemplate,
};
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::monitor::{sample, ProcessMonitor};
use crate::session::{RecorderState, Session};
use crate::ticker::{TickOutcome, Ticker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Started(DateTime<FixedOffset>),
    Continued,
    Ended(Session),
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Created(CreatedEvent),
    /// Write failed; held for one retry on the next tick.
    Deferred,
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub present: bool,
    pub transition: Transition,
    pub retried: Option<EmitOutcome>,
    pub emitted: Option<EmitOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub ticks: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub events_created: u64,
    pub events_dropped: u64,
}

/// Non-collaborator settings for a recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderSettings {
    pub process_name: String,
    pub template: EventTemplate,
    pub flush_on_shutdown: bool,
}

impl RecorderSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            process_name: config.process_name.clone(),
            template: EventTemplate::from_config(config),
            flush_on_shutdown: config.flush_on_shutdown,
        }
    }
}

pub struct SessionRecorder<M, W, C> {
    monitor: M,
    writer: W,
    clock: C,
    settings: RecorderSettings,
    state: RecorderState,
    pending: Option<CalendarEvent>,
    stats: RecorderStats,
}

impl<M, W, C> SessionRecorder<M, W, C>
where
    M: ProcessMonitor,
    W: CalendarWriter,
    C: Clock,
{
    pub fn new(monitor: M, writer: W, clock: C, settings: RecorderSettings) -> Self {
        Self {
            monitor,
            writer,
            clock,
            settings,
            state: RecorderState::Idle,
            pending: None,
            stats: RecorderStats::default(),
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn active_session(&self) -> Option<&Session> {
        match &self.state {
            RecorderState::Active(session) => Some(session),
            RecorderState::Idle => None,
        }
    }

    pub fn pending_retry(&self) -> Option<&CalendarEvent> {
        self.pending.as_ref()
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Applies one presence sample to the state machine. Reads the clock only
    /// on edges.
    pub fn observe(&mut self, present: bool) -> Transition {
        let state = std::mem::replace(&mut self.state, RecorderState::Idle);
        let (next, transition) = match (state, present) {
            (RecorderState::Idle, true) => {
                let start = self.clock.now();
                self.stats.sessions_opened += 1;
                (
                    RecorderState::Active(Session::open(start)),
                    Transition::Started(start),
                )
            }
            (RecorderState::Active(session), true) => {
                (RecorderState::Active(session), Transition::Continued)
            }
            (RecorderState::Active(session), false) => {
                let closed = session.close(self.clock.now());
                self.stats.sessions_closed += 1;
                (RecorderState::Idle, Transition::Ended(closed))
            }
            (RecorderState::Idle, false) => (RecorderState::Idle, Transition::Idle),
        };
        self.state = next;
        transition
    }

    /// One loop iteration. Never fails: monitor errors read as "absent" and
    /// calendar errors follow the retry-once policy.
    pub fn tick(&mut self) -> TickReport {
        self.stats.ticks += 1;

        let retried = self.retry_pending();
        let present = sample(&mut self.monitor, &self.settings.process_name);
        let transition = self.observe(present);

        let emitted = match &transition {
            Transition::Started(start) => {
                info!(
                    process = %self.settings.process_name,
                    start = %start.to_rfc3339(),
                    "Session started"
                );
                None
            }
            Transition::Ended(session) => {
                log_session_end(&self.settings.process_name, session);
                Some(self.emit(session, true))
            }
            Transition::Continued | Transition::Idle => None,
        };

        TickReport {
            present,
            transition,
            retried,
            emitted,
        }
    }

    /// Drives `tick` until the ticker reports shutdown, then flushes.
    pub fn run<T: Ticker>(&mut self, ticker: &mut T) -> Option<Session> {
        info!(
            process = %self.settings.process_name,
            calendar = %self.settings.template.calendar_id,
            "Tracking sessions"
        );
        loop {
            self.tick();
            if ticker.wait() == TickOutcome::Shutdown {
                break;
            }
        }
        let flushed = self.shutdown();
        info!(
            ticks = self.stats.ticks,
            sessions = self.stats.sessions_closed,
            events_created = self.stats.events_created,
            events_dropped = self.stats.events_dropped,
            "Tracker stopped"
        );
        flushed
    }

    /// Final flush. Retries any buffered event once more, then closes and
    /// emits the open session if `flush_on_shutdown` is set. There is no
    /// later tick, so failures here are dropped rather than buffered.
    pub fn shutdown(&mut self) -> Option<Session> {
        self.retry_pending();

        let session = match std::mem::replace(&mut self.state, RecorderState::Idle) {
            RecorderState::Active(session) => session,
            RecorderState::Idle => return None,
        };

        if !self.settings.flush_on_shutdown {
            warn!(
                start = %session.start.to_rfc3339(),
                "Discarding open session at shutdown"
            );
            return None;
        }

        let closed = session.close(self.clock.now());
        self.stats.sessions_closed += 1;
        log_session_end(&self.settings.process_name, &closed);
        self.emit(&closed, false);
        Some(closed)
    }

    fn emit(&mut self, session: &Session, allow_retry: bool) -> EmitOutcome {
        let Some(event) = self.settings.template.build(session) else {
            // Only closed sessions reach here.
            debug!("Skipping emission for open session");
            return EmitOutcome::Dropped;
        };

        match self.writer.create_event(&event) {
            Ok(created) => {
                self.record_created(&created);
                EmitOutcome::Created(created)
            }
            Err(err) if allow_retry => {
                warn!(
                    error = %err,
                    start = %event.start.to_rfc3339(),
                    "Calendar write failed; will retry once next tick"
                );
                self.pending = Some(event);
                EmitOutcome::Deferred
            }
            Err(err) => {
                self.record_dropped(&event, &err.to_string());
                EmitOutcome::Dropped
            }
        }
    }

    fn retry_pending(&mut self) -> Option<EmitOutcome> {
        let event = self.pending.take()?;
        match self.writer.create_event(&event) {
            Ok(created) => {
                self.record_created(&created);
                Some(EmitOutcome::Created(created))
            }
            Err(err) => {
                self.record_dropped(&event, &err.to_string());
                Some(EmitOutcome::Dropped)
            }
        }
    }

    fn record_created(&mut self, created: &CreatedEvent) {
        self.stats.events_created += 1;
        info!(
            event_id = created.id.as_deref().unwrap_or("unknown"),
            "Calendar event created"
        );
    }

    fn record_dropped(&mut self, event: &CalendarEvent, reason: &str) {
        self.stats.events_dropped += 1;
        error!(
            error = %reason,
            start = %event.start.to_rfc3339(),
            end = %event.end.to_rfc3339(),
            "Dropping session; calendar write failed"
        );
    }
}

fn log_session_end(process_name: &str, session: &Session) {
    let end = session.end.map(|end| end.to_rfc3339()).unwrap_or_default();
    let duration = session.duration().map(format_duration).unwrap_or_default();
    info!(
        process = %process_name,
        start = %session.start.to_rfc3339(),
        end = %end,
        duration = %duration,
        "Session ended"
    );
}
