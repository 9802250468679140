//! # tracker-core
//!
//! Core library for session-tracker: samples the process table for one
//! executable, turns presence edges into sessions, and hands each finished
//! session to a calendar-write capability.
//!
//! ## Design Principles
//!
//! - **Synchronous**: one thread, one loop, blocking calls. No async runtime.
//! - **Explicit context**: the recorder owns its monitor, writer and clock;
//!   there is no ambient state, so tests substitute fakes for all three.
//! - **Ticks are isolated**: nothing that happens inside a tick can stop the
//!   loop. Only configuration and credential problems are fatal, at startup.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tracker_core::{IntervalTicker, RecorderSettings, SessionRecorder, SysinfoMonitor, SystemClock};
//!
//! let settings = RecorderSettings::from_config(&config);
//! let mut recorder = SessionRecorder::new(SysinfoMonitor::new(), writer, SystemClock, settings);
//! recorder.run(&mut IntervalTicker::new(config.poll_interval(), shutdown_flag));
//! ```

pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod monitor;
pub mod recorder;
pub mod session;
pub mod ticker;

pub use calendar::{format_duration, CalendarEvent, CalendarWriter, CreatedEvent, EventTemplate};
pub use clock::{Clock, SystemClock};
pub use config::TrackerConfig;
pub use error::{CalendarError, MonitorError, Result, TrackerError};
pub use monitor::{sample, ProcessMonitor, SysinfoMonitor};
pub use recorder::{
    EmitOutcome, RecorderSettings, RecorderStats, SessionRecorder, TickReport, Transition,
};
pub use session::{RecorderState, Session};
pub use ticker::{IntervalTicker, TickOutcome, Ticker};
