//! Google Calendar implementation of `CalendarWriter`.
//!
//! One blocking `events.insert` call per finished session. Auth failures
//! (401/403) invalidate the cached token so the next attempt refreshes it.

use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use tracker_core::{CalendarError, CalendarEvent, CalendarWriter, CreatedEvent, TrackerError};

use crate::oauth::{truncate, TokenStore};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    html_link: Option<String>,
}

pub struct GoogleCalendarWriter {
    client: Client,
    tokens: TokenStore,
    api_base: Url,
}

impl GoogleCalendarWriter {
    /// Builds the writer and makes sure a usable access token exists before
    /// the loop starts. Any failure is a startup error.
    pub fn connect(tokens: TokenStore) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("session-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| TrackerError::Credentials(format!("HTTP client: {}", err)))?;
        let api_base = Url::parse(DEFAULT_API_BASE)
            .map_err(|err| TrackerError::ConfigInvalid(format!("calendar API base: {}", err)))?;

        let mut writer = Self {
            client,
            tokens,
            api_base,
        };
        writer
            .tokens
            .access_token(&writer.client)
            .map_err(|err| TrackerError::Credentials(err.to_string()))?;
        Ok(writer)
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn send(&mut self, event: &CalendarEvent) -> Result<Response, CalendarError> {
        let token = self.tokens.access_token(&self.client)?;
        let url = events_url(&self.api_base, &event.calendar_id)?;
        debug!(url = %url, "Inserting calendar event");

        self.client
            .post(url)
            .bearer_auth(token)
            .json(&event_body(event))
            .send()
            .map_err(|err| CalendarError::Network(err.to_string()))
    }
}

impl CalendarWriter for GoogleCalendarWriter {
    fn create_event(&mut self, event: &CalendarEvent) -> Result<CreatedEvent, CalendarError> {
        let response = self.send(event)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.tokens.invalidate();
            let body = response.text().unwrap_or_default();
            return Err(CalendarError::Auth(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&body, ERROR_BODY_CHARS)
            )));
        }

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CalendarError::Rejected {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_CHARS),
            });
        }

        let text = response
            .text()
            .map_err(|err| CalendarError::Network(format!("reading response: {}", err)))?;
        parse_inserted(&text)
    }
}

/// `calendars/{calendarId}/events`, with the id percent-encoded as one path
/// segment (ids contain `@` and sometimes `#`).
fn events_url(base: &Url, calendar_id: &str) -> Result<Url, CalendarError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| CalendarError::Malformed("calendar API base cannot hold a path".to_string()))?
        .pop_if_empty()
        .extend(["calendars", calendar_id, "events"]);
    Ok(url)
}

fn event_body(event: &CalendarEvent) -> EventBody<'_> {
    let time = |at: &chrono::DateTime<chrono::FixedOffset>| EventTime {
        date_time: at.to_rfc3339(),
        time_zone: event.time_zone.clone(),
    };
    EventBody {
        summary: &event.summary,
        description: &event.description,
        start: time(&event.start),
        end: time(&event.end),
    }
}

fn parse_inserted(text: &str) -> Result<CreatedEvent, CalendarError> {
    let inserted: InsertedEvent = serde_json::from_str(text)
        .map_err(|err| CalendarError::Malformed(format!("event response: {}", err)))?;
    Ok(CreatedEvent {
        id: inserted.id,
        html_link: inserted.html_link,
    })
}
