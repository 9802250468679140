//! OAuth token store for the calendar writer.
//!
//! Reads the authorized-user JSON written by the credential setup step
//! (`token`, `refresh_token`, `token_uri`, `client_id`, `client_secret`,
//! `expiry`), hands out access tokens, and refreshes them against
//! `token_uri` when they are about to expire. Refreshed tokens are written
//! back to the same file so the next start does not need a refresh.
//!
//! Obtaining the first token (browser consent) is not done here.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracker_core::{CalendarError, TrackerError};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    /// Unknown keys are kept so rewriting the file does not lose them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    credentials: AuthorizedUser,
}

impl TokenStore {
    /// Loads and sanity-checks the token file. Failures here are fatal at
    /// startup: without a usable token there is no calendar to write to.
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let data = fs::read(path).map_err(|err| {
            TrackerError::Credentials(format!(
                "cannot read token file {}: {}",
                path.display(),
                err
            ))
        })?;
        let credentials: AuthorizedUser = serde_json::from_slice(&data).map_err(|err| {
            TrackerError::Credentials(format!(
                "token file {} is not valid JSON: {}",
                path.display(),
                err
            ))
        })?;

        let store = Self {
            path: path.to_path_buf(),
            credentials,
        };

        if store.credentials.token.is_none() && !store.can_refresh() {
            return Err(TrackerError::Credentials(format!(
                "token file {} has neither an access token nor refresh credentials",
                path.display()
            )));
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credentials(&self) -> &AuthorizedUser {
        &self.credentials
    }

    pub fn can_refresh(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.credentials.refresh_token)
            && present(&self.credentials.client_id)
            && present(&self.credentials.client_secret)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.credentials.expiry.as_deref().and_then(parse_expiry)
    }

    /// A token without a recorded expiry is treated as valid until the API
    /// rejects it.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.credentials.token.is_none() {
            return true;
        }
        match self.expires_at() {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now,
            None => false,
        }
    }

    /// Drops the cached access token after the API rejected it, so the next
    /// call refreshes.
    pub fn invalidate(&mut self) {
        debug!("Invalidating cached access token");
        self.credentials.token = None;
    }

    pub fn access_token(
        &mut self,
        client: &reqwest::blocking::Client,
    ) -> Result<String, CalendarError> {
        let now = Utc::now();
        if self.needs_refresh(now) {
            self.refresh(client, now)?;
        }
        self.credentials
            .token
            .clone()
            .ok_or_else(|| CalendarError::Auth("no access token available".to_string()))
    }

    pub fn refresh_form(&self) -> Result<Vec<(&'static str, String)>, CalendarError> {
        if !self.can_refresh() {
            return Err(CalendarError::Auth(
                "token expired and no refresh credentials are stored".to_string(),
            ));
        }
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        Ok(vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", field(&self.credentials.refresh_token)),
            ("client_id", field(&self.credentials.client_id)),
            ("client_secret", field(&self.credentials.client_secret)),
        ])
    }

    fn refresh(
        &mut self,
        client: &reqwest::blocking::Client,
        now: DateTime<Utc>,
    ) -> Result<(), CalendarError> {
        let form = self.refresh_form()?;
        debug!(token_uri = %self.credentials.token_uri, "Refreshing access token");

        let response = client
            .post(&self.credentials.token_uri)
            .form(&form)
            .send()
            .map_err(|err| CalendarError::Network(format!("token refresh failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            // 400 invalid_grant means the refresh token was revoked or expired.
            return Err(CalendarError::Auth(format!(
                "token refresh rejected (HTTP {}): {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .map_err(|err| CalendarError::Malformed(format!("token response: {}", err)))?;
        self.apply_refresh(refreshed, now);
        info!(expiry = ?self.credentials.expiry, "Access token refreshed");

        if let Err(err) = self.save() {
            warn!(error = %err, path = %self.path.display(), "Failed to persist refreshed token");
        }
        Ok(())
    }

    pub fn apply_refresh(&mut self, refreshed: RefreshResponse, now: DateTime<Utc>) {
        self.credentials.token = Some(refreshed.access_token);
        // An out-of-range `expires_in` is stored as "no expiry".
        self.credentials.expiry = refreshed
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .map(format_expiry);
        if let Some(refresh_token) = refreshed.refresh_token {
            self.credentials.refresh_token = Some(refresh_token);
        }
    }

    pub fn save(&self) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("Failed to create token dir: {}", err))?;
        }

        let payload = serde_json::to_vec_pretty(&self.credentials)
            .map_err(|err| format!("Failed to serialize token: {}", err))?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload).map_err(|err| format!("Failed to write token: {}", err))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|err| format!("Failed to commit token: {}", err))?;
        Ok(())
    }
}

/// Accepts RFC 3339 and the offset-less UTC form some token writers emit.
fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn format_expiry(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
