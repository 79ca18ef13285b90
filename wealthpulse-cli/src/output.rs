//! Rendering for command output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use wealthpulse_client::{LogEntry, LogKind, UserId, UserProfile};
use wealthpulse_core::AccessTokenClaims;

/// Snapshot printed by `wealthpulse status`.
#[derive(Debug, Serialize)]
pub struct Status {
    pub base_url: String,
    pub authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
    pub acting_as: Option<UserId>,
    pub user: Option<UserProfile>,
}

impl Status {
    /// Expiry of `access_token`, if it is a JWT with a usable `exp`.
    pub fn expiry_of(access_token: &str) -> Option<DateTime<Utc>> {
        AccessTokenClaims::decode(access_token)
            .ok()
            .and_then(|claims| claims.expires_at().ok())
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("API:            {}\n", self.base_url);

        let session = match (self.authenticated, self.expires_at) {
            (true, Some(at)) => format!("logged in (expires {})", at.to_rfc3339()),
            (true, None) => "logged in".to_string(),
            (false, Some(at)) if self.has_refresh_token => {
                format!("expired at {}, refresh token stored", at.to_rfc3339())
            }
            (false, _) if self.has_refresh_token => "expired, refresh token stored".to_string(),
            (false, _) => "logged out".to_string(),
        };
        out.push_str(&format!("Session:        {}\n", session));

        if let Some(user) = &self.user {
            let role = if user.is_admin { " (admin)" } else { "" };
            out.push_str(&format!("User:           {} <{}>{}\n", user.name, user.email, role));
        }

        match self.acting_as {
            Some(id) => out.push_str(&format!("Viewing as:     user {}\n", id)),
            None => out.push_str("Viewing as:     self\n"),
        }

        out
    }
}

/// One line per entry, newest first.
pub fn render_log(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let kind = match entry.kind {
                LogKind::Error => "ERROR",
                LogKind::Warning => "WARN ",
                LogKind::Info => "INFO ",
            };
            let details = entry
                .details
                .as_ref()
                .map(|d| format!(" {}", d))
                .unwrap_or_default();
            format!(
                "{} {} {}{}\n",
                entry.timestamp.format("%H:%M:%S"),
                kind,
                entry.message,
                details
            )
        })
        .collect()
}
