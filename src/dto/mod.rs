use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Healthcheck payloads.
pub mod health;
/// Host endpoint payloads.
pub mod host;
/// Player endpoint payloads.
pub mod player;
/// Question views with and without their answer.
pub mod question;
/// Public session status.
pub mod session;
/// Server-Sent Events payloads.
pub mod sse;
/// Shared validation helpers.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
