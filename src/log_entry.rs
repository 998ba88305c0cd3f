use crate::types::{LogEvent, Scalar};
use chrono::{Local, LocalResult, TimeZone};
use std::fmt;

pub const INVALID_DATE: &str = "Invalid Date";

const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// One labelled item of the bracketed metadata suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaField {
    pub label: &'static str,
    pub value: String,
}

/// A log event projected into display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLogEntry {
    /// Local-time rendering, or "Invalid Date"
    pub timestamp: String,
    pub message: String,
    /// Only the fields that were present, in participant, ip, protocol, round, session order
    pub metadata: Vec<MetaField>,
}

impl FormattedLogEntry {
    /// `[ID: p1 R: 1]`, or an empty string when no metadata was present.
    pub fn suffix(&self) -> String {
        if self.metadata.is_empty() {
            return String::new();
        }
        let body = self
            .metadata
            .iter()
            .map(|field| format!("{}: {}", field.label, field.value))
            .collect::<Vec<_>>()
            .join(" ");
        format!("[{}]", body)
    }
}

impl fmt::Display for FormattedLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.timestamp, self.message)?;
        let suffix = self.suffix();
        if !suffix.is_empty() {
            write!(f, " {}", suffix)?;
        }
        Ok(())
    }
}

/// Formats an event using the local time zone of this machine.
pub fn format(event: &LogEvent) -> FormattedLogEntry {
    format_in(event, &Local)
}

/// Formats an event against an explicit time zone. Never fails.
pub fn format_in<Tz: TimeZone>(event: &LogEvent, tz: &Tz) -> FormattedLogEntry
where
    Tz::Offset: fmt::Display,
{
    FormattedLogEntry {
        timestamp: display_timestamp(event.timestamp.as_ref(), tz),
        message: event.message.clone(),
        metadata: metadata(event),
    }
}

fn display_timestamp<Tz: TimeZone>(timestamp: Option<&Scalar>, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    let Some(seconds) = timestamp.and_then(Scalar::as_f64) else {
        return INVALID_DATE.to_string();
    };
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return INVALID_DATE.to_string();
    }
    match tz.timestamp_millis_opt(millis as i64) {
        LocalResult::Single(at) | LocalResult::Ambiguous(at, _) => {
            at.format(DISPLAY_FORMAT).to_string()
        }
        LocalResult::None => INVALID_DATE.to_string(),
    }
}

fn metadata(event: &LogEvent) -> Vec<MetaField> {
    let text = |value: &Option<String>| value.as_ref().filter(|s| !s.is_empty()).cloned();
    let scalar = |value: &Option<Scalar>| {
        value
            .as_ref()
            .filter(|s| !s.is_unset())
            .map(|s| s.to_string())
    };

    [
        ("ID", text(&event.participant)),
        ("IP", text(&event.ip)),
        ("P", text(&event.protocol)),
        ("R", scalar(&event.round)),
        ("SID", text(&event.session_id)),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|value| MetaField { label, value }))
    .collect()
}
