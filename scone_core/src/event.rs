//! Normalization of raw calendar entries into [`Event`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::{
    error::{Result, SconeError},
    scone_client::RawRecord,
    time_window::TimeWindow,
};

static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
            &
            (?:
                \#(?P<decimal>[0-9]{1,7}) # a decimal code point
                | \#[xX](?P<hex>[0-9a-fA-F]{1,6}) # a hexadecimal code point
                | (?P<name>amp|lt|gt|quot|apos|nbsp) # a named entity
            )
            ;
        ",
    )
    .unwrap()
});

/// One occurrence of a scone on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    /// Path relative to the bakery's website.
    pub source_url: String,
}

impl Event {
    /// Convert a raw record into an event in the given timezone.
    ///
    /// A record whose start lies after its end is kept as it is,
    /// one without an end ends when it starts.
    pub fn from_record(record: &RawRecord, tz: Tz) -> Result<Self> {
        let start = from_epoch_millis(record.start_date, tz)?;
        let end = match record.end_date {
            Some(end_date) => from_epoch_millis(end_date, tz)?,
            None => start,
        };
        Ok(Self {
            name: name_of(record),
            start,
            end,
            source_url: record.full_url.clone(),
        })
    }

    /// The name in the form used for matching and as aggregate key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Drop events which ended before the reference instant.
    pub future_only: bool,
    /// Drop events starting later than this many days after the reference instant.
    /// `None` and `Some(0)` don't bound anything.
    pub days_ahead: Option<u32>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            future_only: true,
            days_ahead: None,
        }
    }
}

/// Convert the records into events, keeping their order.
pub fn normalize(
    records: &[RawRecord],
    time_window: &TimeWindow,
    options: &NormalizeOptions,
) -> Result<Vec<Event>> {
    let reference = time_window.reference();
    let tz = time_window.timezone();
    // a horizon past the end of time bounds nothing
    let horizon = options
        .days_ahead
        .filter(|days| *days > 0)
        .and_then(|days| Duration::try_days(i64::from(days)))
        .and_then(|days| reference.checked_add_signed(days));
    let mut events = Vec::with_capacity(records.len());
    for record in records {
        let event = Event::from_record(record, tz)?;
        if options.future_only && event.end < reference {
            continue;
        }
        if let Some(horizon) = horizon {
            if event.start > horizon {
                continue;
            }
        }
        events.push(event);
    }
    debug!(
        records = records.len(),
        events = events.len(),
        "normalized calendar entries"
    );
    Ok(events)
}

/// Group events by their lowercase name, keeping the order of the dates.
pub fn group_by_name(events: &[Event]) -> BTreeMap<String, Vec<&Event>> {
    let mut groups: BTreeMap<String, Vec<&Event>> = BTreeMap::new();
    for event in events {
        groups.entry(event.key()).or_default().push(event);
    }
    groups
}

/// The trimmed, unescaped title of a record.
pub(crate) fn name_of(record: &RawRecord) -> String {
    unescape_html(&record.title).trim().to_string()
}

pub(crate) fn from_epoch_millis(millis: i64, tz: Tz) -> Result<DateTime<Tz>> {
    tz.timestamp_millis_opt(millis)
        .single()
        .ok_or(SconeError::Timestamp(millis))
}

/// Decode the HTML entities the website puts into titles.
fn unescape_html(text: &str) -> String {
    ENTITY_REGEX
        .replace_all(text, |captures: &Captures| {
            let decoded = if let Some(decimal) = captures.name("decimal") {
                decimal.as_str().parse().ok().and_then(char::from_u32)
            } else if let Some(hex) = captures.name("hex") {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
            } else {
                match &captures["name"] {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| captures[0].to_string(), String::from)
        })
        .into_owned()
}
