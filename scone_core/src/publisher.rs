//! Turns selected scone events into calendar entries of an external calendar service.

pub mod google;
pub mod ics;

use std::{collections::HashSet, fmt};

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::{
    error::{Result, SconeError},
    event::Event,
    scone_client::BASE_URL,
};

static SUMMARY_SUFFIX: &str = " Scone @ Arizmendi";
static LOCATION: &str = "Arizmendi Bakery & Cafe, San Rafael, CA, USA";
static PROMOTION: &str = "Added by Scone Alert";
static COLOR_ID: &str = "1";
static TRANSPARENCY: &str = "transparent";
static HOURS_FORMAT: &str = "%I%p";
/// Scones are gone soon after opening, so the entry doesn't last the whole day.
static DURATION_HOURS: i64 = 3;

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderMethod {
    Email,
    Popup,
}

impl fmt::Display for ReminderMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Popup => f.write_str("popup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reminder {
    pub method: ReminderMethod,
    /// Minutes before the start of the event.
    pub minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    /// Prefix of the relative source URLs of the events.
    pub base_url: String,
    /// Add a popup five minutes before the start.
    pub final_call_reminder: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            final_call_reminder: false,
        }
    }
}

impl PublishSettings {
    pub fn reminders(&self) -> Vec<Reminder> {
        let mut reminders = vec![
            Reminder {
                method: ReminderMethod::Email,
                minutes: 16 * 60,
            },
            Reminder {
                method: ReminderMethod::Popup,
                minutes: 10 * 60,
            },
        ];
        if self.final_call_reminder {
            reminders.push(Reminder {
                method: ReminderMethod::Popup,
                minutes: 5,
            });
        }
        reminders
    }
}

/// Everything a calendar service needs to create an entry for a scone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    pub uid: String,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub time_zone: String,
    pub color_id: String,
    pub transparency: String,
    pub reminders: Vec<Reminder>,
}

impl EventPayload {
    pub fn from_event(event: &Event, settings: &PublishSettings) -> Self {
        let hours = format!(
            "Hours: {} - {}",
            event.start.format(HOURS_FORMAT),
            event.end.format(HOURS_FORMAT)
        );
        let link = format!(
            "{}{}",
            settings.base_url.trim_end_matches('/'),
            event.source_url
        );
        Self {
            uid: uid(event),
            summary: format!("{}{SUMMARY_SUFFIX}", capitalize(&event.key())),
            location: LOCATION.to_string(),
            description: format!("{hours}\n\n{link}\n\n{PROMOTION}"),
            start: event.start,
            end: event.start + Duration::hours(DURATION_HOURS),
            time_zone: event.start.timezone().name().to_string(),
            color_id: COLOR_ID.to_string(),
            transparency: TRANSPARENCY.to_string(),
            reminders: settings.reminders(),
        }
    }
}

/// A calendar entry created by a [`CalendarService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub uid: String,
    /// Where the entry can be looked at.
    pub link: String,
}

#[async_trait]
pub trait CalendarService {
    async fn insert_event(&mut self, payload: &EventPayload) -> Result<PublishedEvent>;
}

/// Create a calendar entry for every event, one after the other.
///
/// The first failure aborts the remaining events. Events with the same uid
/// are only published once per call, and events the service already holds
/// from an earlier run are skipped.
pub async fn publish_all<S>(
    service: &mut S,
    events: &[Event],
    settings: &PublishSettings,
) -> Result<Vec<PublishedEvent>>
where
    S: CalendarService + Send + ?Sized,
{
    let mut published = Vec::with_capacity(events.len());
    let mut seen = HashSet::new();
    for event in events {
        let payload = EventPayload::from_event(event, settings);
        if !seen.insert(payload.uid.clone()) {
            info!(uid = %payload.uid, "skipping duplicate event");
            continue;
        }
        let created = match service.insert_event(&payload).await {
            Ok(created) => created,
            Err(SconeError::Duplicate { summary, uid }) => {
                info!(%summary, %uid, "event already in the calendar");
                continue;
            }
            Err(err) => return Err(err),
        };
        info!(summary = %payload.summary, link = %created.link, "new calendar event created");
        published.push(created);
    }
    Ok(published)
}

/// Capitalize the first letter of every word.
fn capitalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Get a unique id for a specific scone on a specific day.
///
/// Changing this function is a breaking change!
fn uid(event: &Event) -> String {
    let key = event.key();
    let name = WHITESPACE_REGEX.replace_all(&key, "-");
    let date = event.start.format("%Y%m%d");
    format!("SconeAlert_{name}_{date}@arizmendi-sanrafael.com")
}
