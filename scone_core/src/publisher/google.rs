//! Google Calendar as the target of published scones.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use google_calendar3::{
    api::{Event, EventDateTime, EventReminder, EventReminders},
    hyper_rustls::{HttpsConnector, HttpsConnectorBuilder},
    yup_oauth2::{read_application_secret, InstalledFlowAuthenticator, InstalledFlowReturnMethod},
    CalendarHub,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tracing::debug;

use crate::{
    error::{Result, SconeError},
    publisher::{CalendarService, EventPayload, PublishedEvent},
};

/// Client for creating events in a Google calendar.
pub struct GoogleCalendar {
    hub: CalendarHub<HttpsConnector<HttpConnector>>,
    calendar_id: String,
}

impl GoogleCalendar {
    /// Authenticate with the OAuth client secret at `credentials_path`.
    ///
    /// The first run opens the consent page in the browser, the tokens are
    /// cached in `token_cache_path` for the following runs.
    pub async fn new(
        credentials_path: &Path,
        token_cache_path: &Path,
        calendar_id: impl Into<String>,
    ) -> Result<Self> {
        let secret = read_application_secret(credentials_path)
            .await
            .map_err(|err| SconeError::io(credentials_path, err))?;
        let auth =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .persist_tokens_to_disk(token_cache_path)
                .build()
                .await
                .map_err(|err| SconeError::io(token_cache_path, err))?;
        let connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|err| SconeError::Config(format!("cannot load native TLS roots: {err}")))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self {
            hub: CalendarHub::new(client, auth),
            calendar_id: calendar_id.into(),
        })
    }
}

/// Build the Google representation of the payload.
fn to_google_event(payload: &EventPayload) -> Event {
    let date_time = |instant: chrono::DateTime<chrono_tz::Tz>| EventDateTime {
        date_time: Some(instant.with_timezone(&Utc)),
        time_zone: Some(payload.time_zone.clone()),
        ..Default::default()
    };
    Event {
        i_cal_uid: Some(payload.uid.clone()),
        summary: Some(payload.summary.clone()),
        location: Some(payload.location.clone()),
        description: Some(payload.description.clone()),
        start: Some(date_time(payload.start)),
        end: Some(date_time(payload.end)),
        color_id: Some(payload.color_id.clone()),
        transparency: Some(payload.transparency.clone()),
        reminders: Some(EventReminders {
            use_default: Some(false),
            overrides: Some(
                payload
                    .reminders
                    .iter()
                    .map(|reminder| EventReminder {
                        method: Some(reminder.method.to_string()),
                        minutes: Some(reminder.minutes),
                    })
                    .collect(),
            ),
        }),
        ..Default::default()
    }
}

/// Whether the calendar refused the event because its iCalUID is taken.
fn is_duplicate(err: &google_calendar3::Error) -> bool {
    match err {
        google_calendar3::Error::BadRequest(value) => {
            value.pointer("/error/code").and_then(|code| code.as_u64()) == Some(409)
        }
        google_calendar3::Error::Failure(response) => response.status().as_u16() == 409,
        _ => false,
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn insert_event(&mut self, payload: &EventPayload) -> Result<PublishedEvent> {
        let (_, created) = self
            .hub
            .events()
            .insert(to_google_event(payload), &self.calendar_id)
            .doit()
            .await
            .map_err(|err| {
                if is_duplicate(&err) {
                    SconeError::Duplicate {
                        summary: payload.summary.clone(),
                        uid: payload.uid.clone(),
                    }
                } else {
                    SconeError::Publish {
                        summary: payload.summary.clone(),
                        source: Box::new(err),
                    }
                }
            })?;
        debug!(id = ?created.id, "google calendar accepted event");
        Ok(PublishedEvent {
            uid: payload.uid.clone(),
            link: created.html_link.unwrap_or_default(),
        })
    }
}
