//! An iCalendar file as the target of published scones, for calendars without an API.

use std::{
    fs::write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use ical::{
    generator::{
        Emitter, IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property,
    },
    ical_property,
};

use crate::{
    error::{Result, SconeError},
    publisher::{CalendarService, EventPayload, PublishedEvent},
};

static PROD_ID: &str = "-//Scone Alert//arizmendi-sanrafael.com";
static FORMAT: &str = "%Y%m%dT%H%M%S";

/// Collects the published events in a calendar and keeps `path` up to date with it.
pub struct IcsCalendar {
    path: PathBuf,
    calendar: IcalCalendar,
    changed: String,
}

impl IcsCalendar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            calendar: IcalCalendarBuilder::version("2.0")
                .gregorian()
                .prodid(PROD_ID)
                .build(),
            changed: chrono::Utc::now().format(FORMAT).to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn calendar(&self) -> &IcalCalendar {
        &self.calendar
    }
}

/// Build the iCalendar event of the payload.
fn get_event(payload: &EventPayload, changed: &str) -> IcalEvent {
    IcalEventBuilder::tzid(payload.time_zone.as_str())
        .uid(payload.uid.as_str())
        .changed(changed)
        .start(payload.start.format(FORMAT).to_string())
        .end(payload.end.format(FORMAT).to_string())
        .set(ical_property!("SUMMARY", payload.summary.as_str()))
        .set(ical_property!("LOCATION", payload.location.as_str()))
        .set(ical_property!("DESCRIPTION", payload.description.as_str()))
        .set(ical_property!("TRANSP", payload.transparency.to_uppercase()))
        .build()
}

#[async_trait]
impl CalendarService for IcsCalendar {
    async fn insert_event(&mut self, payload: &EventPayload) -> Result<PublishedEvent> {
        self.calendar.events.push(get_event(payload, &self.changed));
        write(&self.path, self.calendar.generate()).map_err(|err| SconeError::Publish {
            summary: payload.summary.clone(),
            source: Box::new(SconeError::io(&self.path, err)),
        })?;
        Ok(PublishedEvent {
            uid: payload.uid.clone(),
            link: format!("{}#{}", self.path.display(), payload.uid),
        })
    }
}
