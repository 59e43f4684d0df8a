//! The history of every scone served, built month by month from the calendar archive.

use std::{
    collections::{btree_map, BTreeMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    error::{Result, SconeError},
    event::{from_epoch_millis, name_of},
    scone_client::{RawRecord, SconeClient},
    time_window::QueryWindow,
};

/// Date format of the aggregate file.
pub static DATE_FORMAT: &str = "%m/%d/%Y";

/// Mapping of lowercase scone names to the dates they were served on.
///
/// Merging only ever appends dates, it never removes any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateStore {
    scones: BTreeMap<String, Vec<String>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduce a month of calendar entries to the dates of each scone.
    ///
    /// Only the title and the start of an entry are read.
    pub fn from_records(records: &[RawRecord], tz: Tz) -> Result<Self> {
        let mut store = Self::new();
        for record in records {
            let start = from_epoch_millis(record.start_date, tz)?;
            store
                .entry(&name_of(record))
                .push(start.format(DATE_FORMAT).to_string());
        }
        Ok(store)
    }

    /// Get the dates of a scone, creating an empty list if it was never seen.
    pub fn entry(&mut self, name: &str) -> &mut Vec<String> {
        self.scones.entry(name.trim().to_lowercase()).or_default()
    }

    pub fn dates(&self, name: &str) -> Option<&[String]> {
        self.scones
            .get(&name.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    /// Append the dates of `other` to the dates of the same scones.
    pub fn merge(&mut self, other: AggregateStore) {
        for (name, dates) in other.scones {
            self.entry(&name).extend(dates);
        }
    }

    pub fn len(&self) -> usize {
        self.scones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scones.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<String>> {
        self.scones.iter()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| SconeError::io(path, err))?;
        serde_json::from_str(&content).map_err(|source| SconeError::Store {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the store to `path`, replacing the previous file only once the new one is complete.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let content = serde_json::to_string_pretty(self).map_err(|source| SconeError::Store {
            path: path.to_path_buf(),
            source,
        })?;
        let mut file = NamedTempFile::new_in(dir).map_err(|err| SconeError::io(dir, err))?;
        file.write_all(content.as_bytes())
            .map_err(|err| SconeError::io(file.path(), err))?;
        file.persist(path)
            .map_err(|err| SconeError::io(path, err.error))?;
        Ok(())
    }
}

/// Summary of a finished bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkReport {
    pub months: u32,
    pub elapsed: Duration,
}

/// Scrapes the calendar archive month by month into an aggregate file.
pub struct Aggregator<'a> {
    client: &'a SconeClient,
    tz: Tz,
    path: PathBuf,
}

impl<'a> Aggregator<'a> {
    /// The first month the archive has data for.
    pub const FLOOR: NaiveDate = match NaiveDate::from_ymd_opt(2015, 8, 1) {
        Some(date) => date,
        None => NaiveDate::MIN,
    };
    /// The archive has no data from this day on.
    pub const CEILING: NaiveDate = match NaiveDate::from_ymd_opt(2021, 1, 1) {
        Some(date) => date,
        None => NaiveDate::MAX,
    };

    pub fn new(client: &'a SconeClient, tz: Tz, path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            tz,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the range against the data available in the archive.
    pub fn validate(start: NaiveDate, end: NaiveDate) -> Result<()> {
        if start < Self::FLOOR || end > Self::CEILING {
            return Err(SconeError::InvalidRange {
                start,
                end,
                floor: Self::FLOOR,
                ceiling: Self::CEILING,
            });
        }
        Ok(())
    }

    /// Scrape every month from `start` (inclusive) to `end` (exclusive).
    ///
    /// The aggregate file is cleared first. A failing month aborts the run,
    /// the months written before stay in the file.
    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<BulkReport> {
        Self::validate(start, end)?;
        info!(
            start = %start.format("%m/%Y"),
            end = %end.format("%m/%Y"),
            "scraping scone data"
        );
        let started = Instant::now();
        AggregateStore::new().save(&self.path)?;
        info!(path = %self.path.display(), "created/cleared aggregate file");

        let mut months = 0;
        let mut cursor = start;
        while cursor < end {
            let window = QueryWindow::containing(cursor);
            let records = self.client.fetch_month(window).await?;
            let month = AggregateStore::from_records(&records, self.tz)?;
            let mut store = AggregateStore::load(&self.path)?;
            store.merge(month);
            store.save(&self.path)?;
            months += 1;
            cursor = window.next().first_day();
        }

        let report = BulkReport {
            months,
            elapsed: started.elapsed(),
        };
        info!(
            months = report.months,
            elapsed = %format!("{:.2}s", report.elapsed.as_secs_f64()),
            "finished scraping scone data"
        );
        Ok(report)
    }
}
