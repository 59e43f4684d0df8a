//! Selection of events by the ingredients in their names.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::event::Event;

/// How multiple ingredient keywords are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// At least one keyword must be part of the name.
    #[default]
    Union,
    /// Every keyword must be part of the name.
    Intersection,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => f.write_str("union"),
            Self::Intersection => f.write_str("intersection"),
        }
    }
}

/// Get the events whose names contain the ingredients, ignoring case.
///
/// The order of the events is kept and every event is returned at most once.
/// An empty keyword list matches nothing.
pub fn select(events: &[Event], keywords: &[String], mode: FilterMode) -> Vec<Event> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect();
    if keywords.is_empty() {
        return vec![];
    }
    let selected: Vec<Event> = events
        .iter()
        .filter(|event| matches(&event.key(), &keywords, mode))
        .cloned()
        .collect();
    info!(
        %mode,
        keywords = ?keywords,
        events = events.len(),
        matches = selected.len(),
        "filtered events by ingredients"
    );
    selected
}

fn matches(name: &str, keywords: &[String], mode: FilterMode) -> bool {
    match mode {
        FilterMode::Union => keywords.iter().any(|keyword| name.contains(keyword.as_str())),
        FilterMode::Intersection => keywords.iter().all(|keyword| name.contains(keyword.as_str())),
    }
}
