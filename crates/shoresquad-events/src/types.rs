//! Cleanup event types.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// How demanding a cleanup is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// Where an event sits relative to a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Past,
    Today,
    Upcoming,
}

/// A scheduled beach cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupEvent {
    pub id: u32,
    pub title: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub description: String,
    pub participants: u32,
    pub max_participants: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub organizer: String,
}

impl CleanupEvent {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn is_full(&self) -> bool {
        self.participants >= self.max_participants
    }

    pub fn spots_left(&self) -> u32 {
        self.max_participants.saturating_sub(self.participants)
    }

    /// Past once the start time has gone by, even on the same day
    pub fn status(&self, now: NaiveDateTime) -> EventStatus {
        if self.starts_at() < now {
            EventStatus::Past
        } else if self.date == now.date() {
            EventStatus::Today
        } else {
            EventStatus::Upcoming
        }
    }

    /// Long-form date, e.g. "Sunday, June 15, 2025"
    pub fn formatted_date(&self) -> String {
        self.date.format("%A, %B %-d, %Y").to_string()
    }
}
