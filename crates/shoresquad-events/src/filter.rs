//! Time-window filters over the event list.

use chrono::{Datelike, Duration, NaiveDate};

use crate::types::CleanupEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Today,
    /// The coming Saturday (today, if it is Saturday) and the Sunday after it
    Weekend,
    /// Today through seven days from now, inclusive
    Week,
}

impl EventFilter {
    /// Parse a filter name; anything unrecognised shows every event
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "today" => Self::Today,
            "weekend" => Self::Weekend,
            "week" => Self::Week,
            _ => Self::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Weekend => "weekend",
            Self::Week => "week",
        }
    }

    /// Whether `date` passes this filter on the day `today`
    pub fn matches_date(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Self::All => true,
            Self::Today => date == today,
            Self::Weekend => {
                let saturday = next_saturday(today);
                date == saturday || date == saturday + Duration::days(1)
            }
            Self::Week => date >= today && date <= today + Duration::days(7),
        }
    }

    pub fn matches(&self, event: &CleanupEvent, today: NaiveDate) -> bool {
        self.matches_date(event.date, today)
    }
}

fn next_saturday(today: NaiveDate) -> NaiveDate {
    let weekday = i64::from(today.weekday().num_days_from_sunday());
    today + Duration::days((6 - weekday) % 7)
}
