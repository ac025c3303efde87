//! The in-memory event list and its filtered view.

use chrono::{NaiveDate, NaiveTime};
use url::Url;

use crate::error::EventError;
use crate::filter::EventFilter;
use crate::types::{CleanupEvent, Difficulty};

/// Text and link for sharing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareMessage {
    pub title: String,
    pub text: String,
    pub url: String,
}

/// All known events plus the view selected by the active filter.
///
/// The filtered view stores positions into `events`, so joins are visible in
/// it without re-filtering.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: Vec<CleanupEvent>,
    visible: Vec<usize>,
    active_filter: EventFilter,
}

impl EventCatalog {
    pub fn new(events: Vec<CleanupEvent>) -> Self {
        let visible = (0..events.len()).collect();
        Self {
            events,
            visible,
            active_filter: EventFilter::All,
        }
    }

    /// The six launch events
    pub fn with_samples() -> Self {
        Self::new(sample_events())
    }

    pub fn events(&self) -> &[CleanupEvent] {
        &self.events
    }

    pub fn active_filter(&self) -> EventFilter {
        self.active_filter
    }

    /// Events passing the active filter, in catalog order
    pub fn filtered(&self) -> Vec<&CleanupEvent> {
        self.visible.iter().filter_map(|&i| self.events.get(i)).collect()
    }

    pub fn get(&self, id: u32) -> Option<&CleanupEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Recompute the filtered view and remember `filter` as active
    pub fn apply_filter(&mut self, filter: EventFilter, today: NaiveDate) -> Vec<&CleanupEvent> {
        self.visible = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.matches(e, today))
            .map(|(i, _)| i)
            .collect();
        self.active_filter = filter;

        tracing::debug!(
            "Filter '{}' shows {} of {} events",
            filter.as_str(),
            self.visible.len(),
            self.events.len()
        );
        self.filtered()
    }

    /// Append the next page of events and re-apply the active filter.
    ///
    /// Events already present (by id) are not added twice.
    pub fn load_more(&mut self, today: NaiveDate) -> usize {
        let before = self.events.len();
        for event in additional_events() {
            if self.get(event.id).is_none() {
                self.events.push(event);
            }
        }
        let added = self.events.len() - before;
        self.apply_filter(self.active_filter, today);
        tracing::info!("Loaded {} more events", added);
        added
    }

    /// Sign one more participant up for an event
    pub fn join(&mut self, id: u32) -> Result<&CleanupEvent, EventError> {
        let event = self
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EventError::EventNotFound(id))?;

        if event.is_full() {
            return Err(EventError::EventFull {
                id,
                title: event.title.clone(),
            });
        }

        event.participants += 1;
        tracing::info!(
            "Joined \"{}\" ({}/{})",
            event.title,
            event.participants,
            event.max_participants
        );
        Ok(event)
    }

    /// Share text and a deep link of the form `<origin>/?event=<id>`
    pub fn share(&self, id: u32, origin: &str) -> Result<ShareMessage, EventError> {
        let event = self.get(id).ok_or(EventError::EventNotFound(id))?;

        let mut url = Url::parse(origin)
            .map_err(|e| EventError::InvalidOrigin(format!("{}: {}", origin, e)))?;
        url.set_path("/");
        url.set_query(Some(&format!("event={}", id)));

        Ok(ShareMessage {
            title: event.title.clone(),
            text: format!(
                "Join me at \"{}\" on {} in {}! #ShoreSquad #BeachCleanup",
                event.title,
                event.formatted_date(),
                event.location
            ),
            url: url.to_string(),
        })
    }
}

fn event(
    id: u32,
    title: &str,
    (year, month, day): (i32, u32, u32),
    (hour, minute): (u32, u32),
    location: &str,
    description: &str,
    (participants, max_participants): (u32, u32),
    difficulty: Difficulty,
    organizer: &str,
) -> Option<CleanupEvent> {
    Some(CleanupEvent {
        id,
        title: title.to_string(),
        date: NaiveDate::from_ymd_opt(year, month, day)?,
        time: NaiveTime::from_hms_opt(hour, minute, 0)?,
        location: location.to_string(),
        description: description.to_string(),
        participants,
        max_participants,
        difficulty,
        organizer: organizer.to_string(),
    })
}

fn sample_events() -> Vec<CleanupEvent> {
    [
        event(
            1,
            "Sentosa Beach Cleanup",
            (2025, 6, 15),
            (9, 0),
            "Sentosa Beach, Singapore",
            "Join us for our weekly beach cleanup! We provide all supplies and refreshments.",
            (24, 40),
            Difficulty::Easy,
            "Singapore Coast Squad",
        ),
        event(
            2,
            "East Coast Park Challenge",
            (2025, 6, 16),
            (7, 30),
            "East Coast Park, Singapore",
            "Advanced cleanup focusing on rocky areas and coastal vegetation. Experience recommended.",
            (12, 20),
            Difficulty::Hard,
            "Singapore Eco Warriors",
        ),
        event(
            3,
            "Family-Friendly Marina Bay Cleanup",
            (2025, 6, 17),
            (10, 0),
            "Marina Bay, Singapore",
            "Perfect for families! Educational activities for kids while we clean the waterfront.",
            (31, 50),
            Difficulty::Easy,
            "Marina Green Team",
        ),
        event(
            4,
            "Changi Beach Morning Mission",
            (2025, 6, 18),
            (8, 0),
            "Changi Beach, Singapore",
            "Early morning cleanup followed by optional beach games and refreshments.",
            (18, 30),
            Difficulty::Medium,
            "East Side Squad",
        ),
        event(
            5,
            "Labrador Park Coastal Cleanup",
            (2025, 6, 19),
            (9, 30),
            "Labrador Park, Singapore",
            "Focus on park coastline and nature trails. Great for beginners!",
            (22, 35),
            Difficulty::Easy,
            "Labrador Eco Squad",
        ),
        event(
            6,
            "Pulau Ubin Beach Restoration",
            (2025, 6, 21),
            (8, 30),
            "Pulau Ubin, Singapore",
            "Comprehensive cleanup and mangrove restoration project. Tools provided.",
            (8, 25),
            Difficulty::Medium,
            "Island Guardians",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn additional_events() -> Vec<CleanupEvent> {
    [
        event(
            7,
            "Tanjong Beach Dawn Patrol",
            (2025, 6, 22),
            (6, 30),
            "Tanjong Beach, Sentosa",
            "Early bird cleanup for the dedicated! Watch the sunrise while making a difference.",
            (5, 15),
            Difficulty::Medium,
            "Dawn Patrol Squad",
        ),
        event(
            8,
            "Coney Island Community Day",
            (2025, 6, 23),
            (11, 0),
            "Coney Island Park, Singapore",
            "Family event with picnic lunch included! Perfect for first-time volunteers.",
            (15, 60),
            Difficulty::Easy,
            "North Shore Green Initiative",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn ids(events: &[&CleanupEvent]) -> Vec<u32> {
        events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_samples_start_unfiltered() {
        let catalog = EventCatalog::with_samples();
        assert_eq!(catalog.events().len(), 6);
        assert_eq!(ids(&catalog.filtered()), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(catalog.active_filter(), EventFilter::All);
    }

    #[test]
    fn test_apply_filters() {
        let mut catalog = EventCatalog::with_samples();
        // Wednesday 2025-06-11: weekend is 14th/15th
        assert_eq!(ids(&catalog.apply_filter(EventFilter::Weekend, d(6, 11))), vec![1]);
        assert_eq!(ids(&catalog.apply_filter(EventFilter::Today, d(6, 17))), vec![3]);
        assert_eq!(
            ids(&catalog.apply_filter(EventFilter::Week, d(6, 16))),
            vec![2, 3, 4, 5, 6]
        );
        assert_eq!(catalog.active_filter(), EventFilter::Week);
        assert_eq!(catalog.apply_filter(EventFilter::All, d(6, 16)).len(), 6);
    }

    #[test]
    fn test_empty_filter_result() {
        let mut catalog = EventCatalog::with_samples();
        assert!(catalog.apply_filter(EventFilter::Today, d(7, 1)).is_empty());
    }

    #[test]
    fn test_load_more_reapplies_filter() {
        let mut catalog = EventCatalog::with_samples();
        catalog.apply_filter(EventFilter::Weekend, d(6, 18));

        // Weekend of the 21st/22nd: Pulau Ubin plus the new dawn patrol
        assert_eq!(catalog.load_more(d(6, 18)), 2);
        assert_eq!(ids(&catalog.filtered()), vec![6, 7]);

        // Second call adds nothing
        assert_eq!(catalog.load_more(d(6, 18)), 0);
        assert_eq!(catalog.events().len(), 8);
    }

    #[test]
    fn test_join_increments_participants() {
        let mut catalog = EventCatalog::with_samples();
        let joined = catalog.join(1).unwrap();
        assert_eq!(joined.participants, 25);
        assert_eq!(catalog.filtered()[0].participants, 25);
    }

    #[test]
    fn test_join_full_event_fails() {
        let mut catalog = EventCatalog::with_samples();
        for _ in 0..8 {
            catalog.join(2).unwrap();
        }
        let err = catalog.join(2).unwrap_err();
        assert!(matches!(err, EventError::EventFull { id: 2, .. }));
        assert_eq!(catalog.get(2).unwrap().participants, 20);
    }

    #[test]
    fn test_join_unknown_event() {
        let mut catalog = EventCatalog::with_samples();
        assert_eq!(catalog.join(99).unwrap_err(), EventError::EventNotFound(99));
    }

    #[test]
    fn test_share_message() {
        let catalog = EventCatalog::with_samples();
        let share = catalog.share(1, "https://shoresquad.example").unwrap();
        assert_eq!(share.url, "https://shoresquad.example/?event=1");
        assert!(share.text.contains("Sentosa Beach Cleanup"));
        assert!(share.text.contains("Sunday, June 15, 2025"));
    }

    #[test]
    fn test_share_rejects_bad_origin() {
        let catalog = EventCatalog::with_samples();
        assert!(matches!(
            catalog.share(1, "not a url"),
            Err(EventError::InvalidOrigin(_))
        ));
    }
}
