//! Chronological merge of a trip's itinerary rows and per-day grouping.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    CarRental, DayTrip, Hotel, Restaurant, Route, TouristSite, Transportation,
};

/// Declaration order is the tie-break when two events share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Transportation,
    HotelCheckOut,
    CarReturn,
    CarPickup,
    HotelCheckIn,
    DayTrip,
    Route,
    TouristSite,
    Restaurant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub kind: EventKind,
    pub entity_id: Uuid,
    pub title: String,
    pub at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    pub location: Option<String>,
}

impl TimelineEvent {
    fn new(kind: EventKind, entity_id: Uuid, title: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            kind,
            entity_id,
            title: title.into(),
            at,
            end_at: None,
            location: None,
        }
    }

    fn ending(mut self, end_at: Option<NaiveDateTime>) -> Self {
        self.end_at = end_at;
        self
    }

    fn at_location(mut self, location: Option<&str>) -> Self {
        self.location = location.map(str::to_string);
        self
    }
}

pub trait TimelineSource {
    fn timeline_events(&self) -> Vec<TimelineEvent>;
}

impl TimelineSource for Hotel {
    fn timeline_events(&self) -> Vec<TimelineEvent> {
        vec![
            TimelineEvent::new(EventKind::HotelCheckIn, self.id, &self.name, self.check_in)
                .at_location(self.address.as_deref()),
            TimelineEvent::new(EventKind::HotelCheckOut, self.id, &self.name, self.check_out)
                .at_location(self.address.as_deref()),
        ]
    }
}

impl TimelineSource for Transportation {
    fn timeline_events(&self) -> Vec<TimelineEvent> {
        let title = format!("{} → {}", self.origin, self.destination);
        vec![
            TimelineEvent::new(EventKind::Transportation, self.id, title, self.departure_at)
                .ending(self.arrival_at)
                .at_location(Some(&self.origin)),
        ]
    }
}

impl TimelineSource for CarRental {
    fn timeline_events(&self) -> Vec<TimelineEvent> {
        let return_location = self
            .return_location
            .as_deref()
            .unwrap_or(&self.pickup_location);
        vec![
            TimelineEvent::new(EventKind::CarPickup, self.id, &self.company, self.pickup_at)
                .at_location(Some(&self.pickup_location)),
            TimelineEvent::new(EventKind::CarReturn, self.id, &self.company, self.return_at)
                .at_location(Some(return_location)),
        ]
    }
}

impl TimelineSource for Restaurant {
    fn timeline_events(&self) -> Vec<TimelineEvent> {
        self.reservation_at
            .map(|at| {
                TimelineEvent::new(EventKind::Restaurant, self.id, &self.name, at)
                    .at_location(self.address.as_deref())
            })
            .into_iter()
            .collect()
    }
}

impl TimelineSource for TouristSite {
    fn timeline_events(&self) -> Vec<TimelineEvent> {
        self.visit_at
            .map(|at| {
                TimelineEvent::new(EventKind::TouristSite, self.id, &self.name, at)
                    .at_location(self.location.as_deref())
            })
            .into_iter()
            .collect()
    }
}

impl TimelineSource for DayTrip {
    fn timeline_events(&self) -> Vec<TimelineEvent> {
        vec![
            TimelineEvent::new(EventKind::DayTrip, self.id, &self.name, self.start_at)
                .ending(self.end_at)
                .at_location(Some(&self.start_location)),
        ]
    }
}

impl TimelineSource for Route {
    fn timeline_events(&self) -> Vec<TimelineEvent> {
        let start = self.start_time.unwrap_or(NaiveTime::MIN);
        vec![TimelineEvent::new(
            EventKind::Route,
            self.id,
            &self.name,
            self.route_date.and_time(start),
        )]
    }
}

/// Sorts by time, then kind, then title.
pub fn sort_events(events: &mut [TimelineEvent]) {
    events.sort_by(|a, b| {
        a.at.cmp(&b.at)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.title.cmp(&b.title))
    });
}

pub fn merge<'a, I>(sources: I) -> Vec<TimelineEvent>
where
    I: IntoIterator<Item = &'a dyn TimelineSource>,
{
    let mut events: Vec<TimelineEvent> = sources
        .into_iter()
        .flat_map(|source| source.timeline_events())
        .collect();
    sort_events(&mut events);
    events
}

/// 1-based day number of `date` within a trip starting on `start`.
pub fn day_index(start: NaiveDate, date: NaiveDate) -> Option<u32> {
    let offset = date.signed_duration_since(start).num_days();
    u32::try_from(offset).ok().map(|days| days + 1)
}

/// Longest trip, in days, that can be created or planned day by day.
pub const MAX_TRIP_DAYS: u32 = 366;

/// Number of calendar days covered by the inclusive range, zero when the
/// range is inverted.
pub fn trip_length(start: NaiveDate, end: NaiveDate) -> u32 {
    day_index(start, end).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct TripDay {
    pub day: u32,
    pub date: NaiveDate,
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub days: Vec<TripDay>,
    pub unscheduled: Vec<TimelineEvent>,
}

/// Buckets sorted events into trip days; anything outside the range goes to
/// `unscheduled`.
pub fn group_by_day(start: NaiveDate, end: NaiveDate, events: Vec<TimelineEvent>) -> DayPlan {
    let mut days: Vec<TripDay> = start
        .iter_days()
        .take(trip_length(start, end).min(MAX_TRIP_DAYS) as usize)
        .enumerate()
        .map(|(index, date)| TripDay {
            day: index as u32 + 1,
            date,
            events: Vec::new(),
        })
        .collect();

    let mut unscheduled = Vec::new();
    for event in events {
        let slot = day_index(start, event.at.date())
            .and_then(|day| days.get_mut(day as usize - 1));
        match slot {
            Some(day) => day.events.push(event),
            None => unscheduled.push(event),
        }
    }

    DayPlan { days, unscheduled }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(2025, 6, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn route(name: &str, day: u32, start_time: Option<NaiveTime>) -> Route {
        Route {
            id: Uuid::new_v4(),
            trip_id: Uuid::nil(),
            name: name.to_string(),
            name_local: None,
            route_date: date(2025, 6, day),
            start_time,
            distance_km: None,
            duration_minutes: None,
            map_config: None,
            notes: None,
            created_at: at(1, 0, 0),
            updated_at: at(1, 0, 0),
        }
    }

    fn hotel(name: &str, check_in: NaiveDateTime, check_out: NaiveDateTime) -> Hotel {
        Hotel {
            id: Uuid::new_v4(),
            trip_id: Uuid::nil(),
            name: name.to_string(),
            address: Some("Main st 1".to_string()),
            check_in,
            check_out,
            confirmation_number: None,
            price_cents: None,
            currency: None,
            payment_status: None,
            document_id: None,
            notes: None,
            created_at: check_in,
            updated_at: check_in,
        }
    }

    #[test]
    fn day_index_is_one_based() {
        let start = date(2025, 6, 1);
        assert_eq!(day_index(start, start), Some(1));
        assert_eq!(day_index(start, date(2025, 6, 3)), Some(3));
        assert_eq!(day_index(start, date(2025, 5, 31)), None);
        assert_eq!(trip_length(start, date(2025, 6, 5)), 5);
        assert_eq!(trip_length(start, date(2025, 5, 1)), 0);
    }

    #[test]
    fn day_plan_is_capped_for_oversized_ranges() {
        let start = date(1, 1, 1);
        let plan = group_by_day(start, date(9999, 12, 31), Vec::new());
        assert_eq!(plan.days.len(), MAX_TRIP_DAYS as usize);
        assert_eq!(plan.days.last().map(|day| day.day), Some(MAX_TRIP_DAYS));
    }

    #[test]
    fn routes_without_start_time_sort_at_midnight() {
        let morning = route("Coast road", 2, NaiveTime::from_hms_opt(9, 0, 0));
        let untimed = route("Old town walk", 2, None);
        let sources: [&dyn TimelineSource; 2] = [&morning, &untimed];
        let events = merge(sources);
        assert_eq!(events[0].title, "Old town walk");
        assert_eq!(events[0].at, at(2, 0, 0));
        assert_eq!(events[1].title, "Coast road");
    }

    #[test]
    fn ties_break_on_kind_then_title() {
        let stay = hotel("Zimmer", at(2, 15, 0), at(4, 11, 0));
        let other = hotel("Alpenhof", at(2, 15, 0), at(3, 11, 0));
        let walk = route("Walk", 2, NaiveTime::from_hms_opt(15, 0, 0));
        let sources: [&dyn TimelineSource; 3] = [&stay, &other, &walk];
        let events = merge(sources);

        let order: Vec<(EventKind, &str)> = events
            .iter()
            .map(|event| (event.kind, event.title.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (EventKind::HotelCheckIn, "Alpenhof"),
                (EventKind::HotelCheckIn, "Zimmer"),
                (EventKind::Route, "Walk"),
                (EventKind::HotelCheckOut, "Alpenhof"),
                (EventKind::HotelCheckOut, "Zimmer"),
            ]
        );
    }

    #[test]
    fn groups_events_into_days_and_unscheduled() {
        let stay = hotel("Inn", at(1, 14, 0), at(3, 10, 0));
        let early = route("Before trip", 1, None);
        let late = route("After trip", 9, None);
        let sources: [&dyn TimelineSource; 3] = [&stay, &early, &late];
        let events = merge(sources);

        let plan = group_by_day(date(2025, 6, 2), date(2025, 6, 4), events);
        assert_eq!(plan.days.len(), 3);
        assert_eq!(plan.days[0].day, 1);
        assert_eq!(plan.days[0].date, date(2025, 6, 2));
        assert!(plan.days[0].events.is_empty());
        assert_eq!(plan.days[1].events.len(), 1);
        assert_eq!(plan.days[1].events[0].kind, EventKind::HotelCheckOut);

        let unscheduled: Vec<&str> = plan.unscheduled.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(unscheduled, vec!["Before trip", "Inn", "After trip"]);
    }
}
