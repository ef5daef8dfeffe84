//! # Daily Timeline
//!
//! Merges visits and externally computed journeys into one chronological
//! sequence per calendar day, with a summary and bounding box per day.
//!
//! ## Rules
//! - A record belongs to the day (in the viewing timezone) of its start time,
//!   including journeys that run past midnight
//! - Entries are ordered by start time; on equal start times a visit comes
//!   before a journey
//! - Days without entries are not returned

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use log::{info, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo_utils::compute_bounds;
use crate::{AggregationError, Bounds, GpsPoint, Result, TimeWindow, UserId, Visit};

/// Configuration for timeline assembly
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimelineConfig {
    /// Viewing timezone as seconds east of UTC (default: 0)
    pub utc_offset_seconds: i32,
}

/// A travel segment produced outside this crate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Journey {
    pub id: String,
    /// Unix seconds
    pub started_at: i64,
    /// Unix seconds
    pub ended_at: i64,
    pub distance_meters: f64,
    pub duration_seconds: i64,
    /// Transport mode as reported by the track source ("walking", "car", ...)
    pub dominant_mode: String,
    pub elevation_gain: Option<f64>,
    pub elevation_loss: Option<f64>,
    /// Average speed in km/h
    pub avg_speed: Option<f64>,
    pub start_point: Option<GpsPoint>,
    pub end_point: Option<GpsPoint>,
}

impl Journey {
    /// Journey with duration derived from its span and no optional metadata.
    pub fn new(id: &str, started_at: i64, ended_at: i64, distance_meters: f64) -> Self {
        Self {
            id: id.to_string(),
            started_at,
            ended_at,
            distance_meters,
            duration_seconds: ended_at - started_at,
            dominant_mode: "unknown".to_string(),
            elevation_gain: None,
            elevation_loss: None,
            avg_speed: None,
            start_point: None,
            end_point: None,
        }
    }

    pub fn with_endpoints(mut self, start: GpsPoint, end: GpsPoint) -> Self {
        self.start_point = Some(start);
        self.end_point = Some(end);
        self
    }
}

/// One element of a day timeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TimelineEntry {
    Visit(Visit),
    Journey(Journey),
}

impl TimelineEntry {
    pub fn started_at(&self) -> i64 {
        match self {
            TimelineEntry::Visit(v) => v.started_at,
            TimelineEntry::Journey(j) => j.started_at,
        }
    }

    pub fn ended_at(&self) -> i64 {
        match self {
            TimelineEntry::Visit(v) => v.ended_at,
            TimelineEntry::Journey(j) => j.ended_at,
        }
    }

    /// Stationary entries sort before moving ones at the same instant.
    fn kind_rank(&self) -> u8 {
        match self {
            TimelineEntry::Visit(_) => 0,
            TimelineEntry::Journey(_) => 1,
        }
    }

    fn chronological(a: &Self, b: &Self) -> Ordering {
        a.started_at()
            .cmp(&b.started_at())
            .then_with(|| a.kind_rank().cmp(&b.kind_rank()))
    }
}

/// Per-day statistics.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DaySummary {
    /// Sum of journey distances in km, one decimal
    pub total_distance_km: f64,
    /// Number of visit entries
    pub places_visited: u32,
    /// Sum of journey durations in whole minutes
    pub time_moving_minutes: i64,
    /// Sum of visit spans in whole minutes
    pub time_stationary_minutes: i64,
    pub journey_count: u32,
}

/// All entries of one calendar day.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DayTimeline {
    pub date: NaiveDate,
    pub entries: Vec<TimelineEntry>,
    pub summary: DaySummary,
    /// Extent of visit coordinates and journey endpoints; `None` without geometry
    pub bounding_box: Option<Bounds>,
}

/// Source of finished visits and journeys.
pub trait TimelineSource {
    /// Visits of `user_id` overlapping `window`.
    fn visits_between(&self, user_id: UserId, window: &TimeWindow) -> Result<Vec<Visit>>;

    /// Journeys of `user_id` overlapping `window`.
    fn journeys_between(&self, user_id: UserId, window: &TimeWindow) -> Result<Vec<Journey>>;
}

/// Running totals for one day.
#[derive(Debug, Default)]
struct DayAccumulator {
    distance_meters: f64,
    moving_seconds: i64,
    stationary_seconds: i64,
    visits: u32,
    journeys: u32,
    positions: Vec<GpsPoint>,
}

impl DayAccumulator {
    fn add(&mut self, entry: &TimelineEntry) {
        match entry {
            TimelineEntry::Visit(v) => {
                self.visits += 1;
                self.stationary_seconds += v.span_seconds().max(0);
                self.include(&v.coordinate);
            }
            TimelineEntry::Journey(j) => {
                self.journeys += 1;
                self.distance_meters += j.distance_meters;
                self.moving_seconds += j.duration_seconds.max(0);
                for p in [j.start_point, j.end_point].iter().flatten() {
                    self.include(p);
                }
            }
        }
    }

    fn include(&mut self, point: &GpsPoint) {
        if point.is_valid() {
            self.positions.push(*point);
        }
    }

    fn finish(self) -> (DaySummary, Option<Bounds>) {
        let summary = DaySummary {
            total_distance_km: ((self.distance_meters / 1000.0) * 10.0).round() / 10.0,
            places_visited: self.visits,
            time_moving_minutes: self.moving_seconds / 60,
            time_stationary_minutes: self.stationary_seconds / 60,
            journey_count: self.journeys,
        };
        (summary, compute_bounds(&self.positions))
    }
}

/// Validate a viewing timezone offset.
pub(crate) fn viewing_offset(utc_offset_seconds: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(utc_offset_seconds)
        .ok_or(AggregationError::InvalidTimezone(utc_offset_seconds))
}

/// Unix timestamp of local midnight starting `date`.
pub(crate) fn local_midnight(date: NaiveDate, offset: &FixedOffset) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() - i64::from(offset.local_minus_utc())
}

fn local_date(timestamp: i64, offset: &FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(offset).date_naive())
}

/// Build day timelines from records already in memory.
///
/// Records are grouped by the local date of their start time; no range
/// filtering happens here.
///
/// # Example
/// ```
/// use location_aggregator::{assemble_days, Journey, TimelineConfig};
///
/// // 2024-05-10 08:00 UTC, 30 minutes, 12.34 km
/// let journey = Journey::new("j1", 1_715_328_000, 1_715_329_800, 12_340.0);
/// let days = assemble_days(vec![], vec![journey], &TimelineConfig::default()).unwrap();
///
/// assert_eq!(days.len(), 1);
/// assert_eq!(days[0].summary.total_distance_km, 12.3);
/// assert_eq!(days[0].summary.time_moving_minutes, 30);
/// assert_eq!(days[0].summary.places_visited, 0);
/// ```
pub fn assemble_days(
    visits: Vec<Visit>,
    journeys: Vec<Journey>,
    config: &TimelineConfig,
) -> Result<Vec<DayTimeline>> {
    let offset = viewing_offset(config.utc_offset_seconds)?;

    let entries = visits
        .into_iter()
        .map(TimelineEntry::Visit)
        .chain(journeys.into_iter().map(TimelineEntry::Journey));

    let mut by_day: BTreeMap<NaiveDate, Vec<TimelineEntry>> = BTreeMap::new();
    for entry in entries {
        match local_date(entry.started_at(), &offset) {
            Some(date) => by_day.entry(date).or_default().push(entry),
            None => warn!("[Timeline] Dropping entry with unrepresentable start {}", entry.started_at()),
        }
    }

    let days = by_day
        .into_iter()
        .map(|(date, mut entries)| {
            entries.sort_by(TimelineEntry::chronological);

            let mut acc = DayAccumulator::default();
            for entry in &entries {
                acc.add(entry);
            }
            let (summary, bounding_box) = acc.finish();

            DayTimeline { date, entries, summary, bounding_box }
        })
        .collect();

    Ok(days)
}

/// Assemble the timeline of `user_id` for `[start_at, end_at)`.
///
/// Loads overlapping visits and journeys from `source`, drops records the
/// source returned outside the range, and groups the rest per day, ascending
/// by date. An empty or inverted range returns `[]` without querying the
/// source.
///
/// A record that starts before `start_at` but runs into the range is kept
/// whole and filed under its own start date, so the first returned day can
/// precede the local date of `start_at`.
pub fn assemble_timeline<S: TimelineSource + ?Sized>(
    source: &S,
    user_id: UserId,
    start_at: i64,
    end_at: i64,
    config: &TimelineConfig,
) -> Result<Vec<DayTimeline>> {
    let window = TimeWindow::new(start_at, end_at);
    if window.is_empty() {
        return Ok(vec![]);
    }

    let visits: Vec<Visit> = source
        .visits_between(user_id, &window)?
        .into_iter()
        .filter(|v| window.overlaps(v.started_at, v.ended_at))
        .collect();
    let journeys: Vec<Journey> = source
        .journeys_between(user_id, &window)?
        .into_iter()
        .filter(|j| window.overlaps(j.started_at, j.ended_at))
        .collect();

    let (visit_count, journey_count) = (visits.len(), journeys.len());
    let days = assemble_days(visits, journeys, config)?;

    info!(
        "[Timeline] user {}: {} visits and {} journeys over {} days",
        user_id,
        visit_count,
        journey_count,
        days.len()
    );

    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlaceAttributes;
    use std::cell::Cell;

    /// 2024-05-10T00:00:00Z
    const DAY: i64 = 1_715_299_200;

    fn at(hour: i64, minute: i64) -> i64 {
        DAY + hour * 3600 + minute * 60
    }

    fn visit(lat: f64, lng: f64, started_at: i64, ended_at: i64) -> Visit {
        Visit {
            coordinate: GpsPoint::new(lat, lng),
            started_at,
            ended_at,
            duration_minutes: (ended_at - started_at) / 60,
            point_count: 2,
            accuracy_meters: None,
            average_distance_meters: 0.0,
            altitude_range: None,
            place: PlaceAttributes::default(),
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    struct MemorySource {
        visits: Vec<Visit>,
        journeys: Vec<Journey>,
        calls: Cell<usize>,
    }

    impl MemorySource {
        fn new(visits: Vec<Visit>, journeys: Vec<Journey>) -> Self {
            Self { visits, journeys, calls: Cell::new(0) }
        }
    }

    impl TimelineSource for MemorySource {
        fn visits_between(&self, _user_id: UserId, _window: &TimeWindow) -> Result<Vec<Visit>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.visits.clone())
        }

        fn journeys_between(&self, _user_id: UserId, _window: &TimeWindow) -> Result<Vec<Journey>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.journeys.clone())
        }
    }

    #[test]
    fn test_day_ordering_and_summary() {
        let home = visit(52.50, 13.40, at(7, 0), at(8, 0));
        let office = visit(52.53, 13.38, at(8, 30), at(17, 0));
        let commute = Journey::new("commute", at(8, 0), at(8, 30), 4_260.0);

        // Deliberately out of order
        let source = MemorySource::new(vec![office.clone(), home.clone()], vec![commute.clone()]);
        let days = assemble_timeline(&source, 1, DAY, DAY + 86_400, &TimelineConfig::default()).unwrap();

        assert_eq!(days.len(), 1);
        let day = &days[0];
        assert_eq!(day.date, date(10));
        assert_eq!(
            day.entries,
            vec![
                TimelineEntry::Visit(home),
                TimelineEntry::Journey(commute),
                TimelineEntry::Visit(office),
            ]
        );
        assert_eq!(day.summary.total_distance_km, 4.3);
        assert_eq!(day.summary.time_moving_minutes, 30);
        assert_eq!(day.summary.time_stationary_minutes, 570);
        assert_eq!(day.summary.places_visited, 2);
        assert_eq!(day.summary.journey_count, 1);
    }

    #[test]
    fn test_zero_width_range_is_empty() {
        let source = MemorySource::new(vec![visit(1.0, 1.0, DAY, DAY + 60)], vec![]);
        let days = assemble_timeline(&source, 1, DAY, DAY, &TimelineConfig::default()).unwrap();
        assert!(days.is_empty());
        assert_eq!(source.calls.get(), 0);

        let inverted = assemble_timeline(&source, 1, DAY + 10, DAY, &TimelineConfig::default()).unwrap();
        assert!(inverted.is_empty());
    }

    #[test]
    fn test_journey_only_day() {
        let j = Journey::new("ride", at(10, 0), at(11, 0), 20_000.0);
        let days = assemble_days(vec![], vec![j], &TimelineConfig::default()).unwrap();

        assert_eq!(days[0].summary.places_visited, 0);
        assert_eq!(days[0].summary.time_stationary_minutes, 0);
        assert_eq!(days[0].summary.time_moving_minutes, 60);
        assert_eq!(days[0].summary.total_distance_km, 20.0);
        assert_eq!(days[0].bounding_box, None);
    }

    #[test]
    fn test_midnight_crossing_journey_goes_to_start_day() {
        let night_bus = Journey::new("night", at(23, 0), at(25, 30), 50_000.0);
        let next_morning = visit(1.0, 1.0, at(26, 0), at(27, 0));
        let days = assemble_days(vec![next_morning], vec![night_bus], &TimelineConfig::default()).unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(10));
        assert_eq!(days[0].summary.time_moving_minutes, 150);
        assert_eq!(days[1].date, date(11));
        assert_eq!(days[1].summary.journey_count, 0);
    }

    #[test]
    fn test_visit_before_journey_on_tie() {
        let v = visit(1.0, 1.0, at(9, 0), at(9, 30));
        let j = Journey::new("j", at(9, 0), at(9, 20), 1_000.0);
        let days = assemble_days(vec![v], vec![j], &TimelineConfig::default()).unwrap();

        assert!(matches!(days[0].entries[0], TimelineEntry::Visit(_)));
        assert!(matches!(days[0].entries[1], TimelineEntry::Journey(_)));
    }

    #[test]
    fn test_empty_days_omitted_and_ascending() {
        let late = visit(1.0, 1.0, DAY + 2 * 86_400 + 100, DAY + 2 * 86_400 + 200);
        let early = visit(1.0, 1.0, DAY + 100, DAY + 200);
        let days = assemble_days(vec![late, early], vec![], &TimelineConfig::default()).unwrap();

        let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(10), date(12)]);
    }

    #[test]
    fn test_viewing_offset_moves_day_boundary() {
        let v = visit(1.0, 1.0, at(23, 30), at(23, 45));

        let utc = assemble_days(vec![v.clone()], vec![], &TimelineConfig::default()).unwrap();
        assert_eq!(utc[0].date, date(10));

        let config = TimelineConfig { utc_offset_seconds: 3600 };
        let shifted = assemble_days(vec![v], vec![], &config).unwrap();
        assert_eq!(shifted[0].date, date(11));
    }

    #[test]
    fn test_invalid_offset() {
        let config = TimelineConfig { utc_offset_seconds: 100_000 };
        let err = assemble_days(vec![], vec![], &config).unwrap_err();
        assert_eq!(err, AggregationError::InvalidTimezone(100_000));
    }

    #[test]
    fn test_bounding_box_includes_journey_endpoints() {
        let v = visit(52.50, 13.40, at(7, 0), at(8, 0));
        let j = Journey::new("j", at(8, 0), at(9, 0), 5_000.0)
            .with_endpoints(GpsPoint::new(52.50, 13.40), GpsPoint::new(52.60, 13.20));
        let days = assemble_days(vec![v], vec![j], &TimelineConfig::default()).unwrap();

        let bbox = days[0].bounding_box.unwrap();
        assert_eq!(bbox.min_lat, 52.50);
        assert_eq!(bbox.max_lat, 52.60);
        assert_eq!(bbox.min_lng, 13.20);
        assert_eq!(bbox.max_lng, 13.40);
    }

    #[test]
    fn test_records_outside_range_are_dropped() {
        let inside = visit(1.0, 1.0, at(10, 0), at(11, 0));
        let before = visit(1.0, 1.0, DAY - 7200, DAY - 3600);
        let after = Journey::new("late", DAY + 86_400, DAY + 90_000, 1_000.0);
        let source = MemorySource::new(vec![inside, before], vec![after]);

        let days = assemble_timeline(&source, 1, DAY, DAY + 86_400, &TimelineConfig::default()).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].entries.len(), 1);
    }

    #[test]
    fn test_overlapping_record_keeps_its_start_day() {
        // Overnight stay from 22:00 on the 9th until 07:00 on the 10th
        let overnight = visit(1.0, 1.0, DAY - 2 * 3600, at(7, 0));
        let breakfast = visit(1.0, 1.0, at(8, 0), at(8, 30));
        let source = MemorySource::new(vec![breakfast, overnight.clone()], vec![]);

        let days = assemble_timeline(&source, 1, DAY, DAY + 86_400, &TimelineConfig::default()).unwrap();
        let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(9), date(10)]);
        assert_eq!(days[0].entries, vec![TimelineEntry::Visit(overnight)]);
        assert_eq!(days[0].summary.time_stationary_minutes, 540);
    }

    #[test]
    fn test_single_ping_visit_adds_no_stationary_time() {
        let mut ping = visit(1.0, 1.0, at(12, 0), at(12, 0));
        ping.point_count = 1;
        ping.duration_minutes = 15;
        let lunch = visit(1.0, 1.0, at(13, 0), at(13, 45));
        let days = assemble_days(vec![ping, lunch], vec![], &TimelineConfig::default()).unwrap();

        // Only the observed span of each visit counts
        assert_eq!(days[0].summary.places_visited, 2);
        assert_eq!(days[0].summary.time_stationary_minutes, 45);
    }

    #[test]
    fn test_local_midnight_round_trip() {
        let offset = viewing_offset(-5 * 3600).unwrap();
        let midnight = local_midnight(date(10), &offset);
        assert_eq!(midnight, DAY + 5 * 3600);
        assert_eq!(local_date(midnight, &offset), Some(date(10)));
        assert_eq!(local_date(midnight - 1, &offset), Some(date(9)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_entries_serialize_with_kind_tag() {
        let v = visit(1.0, 1.0, at(7, 0), at(8, 0));
        let j = Journey::new("j", at(8, 0), at(9, 0), 1_000.0);
        let days = assemble_days(vec![v], vec![j], &TimelineConfig::default()).unwrap();

        let json = serde_json::to_value(&days).unwrap();
        assert_eq!(json[0]["date"], "2024-05-10");
        assert_eq!(json[0]["entries"][0]["kind"], "visit");
        assert_eq!(json[0]["entries"][1]["kind"], "journey");
        assert_eq!(json[0]["summary"]["time_moving_minutes"], 60);
    }
}
