//! End-to-end example: points -> hex density, visits, and a daily timeline.
//!
//! Run with: cargo run --example daily_timeline

use location_aggregator::{
    assemble_timeline, bin_points, cluster_visits, find_near, HexBinConfig, InMemoryPointStore,
    Journey, LocationPoint, Result, TimeWindow, TimelineConfig, TimelineEntry, TimelineSource,
    UserId, Visit, VisitConfig,
};

/// 2024-05-10T00:00:00Z
const DAY: i64 = 1_715_299_200;

struct DemoSource {
    visits: Vec<Visit>,
    journeys: Vec<Journey>,
}

impl TimelineSource for DemoSource {
    fn visits_between(&self, _user_id: UserId, _window: &TimeWindow) -> Result<Vec<Visit>> {
        Ok(self.visits.clone())
    }

    fn journeys_between(&self, _user_id: UserId, _window: &TimeWindow) -> Result<Vec<Journey>> {
        Ok(self.journeys.clone())
    }
}

fn main() {
    let user = 1;
    let home = (52.5200, 13.4050);
    let office = (52.5300, 13.3800);

    // A ping every 5 minutes: home 07:00-08:00, office 08:30-17:00
    let mut points = Vec::new();
    let mut id = 0;
    for (place, from, to) in [(home, 7 * 3600, 8 * 3600), (office, 8 * 3600 + 1800, 17 * 3600)] {
        let mut t = from;
        while t <= to {
            points.push(
                LocationPoint::new(id, user, place.0, place.1, DAY + t)
                    .with_accuracy(5.0 + (id % 7) as f64)
                    .with_altitude(34 + (id % 3) as i32),
            );
            id += 1;
            t += 300;
        }
    }

    // Density map
    let hex = bin_points(&points, &HexBinConfig::default()).unwrap();
    println!("Hex density at resolution {}:", hex.resolution);
    for cell in hex.cells.values() {
        println!(
            "  {} -> {} points ({}..{})",
            cell.h3_index(),
            cell.point_count,
            cell.earliest_timestamp,
            cell.latest_timestamp
        );
    }

    // Visits around each place
    let store = InMemoryPointStore::from_points(points);
    let config = VisitConfig::default();
    let mut visits = Vec::new();
    for (lat, lng) in [home, office] {
        let matches = find_near(&store, user, lng, lat, 75.0, None).unwrap();
        visits.extend(cluster_visits(&matches, &config));
    }
    println!("\n{} visits found", visits.len());

    // Timeline with the commute supplied by the track source
    let commute = Journey::new("commute", DAY + 8 * 3600, DAY + 8 * 3600 + 1800, 2_150.0);
    let source = DemoSource { visits, journeys: vec![commute] };
    let days = assemble_timeline(&source, user, DAY, DAY + 86_400, &TimelineConfig::default()).unwrap();

    for day in &days {
        println!("\n{}", day.date);
        for entry in &day.entries {
            match entry {
                TimelineEntry::Visit(v) => println!(
                    "  visit   {:>6}s  {} points, altitude {}",
                    v.span_seconds(),
                    v.point_count,
                    v.altitude_range.as_deref().unwrap_or("-")
                ),
                TimelineEntry::Journey(j) => {
                    println!("  journey {:>6}s  {:.0}m", j.duration_seconds, j.distance_meters)
                }
            }
        }
        println!(
            "  {:.1} km, {} min moving, {} min stationary, {} places",
            day.summary.total_distance_km,
            day.summary.time_moving_minutes,
            day.summary.time_stationary_minutes,
            day.summary.places_visited
        );
    }
}
