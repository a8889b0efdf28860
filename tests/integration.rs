use std::time::Duration;

use driftkit::{
    ClockSample, ClockTracker, Continent, DriftError, OffsetSeverity, Provider, Selector,
    SeverityLevel, TimeSource, catalog, estimate_offset,
};

struct FixedSample(ClockSample);

impl TimeSource for FixedSample {
    async fn sample(&self) -> Result<ClockSample, DriftError> {
        Ok(self.0)
    }
}

struct Unreachable;

impl TimeSource for Unreachable {
    async fn sample(&self) -> Result<ClockSample, DriftError> {
        Err(DriftError::Timeout(Duration::from_secs(5)))
    }
}

#[tokio::test]
async fn offset_follows_midpoint_assumption() {
    let est = estimate_offset(&FixedSample(ClockSample::new(1000, 1100, 1160)))
        .await
        .unwrap();
    assert_eq!(est.round_trip_ms, 100);
    assert_eq!(est.offset_ms, 110.0);
    assert_eq!(est.uncertainty_ms, 50);
    assert_eq!(est.severity(), OffsetSeverity::Negligible);
}

#[tokio::test]
async fn unreachable_source_is_not_fatal_for_the_tracker() {
    let tracker = ClockTracker::new();
    assert!(tracker.resync(&FixedSample(ClockSample::new(0, 40, -9_980))).await);
    assert!(!tracker.resync(&Unreachable).await);
    let est = tracker.current().unwrap();
    assert_eq!(est.offset_ms, -10_000.0);
    assert!(!est.local_is_behind());
}

#[test]
fn severity_levels_for_reference_offsets() {
    let expected = [
        (10.0, SeverityLevel::Negligible),
        (10_000.0, SeverityLevel::Negligible),
        (100_000.0, SeverityLevel::Warn),
        (1_000_000.0, SeverityLevel::Warn),
        (5_000_000.0, SeverityLevel::Error),
    ];
    for (offset, level) in expected {
        assert_eq!(OffsetSeverity::classify(offset).level(), level, "offset {offset}");
    }
}

#[test]
fn filter_by_provider_and_continent() {
    let all = catalog::builtin();
    let picked = catalog::filter(
        &all,
        Selector::Only(Provider::Aws),
        Selector::Only(Continent::Europe),
    );
    assert!(!picked.is_empty());
    assert!(
        picked
            .iter()
            .all(|t| t.provider == Provider::Aws && t.continent == Continent::Europe)
    );
    let expected = all
        .iter()
        .filter(|t| t.provider == Provider::Aws && t.continent == Continent::Europe)
        .count();
    assert_eq!(picked.len(), expected);
}

#[test]
fn filter_all_returns_catalog_unchanged() {
    let all = catalog::builtin();
    assert_eq!(catalog::filter(&all, Selector::All, Selector::All), all);
}

#[test]
fn filter_keeps_catalog_order() {
    let all = catalog::builtin();
    let picked = catalog::filter(&all, Selector::All, Selector::Only(Continent::Asia));
    let positions: Vec<usize> = picked
        .iter()
        .map(|p| all.iter().position(|t| t.id == p.id).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}
