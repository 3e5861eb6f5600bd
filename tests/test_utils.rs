use chrono::{Duration, NaiveDate, TimeZone, Utc};
use forecast_accuracy::utils::{
    frequency_step, future_target_times, synthetic_observations, synthetic_observations_with_rng,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;

#[rstest]
#[case("daily", 86_400)]
#[case("d", 86_400)]
#[case("weekly", 604_800)]
#[case("hourly", 3_600)]
#[case("min", 60)]
fn test_frequency_step_seconds(#[case] frequency: &str, #[case] seconds: i64) {
    assert_eq!(frequency_step(frequency).unwrap(), Duration::seconds(seconds));
}

#[test]
fn test_unknown_frequency_is_rejected() {
    assert!(frequency_step("quarterly").is_err());
}

#[test]
fn test_future_target_times_start_one_step_ahead() {
    let anchor = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();

    let targets = future_target_times(anchor, 3, "daily").unwrap();

    assert_eq!(targets.len(), 3);
    assert_eq!(targets[0], Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap());
    assert_eq!(targets[1], Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap());
    assert_eq!(targets[2], Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap());
}

#[test]
fn test_future_target_times_with_zero_horizon_are_empty() {
    let anchor = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();

    assert!(future_target_times(anchor, 0, "daily").unwrap().is_empty());
}

#[test]
fn test_synthetic_series_is_reproducible_with_a_seeded_rng() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let mut first_rng = StdRng::seed_from_u64(42);
    let mut second_rng = StdRng::seed_from_u64(42);
    let first = synthetic_observations_with_rng(&mut first_rng, start, 30, 100.0, 0.5, 2.0).unwrap();
    let second =
        synthetic_observations_with_rng(&mut second_rng, start, 30, 100.0, 0.5, 2.0).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 30);
    assert_eq!(first[0].ds, start);
    assert_eq!(first[29].ds, NaiveDate::from_ymd_opt(2024, 1, 30).unwrap());
}

#[test]
fn test_noiseless_synthetic_series_follows_the_drift() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let series = synthetic_observations(start, 5, 100.0, 2.0, 0.0).unwrap();

    assert_eq!(series[0].value, 100.0);
    assert_eq!(series[4].value, 108.0);
}

#[test]
fn test_negative_noise_is_rejected() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    assert!(synthetic_observations(start, 5, 100.0, 2.0, -1.0).is_err());
}
