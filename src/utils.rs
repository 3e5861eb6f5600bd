//! Helpers for building forecast batches and synthetic observation series

use crate::error::{AccuracyError, Result};
use crate::observations::Observation;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Spacing between forecast steps for a named frequency
pub fn frequency_step(frequency: &str) -> Result<Duration> {
    match frequency {
        "daily" | "d" | "1d" => Ok(Duration::days(1)),
        "weekly" | "w" | "1w" => Ok(Duration::weeks(1)),
        "monthly" | "m" | "1m" => Ok(Duration::days(30)),
        "hourly" | "h" | "1h" => Ok(Duration::hours(1)),
        "minute" | "min" | "1min" => Ok(Duration::minutes(1)),
        _ => Err(AccuracyError::ValidationError(format!(
            "Unsupported frequency: {}",
            frequency
        ))),
    }
}

/// Create future target times spaced by a named frequency, starting one step
/// after `last_timestamp`
pub fn future_target_times(
    last_timestamp: DateTime<Utc>,
    horizon: usize,
    frequency: &str,
) -> Result<Vec<DateTime<Utc>>> {
    let step = frequency_step(frequency)?;

    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last_timestamp;
    for _ in 0..horizon {
        current = current + step;
        timestamps.push(current);
    }
    Ok(timestamps)
}

/// Generate a drifting daily observation series with normal noise.
///
/// Day `i` gets `base + drift * i` plus a sample from `N(0, noise_std)`.
pub fn synthetic_observations(
    start: NaiveDate,
    days: usize,
    base: f64,
    drift: f64,
    noise_std: f64,
) -> Result<Vec<Observation>> {
    let mut rng = rand::thread_rng();
    synthetic_observations_with_rng(&mut rng, start, days, base, drift, noise_std)
}

/// Generate a drifting daily observation series using the given RNG
pub fn synthetic_observations_with_rng<R: Rng>(
    rng: &mut R,
    start: NaiveDate,
    days: usize,
    base: f64,
    drift: f64,
    noise_std: f64,
) -> Result<Vec<Observation>> {
    let noise = Normal::new(0.0, noise_std).map_err(|err| {
        AccuracyError::ValidationError(format!("Invalid noise distribution: {}", err))
    })?;

    let mut observations = Vec::with_capacity(days);
    for i in 0..days {
        let ds = start + Duration::days(i as i64);
        let value = base + drift * i as f64 + noise.sample(rng);
        observations.push(Observation::new(ds, value));
    }
    Ok(observations)
}
