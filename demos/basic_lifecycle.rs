use chrono::{Duration, NaiveDate, TimeZone, Utc};
use forecast_accuracy::{
    draft_series, issue_forecasts, Evaluator, ForecastLedger, HistoryQuery, MemoryLedger,
    Observation, ObservationStore, Tolerance, ToleranceConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Forecast Accuracy: Basic Lifecycle Example");
    println!("==========================================\n");

    let ledger = MemoryLedger::new();

    // Load observed history
    println!("Loading observed history...");
    let history = observed_history();
    let added = ledger.add_observations("cpu_load", &history)?;
    println!("Observations loaded: {} days\n", added);

    // Record a three-day forecast issued right after the last observation
    println!("Recording forecasts...");
    let issued_at = Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap();
    let anchor = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
    let drafts = draft_series(
        "cpu_load",
        "v1.0.0",
        issued_at,
        anchor,
        "daily",
        &[71.0, 71.5, 72.0],
    )?;
    let report = issue_forecasts(&ledger, &drafts)?;
    println!(
        "Recorded {} forecasts ({} stale, {} duplicates)\n",
        report.recorded, report.discarded_stale, report.duplicates
    );

    // Allow a forecast to miss by up to one unit
    let mut tolerances = ToleranceConfig::new();
    tolerances.insert("cpu_load", Tolerance::abs(1.0));
    let evaluator = Evaluator::new(&ledger, tolerances);

    // Nothing can be settled before ground truth covers a target day
    println!("Evaluating before ground truth arrives...");
    let before = evaluator.evaluate_pending()?;
    println!(
        "Evaluated: {}, skipped: {}\n",
        before.total_evaluated(),
        before.total_skipped()
    );

    // The next day's observation comes in
    println!("Observing the first target day...");
    let first_target = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
    ledger.add_observations("cpu_load", &[Observation::new(first_target, 71.8)])?;

    let after = evaluator.evaluate_pending()?;
    println!(
        "Evaluated: {}, skipped: {}\n",
        after.total_evaluated(),
        after.total_skipped()
    );

    // Read back the full history, newest issuance first
    println!("Forecast history:");
    let entries = ledger.history("cpu_load", &HistoryQuery::default())?;
    for entry in &entries {
        let target = entry.forecast.target_time.format("%Y-%m-%d");
        match &entry.evaluation {
            Some(evaluation) => println!(
                "  {}: predicted {:.1}, actual {:.1}, error {:+.2} ({})",
                target,
                entry.forecast.yhat,
                evaluation.actual_value,
                evaluation.error,
                if evaluation.within_tolerance { "hit" } else { "miss" },
            ),
            None => println!(
                "  {}: predicted {:.1}, still pending",
                target, entry.forecast.yhat
            ),
        }
    }

    println!("\nSummary:");
    println!("1. Forecasts wait as pending until ground truth covers their target day");
    println!("2. Each forecast is settled exactly once, never re-evaluated");
    println!("3. The configured tolerance decides whether a settled forecast is a hit");
    println!("4. History pairs every forecast with its evaluation once it has one");

    Ok(())
}

/// Ten days of observed history with a gentle upward drift
fn observed_history() -> Vec<Observation> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    (0..10)
        .map(|i| {
            let ds = start + Duration::days(i);
            let value = 70.0 + i as f64 * 0.2 + (i as f64 * 0.8).sin() * 0.5;
            Observation::new(ds, value)
        })
        .collect()
}
