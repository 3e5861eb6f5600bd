use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use forecast_accuracy::utils::synthetic_observations;
use forecast_accuracy::{
    compute_accuracy_summary_with_params, default_horizon_buckets, draft_series, issue_forecasts,
    Evaluator, ObservationStore, SqliteLedger, Tolerance, ToleranceConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    println!("Forecast Accuracy: Windowed Accuracy Report");
    println!("===========================================\n");

    // Simulate four months of daily observations with drift and noise
    println!("Generating synthetic history...");
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let series = synthetic_observations(start, 120, 100.0, 0.3, 2.0)?;
    println!("History generated: {} days\n", series.len());

    let ledger = SqliteLedger::open_in_memory()?;

    let mut tolerances = ToleranceConfig::new();
    tolerances.set_default(Tolerance::rel(0.03));

    // Replay the timeline: every week, load the ground truth that has come
    // in since the last round and issue a fresh two-week forecast
    println!("Replaying weekly forecast rounds...");
    let mut loaded_through = 0;
    let mut recorded_total = 0;
    for issue_index in (28..=112).step_by(7) {
        ledger.add_observations("cpu_load", &series[loaded_through..issue_index])?;
        loaded_through = issue_index;

        let anchor_day = series[issue_index - 1].ds;
        let last_value = series[issue_index - 1].value;
        let anchor = midnight_utc(anchor_day);
        let issued_at = anchor + Duration::hours(6);

        // A naive model that projects the recent drift forward
        let values: Vec<f64> = (1..=14).map(|k| last_value + 0.3 * k as f64).collect();
        let drafts = draft_series("cpu_load", "naive-drift", issued_at, anchor, "daily", &values)?;
        recorded_total += issue_forecasts(&ledger, &drafts)?.recorded;
    }

    // Load the remaining ground truth
    ledger.add_observations("cpu_load", &series[loaded_through..])?;
    println!("Forecasts recorded: {}\n", recorded_total);

    // Settle everything the observations now cover
    println!("Evaluating pending forecasts...");
    let evaluator = Evaluator::new(&ledger, tolerances);
    let pass = evaluator.evaluate_pending()?;
    println!(
        "Evaluated: {}, still pending: {}\n",
        pass.total_evaluated(),
        pass.total_skipped()
    );

    // Summarize accuracy over a trailing window, split by horizon bucket
    let summary = compute_accuracy_summary_with_params(
        &ledger,
        "cpu_load",
        60,
        &default_horizon_buckets(),
        Utc::now(),
    )?;

    println!("Accuracy by horizon bucket:");
    for bucket in &summary.by_horizon {
        let accuracy = bucket
            .stats
            .accuracy
            .map(|a| format!("{:.1}%", a * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        let mae = bucket
            .stats
            .mae
            .map(|m| format!("{:.2}", m))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {:>5} steps: {:>3} forecasts, accuracy {}, mae {}",
            bucket.horizon_range, bucket.stats.num_forecasts, accuracy, mae
        );
    }

    println!("\nReport payload:");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    println!("\nSummary:");
    println!("1. Forecast batches are recorded weekly while ground truth trickles in");
    println!("2. Evaluation settles a forecast the moment observations reach its target");
    println!("3. Horizon buckets separate short range skill from long range guesswork");
    println!("4. The JSON payload is what a reporting surface would consume");

    Ok(())
}

/// Midnight UTC at the start of the given day
fn midnight_utc(ds: NaiveDate) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(ds.and_time(NaiveTime::MIN), Utc)
}
