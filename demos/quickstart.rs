// Fits the trend scenario on a synthetic series and prints the forecast tail
use neural_owl::harness::{synthetic_series, Harness, HarnessOptions, Scenario};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("NeuralOwl quickstart\n");

    let data = synthetic_series(3 * 365, 42)?;
    println!("Synthetic series: {} days from {}", data.len(), data.ds()[0].date());

    let harness = Harness::new(data, HarnessOptions::default().with_epochs(30));
    let outcome = harness.run(Scenario::Trend)?;
    for note in &outcome.notes {
        println!("{}", note);
    }

    if let Some(forecast) = outcome.forecast {
        let yhat = forecast.yhat(1)?;
        let trend = forecast.column("trend")?;
        println!("\n{:>12} {:>10} {:>10}", "ds", "yhat1", "trend");
        let start = forecast.len().saturating_sub(10);
        for i in start..forecast.len() {
            println!(
                "{:>12} {:>10.4} {:>10.4}",
                forecast.ds()[i].date(),
                yhat[i].unwrap_or(f64::NAN),
                trend[i].unwrap_or(f64::NAN)
            );
        }
    }
    Ok(())
}
