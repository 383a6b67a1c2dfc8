use chrono::{Duration, NaiveDate};
use neural_forecast::config::{FitOptions, NeuralProphetConfig};
use neural_forecast::models::{NeuralProphet, PredictionFrameOptions};
use neural_forecast::TimeSeriesData;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Neural Forecast: Basic Forecasting Example");
    println!("==========================================\n");

    let data = create_sample_daily_data(3 * 365);
    println!("Sample data created: {} daily points\n", data.len());

    // 30 days of history predict the next week
    let mut model = NeuralProphet::new(NeuralProphetConfig {
        n_lags: 30,
        n_forecasts: 7,
        epochs: Some(30),
        ..Default::default()
    })?;

    println!("Training model...");
    let metrics = model.fit(&data, FitOptions::validated(0.2))?;
    println!("{}", metrics);

    let future = model.compose_prediction_df(&data, PredictionFrameOptions::new())?;
    let forecast = model.predict(&future)?;

    println!("Forecast for the next 7 days:");
    let last = model.get_last_forecast(&forecast, 0)?;
    let origin = last.column("origin-0").unwrap_or_default();
    for (ds, value) in last.ds().iter().zip(origin) {
        if let Some(value) = value {
            println!("  {}  {:8.3}", ds.date(), value);
        }
    }

    println!("\nComponents: {}", forecast.component_names().join(", "));
    Ok(())
}

fn create_sample_daily_data(days: usize) -> TimeSeriesData {
    let start = NaiveDate::from_ymd_opt(2021, 1, 1)
        .unwrap_or_default()
        .and_time(Default::default());
    let ds = (0..days).map(|i| start + Duration::days(i as i64)).collect();
    let y = (0..days)
        .map(|i| {
            let t = i as f64;
            let weekly = 3.0 * (t * std::f64::consts::TAU / 7.0).sin();
            let yearly = 8.0 * (t * std::f64::consts::TAU / 365.25).cos();
            100.0 + 0.02 * t + weekly + yearly
        })
        .collect();
    TimeSeriesData::new(ds, y).expect("timestamps and values have equal length")
}
