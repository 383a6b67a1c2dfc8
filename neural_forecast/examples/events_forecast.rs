use chrono::{Datelike, Duration, NaiveDate};
use neural_forecast::config::{FitOptions, NeuralProphetConfig};
use neural_forecast::events::{EventConfig, EventTable};
use neural_forecast::models::{NeuralProphet, PredictionFrameOptions};
use neural_forecast::TimeSeriesData;

/// Monthly paydays raise sales for a few days, and so do US holidays
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default();
    let days = 2 * 365;

    let mut paydays = EventTable::new();
    let mut ds = Vec::with_capacity(days);
    let mut y = Vec::with_capacity(days);
    for i in 0..days {
        let date = start + Duration::days(i as i64);
        if date.day() == 15 {
            paydays.push("payday", date);
        }
        let boost = match date.day() {
            15 => 12.0,
            16 => 6.0,
            _ => 0.0,
        };
        ds.push(date.and_time(Default::default()));
        y.push(200.0 + 0.05 * i as f64 + boost);
    }
    // paydays of the forecast period
    paydays.push("payday", NaiveDate::from_ymd_opt(2021, 1, 15).unwrap_or_default());
    let data = TimeSeriesData::new(ds, y)?;

    let mut model = NeuralProphet::new(NeuralProphetConfig {
        epochs: Some(50),
        ..Default::default()
    })?
    .add_events(&["payday"], EventConfig::default().with_window(0, 1))?
    .add_country_holidays("US", EventConfig::default())?;

    let df = model.create_df_with_events(&data, &paydays)?;
    model.fit(&df, FitOptions::default())?;

    for (name, coefficients) in model.event_coefficients()? {
        let effects: Vec<String> = coefficients
            .iter()
            .map(|(feature, value)| format!("{}={:.3}", feature, value))
            .collect();
        println!("{:30} {}", name, effects.join(" "));
    }

    let future = model.compose_prediction_df(
        &df,
        PredictionFrameOptions::new()
            .with_events(paydays)
            .with_future_periods(30),
    )?;
    let forecast = model.predict(&future)?;
    let yhat = forecast.yhat(1)?;
    for (ds, value) in forecast.ds().iter().zip(yhat) {
        if let Some(value) = value {
            println!("{}  {:8.2}", ds.date(), value);
        }
    }
    Ok(())
}
