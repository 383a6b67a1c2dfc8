//! Debug scenarios exercising the forecasting model end to end
//!
//! Each scenario is a linear script: configure a model, fit it, compose a
//! future frame, predict and collect what a developer would inspect.

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use neural_forecast::config::{
    CovariateConfig, FitOptions, NeuralProphetConfig, RegressorConfig, SeasonalityMode,
    SeasonalitySetting,
};
use neural_forecast::error::{ForecastError, Result};
use neural_forecast::events::{EventConfig, EventTable};
use neural_forecast::forecast::Forecast;
use neural_forecast::metrics::MetricsTable;
use neural_forecast::models::{NeuralProphet, PredictionFrameOptions};
use neural_forecast::plot::Figure;
use neural_forecast::utils::infer_frequency;
use neural_forecast::TimeSeriesData;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::fmt;
use tracing::info;

const PLAYOFFS: [&str; 14] = [
    "2008-01-13",
    "2009-01-03",
    "2010-01-16",
    "2010-01-24",
    "2010-02-07",
    "2011-01-08",
    "2013-01-12",
    "2014-01-12",
    "2014-01-19",
    "2014-02-02",
    "2015-01-11",
    "2016-01-17",
    "2016-01-24",
    "2016-02-07",
];
const SUPERBOWLS: [&str; 3] = ["2010-02-07", "2014-02-02", "2016-02-07"];

/// One debug scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Column name validation
    Names,
    /// Split, fit with per-epoch validation, then test on the held-out part
    TrainEvalTest,
    /// Trend only, with many regularized changepoints
    Trend,
    /// Deep AR network predicting two weeks
    ArNet,
    /// Multiplicative yearly and weekly seasonality
    Seasons,
    /// Lagged covariate plus future regressors
    LagReg,
    /// Custom events and country holidays
    Holidays,
    /// Short AR model forecasting from the end of the data
    Predict,
    /// Every scenario above in order
    All,
}

impl Scenario {
    pub const EACH: [Scenario; 8] = [
        Scenario::Names,
        Scenario::TrainEvalTest,
        Scenario::Trend,
        Scenario::ArNet,
        Scenario::Seasons,
        Scenario::LagReg,
        Scenario::Holidays,
        Scenario::Predict,
    ];

    /// The scenarios this selection stands for
    pub fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => Self::EACH.to_vec(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::Names => "names",
            Scenario::TrainEvalTest => "train-eval-test",
            Scenario::Trend => "trend",
            Scenario::ArNet => "ar-net",
            Scenario::Seasons => "seasons",
            Scenario::LagReg => "lag-reg",
            Scenario::Holidays => "holidays",
            Scenario::Predict => "predict",
            Scenario::All => "all",
        };
        write!(f, "{}", name)
    }
}

/// Options shared by all scenarios
#[derive(Debug, Clone, Default)]
pub struct HarnessOptions {
    /// Log training progress of every model
    pub verbose: bool,
    /// Overrides the automatic number of epochs
    pub epochs: Option<usize>,
    /// Collect plot figures
    pub plots: bool,
}

impl HarnessOptions {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }

    pub fn with_plots(mut self, plots: bool) -> Self {
        self.plots = plots;
        self
    }
}

/// Everything a scenario produced
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    /// Labelled metrics tables, e.g. `train/eval` and `test`
    pub metrics: Vec<(String, MetricsTable)>,
    /// Human readable findings such as coefficient summaries
    pub notes: Vec<String>,
    pub forecast: Option<Forecast>,
    pub figures: Vec<Figure>,
}

impl ScenarioOutcome {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            metrics: Vec::new(),
            notes: Vec::new(),
            forecast: None,
            figures: Vec::new(),
        }
    }
}

/// Runs scenarios against one input series
#[derive(Debug, Clone)]
pub struct Harness {
    data: TimeSeriesData,
    options: HarnessOptions,
}

impl Harness {
    pub fn new(data: TimeSeriesData, options: HarnessOptions) -> Self {
        Self { data, options }
    }

    pub fn data(&self) -> &TimeSeriesData {
        &self.data
    }

    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    /// Run a single scenario; `Scenario::All` runs every scenario and
    /// returns the outcome of the last one
    pub fn run(&self, scenario: Scenario) -> Result<ScenarioOutcome> {
        info!(%scenario, rows = self.data.len(), "running scenario");
        match scenario {
            Scenario::Names => self.names(),
            Scenario::TrainEvalTest => self.train_eval_test(),
            Scenario::Trend => self.trend(),
            Scenario::ArNet => self.ar_net(),
            Scenario::Seasons => self.seasons(),
            Scenario::LagReg => self.lag_reg(),
            Scenario::Holidays => self.holidays(),
            Scenario::Predict => self.predict(),
            Scenario::All => {
                let mut last = ScenarioOutcome::new(Scenario::All);
                for each in Scenario::EACH {
                    last = self.run(each)?;
                }
                Ok(last)
            }
        }
    }

    fn config(&self) -> NeuralProphetConfig {
        NeuralProphetConfig {
            verbose: self.options.verbose,
            epochs: self.options.epochs,
            ..Default::default()
        }
    }

    fn no_seasonality(&self) -> NeuralProphetConfig {
        NeuralProphetConfig {
            yearly_seasonality: SeasonalitySetting::Disabled,
            weekly_seasonality: SeasonalitySetting::Disabled,
            daily_seasonality: SeasonalitySetting::Disabled,
            ..self.config()
        }
    }

    /// Append the standard figures of a fitted model
    fn collect_figures(
        &self,
        model: &NeuralProphet,
        forecast: &Forecast,
        outcome: &mut ScenarioOutcome,
        last_forecast: Option<usize>,
        parameters: bool,
    ) -> Result<()> {
        if !self.options.plots {
            return Ok(());
        }
        if let Some(include_previous_n) = last_forecast {
            outcome
                .figures
                .push(model.plot_last_forecast(forecast, include_previous_n)?);
        }
        outcome.figures.push(model.plot(forecast)?);
        outcome.figures.extend(model.plot_components(forecast)?);
        if parameters {
            outcome.figures.extend(model.plot_parameters()?);
        }
        Ok(())
    }

    fn names(&self) -> Result<ScenarioOutcome> {
        let model = NeuralProphet::new(self.config())?;
        model.validate_column_name("hello_friend")?;

        let mut outcome = ScenarioOutcome::new(Scenario::Names);
        outcome
            .notes
            .push("'hello_friend' is a valid column name".to_string());
        Ok(outcome)
    }

    fn train_eval_test(&self) -> Result<ScenarioOutcome> {
        let mut model = NeuralProphet::new(NeuralProphetConfig {
            n_lags: 14,
            n_forecasts: 7,
            ar_sparsity: Some(0.1),
            ..self.config()
        })?;
        let (train, test) = model.split_df(&self.data, 0.1, true)?;

        let metrics = model.fit(&train, FitOptions::validated(0.1))?;
        let test_metrics = model.test(&test)?;

        let mut outcome = ScenarioOutcome::new(Scenario::TrainEvalTest);
        outcome.metrics.push(("train/eval".to_string(), metrics));
        outcome.metrics.push(("test".to_string(), test_metrics));
        Ok(outcome)
    }

    fn trend(&self) -> Result<ScenarioOutcome> {
        let mut model = NeuralProphet::new(NeuralProphetConfig {
            n_changepoints: 100,
            trend_smoothness: 2.0,
            ..self.no_seasonality()
        })?;
        model.fit(&self.data, FitOptions::default())?;

        let future = model.compose_prediction_df(
            &self.data,
            PredictionFrameOptions::new()
                .with_future_periods(60)
                .with_n_history(self.data.len()),
        )?;
        let forecast = model.predict(&future)?;

        let mut outcome = ScenarioOutcome::new(Scenario::Trend);
        let changes = model.trend_rate_changes()?;
        let active = changes.iter().filter(|(_, d)| d.abs() > 1e-3).count();
        outcome.notes.push(format!(
            "{} of {} changepoints change the rate by more than 0.001",
            active,
            changes.len()
        ));
        self.collect_figures(&model, &forecast, &mut outcome, None, true)?;
        outcome.forecast = Some(forecast);
        Ok(outcome)
    }

    fn ar_net(&self) -> Result<ScenarioOutcome> {
        let mut model = NeuralProphet::new(NeuralProphetConfig {
            n_forecasts: 14,
            n_lags: 28,
            ar_sparsity: Some(0.01),
            num_hidden_layers: 2,
            ..self.no_seasonality()
        })?;
        model.set_forecast_in_focus(model.n_forecasts())?;
        let metrics = model.fit(&self.data, FitOptions::validated(0.2))?;

        let future = model.compose_prediction_df(
            &self.data,
            PredictionFrameOptions::new().with_n_history(self.data.len()),
        )?;
        let forecast = model.predict(&future)?;

        let mut outcome = ScenarioOutcome::new(Scenario::ArNet);
        outcome.metrics.push(("train/eval".to_string(), metrics));
        self.collect_figures(&model, &forecast, &mut outcome, Some(3), true)?;
        outcome.forecast = Some(forecast);
        Ok(outcome)
    }

    fn seasons(&self) -> Result<ScenarioOutcome> {
        let mut model = NeuralProphet::new(NeuralProphetConfig {
            yearly_seasonality: SeasonalitySetting::FourierOrder(8),
            weekly_seasonality: SeasonalitySetting::FourierOrder(4),
            seasonality_mode: SeasonalityMode::Multiplicative,
            ..self.config()
        })?;
        let metrics = model.fit(&self.data, FitOptions::validated(0.2))?;

        let future = model.compose_prediction_df(
            &self.data,
            PredictionFrameOptions::new()
                .with_n_history(self.data.len())
                .with_future_periods(365),
        )?;
        let forecast = model.predict(&future)?;

        let mut outcome = ScenarioOutcome::new(Scenario::Seasons);
        outcome.metrics.push(("train/eval".to_string(), metrics));
        for (name, coefficients) in model.seasonality_coefficients()? {
            let total: f64 = coefficients.iter().map(|c| c.abs()).sum();
            outcome
                .notes
                .push(format!("{}: sum |coefficients| = {:.4}", name, total));
            outcome.notes.push(format!("{}: {:?}", name, coefficients));
        }
        self.collect_figures(&model, &forecast, &mut outcome, None, true)?;
        outcome.forecast = Some(forecast);
        Ok(outcome)
    }

    fn lag_reg(&self) -> Result<ScenarioOutcome> {
        let model = NeuralProphet::new(NeuralProphetConfig {
            n_forecasts: 3,
            n_lags: 5,
            ar_sparsity: Some(0.1),
            ..self.no_seasonality()
        })?;

        // regressors need a value on every date, so fill the grid first
        let (mut df, _) = self
            .data
            .fill_missing_dates(infer_frequency(self.data.ds())?)?;
        df.set_column("A", df.rolling_mean("y", 7, 1)?)?;
        df.set_column("B", df.rolling_mean("y", 30, 1)?)?;
        df.set_column("C", df.rolling_mean("y", 30, 1)?)?;
        let mut model = model
            .add_covariate("A", CovariateConfig::default())?
            .add_regressor("B", RegressorConfig::default())?
            .add_regressor("C", RegressorConfig::default())?;
        let metrics = model.fit(&df, FitOptions::validated(0.2))?;

        // regressors are held at their last known value
        let mut options = PredictionFrameOptions::new().with_n_history(365);
        for name in ["B", "C"] {
            let last = last_value(&df, name)?;
            options = options.with_regressor(name, vec![last; model.n_forecasts()]);
        }
        let future = model.compose_prediction_df(&df, options)?;
        let forecast = model.predict(&future)?;

        let mut outcome = ScenarioOutcome::new(Scenario::LagReg);
        outcome.metrics.push(("train/eval".to_string(), metrics));
        for (name, coefficient) in model.regressor_coefficients()? {
            outcome
                .notes
                .push(format!("regressor {}: {:.4}", name, coefficient));
        }
        self.collect_figures(&model, &forecast, &mut outcome, Some(10), true)?;
        outcome.forecast = Some(forecast);
        Ok(outcome)
    }

    fn holidays(&self) -> Result<ScenarioOutcome> {
        let mut events = EventTable::from_dates("playoff", &PLAYOFFS)?;
        events.extend(&EventTable::from_dates("superbowl", &SUPERBOWLS)?);

        let model = NeuralProphet::new(self.config())?
            .add_events(
                &["superbowl", "playoff"],
                EventConfig::default()
                    .with_window(-1, 1)
                    .with_mode(SeasonalityMode::Additive),
            )?
            .add_country_holidays(
                "US",
                EventConfig::default().with_mode(SeasonalityMode::Multiplicative),
            )?;

        let history = model.create_df_with_events(&self.data, &events)?;
        let mut model = model;
        model.fit(&history, FitOptions::default())?;

        let end = self.data.len().min(500);
        let recent = self.data.slice(100.min(end), Some(end))?;
        let recent = model.create_df_with_events(&recent, &events)?;
        let future = model.compose_prediction_df(
            &recent,
            PredictionFrameOptions::new()
                .with_events(events)
                .with_future_periods(20)
                .with_n_history(1),
        )?;
        let forecast = model.predict(&future)?;

        let mut outcome = ScenarioOutcome::new(Scenario::Holidays);
        for (name, coefficients) in model.event_coefficients()? {
            let values: Vec<String> = coefficients
                .iter()
                .map(|(feature, value)| format!("{}={:.4}", feature, value))
                .collect();
            outcome.notes.push(format!("{}: {}", name, values.join(" ")));
        }
        self.collect_figures(&model, &forecast, &mut outcome, None, true)?;
        outcome.forecast = Some(forecast);
        Ok(outcome)
    }

    fn predict(&self) -> Result<ScenarioOutcome> {
        let mut model = NeuralProphet::new(NeuralProphetConfig {
            n_forecasts: 3,
            n_lags: 5,
            ..self.no_seasonality()
        })?;
        model.fit(&self.data, FitOptions::default())?;

        let future = model
            .compose_prediction_df(&self.data, PredictionFrameOptions::new().with_n_history(10))?;
        let forecast = model.predict(&future)?;

        let mut outcome = ScenarioOutcome::new(Scenario::Predict);
        self.collect_figures(&model, &forecast, &mut outcome, Some(10), false)?;
        outcome.forecast = Some(forecast);
        Ok(outcome)
    }
}

fn last_value(df: &TimeSeriesData, column: &str) -> Result<f64> {
    df.column(column)
        .and_then(|values| values.iter().rev().flatten().next().copied())
        .ok_or_else(|| ForecastError::DataError(format!("Column '{}' has no values", column)))
}

/// Daily series shaped like web traffic in log scale: a slow trend, yearly
/// and weekly cycles and gaussian noise. Starts on 2008-01-01.
pub fn synthetic_series(days: usize, seed: u64) -> Result<TimeSeriesData> {
    let start = NaiveDate::from_ymd_opt(2008, 1, 1)
        .ok_or_else(|| ForecastError::DataError("Invalid start date".to_string()))?
        .and_time(Default::default());
    let noise = Normal::new(0.0, 0.15)
        .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let ds = (0..days).map(|i| start + Duration::days(i as i64)).collect();
    let y = (0..days)
        .map(|i| {
            let t = i as f64;
            let yearly = 0.8 * (std::f64::consts::TAU * t / 365.25).cos()
                + 0.3 * (2.0 * std::f64::consts::TAU * t / 365.25).sin();
            let weekly = 0.25 * (std::f64::consts::TAU * t / 7.0).sin();
            8.0 - 0.0002 * t + yearly + weekly + noise.sample(&mut rng)
        })
        .collect();
    TimeSeriesData::new(ds, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_to_every_scenario() {
        assert_eq!(Scenario::All.expand().len(), 8);
        assert_eq!(Scenario::Trend.expand(), vec![Scenario::Trend]);
        assert_eq!(Scenario::TrainEvalTest.to_string(), "train-eval-test");
    }

    #[test]
    fn test_synthetic_series_is_seeded() {
        let a = synthetic_series(50, 7).unwrap();
        let b = synthetic_series(50, 7).unwrap();
        let c = synthetic_series(50, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.y(), c.y());
        assert_eq!(a.ds()[0].to_string(), "2008-01-01 00:00:00");
    }

    #[test]
    fn test_names_scenario() {
        let data = synthetic_series(30, 1).unwrap();
        let outcome = Harness::new(data, HarnessOptions::default())
            .run(Scenario::Names)
            .unwrap();
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.forecast.is_none());
    }
}
