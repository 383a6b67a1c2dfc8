//! NeuralProphet-style forecaster
//!
//! Decomposes a series into a piecewise linear trend, Fourier
//! seasonalities, events, country holidays and future regressors, and adds
//! an auto-regressive network over recent values plus one network per
//! lagged covariate. Components are fitted jointly by mini-batch gradient
//! descent on normalized data.
//!
//! Typical use:
//!
//! ```no_run
//! use neural_forecast::config::{FitOptions, NeuralProphetConfig};
//! use neural_forecast::data::DataLoader;
//! use neural_forecast::models::neural_prophet::{NeuralProphet, PredictionFrameOptions};
//!
//! # fn main() -> neural_forecast::error::Result<()> {
//! let df = DataLoader::from_csv("example_wp_log_peyton_manning.csv")?;
//! let mut m = NeuralProphet::new(NeuralProphetConfig {
//!     n_lags: 14,
//!     n_forecasts: 7,
//!     ..Default::default()
//! })?;
//! let metrics = m.fit(&df, FitOptions::default())?;
//! println!("{}", metrics);
//!
//! let future = m.compose_prediction_df(&df, PredictionFrameOptions::new().with_n_history(30))?;
//! let forecast = m.predict(&future)?;
//! # Ok(())
//! # }
//! ```

use crate::config::{
    auto_batch_size, auto_epochs, CovariateConfig, FitOptions, Growth, NeuralProphetConfig,
    RegressorConfig, SeasonalityMode, DAILY_FOURIER_ORDER, DEFAULT_LEARNING_RATE,
    WEEKLY_FOURIER_ORDER, YEARLY_FOURIER_ORDER,
};
use crate::data::TimeSeriesData;
use crate::dataset::{Dataset, WindowSpec};
use crate::error::{ForecastError, Result};
use crate::events::{EventConfig, EventTable};
use crate::features::{BlockSource, FeatureBlock, FeatureLayout};
use crate::forecast::Forecast;
use crate::holidays::{Country, HolidayIndex};
use crate::metrics::{EpochMetrics, MetricsTable};
use crate::models::time_net::{TimeNet, TimeNetSpec};
use crate::models::trend::PiecewiseLinearTrend;
use crate::models::ForecastModel;
use crate::nn::Mlp;
use crate::plot::{component_figures, forecast_figure, last_forecast_figure, Figure, SeriesStyle};
use crate::scaling::{DataNormalization, ShiftScale, TimeScale};
use crate::training::{Trainer, TrainerConfig};
use crate::utils::{
    days_since_epoch, format_datetime, future_timestamps, infer_frequency, unix_epoch,
};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use forecast_math::fourier::fourier_terms;
use forecast_math::interpolate::{count_missing, interpolate_linear};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::{debug, info};

const RESERVED_NAMES: [&str; 9] = [
    "ds", "y", "t", "y_scaled", "yhat", "trend", "residual", "ar", "origin",
];
const SEASONALITY_NAMES: [&str; 3] = ["yearly", "weekly", "daily"];
const RESERVED_PREFIXES: [&str; 4] = ["season_", "event_", "regressor_", "covar_"];

/// Options of [`NeuralProphet::compose_prediction_df`]
#[derive(Debug, Clone, Default)]
pub struct PredictionFrameOptions {
    /// Occurrences of registered events, used for rows without event columns
    pub events: Option<EventTable>,
    /// Future values of every registered regressor
    pub regressors: BTreeMap<String, Vec<f64>>,
    /// Future rows to add; defaults to `n_forecasts`
    pub future_periods: Option<usize>,
    /// History rows to keep in addition to the `n_lags` inputs
    pub n_history: usize,
}

impl PredictionFrameOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: EventTable) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_regressor(mut self, name: &str, future_values: Vec<f64>) -> Self {
        self.regressors.insert(name.to_string(), future_values);
        self
    }

    pub fn with_future_periods(mut self, periods: usize) -> Self {
        self.future_periods = Some(periods);
        self
    }

    pub fn with_n_history(mut self, n_history: usize) -> Self {
        self.n_history = n_history;
        self
    }
}

/// Everything learned by `fit`
#[derive(Debug, Clone)]
struct FittedState {
    net: TimeNet,
    normalization: DataNormalization,
    frequency: Duration,
    metrics: MetricsTable,
}

/// Neural forecaster with trend, seasonality, events, regressors,
/// auto-regression and lagged covariates
#[derive(Debug, Clone)]
pub struct NeuralProphet {
    config: NeuralProphetConfig,
    forecast_in_focus: Option<usize>,
    events: Vec<(String, EventConfig)>,
    country_holidays: Option<(Country, EventConfig)>,
    regressors: Vec<(String, RegressorConfig)>,
    covariates: Vec<(String, CovariateConfig)>,
    state: Option<FittedState>,
}

impl NeuralProphet {
    /// Create a model; invalid option combinations are rejected here
    pub fn new(config: NeuralProphetConfig) -> Result<Self> {
        let config = config.resolve()?;
        debug!(
            n_lags = config.n_lags,
            n_forecasts = config.n_forecasts,
            "created model"
        );
        Ok(Self {
            config,
            forecast_in_focus: None,
            events: Vec::new(),
            country_holidays: None,
            regressors: Vec::new(),
            covariates: Vec::new(),
            state: None,
        })
    }

    pub fn config(&self) -> &NeuralProphetConfig {
        &self.config
    }

    pub fn n_forecasts(&self) -> usize {
        self.config.n_forecasts
    }

    pub fn n_lags(&self) -> usize {
        self.config.n_lags
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn forecast_in_focus(&self) -> Option<usize> {
        self.forecast_in_focus
    }

    /// Metrics recorded during `fit`
    pub fn train_metrics(&self) -> Option<&MetricsTable> {
        self.state.as_ref().map(|s| &s.metrics)
    }

    fn state(&self) -> Result<&FittedState> {
        self.state.as_ref().ok_or(ForecastError::NotFitted)
    }

    fn ensure_unfitted(&self) -> Result<()> {
        if self.state.is_some() {
            return Err(ForecastError::AlreadyFitted);
        }
        Ok(())
    }

    /// Check that `name` can be used for a new event, regressor or
    /// covariate column
    pub fn validate_column_name(&self, name: &str) -> Result<()> {
        let reject = |reason: &str| {
            Err(ForecastError::ValidationError(format!(
                "Name '{}' {}",
                name, reason
            )))
        };

        if name.is_empty() {
            return reject("must not be empty");
        }
        if RESERVED_NAMES.contains(&name) {
            return reject("is reserved");
        }
        for prefix in ["yhat", "residual", "ar"] {
            if let Some(rest) = name.strip_prefix(prefix) {
                if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                    return reject("is reserved for forecast outputs");
                }
            }
        }
        if RESERVED_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return reject("uses a reserved component prefix");
        }
        if SEASONALITY_NAMES.contains(&name) {
            return reject("is already used by a seasonality");
        }
        if self.events.iter().any(|(n, _)| n == name) {
            return reject("is already used by an event");
        }
        if self.regressors.iter().any(|(n, _)| n == name) {
            return reject("is already used by a regressor");
        }
        if self.covariates.iter().any(|(n, _)| n == name) {
            return reject("is already used by a covariate");
        }
        if let Some((country, _)) = &self.country_holidays {
            if country.holiday_names().contains(name) {
                return reject("is already used by a country holiday");
            }
        }
        Ok(())
    }

    fn check_mode(&self, mode: SeasonalityMode) -> Result<()> {
        if self.config.growth == Growth::Off && mode == SeasonalityMode::Multiplicative {
            return Err(ForecastError::InvalidParameter(
                "Multiplicative components require a trend".to_string(),
            ));
        }
        Ok(())
    }

    /// Register a lagged covariate; its past values feed the AR inputs
    pub fn add_covariate(mut self, name: &str, config: CovariateConfig) -> Result<Self> {
        self.ensure_unfitted()?;
        if self.config.n_lags == 0 {
            return Err(ForecastError::InvalidParameter(
                "Covariates require n_lags > 0".to_string(),
            ));
        }
        self.validate_column_name(name)?;
        self.covariates.push((name.to_string(), config));
        Ok(self)
    }

    /// Register a regressor whose future values are known
    pub fn add_regressor(mut self, name: &str, config: RegressorConfig) -> Result<Self> {
        self.ensure_unfitted()?;
        self.validate_column_name(name)?;
        self.check_mode(config.mode)?;
        self.regressors.push((name.to_string(), config));
        Ok(self)
    }

    /// Register events sharing one window and mode
    pub fn add_events(mut self, names: &[&str], config: EventConfig) -> Result<Self> {
        self.ensure_unfitted()?;
        config.validate()?;
        self.check_mode(config.mode)?;
        for name in names {
            self.validate_column_name(name)?;
            self.events.push((name.to_string(), config));
        }
        Ok(self)
    }

    /// Register the public holidays of a country (`US`, `CA`, `GB`/`UK`,
    /// `DE`)
    pub fn add_country_holidays(mut self, country: &str, config: EventConfig) -> Result<Self> {
        self.ensure_unfitted()?;
        config.validate()?;
        self.check_mode(config.mode)?;
        if self.country_holidays.is_some() {
            return Err(ForecastError::InvalidParameter(
                "Country holidays have already been added".to_string(),
            ));
        }
        let country: Country = country.parse()?;
        let holidays = country.holiday_names();
        let taken = self
            .events
            .iter()
            .map(|(n, _)| n)
            .chain(self.regressors.iter().map(|(n, _)| n))
            .chain(self.covariates.iter().map(|(n, _)| n))
            .find(|n| holidays.contains(n.as_str()));
        if let Some(name) = taken {
            return Err(ForecastError::ValidationError(format!(
                "Name '{}' is also a {} holiday",
                name, country
            )));
        }
        self.country_holidays = Some((country, config));
        Ok(self)
    }

    /// Forecast step used by plots, 1-based
    pub fn set_forecast_in_focus(&mut self, step: usize) -> Result<()> {
        if step == 0 || step > self.config.n_forecasts {
            return Err(ForecastError::InvalidParameter(format!(
                "Forecast in focus must be in 1..={}, got {}",
                self.config.n_forecasts, step
            )));
        }
        self.forecast_in_focus = Some(step);
        Ok(())
    }

    fn focus(&self) -> usize {
        self.forecast_in_focus.unwrap_or(1)
    }

    /// Split into training and validation frames by sample count.
    ///
    /// With `inputs_overbleed` the validation frame starts `n_lags` rows
    /// early so its first window can use the end of the training data.
    pub fn split_df(
        &self,
        df: &TimeSeriesData,
        valid_p: f64,
        inputs_overbleed: bool,
    ) -> Result<(TimeSeriesData, TimeSeriesData)> {
        if !(valid_p > 0.0 && valid_p < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "valid_p must be in (0, 1), got {}",
                valid_p
            )));
        }
        let n_lags = self.config.n_lags;
        let n_forecasts = self.config.n_forecasts;
        // both frames lose n_forecasts - 1 rows after their last window origin
        let n_samples = (df.len() + 2)
            .saturating_sub(n_lags + 2 * n_forecasts)
            .saturating_sub(if inputs_overbleed { 0 } else { n_lags });
        let n_valid = ((n_samples as f64 * valid_p) as usize).max(1);
        if n_samples <= n_valid {
            return Err(ForecastError::DataError(format!(
                "{} rows are too few to split with n_lags={} and n_forecasts={}",
                df.len(),
                n_lags,
                n_forecasts
            )));
        }
        let n_train = n_samples - n_valid;

        let split_train = n_train + n_lags + n_forecasts - 1;
        let split_valid = if inputs_overbleed {
            split_train - n_lags
        } else {
            split_train
        };
        debug!(n_train, n_valid, "split data");
        Ok((
            df.slice(0, Some(split_train))?,
            df.slice(split_valid, None)?,
        ))
    }

    /// Add a 0/1 column for every registered event
    pub fn create_df_with_events(
        &self,
        df: &TimeSeriesData,
        events: &EventTable,
    ) -> Result<TimeSeriesData> {
        for name in events.names() {
            if !self.events.iter().any(|(n, _)| n == name) {
                return Err(ForecastError::ValidationError(format!(
                    "Event '{}' has not been added to the model",
                    name
                )));
            }
        }
        let mut out = df.clone();
        for (name, _) in &self.events {
            out.set_column(name, events.indicator(name, df.ds()))?;
        }
        Ok(out)
    }

    /// Sort checks, date-grid filling and imputation shared by fitting and
    /// prediction
    fn prepare(&self, df: &TimeSeriesData) -> Result<TimeSeriesData> {
        if df.is_empty() {
            return Err(ForecastError::DataError("Dataframe is empty".to_string()));
        }
        df.check_monotonic()?;
        let required = self
            .regressors
            .iter()
            .map(|(n, _)| n)
            .chain(self.covariates.iter().map(|(n, _)| n));
        for name in required {
            if !df.has_column(name) {
                return Err(ForecastError::DataError(format!(
                    "Column '{}' is missing",
                    name
                )));
            }
        }

        let mut df = df.clone();
        let frequency = match &self.state {
            Some(state) => Some(state.frequency),
            None if df.len() > 1 => Some(infer_frequency(df.ds())?),
            None => None,
        };
        if let Some(frequency) = frequency {
            let (filled, inserted) = df.fill_missing_dates(frequency)?;
            if inserted > 0 {
                if let Some((name, _)) = self.regressors.first() {
                    return Err(ForecastError::DataError(format!(
                        "{} timestamps are missing; regressor '{}' has no values for them",
                        inserted, name
                    )));
                }
                info!(inserted, "added rows for missing timestamps");
                df = filled;
            }
        }

        if self.config.impute_missing {
            let filled = interpolate_linear(df.y(), None);
            let imputed = count_missing(df.y()) - count_missing(&filled);
            if imputed > 0 {
                debug!(imputed, "interpolated missing y");
            }
            df.set_y(filled)?;
            for (name, _) in &self.covariates {
                if let Some(values) = df.column(name) {
                    let filled = interpolate_linear(values, None);
                    df.set_column(name, filled)?;
                }
            }
        }
        Ok(df)
    }

    fn fit_normalization(&self, df: &TimeSeriesData) -> Result<DataNormalization> {
        let mut columns = BTreeMap::new();
        for (name, config) in &self.regressors {
            let values = df.column(name).unwrap_or_default();
            columns.insert(name.clone(), ShiftScale::fit(values, config.normalize, false)?);
        }
        for (name, config) in &self.covariates {
            let values = df.column(name).unwrap_or_default();
            columns.insert(name.clone(), ShiftScale::fit(values, config.normalize, false)?);
        }
        Ok(DataNormalization {
            time: TimeScale::fit(df.ds())?,
            y: ShiftScale::fit(df.y(), self.config.normalize_y, true)?,
            columns,
        })
    }

    /// Seasonalities to fit as `(name, period in days, Fourier order)`
    fn seasonalities(
        &self,
        ds: &[NaiveDateTime],
        frequency: Duration,
    ) -> Vec<(&'static str, f64, usize)> {
        let span_days = match (ds.first(), ds.last()) {
            (Some(first), Some(last)) => (*last - *first).num_seconds() as f64 / 86_400.0,
            _ => 0.0,
        };
        let freq_days = frequency.num_seconds() as f64 / 86_400.0;
        let candidates = [
            (
                "yearly",
                365.25,
                self.config.yearly_seasonality,
                span_days >= 730.0,
                YEARLY_FOURIER_ORDER,
            ),
            (
                "weekly",
                7.0,
                self.config.weekly_seasonality,
                span_days >= 14.0 && freq_days < 7.0,
                WEEKLY_FOURIER_ORDER,
            ),
            (
                "daily",
                1.0,
                self.config.daily_seasonality,
                span_days >= 2.0 && freq_days < 1.0,
                DAILY_FOURIER_ORDER,
            ),
        ];
        candidates
            .into_iter()
            .filter_map(|(name, period, setting, auto, default_order)| {
                setting
                    .resolve(auto, default_order)
                    .map(|order| (name, period, order))
            })
            .collect()
    }

    fn build_layout(&self, df: &TimeSeriesData, frequency: Duration) -> Result<FeatureLayout> {
        let mut layout = FeatureLayout::new();
        for (name, period, order) in self.seasonalities(df.ds(), frequency) {
            debug!(name, order, "adding seasonality");
            layout.push(
                name,
                BlockSource::Seasonality {
                    period,
                    fourier_order: order,
                },
                self.config.seasonality_mode,
                self.config.seasonality_reg,
            )?;
        }
        for (name, config) in &self.events {
            layout.push(
                name,
                BlockSource::Event {
                    offsets: config.offsets(),
                },
                config.mode,
                config.regularization.unwrap_or(0.0),
            )?;
        }
        if let Some((country, config)) = &self.country_holidays {
            let years = match (df.ds().first(), df.ds().last()) {
                (Some(first), Some(last)) => first.year()..=last.year(),
                _ => return Ok(layout),
            };
            let index = HolidayIndex::new(*country, years);
            for name in index.names() {
                layout.push(
                    name,
                    BlockSource::Holiday {
                        country: *country,
                        offsets: config.offsets(),
                    },
                    config.mode,
                    config.regularization.unwrap_or(0.0),
                )?;
            }
        }
        for (name, config) in &self.regressors {
            layout.push(
                name,
                BlockSource::Regressor,
                config.mode,
                config.regularization.unwrap_or(0.0),
            )?;
        }
        Ok(layout)
    }

    fn build_trend(&self, time: &TimeScale) -> Option<PiecewiseLinearTrend> {
        if self.config.growth == Growth::Off {
            return None;
        }
        let trend = match &self.config.changepoints {
            Some(dates) => {
                let mut points: Vec<f64> = dates
                    .iter()
                    .map(|d| time.transform(&d.and_time(Default::default())))
                    .filter(|t| *t > 0.0 && *t < 1.0)
                    .collect();
                points.sort_by(|a, b| a.total_cmp(b));
                PiecewiseLinearTrend::new(points)
            }
            None => PiecewiseLinearTrend::evenly_spaced(
                self.config.n_changepoints,
                self.config.changepoints_range,
            ),
        };
        Some(trend)
    }

    fn dataset(
        &self,
        net: &TimeNet,
        normalization: &DataNormalization,
        df: &TimeSeriesData,
        require_targets: bool,
    ) -> Result<Dataset> {
        let t = df
            .ds()
            .iter()
            .map(|d| normalization.time.transform(d))
            .collect();
        let features = net.layout().build_rows(df, normalization)?;
        let y: Vec<Option<f64>> = df
            .y()
            .iter()
            .map(|v| v.map(|x| normalization.y.transform(x)))
            .collect();
        let covariates: Vec<Vec<Option<f64>>> = self
            .covariates
            .iter()
            .map(|(name, _)| {
                let column = df.column(name).ok_or_else(|| {
                    ForecastError::DataError(format!("Covariate column '{}' is missing", name))
                })?;
                let scale = normalization.column(name);
                Ok(column
                    .iter()
                    .map(|v| v.map(|x| scale.transform(x)))
                    .collect())
            })
            .collect::<Result<_>>()?;

        Dataset::tabularize(
            t,
            features,
            &y,
            &covariates,
            WindowSpec {
                n_lags: self.config.n_lags,
                n_forecasts: self.config.n_forecasts,
                require_targets,
            },
        )
    }

    /// Train the model; returns one row of metrics per epoch
    pub fn fit(&mut self, df: &TimeSeriesData, options: FitOptions) -> Result<MetricsTable> {
        self.ensure_unfitted()?;
        let df = self.prepare(df)?;
        let frequency = infer_frequency(df.ds())?;

        let (train_df, valid_df) = if options.validate_each_epoch {
            let (train, valid) = self.split_df(&df, options.valid_p, true)?;
            (train, Some(valid))
        } else {
            (df, None)
        };

        let normalization = self.fit_normalization(&train_df)?;
        let layout = self.build_layout(&train_df, frequency)?;
        let trend = self.build_trend(&normalization.time);
        let spec = TimeNetSpec {
            n_forecasts: self.config.n_forecasts,
            n_lags: self.config.n_lags,
            num_hidden_layers: self.config.num_hidden_layers,
            d_hidden: self.config.d_hidden(),
            ar_regularization: self.config.ar_regularization(),
            trend_smoothness: self.config.trend_smoothness,
            trend_threshold: self.config.trend_threshold_value(),
        };
        let covariates = self
            .covariates
            .iter()
            .map(|(name, c)| (name.clone(), c.only_last_value, c.regularization))
            .collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut net = TimeNet::new(&spec, trend, layout, covariates, &mut rng)?;

        let train = self.dataset(&net, &normalization, &train_df, true)?;
        let valid = valid_df
            .map(|v| self.dataset(&net, &normalization, &v, true))
            .transpose()?;

        if let Some(trend) = net.trend_mut() {
            let (t_obs, y_obs): (Vec<f64>, Vec<f64>) = train
                .t
                .iter()
                .zip(train_df.y())
                .filter_map(|(t, y)| y.map(|v| (*t, normalization.y.transform(v))))
                .unzip();
            trend.init_from(&t_obs, &y_obs);
        }

        let n_samples = train.len();
        let trainer_config = TrainerConfig {
            epochs: self.config.epochs.unwrap_or_else(|| auto_epochs(n_samples)),
            batch_size: self
                .config
                .batch_size
                .unwrap_or_else(|| auto_batch_size(n_samples)),
            learning_rate: self.config.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            loss: self.config.loss_func.to_loss(),
            seed: self.config.seed,
            verbose: self.config.verbose,
        };
        info!(
            samples = n_samples,
            epochs = trainer_config.epochs,
            batch_size = trainer_config.batch_size,
            learning_rate = trainer_config.learning_rate,
            components = net.layout().blocks().len(),
            "fitting model"
        );

        let y_scale = normalization.y.scale;
        let mut trainer = Trainer::new(trainer_config, n_samples);
        let mut metrics = MetricsTable::new(trainer_config.loss.name());
        for epoch in 0..trainer_config.epochs {
            let stats = trainer.run_epoch(&mut net, &train, epoch, y_scale);
            let val = valid
                .as_ref()
                .map(|v| Trainer::evaluate(&net, v, trainer_config.loss, y_scale));
            metrics.push(EpochMetrics {
                epoch: epoch + 1,
                loss: stats.loss,
                reg_loss: stats.reg_loss,
                mae: stats.mae,
                rmse: stats.rmse,
                val_loss: val.map(|v| v.loss),
                val_mae: val.map(|v| v.mae),
                val_rmse: val.map(|v| v.rmse),
            });
        }

        if let Some(last) = metrics.last() {
            info!(loss = last.loss, mae = last.mae, rmse = last.rmse, "training finished");
        }
        self.state = Some(FittedState {
            net,
            normalization,
            frequency,
            metrics: metrics.clone(),
        });
        Ok(metrics)
    }

    /// Evaluate the fitted model on held-out data
    pub fn test(&self, df: &TimeSeriesData) -> Result<MetricsTable> {
        let state = self.state()?;
        let df = self.prepare(df)?;
        let data = self.dataset(&state.net, &state.normalization, &df, true)?;
        let loss = self.config.loss_func.to_loss();
        let stats = Trainer::evaluate(&state.net, &data, loss, state.normalization.y.scale);

        let mut table = MetricsTable::new(loss.name());
        table.push(EpochMetrics {
            epoch: 1,
            loss: stats.loss,
            reg_loss: 0.0,
            mae: stats.mae,
            rmse: stats.rmse,
            ..Default::default()
        });
        info!(loss = stats.loss, mae = stats.mae, rmse = stats.rmse, "test finished");
        Ok(table)
    }

    /// Recent history plus future rows ready for [`NeuralProphet::predict`]
    pub fn compose_prediction_df(
        &self,
        df: &TimeSeriesData,
        options: PredictionFrameOptions,
    ) -> Result<TimeSeriesData> {
        let state = self.state()?;
        let n_lags = self.config.n_lags;
        let n_forecasts = self.config.n_forecasts;
        let future_periods = options.future_periods.unwrap_or(n_forecasts);
        if n_lags > 0 && future_periods > n_forecasts {
            return Err(ForecastError::InvalidParameter(format!(
                "With n_lags > 0 at most n_forecasts={} future periods can be predicted, got {}",
                n_forecasts, future_periods
            )));
        }
        if df.len() < n_lags {
            return Err(ForecastError::DataError(format!(
                "At least n_lags={} history rows are needed, got {}",
                n_lags,
                df.len()
            )));
        }
        df.check_monotonic()?;

        let mut history = df.tail(n_lags + options.n_history);
        let last = match df.ds().last() {
            Some(last) => *last,
            None => return Err(ForecastError::DataError("Dataframe is empty".to_string())),
        };
        let future_ds = future_timestamps(last, future_periods, state.frequency)?;
        let mut future = TimeSeriesData::from_parts(future_ds, vec![None; future_periods])?;

        for (name, _) in &self.regressors {
            let values = options.regressors.get(name).ok_or_else(|| {
                ForecastError::InvalidParameter(format!(
                    "Future values of regressor '{}' are required",
                    name
                ))
            })?;
            if values.len() < future_periods {
                return Err(ForecastError::InvalidParameter(format!(
                    "Regressor '{}' has {} future values, {} are needed",
                    name,
                    values.len(),
                    future_periods
                )));
            }
            let values = values[..future_periods].iter().copied().map(Some).collect();
            future.set_column(name, values)?;
        }

        for (name, _) in &self.events {
            let indicator = |ds: &[NaiveDateTime]| match &options.events {
                Some(table) => table.indicator(name, ds),
                None => vec![Some(0.0); ds.len()],
            };
            if !history.has_column(name) {
                let values = indicator(history.ds());
                history.set_column(name, values)?;
            }
            let values = indicator(future.ds());
            future.set_column(name, values)?;
        }

        history.append(&future)?;
        debug!(
            history = history.len() - future_periods,
            future = future_periods,
            "composed prediction frame"
        );
        Ok(history)
    }

    /// Predict every row that has a complete input window
    pub fn predict(&self, df: &TimeSeriesData) -> Result<Forecast> {
        let state = self.state()?;
        let df = self.prepare(df)?;
        let data = self.dataset(&state.net, &state.normalization, &df, false)?;
        let net = &state.net;
        let y_norm = state.normalization.y;
        let n_forecasts = self.config.n_forecasts;
        let n_lags = self.config.n_lags;
        let len = df.len();

        let mut yhat = vec![vec![None; len]; n_forecasts];
        let mut ar = vec![vec![None; len]; n_forecasts];
        let mut covars = vec![vec![vec![None; len]; n_forecasts]; self.covariates.len()];
        for sample in &data.samples {
            let out = net.forward(sample, &data);
            for h in 0..n_forecasts {
                let row = sample.origin + h;
                yhat[h][row] = Some(y_norm.inverse(out.yhat[h]));
                ar[h][row] = Some(out.ar[h] * y_norm.scale);
                for (i, values) in out.covariates.iter().enumerate() {
                    covars[i][h][row] = Some(values[h] * y_norm.scale);
                }
            }
        }

        let mut result = TimeSeriesData::from_parts(df.ds().to_vec(), df.y().to_vec())?;
        for (h, values) in yhat.into_iter().enumerate() {
            let residual = values
                .iter()
                .zip(df.y())
                .map(|(p, a)| Some((*p)? - (*a)?))
                .collect();
            result.set_column(&format!("yhat{}", h + 1), values)?;
            result.set_column(&format!("residual{}", h + 1), residual)?;
        }

        let trend_scaled: Vec<f64> = data.t.iter().map(|t| net.trend_at(*t)).collect();
        result.set_column(
            "trend",
            trend_scaled.iter().map(|v| Some(y_norm.inverse(*v))).collect(),
        )?;
        for block in net.layout().blocks() {
            let values = data
                .features
                .iter()
                .zip(&trend_scaled)
                .map(|(features, trend)| {
                    let value = net.block_value(block, features);
                    Some(match block.mode {
                        SeasonalityMode::Additive => value * y_norm.scale,
                        SeasonalityMode::Multiplicative => value * trend * y_norm.scale,
                    })
                })
                .collect();
            result.set_column(&block.component_name(), values)?;
        }
        if n_lags > 0 {
            for (h, values) in ar.into_iter().enumerate() {
                result.set_column(&format!("ar{}", h + 1), values)?;
            }
        }
        for ((name, _), steps) in self.covariates.iter().zip(covars) {
            for (h, values) in steps.into_iter().enumerate() {
                result.set_column(&format!("covar_{}_{}", name, h + 1), values)?;
            }
        }

        debug!(rows = len, windows = data.len(), "predicted");
        Ok(Forecast::new(result, n_forecasts))
    }

    /// Forecasts of the latest `include_previous_n + 1` origins, one column
    /// `origin-{k}` per origin aligned with the rows they predict
    pub fn get_last_forecast(
        &self,
        forecast: &Forecast,
        include_previous_n: usize,
    ) -> Result<TimeSeriesData> {
        let n_forecasts = forecast.n_forecasts();
        let first_step = forecast.yhat(1)?;
        let last_origin = first_step
            .iter()
            .rposition(|v| v.is_some())
            .ok_or_else(|| {
                ForecastError::ForecastingError("Forecast has no predictions".to_string())
            })?;

        let start = last_origin.saturating_sub(include_previous_n + self.config.n_lags);
        let end = (last_origin + n_forecasts).min(forecast.len());
        let mut out = TimeSeriesData::from_parts(
            forecast.ds()[start..end].to_vec(),
            forecast.y()[start..end].to_vec(),
        )?;

        let steps: Vec<&[Option<f64>]> = (1..=n_forecasts)
            .map(|h| forecast.yhat(h))
            .collect::<Result<_>>()?;
        for k in 0..=include_previous_n {
            let Some(origin) = last_origin.checked_sub(k) else {
                break;
            };
            let values = (start..end)
                .map(|row| {
                    let h = row.checked_sub(origin)?;
                    steps.get(h).and_then(|s| s[row])
                })
                .collect();
            out.set_column(&format!("origin-{}", k), values)?;
        }
        Ok(out)
    }

    /// Actual values against the forecast step in focus
    pub fn plot(&self, forecast: &Forecast) -> Result<Figure> {
        forecast_figure(forecast, self.focus())
    }

    /// One figure per forecast component
    pub fn plot_components(&self, forecast: &Forecast) -> Result<Vec<Figure>> {
        Ok(component_figures(forecast, self.focus()))
    }

    pub fn plot_last_forecast(
        &self,
        forecast: &Forecast,
        include_previous_n: usize,
    ) -> Result<Figure> {
        Ok(last_forecast_figure(
            &self.get_last_forecast(forecast, include_previous_n)?,
        ))
    }

    /// Figures of the fitted parameters: trend, seasonal profiles, event
    /// and regressor coefficients, AR and covariate weights
    pub fn plot_parameters(&self) -> Result<Vec<Figure>> {
        let state = self.state()?;
        let net = &state.net;
        let scale = state.normalization.y.scale;
        let mut figures = Vec::new();

        if let Some(trend) = net.trend() {
            let time = state.normalization.time;
            let points: Vec<f64> = (0..=100).map(|i| i as f64 / 100.0).collect();
            let x = points.iter().map(|t| format_datetime(&time_at(&time, *t))).collect();
            let y = points
                .iter()
                .map(|t| Some(state.normalization.y.inverse(trend.value(*t))))
                .collect();
            figures.push(Figure::new("Trend", "ds", "trend").with_series(
                "trend",
                SeriesStyle::Line,
                x,
                y,
            ));

            let changes = self.trend_rate_changes()?;
            figures.push(
                Figure::new("Trend rate change", "ds", "rate change").with_series(
                    "delta",
                    SeriesStyle::Bar,
                    changes.iter().map(|(d, _)| format_datetime(d)).collect(),
                    changes.iter().map(|(_, v)| Some(*v)).collect(),
                ),
            );
        }

        for block in net.layout().blocks() {
            let params = net.block_params(block);
            let unit = match block.mode {
                SeasonalityMode::Additive => scale,
                SeasonalityMode::Multiplicative => 1.0,
            };
            let y_label = match block.mode {
                SeasonalityMode::Additive => block.component_name(),
                SeasonalityMode::Multiplicative => format!("{} (relative)", block.component_name()),
            };
            match &block.source {
                BlockSource::Seasonality {
                    period,
                    fourier_order,
                } => {
                    let (x, t_days) = seasonal_profile_axis(&block.name);
                    let rows = fourier_terms(&t_days, *period, *fourier_order)?;
                    let y = rows
                        .iter()
                        .map(|row| {
                            Some(row.iter().zip(&params).map(|(f, p)| f * p).sum::<f64>() * unit)
                        })
                        .collect();
                    figures.push(
                        Figure::new(&format!("Seasonality: {}", block.name), "time", &y_label)
                            .with_series(&block.name, SeriesStyle::Line, x, y),
                    );
                }
                _ => {
                    let y = params.iter().map(|p| Some(p * unit)).collect();
                    figures.push(
                        Figure::new(&block.component_name(), "feature", &y_label).with_series(
                            &block.name,
                            SeriesStyle::Bar,
                            block.feature_names(),
                            y,
                        ),
                    );
                }
            }
        }

        let focus = self.focus() - 1;
        let direct = self.config.num_hidden_layers == 0;
        if let Some(weights) = self.ar_weights()? {
            figures.push(lag_weight_figure("AR weights", &weights, focus, direct));
        }
        for cov in net.covariate_nets() {
            let weights = first_layer_weights(&cov.net);
            figures.push(lag_weight_figure(
                &format!("Covariate weights: {}", cov.name),
                &weights,
                focus,
                direct,
            ));
        }

        Ok(figures)
    }

    /// Fourier coefficients of each seasonality
    pub fn seasonality_coefficients(&self) -> Result<BTreeMap<String, Vec<f64>>> {
        let net = &self.state()?.net;
        Ok(net
            .layout()
            .blocks()
            .iter()
            .filter(|b| matches!(b.source, BlockSource::Seasonality { .. }))
            .map(|b| (b.name.clone(), net.block_params(b)))
            .collect())
    }

    /// Coefficient of each window offset of every event and holiday
    pub fn event_coefficients(&self) -> Result<BTreeMap<String, Vec<(String, f64)>>> {
        let net = &self.state()?.net;
        Ok(net
            .layout()
            .blocks()
            .iter()
            .filter(|b| {
                matches!(
                    b.source,
                    BlockSource::Event { .. } | BlockSource::Holiday { .. }
                )
            })
            .map(|b| {
                let coefficients = b.feature_names().into_iter().zip(net.block_params(b)).collect();
                (b.name.clone(), coefficients)
            })
            .collect())
    }

    /// Coefficient of each future regressor on normalized inputs
    pub fn regressor_coefficients(&self) -> Result<BTreeMap<String, f64>> {
        let net = &self.state()?.net;
        Ok(net
            .layout()
            .blocks()
            .iter()
            .filter(|b| b.source == BlockSource::Regressor)
            .map(|b| (b.name.clone(), net.block_params(b)[0]))
            .collect())
    }

    /// Changepoint timestamps with their rate change in original units per
    /// training span
    pub fn trend_rate_changes(&self) -> Result<Vec<(NaiveDateTime, f64)>> {
        let state = self.state()?;
        let scale = state.normalization.y.scale;
        Ok(match state.net.trend() {
            Some(trend) => trend
                .changepoints()
                .iter()
                .zip(trend.rate_changes())
                .map(|(t, delta)| (time_at(&state.normalization.time, *t), delta * scale))
                .collect(),
            None => Vec::new(),
        })
    }

    /// First-layer weights of the AR network, `[output][lag input]`
    pub fn ar_weights(&self) -> Result<Option<Vec<Vec<f64>>>> {
        Ok(self.state()?.net.ar_net().map(first_layer_weights))
    }

    pub fn block(&self, name: &str) -> Result<FeatureBlock> {
        self.state()?
            .net
            .layout()
            .block(name)
            .cloned()
            .ok_or_else(|| ForecastError::ValidationError(format!("No component '{}'", name)))
    }
}

fn time_at(time: &TimeScale, t: f64) -> NaiveDateTime {
    let seconds = time.start + t * time.span;
    unix_epoch() + Duration::milliseconds((seconds * 1000.0).round() as i64)
}

fn first_layer_weights(net: &Mlp) -> Vec<Vec<f64>> {
    let layer = &net.layers()[0];
    (0..layer.out_dim())
        .map(|o| (0..layer.in_dim()).map(|i| layer.weight(o, i)).collect())
        .collect()
}

/// Bar chart over lags for one forecast step. With hidden layers the
/// first layer does not map to steps, so the mean absolute weight per lag
/// is shown instead.
fn lag_weight_figure(title: &str, weights: &[Vec<f64>], focus: usize, direct: bool) -> Figure {
    let n_inputs = weights.first().map(|w| w.len()).unwrap_or(0);
    let values: Vec<Option<f64>> = match weights.get(focus) {
        Some(row) if direct => row.iter().map(|w| Some(*w)).collect(),
        _ => (0..n_inputs)
            .map(|i| {
                Some(weights.iter().map(|row| row[i].abs()).sum::<f64>() / weights.len() as f64)
            })
            .collect(),
    };
    let x = (0..n_inputs).map(|i| format!("lag {}", n_inputs - i)).collect();
    Figure::new(title, "lag", "weight").with_series("weight", SeriesStyle::Bar, x, values)
}

/// X labels and day offsets for plotting one period of a seasonality
fn seasonal_profile_axis(name: &str) -> (Vec<String>, Vec<f64>) {
    let anchor = NaiveDate::from_ymd_opt(2017, 1, 2)
        .unwrap_or_default()
        .and_time(Default::default());
    match name {
        "weekly" => {
            let x = (0..7)
                .map(|d| (anchor + Duration::days(d)).format("%A").to_string())
                .collect();
            let t = (0..7)
                .map(|d| days_since_epoch(&(anchor + Duration::days(d))))
                .collect();
            (x, t)
        }
        "daily" => {
            let x = (0..24).map(|h| format!("{:02}:00", h)).collect();
            let t = (0..24)
                .map(|h| days_since_epoch(&(anchor + Duration::hours(h))))
                .collect();
            (x, t)
        }
        _ => {
            let start = anchor - Duration::days(1);
            let x = (0..365)
                .map(|d| format_datetime(&(start + Duration::days(d))))
                .collect();
            let t = (0..365)
                .map(|d| days_since_epoch(&(start + Duration::days(d))))
                .collect();
            (x, t)
        }
    }
}

impl ForecastModel for NeuralProphet {
    fn name(&self) -> &str {
        "NeuralProphet"
    }

    fn fit(&mut self, data: &TimeSeriesData) -> Result<MetricsTable> {
        NeuralProphet::fit(self, data, FitOptions::default())
    }

    fn test(&self, data: &TimeSeriesData) -> Result<MetricsTable> {
        NeuralProphet::test(self, data)
    }

    fn predict(&self, data: &TimeSeriesData) -> Result<Forecast> {
        NeuralProphet::predict(self, data)
    }
}
