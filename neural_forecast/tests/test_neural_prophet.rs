use chrono::{Duration, NaiveDate, NaiveDateTime};
use neural_forecast::config::{
    CovariateConfig, FitOptions, Growth, NeuralProphetConfig, RegressorConfig, SeasonalityMode,
    SeasonalitySetting,
};
use neural_forecast::dataset::sample_count;
use neural_forecast::events::{EventConfig, EventTable};
use neural_forecast::models::{NeuralProphet, PredictionFrameOptions};
use neural_forecast::{ForecastError, TimeSeriesData};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Daily series with a slow trend and a weekly cycle
fn weekly_series(n: usize) -> TimeSeriesData {
    let ds = (0..n).map(|i| start() + Duration::days(i as i64)).collect();
    let y = (0..n)
        .map(|i| {
            let t = i as f64;
            20.0 + 0.05 * t + 3.0 * (2.0 * std::f64::consts::PI * t / 7.0).sin()
        })
        .collect();
    TimeSeriesData::new(ds, y).unwrap()
}

fn quick_config(n_lags: usize, n_forecasts: usize) -> NeuralProphetConfig {
    NeuralProphetConfig {
        n_lags,
        n_forecasts,
        epochs: Some(10),
        batch_size: Some(32),
        learning_rate: Some(0.05),
        ..Default::default()
    }
}

#[rstest]
#[case("y")]
#[case("ds")]
#[case("trend")]
#[case("yhat3")]
#[case("residual1")]
#[case("ar2")]
#[case("season_custom")]
#[case("event_sale")]
#[case("weekly")]
fn test_reserved_names_are_rejected(#[case] name: &str) {
    let model = NeuralProphet::new(NeuralProphetConfig::default()).unwrap();
    assert!(model.validate_column_name(name).is_err());
}

#[test]
fn test_names_must_be_unique() {
    let model = NeuralProphet::new(NeuralProphetConfig::default())
        .unwrap()
        .add_regressor("temperature", RegressorConfig::default())
        .unwrap();
    assert!(model.validate_column_name("yhat_upper").is_ok());
    assert!(model
        .add_events(&["temperature"], EventConfig::default())
        .is_err());
}

#[test]
fn test_covariates_need_lags() {
    let model = NeuralProphet::new(NeuralProphetConfig::default()).unwrap();
    let err = model
        .add_covariate("price", CovariateConfig::default())
        .unwrap_err();
    assert!(matches!(err, ForecastError::InvalidParameter(_)));
}

#[test]
fn test_multiplicative_components_need_trend() {
    let config = NeuralProphetConfig {
        growth: Growth::Off,
        ..Default::default()
    };
    let model = NeuralProphet::new(config.clone()).unwrap();
    assert!(model
        .add_regressor(
            "x",
            RegressorConfig::default().with_mode(SeasonalityMode::Multiplicative)
        )
        .is_err());

    let config = NeuralProphetConfig {
        seasonality_mode: SeasonalityMode::Multiplicative,
        ..config
    };
    assert!(NeuralProphet::new(config).is_err());
}

#[test]
fn test_single_step_without_lags() {
    let model = NeuralProphet::new(NeuralProphetConfig {
        n_forecasts: 5,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(model.n_forecasts(), 1);
}

#[test]
fn test_split_df_overbleeds_lags() {
    let model = NeuralProphet::new(quick_config(10, 5)).unwrap();
    let df = weekly_series(100);

    let (train, valid) = model.split_df(&df, 0.2, true).unwrap();
    assert_eq!(sample_count(train.len(), 10, 5), 66);
    assert_eq!(sample_count(valid.len(), 10, 5), 16);
    assert_eq!(train.len(), 80);
    assert_eq!(valid.ds()[0], df.ds()[70]);

    let (train, valid) = model.split_df(&df, 0.2, false).unwrap();
    assert_eq!(sample_count(train.len(), 10, 5), 58);
    assert_eq!(sample_count(valid.len(), 10, 5), 14);
    assert_eq!(train.len() + valid.len(), 100);
    assert!(model.split_df(&df, 1.5, true).is_err());
}

#[test]
fn test_split_df_leaves_a_validation_window() {
    let mut model = NeuralProphet::new(quick_config(5, 7)).unwrap();
    let df = weekly_series(30);

    let (train, valid) = model.split_df(&df, 0.1, true).unwrap();
    assert_eq!(sample_count(train.len(), 5, 7), 12);
    assert_eq!(sample_count(valid.len(), 5, 7), 1);

    model.fit(&train, FitOptions::default()).unwrap();
    let metrics = model.test(&valid).unwrap();
    assert_eq!(metrics.len(), 1);

    // too short for a training and a validation window
    assert!(model.split_df(&weekly_series(13), 0.1, true).is_err());
}

#[test]
fn test_create_df_with_events() {
    let model = NeuralProphet::new(NeuralProphetConfig::default())
        .unwrap()
        .add_events(&["launch", "sale"], EventConfig::default())
        .unwrap();
    let df = weekly_series(10);
    let events = EventTable::from_dates("launch", &["2020-01-03"]).unwrap();

    let with_events = model.create_df_with_events(&df, &events).unwrap();
    let launch = with_events.column("launch").unwrap();
    assert_eq!(launch[2], Some(1.0));
    assert_eq!(launch.iter().flatten().sum::<f64>(), 1.0);
    // registered but absent from the table
    assert!(with_events
        .column("sale")
        .unwrap()
        .iter()
        .all(|v| *v == Some(0.0)));

    let unknown = EventTable::from_dates("holiday", &["2020-01-05"]).unwrap();
    assert!(model.create_df_with_events(&df, &unknown).is_err());
}

#[test]
fn test_unfitted_model_errors() {
    let model = NeuralProphet::new(NeuralProphetConfig::default()).unwrap();
    let df = weekly_series(30);
    assert!(matches!(model.predict(&df), Err(ForecastError::NotFitted)));
    assert!(matches!(model.test(&df), Err(ForecastError::NotFitted)));
    assert!(model
        .compose_prediction_df(&df, PredictionFrameOptions::new())
        .is_err());
    assert!(model.plot_parameters().is_err());
}

#[test]
fn test_fit_predict_with_lags() {
    let df = weekly_series(150);
    let mut model = NeuralProphet::new(quick_config(7, 3)).unwrap();
    let metrics = model.fit(&df, FitOptions::default()).unwrap();

    assert_eq!(metrics.len(), 10);
    assert_eq!(metrics.column_names()[0], "SmoothL1Loss");
    assert!(metrics.rows().iter().all(|r| r.loss.is_finite()));
    assert!(matches!(
        model.clone().fit(&df, FitOptions::default()),
        Err(ForecastError::AlreadyFitted)
    ));

    let future = model
        .compose_prediction_df(&df, PredictionFrameOptions::new())
        .unwrap();
    assert_eq!(future.len(), 10);
    assert!(future.y()[7..].iter().all(|v| v.is_none()));

    let forecast = model.predict(&future).unwrap();
    for name in [
        "yhat1",
        "yhat3",
        "residual2",
        "trend",
        "season_weekly",
        "ar1",
        "ar3",
    ] {
        assert!(forecast.has_column(name), "missing column {}", name);
    }
    assert!(forecast.yhat(1).unwrap()[7].is_some());
    assert!(forecast.yhat(3).unwrap()[9].is_some());
    assert!(forecast.yhat(1).unwrap()[6].is_none());

    let last = model.get_last_forecast(&forecast, 0).unwrap();
    let origin = last.column("origin-0").unwrap();
    assert_eq!(origin.iter().flatten().count(), 3);

    // more future periods than forecast steps is not possible with lags
    assert!(model
        .compose_prediction_df(&df, PredictionFrameOptions::new().with_future_periods(4))
        .is_err());
}

#[test]
fn test_validation_metrics_each_epoch() {
    let df = weekly_series(120);
    let mut model = NeuralProphet::new(quick_config(5, 1)).unwrap();
    let metrics = model.fit(&df, FitOptions::validated(0.2)).unwrap();

    assert!(metrics.has_validation());
    assert!(metrics.column_names().contains(&"val_MAE".to_string()));
    assert!(metrics.rows().iter().all(|r| r.val_loss.is_some()));

    let test = model.test(&df.slice(90, None).unwrap()).unwrap();
    assert_eq!(test.len(), 1);
}

#[test]
fn test_regressor_needs_future_values() {
    let n = 60;
    let df = weekly_series(n)
        .with_column("promo", (0..n).map(|i| (i % 3) as f64).collect())
        .unwrap();
    let mut model = NeuralProphet::new(NeuralProphetConfig {
        epochs: Some(5),
        weekly_seasonality: SeasonalitySetting::Disabled,
        ..Default::default()
    })
    .unwrap()
    .add_regressor("promo", RegressorConfig::default())
    .unwrap();
    model.fit(&df, FitOptions::default()).unwrap();

    assert!(model
        .compose_prediction_df(&df, PredictionFrameOptions::new())
        .is_err());
    let future = model
        .compose_prediction_df(
            &df,
            PredictionFrameOptions::new()
                .with_future_periods(5)
                .with_regressor("promo", vec![1.0; 5]),
        )
        .unwrap();
    assert_eq!(future.len(), 5);

    let forecast = model.predict(&future).unwrap();
    assert!(forecast.has_column("regressor_promo"));
    assert!(forecast.yhat(1).unwrap().iter().all(|v| v.is_some()));
    assert_eq!(model.regressor_coefficients().unwrap().len(), 1);
}

#[test]
fn test_plot_parameters_after_fit() {
    let df = weekly_series(100);
    let mut model = NeuralProphet::new(quick_config(3, 1)).unwrap();
    model.fit(&df, FitOptions::default()).unwrap();

    let figures = model.plot_parameters().unwrap();
    let titles: Vec<&str> = figures.iter().map(|f| f.title.as_str()).collect();
    assert!(titles.contains(&"Trend"));
    assert!(titles.contains(&"Seasonality: weekly"));
    assert!(titles.contains(&"AR weights"));

    let weekly = figures
        .iter()
        .find(|f| f.title == "Seasonality: weekly")
        .unwrap();
    assert_eq!(weekly.series[0].x.len(), 7);
    assert_eq!(model.trend_rate_changes().unwrap().len(), 5);
}

/// `weekly_series` with the rows of 2020-01-10 through 2020-01-19 removed
fn series_with_hole(n: usize) -> TimeSeriesData {
    let full = weekly_series(n);
    let mut data = full.slice(0, Some(9)).unwrap();
    data.append(&full.slice(19, None).unwrap()).unwrap();
    data
}

#[test]
fn test_missing_dates_are_filled() {
    let df = series_with_hole(60);
    assert_eq!(df.len(), 50);
    let mut model = NeuralProphet::new(quick_config(3, 1)).unwrap();
    model.fit(&df, FitOptions::default()).unwrap();

    let future = model
        .compose_prediction_df(&df, PredictionFrameOptions::new().with_n_history(50))
        .unwrap();
    assert_eq!(future.len(), 51);

    let forecast = model.predict(&future).unwrap();
    assert_eq!(forecast.len(), 61);
    let hole = start() + Duration::days(11);
    let row = forecast.ds().iter().position(|d| *d == hole).unwrap();
    assert_eq!(row, 11);
    assert!(forecast.y()[row].is_some());
    assert!(forecast.yhat(1).unwrap()[row].is_some());
}

#[test]
fn test_missing_dates_reject_regressors() {
    let df = series_with_hole(60);
    let n = df.len();
    let df = df
        .with_column("promo", (0..n).map(|i| (i % 3) as f64).collect())
        .unwrap();
    let mut model = NeuralProphet::new(quick_config(0, 1))
        .unwrap()
        .add_regressor("promo", RegressorConfig::default())
        .unwrap();
    let err = model.fit(&df, FitOptions::default()).unwrap_err();
    assert!(matches!(err, ForecastError::DataError(_)));
}

#[test]
fn test_event_names_clash_with_country_holidays() {
    let model = NeuralProphet::new(NeuralProphetConfig::default())
        .unwrap()
        .add_country_holidays("US", EventConfig::default())
        .unwrap();
    assert!(model.validate_column_name("Thanksgiving").is_err());
    assert!(model.validate_column_name("Boxing Day").is_ok());
    assert!(model
        .add_events(&["Thanksgiving"], EventConfig::default())
        .is_err());

    let model = NeuralProphet::new(NeuralProphetConfig::default())
        .unwrap()
        .add_events(&["Christmas Day"], EventConfig::default())
        .unwrap();
    assert!(model
        .add_country_holidays("GB", EventConfig::default())
        .is_err());
}

#[rstest]
#[case(0, false)]
#[case(1, true)]
#[case(3, true)]
#[case(4, false)]
fn test_forecast_in_focus_bounds(#[case] step: usize, #[case] accepted: bool) {
    let mut model = NeuralProphet::new(quick_config(3, 3)).unwrap();
    assert_eq!(model.set_forecast_in_focus(step).is_ok(), accepted);
    let expected = if accepted { Some(step) } else { None };
    assert_eq!(model.forecast_in_focus(), expected);
}

#[test]
fn test_forecast_in_focus_selects_plotted_step() {
    let df = weekly_series(100);
    let mut model = NeuralProphet::new(quick_config(4, 3)).unwrap();
    model.fit(&df, FitOptions::default()).unwrap();
    let future = model
        .compose_prediction_df(&df, PredictionFrameOptions::new().with_n_history(20))
        .unwrap();
    let forecast = model.predict(&future).unwrap();

    assert!(model.plot(&forecast).unwrap().series("yhat1").is_some());
    model.set_forecast_in_focus(3).unwrap();
    let figure = model.plot(&forecast).unwrap();
    assert!(figure.series("yhat3").is_some());
    assert!(figure.series("yhat1").is_none());

    let components = model.plot_components(&forecast).unwrap();
    assert!(components.iter().any(|f| f.title == "ar3"));
    assert!(!components.iter().any(|f| f.title == "ar1"));

    let weights = model.ar_weights().unwrap().unwrap();
    let figures = model.plot_parameters().unwrap();
    let ar = figures.iter().find(|f| f.title == "AR weights").unwrap();
    let plotted: Vec<f64> = ar.series[0].y.iter().flatten().copied().collect();
    assert_eq!(plotted, weights[2]);
}
