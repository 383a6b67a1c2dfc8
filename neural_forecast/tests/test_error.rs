use neural_forecast::error::ForecastError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let forecast_error = ForecastError::from(io_error);

    match forecast_error {
        ForecastError::IoError(_) => {}
        _ => panic!("Expected IoError variant"),
    }

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    match ForecastError::from(json_error) {
        ForecastError::SerdeError(_) => {}
        other => panic!("Expected SerdeError variant, got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let error = ForecastError::InvalidParameter("n_lags must be > 0".to_string());
    assert_eq!(error.to_string(), "Invalid parameter: n_lags must be > 0");

    let error = ForecastError::DataError("Dataframe is empty".to_string());
    assert_eq!(error.to_string(), "Data error: Dataframe is empty");

    assert_eq!(
        ForecastError::NotFitted.to_string(),
        "Model has not been fitted yet"
    );
}
