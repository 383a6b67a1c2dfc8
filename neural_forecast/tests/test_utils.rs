use chrono::{Duration, NaiveDate};
use neural_forecast::utils::{
    days_since_epoch, format_datetime, future_timestamps, infer_frequency, parse_datetime,
};
use rstest::rstest;

#[rstest]
#[case("2016-01-17", "2016-01-17")]
#[case("2016-01-17 13:45:00", "2016-01-17 13:45:00")]
#[case("2016-01-17T13:45:00", "2016-01-17 13:45:00")]
#[case("2016/01/17", "2016-01-17")]
fn test_parse_and_format(#[case] input: &str, #[case] expected: &str) {
    let parsed = parse_datetime(input).unwrap();
    assert_eq!(format_datetime(&parsed), expected);
}

#[test]
fn test_parse_invalid() {
    assert!(parse_datetime("17.01.2016").is_err());
    assert!(parse_datetime("").is_err());
}

#[test]
fn test_infer_frequency_uses_most_common_step() {
    let start = parse_datetime("2020-01-01").unwrap();
    let mut ds: Vec<_> = (0..10).map(|i| start + Duration::days(i)).collect();
    // one missing day does not change the frequency
    ds.remove(4);
    assert_eq!(infer_frequency(&ds).unwrap(), Duration::days(1));

    let hourly: Vec<_> = (0..48).map(|i| start + Duration::hours(i)).collect();
    assert_eq!(infer_frequency(&hourly).unwrap(), Duration::hours(1));

    assert!(infer_frequency(&ds[..1]).is_err());
}

#[test]
fn test_future_timestamps() {
    let last = parse_datetime("2020-12-30").unwrap();
    let future = future_timestamps(last, 3, Duration::days(1)).unwrap();
    assert_eq!(
        future.iter().map(format_datetime).collect::<Vec<_>>(),
        vec!["2020-12-31", "2021-01-01", "2021-01-02"]
    );
    assert!(future_timestamps(last, 3, Duration::zero()).is_err());
}

#[test]
fn test_days_since_epoch() {
    let dt = NaiveDate::from_ymd_opt(1970, 1, 2)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    assert!((days_since_epoch(&dt) - 1.5).abs() < 1e-12);
}
