use chrono::{Duration, NaiveDate, NaiveDateTime};
use neural_forecast::data::{DataLoader, TimeSeriesData};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn day(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(offset)
}

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "ds,y,temperature").unwrap();
    writeln!(file, "2023-01-01,100.0,3.5").unwrap();
    writeln!(file, "2023-01-02,103.0,4.0").unwrap();
    writeln!(file, "2023-01-03,,2.5").unwrap();

    let data = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(data.len(), 3);
    assert_eq!(data.ds()[2], day(2));
    assert_eq!(data.y(), &[Some(100.0), Some(103.0), None]);
    assert_eq!(
        data.column("temperature").unwrap(),
        &[Some(3.5), Some(4.0), Some(2.5)]
    );
}

#[test]
fn test_data_loader_error_handling() {
    assert!(DataLoader::from_csv("nonexistent_file.csv").is_err());

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "ds,value").unwrap();
    writeln!(file, "2023-01-01,1.0").unwrap();
    assert!(DataLoader::from_csv(file.path()).is_err());
}

#[test]
fn test_time_series_data_operations() {
    let data = TimeSeriesData::new((0..3).map(day).collect(), vec![100.0, 103.0, 106.0]).unwrap();

    assert_eq!(data.len(), 3);
    assert!(!data.is_empty());

    let subset = data.slice(1, Some(3)).unwrap();
    assert_eq!(subset.len(), 2);
    assert_eq!(subset.ds()[0], day(1));

    let mean = data.mean().unwrap();
    assert!(mean > 102.0 && mean < 104.0);
    let std_dev = data.std_dev().unwrap();
    assert!(std_dev > 2.0 && std_dev < 4.0);
}

#[test]
fn test_append_and_write_csv() {
    let mut data = TimeSeriesData::new((0..3).map(day).collect(), vec![1.0, 2.0, 3.0])
        .unwrap()
        .with_column("x", vec![0.1, 0.2, 0.3])
        .unwrap();
    let future = TimeSeriesData::from_parts(vec![day(3), day(4)], vec![None, None]).unwrap();
    data.append(&future).unwrap();

    assert_eq!(data.len(), 5);
    assert_eq!(data.column("x").unwrap()[4], None);
    assert!(data.append(&future).is_err());

    let file = NamedTempFile::new().unwrap();
    data.write_csv(file.path()).unwrap();
    let back = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(back.len(), 5);
    assert_eq!(back.ds(), data.ds());
    assert_eq!(back.y()[..3], data.y()[..3]);
}

#[test]
fn test_unsorted_timestamps_are_rejected() {
    let data = TimeSeriesData::new(vec![day(1), day(0)], vec![1.0, 2.0]).unwrap();
    assert!(data.check_monotonic().is_err());
}
