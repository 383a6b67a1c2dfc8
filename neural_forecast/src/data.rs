//! Time series data handling for forecasting
//!
//! A [`TimeSeriesData`] holds the `ds` timestamps, the target `y` and any
//! number of aligned numeric columns (lagged covariates, future regressors,
//! event indicators). Polars is used to move data in and out of CSV files
//! and `DataFrame`s.

use crate::error::{ForecastError, Result};
use crate::utils::{format_datetime, parse_datetime, unix_epoch};
use chrono::{Duration, NaiveDateTime};
use forecast_math::rolling::rolling_mean;
use polars::prelude::*;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Name of the timestamp column
pub const DS_COLUMN: &str = "ds";
/// Name of the target column
pub const Y_COLUMN: &str = "y";

/// Time series data structure for forecasting
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesData {
    /// Timestamps, strictly increasing for model input
    ds: Vec<NaiveDateTime>,
    /// Target values; `None` for unknown (future) rows
    y: Vec<Option<f64>>,
    /// Additional numeric columns aligned with `ds`
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

/// Data loader for time series data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load time series data from a CSV file with `ds` and `y` columns
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeriesData> {
        let file = File::open(path.as_ref())?;
        let df = CsvReader::new(file)
            .infer_schema(Some(1000))
            .has_header(true)
            .finish()?;

        debug!(
            path = %path.as_ref().display(),
            rows = df.height(),
            "loaded csv"
        );
        Self::from_dataframe(df)
    }

    /// Create time series data from an existing DataFrame
    pub fn from_dataframe(df: DataFrame) -> Result<TimeSeriesData> {
        let time_column = Self::detect_time_column(&df)?;
        let ds = series_to_datetimes(df.column(&time_column)?)?;

        let y_series = df.column(Y_COLUMN).map_err(|_| {
            ForecastError::DataError(format!("Column '{}' not found in data", Y_COLUMN))
        })?;
        let y = series_to_f64(y_series)?;

        let mut data = TimeSeriesData::from_parts(ds, y)?;
        for series in df.get_columns() {
            let name = series.name();
            if name == time_column || name == Y_COLUMN {
                continue;
            }
            let dtype = series.dtype();
            if dtype.is_numeric() || matches!(dtype, DataType::Boolean) {
                data.set_column(name, series_to_f64(series)?)?;
            } else {
                debug!(column = name, dtype = %dtype, "skipping non-numeric column");
            }
        }

        Ok(data)
    }

    /// Detect the time column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        let column_names = df.get_column_names();

        if column_names.contains(&DS_COLUMN) {
            return Ok(DS_COLUMN.to_string());
        }

        // Fall back to common time column names
        for name in &column_names {
            let lower_name = name.to_lowercase();
            if lower_name.contains("time") || lower_name.contains("date") {
                return Ok(name.to_string());
            }
        }

        if let Some(first_col) = df.get_columns().first() {
            if first_col.dtype().is_temporal() {
                return Ok(first_col.name().to_string());
            }
        }

        Err(ForecastError::DataError(
            "No time column found in data".to_string(),
        ))
    }
}

fn series_to_datetimes(series: &Series) -> Result<Vec<NaiveDateTime>> {
    let name = series.name().to_string();
    let missing = || ForecastError::DataError(format!("Missing timestamp in column '{}'", name));

    match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|value| value.ok_or_else(missing).and_then(parse_datetime))
            .collect(),
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            let epoch = unix_epoch();
            days.i32()?
                .into_iter()
                .map(|value| {
                    let days = value.ok_or_else(missing)?;
                    epoch
                        .checked_add_signed(Duration::days(days as i64))
                        .ok_or_else(|| ForecastError::DataError("Date out of range".to_string()))
                })
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let per_second: i64 = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let epoch = unix_epoch();
            let raw = series.cast(&DataType::Int64)?;
            raw.i64()?
                .into_iter()
                .map(|value| {
                    let value = value.ok_or_else(missing)?;
                    let secs = value.div_euclid(per_second);
                    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
                    epoch
                        .checked_add_signed(Duration::seconds(secs) + Duration::nanoseconds(nanos))
                        .ok_or_else(|| {
                            ForecastError::DataError("Timestamp out of range".to_string())
                        })
                })
                .collect()
        }
        other => Err(ForecastError::DataError(format!(
            "Column '{}' of type {} cannot be used as timestamps",
            name, other
        ))),
    }
}

fn series_to_f64(series: &Series) -> Result<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    let values = casted.f64()?;
    Ok(values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

impl TimeSeriesData {
    /// Create a new TimeSeriesData from timestamps and fully observed values
    pub fn new(ds: Vec<NaiveDateTime>, y: Vec<f64>) -> Result<Self> {
        Self::from_parts(ds, y.into_iter().map(Some).collect())
    }

    /// Create a new TimeSeriesData where some target values may be unknown
    pub fn from_parts(ds: Vec<NaiveDateTime>, y: Vec<Option<f64>>) -> Result<Self> {
        if ds.len() != y.len() {
            return Err(ForecastError::DataError(format!(
                "ds length ({}) doesn't match y length ({})",
                ds.len(),
                y.len()
            )));
        }

        Ok(Self {
            ds,
            y: y.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect(),
            columns: BTreeMap::new(),
        })
    }

    /// Add a fully observed column, builder style
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        self.set_column(name, values.into_iter().map(Some).collect())?;
        Ok(self)
    }

    /// Insert or replace a column
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        if name == DS_COLUMN || name == Y_COLUMN {
            return Err(ForecastError::ValidationError(format!(
                "Column name '{}' is reserved",
                name
            )));
        }
        if values.len() != self.ds.len() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' has {} values, expected {}",
                name,
                values.len(),
                self.ds.len()
            )));
        }
        self.columns.insert(
            name.to_string(),
            values.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect(),
        );
        Ok(())
    }

    /// Replace the target values
    pub fn set_y(&mut self, y: Vec<Option<f64>>) -> Result<()> {
        if y.len() != self.ds.len() {
            return Err(ForecastError::DataError(format!(
                "y has {} values, expected {}",
                y.len(),
                self.ds.len()
            )));
        }
        self.y = y.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect();
        Ok(())
    }

    /// Get the timestamps
    pub fn ds(&self) -> &[NaiveDateTime] {
        &self.ds
    }

    /// Get the target values
    pub fn y(&self) -> &[Option<f64>] {
        &self.y
    }

    /// Observed target values, skipping unknown rows
    pub fn observed_y(&self) -> Vec<f64> {
        self.y.iter().flatten().copied().collect()
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// Check if a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Names of the additional columns, sorted
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.ds.len()
    }

    /// Get a slice of the data from start to end index
    pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Self> {
        let end = end.unwrap_or(self.len());
        if start > end || end > self.len() {
            return Err(ForecastError::DataError(format!(
                "Invalid slice {}..{} of a series with {} rows",
                start,
                end,
                self.len()
            )));
        }

        Ok(Self {
            ds: self.ds[start..end].to_vec(),
            y: self.y[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[start..end].to_vec()))
                .collect(),
        })
    }

    /// The last `n` rows (all rows if fewer)
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            ds: self.ds[start..].to_vec(),
            y: self.y[start..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[start..].to_vec()))
                .collect(),
        }
    }

    /// Append rows that follow this series in time.
    ///
    /// Columns missing on either side are filled with `None`.
    pub fn append(&mut self, other: &TimeSeriesData) -> Result<()> {
        if let (Some(last), Some(first)) = (self.ds.last(), other.ds.first()) {
            if first <= last {
                return Err(ForecastError::DataError(format!(
                    "Appended rows must start after {}, got {}",
                    last, first
                )));
            }
        }

        let own_len = self.len();
        for (name, values) in &other.columns {
            self.columns
                .entry(name.clone())
                .or_insert_with(|| vec![None; own_len])
                .extend(values.iter().copied());
        }
        for (name, values) in self.columns.iter_mut() {
            if !other.columns.contains_key(name) {
                values.extend(std::iter::repeat(None).take(other.len()));
            }
        }
        self.ds.extend(other.ds.iter().copied());
        self.y.extend(other.y.iter().copied());
        Ok(())
    }

    /// Verify that timestamps are strictly increasing
    pub fn check_monotonic(&self) -> Result<()> {
        for pair in self.ds.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ForecastError::DataError(format!(
                    "Timestamps must be strictly increasing and unique ({} followed by {})",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }

    /// Insert rows for timestamps absent from the regular grid.
    ///
    /// A gap that is a whole multiple of `frequency` gets one row per
    /// missing step, with `None` in `y` and in every column. Other gaps
    /// are left alone. Returns the filled series and the number of rows
    /// inserted.
    pub fn fill_missing_dates(&self, frequency: Duration) -> Result<(Self, usize)> {
        if frequency <= Duration::zero() {
            return Err(ForecastError::ValidationError(format!(
                "Frequency must be positive, got {}",
                frequency
            )));
        }
        let step = frequency.num_seconds();
        let mut filled = Self {
            ds: Vec::with_capacity(self.len()),
            y: Vec::with_capacity(self.len()),
            columns: self
                .columns
                .keys()
                .map(|name| (name.clone(), Vec::with_capacity(self.len())))
                .collect(),
        };
        let mut inserted = 0usize;

        for i in 0..self.len() {
            if i > 0 {
                let previous = self.ds[i - 1];
                let gap = (self.ds[i] - previous).num_seconds();
                if step > 0 && gap > step && gap % step == 0 {
                    for k in 1..gap / step {
                        filled.ds.push(previous + Duration::seconds(k * step));
                        filled.y.push(None);
                        for values in filled.columns.values_mut() {
                            values.push(None);
                        }
                        inserted += 1;
                    }
                }
            }
            filled.ds.push(self.ds[i]);
            filled.y.push(self.y[i]);
            for (name, values) in filled.columns.iter_mut() {
                values.push(self.columns[name][i]);
            }
        }

        Ok((filled, inserted))
    }

    /// Rolling mean of `y` or of a named column
    pub fn rolling_mean(
        &self,
        column: &str,
        window: usize,
        min_periods: usize,
    ) -> Result<Vec<Option<f64>>> {
        let values = if column == Y_COLUMN {
            &self.y
        } else {
            self.columns.get(column).ok_or_else(|| {
                ForecastError::DataError(format!("Column '{}' not found", column))
            })?
        };
        Ok(rolling_mean(values, window, min_periods)?)
    }

    /// Calculate the mean of the observed target values
    pub fn mean(&self) -> Result<f64> {
        let observed = self.observed_y();
        if observed.is_empty() {
            return Err(ForecastError::DataError(
                "No observed values available".to_string(),
            ));
        }
        Ok(Statistics::mean(observed.iter()))
    }

    /// Calculate the sample standard deviation of the observed target values
    pub fn std_dev(&self) -> Result<f64> {
        let observed = self.observed_y();
        if observed.len() < 2 {
            return Err(ForecastError::DataError(
                "At least two observed values are needed".to_string(),
            ));
        }
        Ok(Statistics::std_dev(observed.iter()))
    }

    /// Convert to a polars DataFrame with `ds` formatted as text
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let ds: Vec<String> = self.ds.iter().map(format_datetime).collect();
        let mut series = vec![
            Series::new(DS_COLUMN, ds),
            Series::new(Y_COLUMN, self.y.clone()),
        ];
        for (name, values) in &self.columns {
            series.push(Series::new(name.as_str(), values.clone()));
        }
        Ok(DataFrame::new(series)?)
    }

    /// Write the data to a CSV file
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDateTime> {
        let start = parse_datetime("2020-01-01").unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn test_fill_missing_dates() {
        let all = dates(6);
        let kept = vec![all[0], all[1], all[4], all[5]];
        let data = TimeSeriesData::new(kept, vec![1.0, 2.0, 5.0, 6.0])
            .unwrap()
            .with_column("A", vec![10.0, 20.0, 50.0, 60.0])
            .unwrap();

        let (filled, inserted) = data.fill_missing_dates(Duration::days(1)).unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(filled.ds(), all.as_slice());
        assert_eq!(filled.y()[2], None);
        assert_eq!(filled.y()[4], Some(5.0));
        assert_eq!(filled.column("A").unwrap()[3], None);

        let (same, inserted) = filled.fill_missing_dates(Duration::days(1)).unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(same, filled);
        assert!(data.fill_missing_dates(Duration::zero()).is_err());
    }

    #[test]
    fn test_slice_and_tail() {
        let data = TimeSeriesData::new(dates(5), vec![1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .with_column("A", vec![10.0, 20.0, 30.0, 40.0, 50.0])
            .unwrap();

        let sliced = data.slice(1, Some(3)).unwrap();
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced.column("A").unwrap(), &[Some(20.0), Some(30.0)]);

        let tail = data.tail(2);
        assert_eq!(tail.y(), &[Some(4.0), Some(5.0)]);
        assert_eq!(data.tail(10).len(), 5);
        assert!(data.slice(4, Some(2)).is_err());
    }

    #[test]
    fn test_append_fills_missing_columns() {
        let all = dates(4);
        let mut head = TimeSeriesData::new(all[..2].to_vec(), vec![1.0, 2.0])
            .unwrap()
            .with_column("A", vec![1.0, 1.0])
            .unwrap();
        let tail = TimeSeriesData::from_parts(all[2..].to_vec(), vec![None, None]).unwrap();

        head.append(&tail).unwrap();
        assert_eq!(head.len(), 4);
        assert_eq!(head.column("A").unwrap()[3], None);
        assert!(head.append(&tail).is_err());
    }

    #[test]
    fn test_nan_is_missing() {
        let data = TimeSeriesData::from_parts(dates(2), vec![Some(f64::NAN), Some(1.0)]).unwrap();
        assert_eq!(data.y()[0], None);
        assert_eq!(data.observed_y(), vec![1.0]);
    }

    #[test]
    fn test_reserved_column_names() {
        let mut data = TimeSeriesData::new(dates(1), vec![1.0]).unwrap();
        assert!(data.set_column("y", vec![Some(1.0)]).is_err());
        assert!(data.set_column("A", vec![]).is_err());
    }

    #[test]
    fn test_dataframe_roundtrip() {
        let data = TimeSeriesData::new(dates(3), vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_column("B", vec![0.5, 0.25, 0.125])
            .unwrap();

        let df = data.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);

        let back = DataLoader::from_dataframe(df).unwrap();
        assert_eq!(back, data);
    }
}
