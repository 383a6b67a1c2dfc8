//! Renderer-independent plot data
//!
//! Figures are plain serializable values. Write them as JSON and feed them
//! to any plotting frontend.

use crate::data::TimeSeriesData;
use crate::error::Result;
use crate::forecast::Forecast;
use crate::utils::format_datetime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// How a series is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStyle {
    Line,
    Scatter,
    Bar,
}

/// One named series of a figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub name: String,
    pub style: SeriesStyle,
    pub x: Vec<String>,
    pub y: Vec<Option<f64>>,
}

/// A single chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<PlotSeries>,
}

impl Figure {
    pub fn new(title: &str, x_label: &str, y_label: &str) -> Self {
        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            series: Vec::new(),
        }
    }

    pub fn with_series(
        mut self,
        name: &str,
        style: SeriesStyle,
        x: Vec<String>,
        y: Vec<Option<f64>>,
    ) -> Self {
        self.series.push(PlotSeries {
            name: name.to_string(),
            style,
            x,
            y,
        });
        self
    }

    pub fn series(&self, name: &str) -> Option<&PlotSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

fn x_axis(data: &TimeSeriesData) -> Vec<String> {
    data.ds().iter().map(format_datetime).collect()
}

/// Actual values against the predictions of one forecast step
pub fn forecast_figure(forecast: &Forecast, step: usize) -> Result<Figure> {
    let x = x_axis(forecast.data());
    let yhat = forecast.yhat(step)?.to_vec();
    Ok(Figure::new("Forecast", "ds", "y")
        .with_series("y", SeriesStyle::Scatter, x.clone(), forecast.y().to_vec())
        .with_series(&format!("yhat{}", step), SeriesStyle::Line, x, yhat))
}

/// One figure per component column; step-indexed components use `step`
pub fn component_figures(forecast: &Forecast, step: usize) -> Vec<Figure> {
    let x = x_axis(forecast.data());
    let ar_name = format!("ar{}", step);
    let covar_suffix = format!("_{}", step);

    forecast
        .component_names()
        .into_iter()
        .filter(|name| {
            if name.starts_with("covar_") {
                name.ends_with(&covar_suffix)
            } else if name.starts_with("ar") {
                *name == ar_name
            } else {
                true
            }
        })
        .filter_map(|name| {
            let values = forecast.column(&name).ok()?.to_vec();
            Some(
                Figure::new(&name, "ds", &name).with_series(
                    &name,
                    SeriesStyle::Line,
                    x.clone(),
                    values,
                ),
            )
        })
        .collect()
}

/// Actual values plus one line per forecast origin
pub fn last_forecast_figure(last: &TimeSeriesData) -> Figure {
    let x = x_axis(last);
    let mut figure = Figure::new("Last forecast", "ds", "y").with_series(
        "y",
        SeriesStyle::Scatter,
        x.clone(),
        last.y().to_vec(),
    );
    for name in last.column_names() {
        if let Some(values) = last.column(name) {
            figure = figure.with_series(name, SeriesStyle::Line, x.clone(), values.to_vec());
        }
    }
    figure
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_figure_json() {
        let figure = Figure::new("Trend", "ds", "trend").with_series(
            "trend",
            SeriesStyle::Line,
            vec!["2020-01-01".to_string()],
            vec![Some(1.5)],
        );
        let json = figure.to_json().unwrap();
        assert!(json.contains("\"style\": \"line\""));
        let back: Figure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, figure);
        assert!(back.series("trend").is_some());
    }
}
