//! Technical indicators over a closing-price series.
//!
//! All windows are trailing: the point at index `i` covers `i - period + 1 ..= i`,
//! so the output starts at index `period - 1`.

use serde::{Deserialize, Serialize};

/// One trading interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<u64>,
}

impl PricePoint {
    pub fn close(date: impl Into<String>, close: f64) -> Self {
        Self {
            date: date.into(),
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    MovingAverage,
    Bollinger,
    LinearRegression,
}

impl IndicatorKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "moving_average" | "ma" | "sma" => Some(Self::MovingAverage),
            "bollinger" | "bollinger_bands" => Some(Self::Bollinger),
            "linear_regression" | "regression" | "trend" => Some(Self::LinearRegression),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MovingAverage => "moving average",
            Self::Bollinger => "Bollinger Bands",
            Self::LinearRegression => "linear regression",
        }
    }
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why an indicator could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("not enough data for {0} calculation")]
    NotEnoughData(IndicatorKind),
    #[error("period must be at least 1")]
    ZeroPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragePoint {
    pub date: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    pub date: String,
    pub upper: f64,
    pub lower: f64,
    pub middle: f64,
}

/// Least-squares line over `(index, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

impl Regression {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Minimum points for a regression line.
pub const MIN_REGRESSION_POINTS: usize = 2;

fn check_window(
    series: &[PricePoint],
    period: usize,
    kind: IndicatorKind,
) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    if series.len() < period {
        return Err(IndicatorError::NotEnoughData(kind));
    }
    Ok(())
}

pub fn moving_average(
    series: &[PricePoint],
    period: usize,
) -> Result<Vec<AveragePoint>, IndicatorError> {
    check_window(series, period, IndicatorKind::MovingAverage)?;
    Ok(series
        .windows(period)
        .map(|window| AveragePoint {
            date: window[period - 1].date.clone(),
            average: mean(window),
        })
        .collect())
}

/// Bands at two population standard deviations around the window mean.
pub fn bollinger_bands(
    series: &[PricePoint],
    period: usize,
) -> Result<Vec<BandPoint>, IndicatorError> {
    check_window(series, period, IndicatorKind::Bollinger)?;
    Ok(series
        .windows(period)
        .map(|window| {
            let middle = mean(window);
            let variance = window
                .iter()
                .map(|p| (p.close - middle).powi(2))
                .sum::<f64>()
                / period as f64;
            let spread = 2.0 * variance.sqrt();
            BandPoint {
                date: window[period - 1].date.clone(),
                upper: middle + spread,
                lower: middle - spread,
                middle,
            }
        })
        .collect())
}

pub fn linear_regression(series: &[PricePoint]) -> Result<Regression, IndicatorError> {
    if series.len() < MIN_REGRESSION_POINTS {
        return Err(IndicatorError::NotEnoughData(
            IndicatorKind::LinearRegression,
        ));
    }
    let n = series.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(series);

    let (num, den) = series
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, p)| {
            let dx = i as f64 - mean_x;
            (num + dx * (p.close - mean_y), den + dx * dx)
        });
    let slope = num / den;
    Ok(Regression {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

fn mean(points: &[PricePoint]) -> f64 {
    points.iter().map(|p| p.close).sum::<f64>() / points.len() as f64
}
