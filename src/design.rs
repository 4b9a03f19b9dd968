use std::f64::consts::PI;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::saturation::SaturatedResponse;
use crate::types::{ControlSpec, MmmError};

/// Named control regressors (trend, seasonality, user series) over one window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlSet {
    len: usize,
    names: Vec<String>,
    series: Vec<Vec<f64>>,
}

impl ControlSet {
    /// An empty set for a window of `len` periods.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            names: Vec::new(),
            series: Vec::new(),
        }
    }

    pub fn from_spec(spec: &ControlSpec, len: usize) -> Result<Self, MmmError> {
        let mut controls = Self::new(len);
        if spec.trend {
            controls = controls.with_trend();
        }
        if let Some(period) = spec.seasonal_period {
            controls = controls.with_seasonality(period)?;
        }
        Ok(controls)
    }

    /// Linear time index `0, 1, ..., len - 1`.
    pub fn with_trend(mut self) -> Self {
        self.names.push("trend".to_string());
        self.series.push((0..self.len).map(|t| t as f64).collect());
        self
    }

    /// Fourier pair `sin(2πt/period)`, `cos(2πt/period)`.
    pub fn with_seasonality(mut self, period: usize) -> Result<Self, MmmError> {
        if period < 2 {
            return Err(MmmError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {period}"
            )));
        }
        let angle = |t: usize| 2.0 * PI * t as f64 / period as f64;
        self.names.push("season_sin".to_string());
        self.series.push((0..self.len).map(|t| angle(t).sin()).collect());
        self.names.push("season_cos".to_string());
        self.series.push((0..self.len).map(|t| angle(t).cos()).collect());
        Ok(self)
    }

    pub fn with_series(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self, MmmError> {
        if values.len() != self.len {
            return Err(MmmError::DimensionMismatch {
                expected: self.len,
                found: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MmmError::InvalidParameter(
                "control series must be finite".to_string(),
            ));
        }
        self.names.push(name.into());
        self.series.push(values);
        Ok(self)
    }

    /// Number of periods each control spans.
    pub fn periods(&self) -> usize {
        self.len
    }

    /// Number of control columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn series(&self) -> &[Vec<f64>] {
        &self.series
    }
}

/// Build the attribution design matrix.
///
/// Columns are the saturated channel responses in order, followed by the controls.
/// Rows are periods.
///
/// # Errors
/// `EmptyInput` without channels, `DimensionMismatch` if any series differs from the
/// control set's period count.
pub(crate) fn build_design(
    channels: &[SaturatedResponse],
    controls: &ControlSet,
) -> Result<Array2<f64>, MmmError> {
    if channels.is_empty() {
        return Err(MmmError::EmptyInput);
    }
    let rows = controls.periods();
    for ch in channels {
        if ch.values.len() != rows {
            return Err(MmmError::DimensionMismatch {
                expected: rows,
                found: ch.values.len(),
            });
        }
    }

    let columns = channels
        .iter()
        .map(|c| &c.values)
        .chain(controls.series().iter());
    let mut x = Array2::<f64>::zeros((rows, channels.len() + controls.len()));
    for (col, values) in columns.enumerate() {
        for (r, &v) in values.iter().enumerate() {
            x[[r, col]] = v;
        }
    }
    Ok(x)
}
