//! Attribution of observed sales into baseline, controls and channel contributions.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::validate_aligned;
use crate::design::{build_design, ControlSet};
use crate::ridge::{compute_metrics, fit_ridge};
use crate::saturation::SaturatedResponse;
use crate::types::{DecompositionOptions, MmmError};

/// One regressor's coefficient and its per-period contribution `coefficient * x[t]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSeries {
    pub name: String,
    pub coefficient: f64,
    pub values: Vec<f64>,
}

impl ComponentSeries {
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Per-period attribution of sales.
///
/// Invariant: for every period `t`,
/// `baseline + Σ controls[t] + Σ channels[t] + residuals[t] == observed[t]`
/// up to floating-point rounding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResult {
    /// Intercept, attributed to every period.
    pub baseline: f64,
    pub channels: Vec<ComponentSeries>,
    pub controls: Vec<ComponentSeries>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub observed: Vec<f64>,
    pub rmse: f64,
    pub r2: f64,
    /// Channels whose negative coefficient was clipped to zero.
    pub clipped_channels: Vec<String>,
}

impl DecompositionResult {
    pub fn n_periods(&self) -> usize {
        self.observed.len()
    }

    pub fn channel_coefficients(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.coefficient).collect()
    }

    /// Contribution of `channel` summed over the window.
    pub fn channel_total(&self, channel: &str) -> Option<f64> {
        self.channels
            .iter()
            .find(|c| c.name == channel)
            .map(ComponentSeries::total)
    }

    /// `baseline + controls + channels + residual` at period `t`.
    pub fn period_total(&self, t: usize) -> f64 {
        self.baseline
            + self.controls.iter().map(|c| c.values[t]).sum::<f64>()
            + self.channels.iter().map(|c| c.values[t]).sum::<f64>()
            + self.residuals[t]
    }

    /// Largest absolute gap between the reassembled components and observed sales.
    pub fn max_reconstruction_error(&self) -> f64 {
        (0..self.n_periods())
            .map(|t| (self.period_total(t) - self.observed[t]).abs())
            .fold(0.0, f64::max)
    }

    /// See [`create_waterfall_data`].
    pub fn waterfall(&self) -> Vec<WaterfallStep> {
        create_waterfall_data(self)
    }
}

/// Decompose sales into baseline, control and channel contributions with default
/// ridge options.
///
/// # Arguments
/// * `saturated_channels` - One saturated response series per channel.
/// * `sales` - Observed sales, aligned with every response series.
/// * `controls` - Trend, seasonality and custom control columns.
///
/// # Returns
/// The [`DecompositionResult`]; see [`decompose_sales_with`] for the errors.
pub fn decompose_sales(
    saturated_channels: &[SaturatedResponse],
    sales: &[f64],
    controls: &ControlSet,
) -> Result<DecompositionResult, MmmError> {
    decompose_sales_with(
        saturated_channels,
        sales,
        controls,
        &DecompositionOptions::default(),
    )
}

/// Ridge regression of sales on saturated channel responses, controls and an intercept.
///
/// Negative channel coefficients are clipped to zero with a warning; the clipped
/// channels leave the active set and the rest are re-estimated until every channel
/// coefficient is non-negative. Control coefficients are unconstrained.
///
/// # Errors
/// `EmptyInput` without channels or periods, `DimensionMismatch` for misaligned
/// series, `Linalg` if the least-squares solve fails.
pub fn decompose_sales_with(
    saturated_channels: &[SaturatedResponse],
    sales: &[f64],
    controls: &ControlSet,
    opts: &DecompositionOptions,
) -> Result<DecompositionResult, MmmError> {
    if saturated_channels.is_empty() {
        return Err(MmmError::EmptyInput);
    }
    let series: Vec<Vec<f64>> = saturated_channels.iter().map(|c| c.values.clone()).collect();
    let n = validate_aligned(&series, Some(sales))?;
    if controls.periods() != n {
        return Err(MmmError::DimensionMismatch {
            expected: n,
            found: controls.periods(),
        });
    }
    if sales.iter().any(|v| !v.is_finite()) {
        return Err(MmmError::InvalidParameter(
            "sales must be finite".to_string(),
        ));
    }

    let x = build_design(saturated_channels, controls)?;
    let y = Array1::from(sales.to_vec());
    let k = saturated_channels.len();
    let mut active = vec![true; x.ncols()];
    let mut clipped_channels = Vec::new();

    let fit = loop {
        let fit = fit_ridge(&x, &y, opts.ridge_lambda, opts.standardize, &active)?;
        let negative: Vec<usize> = (0..k)
            .filter(|&j| active[j] && fit.coefficients[j] < 0.0)
            .collect();
        if negative.is_empty() {
            break fit;
        }
        for j in negative {
            let name = &saturated_channels[j].channel;
            warn!(
                channel = %name,
                coefficient = fit.coefficients[j],
                "negative channel coefficient clipped to zero"
            );
            active[j] = false;
            clipped_channels.push(name.clone());
        }
        debug!(active = active.iter().filter(|a| **a).count(), "refitting ridge");
    };

    let component = |name: &str, coefficient: f64, col: usize| ComponentSeries {
        name: name.to_string(),
        coefficient,
        values: x.column(col).iter().map(|v| coefficient * v).collect(),
    };
    let channels: Vec<ComponentSeries> = saturated_channels
        .iter()
        .enumerate()
        .map(|(j, c)| component(&c.channel, fit.coefficients[j], j))
        .collect();
    let control_parts: Vec<ComponentSeries> = controls
        .names()
        .iter()
        .enumerate()
        .map(|(i, name)| component(name, fit.coefficients[k + i], k + i))
        .collect();

    let fitted: Vec<f64> = (0..n)
        .map(|t| {
            fit.intercept
                + channels.iter().map(|c| c.values[t]).sum::<f64>()
                + control_parts.iter().map(|c| c.values[t]).sum::<f64>()
        })
        .collect();
    let residuals: Vec<f64> = sales.iter().zip(fitted.iter()).map(|(s, f)| s - f).collect();
    let (rmse, r2) = compute_metrics(&y, &Array1::from(fitted.clone()));

    Ok(DecompositionResult {
        baseline: fit.intercept,
        channels,
        controls: control_parts,
        fitted,
        residuals,
        observed: sales.to_vec(),
        rmse,
        r2,
        clipped_channels,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Baseline,
    Control,
    Channel,
    Residual,
    Total,
}

/// One bar of a sales waterfall, with the running total after it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub label: String,
    pub kind: StepKind,
    pub value: f64,
    pub cumulative: f64,
}

/// Window-total waterfall: baseline, each control, each channel, unexplained, total.
///
/// The unexplained step is the observed total minus the running sum of the steps
/// before it, so the final running total equals the observed total exactly.
pub fn create_waterfall_data(result: &DecompositionResult) -> Vec<WaterfallStep> {
    let observed_total: f64 = result.observed.iter().sum();
    let mut steps = Vec::with_capacity(result.controls.len() + result.channels.len() + 3);
    let mut running = 0.0;
    let mut push = |steps: &mut Vec<WaterfallStep>, label: &str, kind: StepKind, value: f64| {
        running += value;
        steps.push(WaterfallStep {
            label: label.to_string(),
            kind,
            value,
            cumulative: running,
        });
    };

    push(
        &mut steps,
        "Baseline",
        StepKind::Baseline,
        result.baseline * result.n_periods() as f64,
    );
    for c in &result.controls {
        push(&mut steps, &c.name, StepKind::Control, c.total());
    }
    for c in &result.channels {
        push(&mut steps, &c.name, StepKind::Channel, c.total());
    }
    let explained = steps.last().map(|s| s.cumulative).unwrap_or(0.0);
    steps.push(WaterfallStep {
        label: "Unexplained".to_string(),
        kind: StepKind::Residual,
        value: observed_total - explained,
        cumulative: observed_total,
    });
    steps.push(WaterfallStep {
        label: "Total".to_string(),
        kind: StepKind::Total,
        value: observed_total,
        cumulative: observed_total,
    });
    steps
}
