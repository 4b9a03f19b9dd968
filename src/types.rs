use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::adstock::{adstock, steady_state_multiplier, validate_decay, AdstockedSeries};
use crate::defaults::{
    DEFAULT_ALPHA_BOUNDS, DEFAULT_DECAY_RATE, DEFAULT_FIT_ATTEMPTS, DEFAULT_GAMMA_LOWER_FACTOR,
    DEFAULT_GAMMA_UPPER_FACTOR, DEFAULT_NM_FTOL, DEFAULT_NM_MAX_ITER, DEFAULT_NM_STEP,
    DEFAULT_OPT_MAX_ITER, DEFAULT_OPT_TOL, DEFAULT_PARETO_STEPS,
    DEFAULT_RIDGE_LAMBDA, DEFAULT_SEASONAL_PERIOD, DEFAULT_SEED, DEFAULT_STANDARDIZE,
};
use crate::saturation::{HillCurve, SaturatedResponse};

/// Library error type.
#[derive(thiserror::Error, Debug)]
pub enum MmmError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("saturation curve fit diverged after {attempts} attempts")]
    FitDivergence { attempts: usize },
    #[error("infeasible budget: {budget} is below the sum of minimum spend bounds {min_total}")]
    InfeasibleBudget { budget: f64, min_total: f64 },
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("empty input")]
    EmptyInput,
    #[error("linear algebra failure: {0}")]
    Linalg(String),
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("curve fitting worker panicked for channel {0}")]
    WorkerPanicked(String),
    #[error("solver failure: {0}")]
    Solver(String),
}

/// Per-period spend bounds for one channel.
///
/// Invariant: `0 <= min <= max`. `max` may be `f64::INFINITY`, in which case the
/// optimizer caps the channel at the total budget. An unbounded `max` is written as
/// `null` in JSON.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpendBounds", into = "RawSpendBounds")]
pub struct SpendBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Serialize, Deserialize)]
struct RawSpendBounds {
    min: f64,
    #[serde(default)]
    max: Option<f64>,
}

impl TryFrom<RawSpendBounds> for SpendBounds {
    type Error = MmmError;

    fn try_from(raw: RawSpendBounds) -> Result<Self, Self::Error> {
        Self::new(raw.min, raw.max.unwrap_or(f64::INFINITY))
    }
}

impl From<SpendBounds> for RawSpendBounds {
    fn from(bounds: SpendBounds) -> Self {
        Self {
            min: bounds.min,
            max: bounds.max.is_finite().then_some(bounds.max),
        }
    }
}

impl Default for SpendBounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
        }
    }
}

impl SpendBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, MmmError> {
        if !min.is_finite() || min < 0.0 {
            return Err(MmmError::InvalidParameter(format!(
                "minimum spend must be finite and non-negative, got {min}"
            )));
        }
        if max.is_nan() || max < min {
            return Err(MmmError::InvalidParameter(format!(
                "maximum spend {max} must be at least the minimum {min}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, spend: f64, tol: f64) -> bool {
        spend >= self.min - tol && spend <= self.max + tol
    }

    /// Re-check the invariant on bounds that may have been assigned field by field.
    pub(crate) fn validate(&self) -> Result<(), MmmError> {
        Self::new(self.min, self.max).map(|_| ())
    }
}

/// Limits on a channel's share of the total budget, as fractions in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawShareBounds")]
pub struct ShareBounds {
    pub min_pct: f64,
    pub max_pct: f64,
}

#[derive(Deserialize)]
struct RawShareBounds {
    min_pct: f64,
    max_pct: f64,
}

impl TryFrom<RawShareBounds> for ShareBounds {
    type Error = MmmError;

    fn try_from(raw: RawShareBounds) -> Result<Self, Self::Error> {
        Self::new(raw.min_pct, raw.max_pct)
    }
}

impl Default for ShareBounds {
    fn default() -> Self {
        Self {
            min_pct: 0.0,
            max_pct: 1.0,
        }
    }
}

impl ShareBounds {
    pub fn new(min_pct: f64, max_pct: f64) -> Result<Self, MmmError> {
        if !(0.0..=1.0).contains(&min_pct) || !(min_pct..=1.0).contains(&max_pct) {
            return Err(MmmError::InvalidParameter(format!(
                "budget shares must satisfy 0 <= min <= max <= 1, got ({min_pct}, {max_pct})"
            )));
        }
        Ok(Self { min_pct, max_pct })
    }

    pub(crate) fn validate(&self) -> Result<(), MmmError> {
        Self::new(self.min_pct, self.max_pct).map(|_| ())
    }
}

/// A media channel with fitted response parameters.
///
/// The scalar response to a constant per-period spend `s` is
/// `beta * saturate(s * carryover)`, where `carryover` is the steady-state adstock
/// multiplier for the channel's decay rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: usize,
    pub name: String,
    /// Raw spend series, time ordered. Empty for channels built only for allocation.
    pub spend: Vec<f64>,
    pub decay_rate: f64,
    pub normalize_adstock: bool,
    pub saturation: HillCurve,
    pub beta: f64,
    pub bounds: SpendBounds,
    #[serde(default)]
    pub share: ShareBounds,
}

impl Channel {
    pub fn new(
        id: usize,
        name: impl Into<String>,
        decay_rate: f64,
        saturation: HillCurve,
        beta: f64,
    ) -> Result<Self, MmmError> {
        validate_decay(decay_rate)?;
        if !beta.is_finite() || beta < 0.0 {
            return Err(MmmError::InvalidParameter(format!(
                "channel coefficient must be finite and non-negative, got {beta}"
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            spend: Vec::new(),
            decay_rate,
            normalize_adstock: false,
            saturation,
            beta,
            bounds: SpendBounds::default(),
            share: ShareBounds::default(),
        })
    }

    pub fn with_spend(mut self, spend: Vec<f64>) -> Self {
        self.spend = spend;
        self
    }

    pub fn with_bounds(mut self, bounds: SpendBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Constrain the channel to a share of whatever budget it is optimized under.
    pub fn with_share_bounds(mut self, share: ShareBounds) -> Self {
        self.share = share;
        self
    }

    pub fn with_normalized_adstock(mut self, normalize: bool) -> Self {
        self.normalize_adstock = normalize;
        self
    }

    /// Steady-state adstock multiplier of a constant per-period spend.
    pub fn carryover(&self) -> f64 {
        steady_state_multiplier(self.decay_rate, self.normalize_adstock)
    }

    pub fn response(&self, spend: f64) -> f64 {
        self.beta * self.saturation.apply(spend * self.carryover())
    }

    /// Analytic derivative of [`Channel::response`] with respect to spend.
    pub fn marginal_response(&self, spend: f64) -> f64 {
        let c = self.carryover();
        self.beta * c * self.saturation.derivative(spend * c)
    }

    /// Per-period spend at which the steady-state response reaches half saturation.
    pub fn half_saturation_spend(&self) -> f64 {
        self.saturation.gamma() / self.carryover()
    }

    pub fn adstocked(&self) -> Result<AdstockedSeries, MmmError> {
        Ok(AdstockedSeries {
            channel: self.name.clone(),
            values: adstock(&self.spend, self.decay_rate, self.normalize_adstock)?,
        })
    }

    pub fn saturated(&self) -> Result<SaturatedResponse, MmmError> {
        let adstocked = self.adstocked()?;
        Ok(SaturatedResponse {
            channel: self.name.clone(),
            values: self.saturation.apply_series(&adstocked.values),
        })
    }
}

/// Budget per channel, in the order of `channels`.
///
/// Invariant: `channels.len() == spend.len()`; every entry is finite and non-negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub channels: Vec<String>,
    pub spend: Vec<f64>,
}

/// A what-if change applied to one channel of an [`AllocationPlan`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Adjustment {
    /// Relative change: `-0.5` halves the spend, `1.0` doubles it.
    Scale(f64),
    /// Absolute change in spend.
    Shift(f64),
    /// Replace the spend outright.
    Set(f64),
}

impl AllocationPlan {
    pub fn new(channels: Vec<String>, spend: Vec<f64>) -> Result<Self, MmmError> {
        if channels.len() != spend.len() {
            return Err(MmmError::DimensionMismatch {
                expected: channels.len(),
                found: spend.len(),
            });
        }
        for (name, &s) in channels.iter().zip(spend.iter()) {
            if !s.is_finite() || s < 0.0 {
                return Err(MmmError::InvalidParameter(format!(
                    "spend for {name} must be finite and non-negative, got {s}"
                )));
            }
        }
        Ok(Self { channels, spend })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, MmmError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (channels, spend): (Vec<String>, Vec<f64>) =
            pairs.into_iter().map(|(c, s)| (c.into(), s)).unzip();
        Self::new(channels, spend)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.spend.iter().sum()
    }

    pub fn spend_for(&self, channel: &str) -> Option<f64> {
        self.channels
            .iter()
            .position(|c| c == channel)
            .map(|idx| self.spend[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.channels
            .iter()
            .map(String::as_str)
            .zip(self.spend.iter().copied())
    }

    /// Fraction of the plan's total going to each channel (zeros for an empty plan).
    pub fn shares(&self) -> Vec<f64> {
        let total = self.total();
        if total <= 0.0 {
            return vec![0.0; self.len()];
        }
        self.spend.iter().map(|&s| s / total).collect()
    }

    /// Apply what-if adjustments, clamping each adjusted spend at zero.
    pub fn adjusted(&self, changes: &[(&str, Adjustment)]) -> Result<Self, MmmError> {
        let mut spend = self.spend.clone();
        for &(channel, change) in changes {
            let idx = self
                .channels
                .iter()
                .position(|c| c == channel)
                .ok_or_else(|| MmmError::UnknownChannel(channel.to_string()))?;
            let updated = match change {
                Adjustment::Scale(pct) => spend[idx] * (1.0 + pct),
                Adjustment::Shift(amount) => spend[idx] + amount,
                Adjustment::Set(amount) => amount,
            };
            spend[idx] = updated.max(0.0);
        }
        Self::new(self.channels.clone(), spend)
    }

    /// Spend per channel in the order of `channels`, matched by name.
    ///
    /// Channels absent from the plan get zero spend; plan entries naming an unknown
    /// channel are rejected.
    pub(crate) fn aligned_to(&self, channels: &[Channel]) -> Result<Vec<f64>, MmmError> {
        for name in &self.channels {
            if !channels.iter().any(|c| &c.name == name) {
                return Err(MmmError::UnknownChannel(name.clone()));
            }
        }
        Ok(channels
            .iter()
            .map(|c| self.spend_for(&c.name).unwrap_or(0.0))
            .collect())
    }
}

/// Allocation objectives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Total predicted media revenue.
    #[default]
    Revenue,
    /// Predicted revenue per unit of spend.
    Roi,
    /// Predicted revenue minus spend.
    Profit,
}

impl Objective {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Revenue => "maximize_revenue",
            Self::Roi => "maximize_roi",
            Self::Profit => "maximize_profit",
        }
    }

    /// Whether the objective is concave whenever every response curve is concave.
    pub(crate) fn preserves_concavity(&self) -> bool {
        matches!(self, Self::Revenue | Self::Profit)
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Objective {
    type Err = MmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maximize_revenue" | "revenue" | "sales" => Ok(Self::Revenue),
            "maximize_roi" | "roi" | "efficiency" => Ok(Self::Roi),
            "maximize_profit" | "profit" => Ok(Self::Profit),
            other => Err(MmmError::InvalidParameter(format!(
                "unknown objective '{other}'"
            ))),
        }
    }
}

/// Outcome of an iterative optimizer run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// Tolerance met on a concave problem: the optimum is global.
    Converged,
    /// Tolerance met, but a non-concave curve or objective means the optimum may be local.
    LocalOptimum,
    /// The iteration cap was hit before the tolerance was met.
    Nonconverged { iterations: usize },
}

impl ConvergenceStatus {
    pub fn is_converged(&self) -> bool {
        !matches!(self, Self::Nonconverged { .. })
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Result of a single-objective allocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub objective: Objective,
    pub plan: AllocationPlan,
    /// Value of `objective` at the returned plan.
    pub predicted_outcome: f64,
    /// Total predicted media revenue at the returned plan.
    pub predicted_revenue: f64,
    /// Predicted revenue per channel, in plan order.
    pub contributions: Vec<f64>,
    pub status: ConvergenceStatus,
    pub iterations: usize,
}

/// Options for nonlinear least-squares saturation fitting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FitOptions {
    /// Attempts before giving up; values below 3 are raised to 3.
    pub max_attempts: usize,
    pub seed: u64,
    pub max_iter: usize,
    /// Standard deviation of the simplex's normalized squared errors at which a
    /// search counts as converged.
    pub ftol: f64,
    /// Initial simplex step in log-parameter space.
    pub initial_step: f64,
    pub alpha_bounds: (f64, f64),
    /// Lower gamma bound as a multiple of the smallest positive input.
    pub gamma_lower_factor: f64,
    /// Upper gamma bound as a multiple of the largest input.
    pub gamma_upper_factor: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_FIT_ATTEMPTS,
            seed: DEFAULT_SEED,
            max_iter: DEFAULT_NM_MAX_ITER,
            ftol: DEFAULT_NM_FTOL,
            initial_step: DEFAULT_NM_STEP,
            alpha_bounds: DEFAULT_ALPHA_BOUNDS,
            gamma_lower_factor: DEFAULT_GAMMA_LOWER_FACTOR,
            gamma_upper_factor: DEFAULT_GAMMA_UPPER_FACTOR,
        }
    }
}

impl FitOptions {
    pub(crate) fn validate(&self) -> Result<(), MmmError> {
        let (a_lo, a_hi) = self.alpha_bounds;
        if !(a_lo > 0.0 && a_hi > a_lo && a_hi.is_finite()) {
            return Err(MmmError::InvalidParameter(format!(
                "alpha bounds must satisfy 0 < lo < hi, got ({a_lo}, {a_hi})"
            )));
        }
        let factors = [
            ("gamma_lower_factor", self.gamma_lower_factor),
            ("gamma_upper_factor", self.gamma_upper_factor),
            ("initial_step", self.initial_step),
        ];
        for (name, value) in factors {
            if !(value.is_finite() && value > 0.0) {
                return Err(MmmError::InvalidParameter(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !(self.ftol.is_finite() && self.ftol >= 0.0) {
            return Err(MmmError::InvalidParameter(format!(
                "ftol must be finite and non-negative, got {}",
                self.ftol
            )));
        }
        if self.max_iter == 0 {
            return Err(MmmError::InvalidParameter(
                "max_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Options for the ridge attribution regression.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecompositionOptions {
    /// Ridge (L2) strength on standardized columns; 0.0 gives plain least squares.
    pub ridge_lambda: f64,
    /// Scale columns to unit variance before penalizing.
    pub standardize: bool,
}

impl Default for DecompositionOptions {
    fn default() -> Self {
        Self {
            ridge_lambda: DEFAULT_RIDGE_LAMBDA,
            standardize: DEFAULT_STANDARDIZE,
        }
    }
}

/// Options for the projected-gradient budget optimizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizerOptions {
    pub max_iter: usize,
    /// Stationarity tolerance, relative to the budget.
    pub tolerance: f64,
    /// Also start from a gamma-proportional split and one corner per channel.
    pub multi_start: bool,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_OPT_MAX_ITER,
            tolerance: DEFAULT_OPT_TOL,
            multi_start: true,
        }
    }
}

/// Options for the weighted-sum Pareto sweep.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParetoOptions {
    /// Resolution of the weight simplex lattice (2 objectives -> steps + 1 weights).
    pub weight_steps: usize,
    pub optimizer: OptimizerOptions,
}

impl Default for ParetoOptions {
    fn default() -> Self {
        Self {
            weight_steps: DEFAULT_PARETO_STEPS,
            optimizer: OptimizerOptions::default(),
        }
    }
}

/// How a channel's saturation curve is obtained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SaturationSpec {
    Fixed(HillCurve),
    /// Fit against total sales with [`crate::fit_hill_saturation_with`].
    Fit,
}

/// Per-run configuration of one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub decay_rate: f64,
    pub saturation: SaturationSpec,
    pub bounds: SpendBounds,
    #[serde(default)]
    pub share: ShareBounds,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decay_rate: DEFAULT_DECAY_RATE,
            saturation: SaturationSpec::Fit,
            bounds: SpendBounds::default(),
            share: ShareBounds::default(),
        }
    }

    pub fn with_decay(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    pub fn with_curve(mut self, curve: HillCurve) -> Self {
        self.saturation = SaturationSpec::Fixed(curve);
        self
    }

    pub fn with_bounds(mut self, bounds: SpendBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_share_bounds(mut self, share: ShareBounds) -> Self {
        self.share = share;
        self
    }
}

/// Control regressors added to the attribution model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    pub trend: bool,
    /// Period of the Fourier seasonality pair, if any.
    pub seasonal_period: Option<usize>,
}

impl Default for ControlSpec {
    fn default() -> Self {
        Self {
            trend: true,
            seasonal_period: Some(DEFAULT_SEASONAL_PERIOD),
        }
    }
}

/// Everything one analysis run needs, passed explicitly per call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub channels: Vec<ChannelSpec>,
    pub controls: ControlSpec,
    pub normalize_adstock: bool,
    pub decomposition: DecompositionOptions,
    pub fit: FitOptions,
    /// Fit channel curves on scoped worker threads.
    pub parallel_fit: bool,
}

impl ModelConfig {
    pub fn new(channels: Vec<ChannelSpec>) -> Self {
        Self {
            channels,
            controls: ControlSpec::default(),
            normalize_adstock: false,
            decomposition: DecompositionOptions::default(),
            fit: FitOptions::default(),
            parallel_fit: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv() -> Channel {
        Channel::new(0, "TV", 0.5, HillCurve::new(1.0, 1000.0).unwrap(), 2.0).unwrap()
    }

    #[test]
    fn test_channel_rejects_bad_parameters() {
        let curve = HillCurve::new(1.0, 10.0).unwrap();
        assert!(matches!(
            Channel::new(0, "x", 1.0, curve, 1.0),
            Err(MmmError::InvalidParameter(_))
        ));
        assert!(matches!(
            Channel::new(0, "x", 0.2, curve, -1.0),
            Err(MmmError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_channel_response_uses_carryover() {
        let channel = tv();
        // decay 0.5 => steady-state multiplier 2
        assert!((channel.carryover() - 2.0).abs() < 1e-12);
        assert!((channel.response(500.0) - 1.0).abs() < 1e-12);
        assert!((channel.half_saturation_spend() - 500.0).abs() < 1e-9);

        let normalized = tv().with_normalized_adstock(true);
        assert!((normalized.carryover() - 1.0).abs() < 1e-12);
        assert!((normalized.response(1000.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_marginal_response_matches_difference() {
        let channel = tv();
        let h = 1e-3;
        let numeric = (channel.response(300.0 + h) - channel.response(300.0 - h)) / (2.0 * h);
        assert!((channel.marginal_response(300.0) - numeric).abs() < 1e-8);
    }

    #[test]
    fn test_bounds_validation() {
        assert!(SpendBounds::new(10.0, 5.0).is_err());
        assert!(SpendBounds::new(-1.0, 5.0).is_err());
        let b = SpendBounds::new(0.0, f64::INFINITY).unwrap();
        assert!(b.contains(1e12, 0.0));
    }

    #[test]
    fn test_unbounded_spend_round_trips_as_null() {
        let json = serde_json::to_string(&SpendBounds::default()).unwrap();
        assert_eq!(json, r#"{"min":0.0,"max":null}"#);
        let back: SpendBounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max, f64::INFINITY);

        let missing: SpendBounds = serde_json::from_str(r#"{"min":5.0}"#).unwrap();
        assert_eq!(missing, SpendBounds::new(5.0, f64::INFINITY).unwrap());
        let capped: SpendBounds = serde_json::from_str(r#"{"min":1.0,"max":9.0}"#).unwrap();
        assert_eq!(capped, SpendBounds::new(1.0, 9.0).unwrap());
    }

    #[test]
    fn test_inverted_bounds_rejected_on_load() {
        assert!(serde_json::from_str::<SpendBounds>(r#"{"min":10.0,"max":5.0}"#).is_err());
        assert!(serde_json::from_str::<SpendBounds>(r#"{"min":-1.0,"max":5.0}"#).is_err());
        assert!(serde_json::from_str::<ShareBounds>(r#"{"min_pct":0.6,"max_pct":0.4}"#).is_err());
        assert!(serde_json::from_str::<ShareBounds>(r#"{"min_pct":0.1,"max_pct":1.5}"#).is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_json() {
        let config = ModelConfig::new(vec![ChannelSpec::new("TV"), ChannelSpec::new("Search")]);
        let json = serde_json::to_string(&config).unwrap();
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.channels, config.channels);
        assert_eq!(back.channels[0].bounds.max, f64::INFINITY);
        assert_eq!(back.channels[1].share, ShareBounds::default());
    }

    #[test]
    fn test_fit_options_validation() {
        assert!(FitOptions::default().validate().is_ok());
        let bad = [
            FitOptions {
                gamma_lower_factor: -1.0,
                ..Default::default()
            },
            FitOptions {
                gamma_upper_factor: f64::NAN,
                ..Default::default()
            },
            FitOptions {
                initial_step: 0.0,
                ..Default::default()
            },
            FitOptions {
                ftol: f64::INFINITY,
                ..Default::default()
            },
            FitOptions {
                alpha_bounds: (2.0, 1.0),
                ..Default::default()
            },
        ];
        for opts in bad {
            assert!(
                matches!(opts.validate(), Err(MmmError::InvalidParameter(_))),
                "{opts:?}"
            );
        }
    }

    #[test]
    fn test_plan_adjustments_clamp_at_zero() {
        let plan = AllocationPlan::from_pairs([("TV", 100.0), ("Digital", 50.0)]).unwrap();
        let adjusted = plan
            .adjusted(&[
                ("TV", Adjustment::Scale(-0.5)),
                ("Digital", Adjustment::Shift(-80.0)),
            ])
            .unwrap();
        assert_eq!(adjusted.spend_for("TV"), Some(50.0));
        assert_eq!(adjusted.spend_for("Digital"), Some(0.0));
        assert!(matches!(
            plan.adjusted(&[("Radio", Adjustment::Set(1.0))]),
            Err(MmmError::UnknownChannel(_))
        ));
    }

    #[test]
    fn test_plan_shares_and_alignment() {
        let plan = AllocationPlan::from_pairs([("Digital", 300.0), ("TV", 100.0)]).unwrap();
        let shares = plan.shares();
        assert!((shares[0] - 0.75).abs() < 1e-12);

        let aligned = plan.aligned_to(&[tv()]);
        assert!(matches!(aligned, Err(MmmError::UnknownChannel(_))));

        let tv_only = AllocationPlan::from_pairs([("TV", 100.0)]).unwrap();
        let digital =
            Channel::new(1, "Digital", 0.0, HillCurve::new(1.5, 500.0).unwrap(), 3.0).unwrap();
        assert_eq!(tv_only.aligned_to(&[digital, tv()]).unwrap(), vec![0.0, 100.0]);
    }

    #[test]
    fn test_objective_parsing() {
        assert_eq!("maximize_revenue".parse::<Objective>().unwrap(), Objective::Revenue);
        assert_eq!("ROI".parse::<Objective>().unwrap(), Objective::Roi);
        assert_eq!(Objective::Profit.to_string(), "maximize_profit");
        assert!("reach".parse::<Objective>().is_err());
    }
}
