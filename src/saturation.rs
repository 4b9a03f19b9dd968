//! Hill saturation: diminishing returns of adstocked spend.

use std::cmp::Ordering;

use argmin::core::{
    CostFunction, Error as ArgminError, Executor, State, TerminationReason, TerminationStatus,
};
use argmin::solver::neldermead::NelderMead;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::defaults::MIN_FIT_ATTEMPTS;
use crate::types::{FitOptions, MmmError};

/// Saturated response for one channel, values in `[0, 1)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaturatedResponse {
    pub channel: String,
    pub values: Vec<f64>,
}

/// Hill curve `x^alpha / (x^alpha + gamma^alpha)`.
///
/// `gamma` is the half-saturation point; `alpha <= 1` gives a concave curve and
/// `alpha > 1` an S-shaped one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHillCurve")]
pub struct HillCurve {
    alpha: f64,
    gamma: f64,
}

#[derive(Deserialize)]
struct RawHillCurve {
    alpha: f64,
    gamma: f64,
}

impl TryFrom<RawHillCurve> for HillCurve {
    type Error = MmmError;

    fn try_from(raw: RawHillCurve) -> Result<Self, Self::Error> {
        Self::new(raw.alpha, raw.gamma)
    }
}

impl HillCurve {
    pub fn new(alpha: f64, gamma: f64) -> Result<Self, MmmError> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(MmmError::InvalidParameter(format!(
                "alpha must be positive, got {alpha}"
            )));
        }
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(MmmError::InvalidParameter(format!(
                "gamma must be positive, got {gamma}"
            )));
        }
        Ok(Self { alpha, gamma })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn is_concave(&self) -> bool {
        self.alpha <= 1.0
    }

    pub fn apply(&self, x: f64) -> f64 {
        if x.is_nan() || x <= 0.0 {
            return 0.0;
        }
        1.0 / (1.0 + (self.gamma / x).powf(self.alpha))
    }

    pub fn apply_series(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.apply(x)).collect()
    }

    /// `alpha * s * (1 - s) / x`, with the unbounded slope at zero for `alpha < 1`
    /// evaluated a hair above zero.
    pub fn derivative(&self, x: f64) -> f64 {
        let x = if self.alpha < 1.0 {
            x.max(self.gamma * 1e-9)
        } else {
            x
        };
        if x <= 0.0 {
            return if self.alpha == 1.0 {
                1.0 / self.gamma
            } else {
                0.0
            };
        }
        let s = self.apply(x);
        self.alpha * s * (1.0 - s) / x
    }

    /// Input level reaching saturation `s`: `gamma * (s / (1 - s))^(1 / alpha)`.
    pub fn invert(&self, s: f64) -> Result<f64, MmmError> {
        if !(0.0..1.0).contains(&s) {
            return Err(MmmError::InvalidParameter(format!(
                "target saturation must be in [0, 1), got {s}"
            )));
        }
        if s == 0.0 {
            return Ok(0.0);
        }
        Ok(self.gamma * (s / (1.0 - s)).powf(1.0 / self.alpha))
    }
}

/// Checked scalar Hill transform.
pub fn saturate(x: f64, alpha: f64, gamma: f64) -> Result<f64, MmmError> {
    Ok(HillCurve::new(alpha, gamma)?.apply(x))
}

/// Spend reaching `target_saturation` on the curve, solved analytically.
pub fn calculate_optimal_spend(
    alpha: f64,
    gamma: f64,
    target_saturation: f64,
) -> Result<f64, MmmError> {
    HillCurve::new(alpha, gamma)?.invert(target_saturation)
}

/// Saturation families for comparing response shapes.
///
/// The attribution pipeline fits Hill curves; logistic and Michaelis-Menten curves
/// are available for curve comparison and target-spend calculations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponseCurve")]
pub enum ResponseCurve {
    Hill(HillCurve),
    /// `cap / (1 + exp(-k * (x - x0)))`
    Logistic { k: f64, x0: f64, cap: f64 },
    /// `vmax * x / (km + x)`, the Hill curve with `alpha = 1` scaled by `vmax`.
    MichaelisMenten { vmax: f64, km: f64 },
}

#[derive(Deserialize)]
enum RawResponseCurve {
    Hill(HillCurve),
    Logistic { k: f64, x0: f64, cap: f64 },
    MichaelisMenten { vmax: f64, km: f64 },
}

impl TryFrom<RawResponseCurve> for ResponseCurve {
    type Error = MmmError;

    fn try_from(raw: RawResponseCurve) -> Result<Self, Self::Error> {
        match raw {
            RawResponseCurve::Hill(curve) => Ok(Self::Hill(curve)),
            RawResponseCurve::Logistic { k, x0, cap } => Self::logistic(k, x0, cap),
            RawResponseCurve::MichaelisMenten { vmax, km } => Self::michaelis_menten(vmax, km),
        }
    }
}

impl From<HillCurve> for ResponseCurve {
    fn from(curve: HillCurve) -> Self {
        Self::Hill(curve)
    }
}

fn positive(name: &str, value: f64) -> Result<(), MmmError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MmmError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

impl ResponseCurve {
    pub fn logistic(k: f64, x0: f64, cap: f64) -> Result<Self, MmmError> {
        positive("logistic steepness", k)?;
        positive("logistic cap", cap)?;
        if !x0.is_finite() {
            return Err(MmmError::InvalidParameter(format!(
                "logistic midpoint must be finite, got {x0}"
            )));
        }
        Ok(Self::Logistic { k, x0, cap })
    }

    pub fn michaelis_menten(vmax: f64, km: f64) -> Result<Self, MmmError> {
        positive("vmax", vmax)?;
        positive("km", km)?;
        Ok(Self::MichaelisMenten { vmax, km })
    }

    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Self::Hill(curve) => curve.apply(x),
            Self::Logistic { k, x0, cap } => cap / (1.0 + (-k * (x - x0)).exp()),
            Self::MichaelisMenten { vmax, km } => {
                if x.is_nan() || x <= 0.0 {
                    0.0
                } else {
                    vmax * x / (km + x)
                }
            }
        }
    }

    pub fn derivative(&self, x: f64) -> f64 {
        match *self {
            Self::Hill(curve) => curve.derivative(x),
            Self::Logistic { k, x0, .. } => {
                let s = 1.0 / (1.0 + (-k * (x - x0)).exp());
                k * self.ceiling() * s * (1.0 - s)
            }
            Self::MichaelisMenten { vmax, km } => {
                let x = x.max(0.0);
                vmax * km / ((km + x) * (km + x))
            }
        }
    }

    /// Asymptotic response as spend grows without bound.
    pub fn ceiling(&self) -> f64 {
        match *self {
            Self::Hill(_) => 1.0,
            Self::Logistic { cap, .. } => cap,
            Self::MichaelisMenten { vmax, .. } => vmax,
        }
    }

    /// Input level at which the response reaches half its ceiling.
    pub fn half_saturation(&self) -> f64 {
        match *self {
            Self::Hill(curve) => curve.gamma(),
            Self::Logistic { x0, .. } => x0.max(0.0),
            Self::MichaelisMenten { km, .. } => km,
        }
    }

    /// Whether the curve has diminishing returns on all of `x >= 0`.
    pub fn is_concave(&self) -> bool {
        match *self {
            Self::Hill(curve) => curve.is_concave(),
            Self::Logistic { x0, .. } => x0 <= 0.0,
            Self::MichaelisMenten { .. } => true,
        }
    }

    /// Smallest non-negative input reaching `fraction` of the ceiling.
    pub fn invert(&self, fraction: f64) -> Result<f64, MmmError> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(MmmError::InvalidParameter(format!(
                "target saturation must be in [0, 1), got {fraction}"
            )));
        }
        match *self {
            Self::Hill(curve) => curve.invert(fraction),
            Self::Logistic { k, x0, .. } => {
                if fraction == 0.0 {
                    return Ok(0.0);
                }
                Ok((x0 - (1.0 / fraction - 1.0).ln() / k).max(0.0))
            }
            Self::MichaelisMenten { km, .. } => Ok(km * fraction / (1.0 - fraction)),
        }
    }
}

/// Spend at which `curve` reaches `target_saturation` of its ceiling.
pub fn calculate_optimal_spend_for(
    curve: &ResponseCurve,
    target_saturation: f64,
) -> Result<f64, MmmError> {
    curve.invert(target_saturation)
}

/// Result of fitting `scale * saturate(x)` to observed responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HillFit {
    pub curve: HillCurve,
    pub scale: f64,
    /// Root mean squared error, in response units.
    pub fit_error: f64,
    pub r2: f64,
    /// Attempt (1-based) that converged.
    pub attempts: usize,
    pub iterations: usize,
}

impl HillFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.scale * self.curve.apply(x)
    }
}

/// Fit a Hill curve to `(x, y)` with default [`FitOptions`].
///
/// # Arguments
/// * `x` - Non-negative input levels, usually adstocked spend
/// * `y` - Observed responses, same length as `x`
///
/// # Returns
/// The fitted curve with its closed-form scale and fit diagnostics.
pub fn fit_hill_saturation(x: &[f64], y: &[f64]) -> Result<HillFit, MmmError> {
    fit_hill_saturation_with(x, y, &FitOptions::default())
}

/// Fit Hill parameters by nonlinear least squares.
///
/// A Nelder-Mead simplex searches `(ln alpha, ln gamma)` inside the configured bounds
/// while the non-negative `scale` is solved in closed form at every candidate. The first
/// attempt starts at `alpha = 1, gamma = median(x)`; later attempts draw seeded starts.
///
/// # Errors
/// `DimensionMismatch` for unequal lengths, `InvalidParameter` for unusable inputs or
/// options, `FitDivergence` once every attempt has failed to converge.
pub fn fit_hill_saturation_with(
    x: &[f64],
    y: &[f64],
    opts: &FitOptions,
) -> Result<HillFit, MmmError> {
    if x.len() != y.len() {
        return Err(MmmError::DimensionMismatch {
            expected: x.len(),
            found: y.len(),
        });
    }
    if x.len() < 3 {
        return Err(MmmError::InvalidParameter(format!(
            "saturation fit needs at least 3 points, got {}",
            x.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) || x.iter().any(|&v| v < 0.0) {
        return Err(MmmError::InvalidParameter(
            "saturation fit inputs must be finite with non-negative spend".to_string(),
        ));
    }
    opts.validate()?;
    let (a_lo, a_hi) = opts.alpha_bounds;

    let x_min_pos = x
        .iter()
        .copied()
        .filter(|&v| v > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !x_min_pos.is_finite() {
        return Err(MmmError::InvalidParameter(
            "spend series has no positive values".to_string(),
        ));
    }
    let x_max = x.iter().copied().fold(0.0, f64::max);
    let y_scale = y.iter().map(|v| v.abs()).fold(0.0, f64::max);
    if y_scale <= 0.0 {
        return Err(MmmError::InvalidParameter(
            "response series is identically zero".to_string(),
        ));
    }
    let y_norm: Vec<f64> = y.iter().map(|v| v / y_scale).collect();

    let g_lo = x_min_pos * opts.gamma_lower_factor;
    let g_hi = x_max * opts.gamma_upper_factor;
    if !(g_lo > 0.0 && g_hi.is_finite() && g_lo < g_hi) {
        return Err(MmmError::InvalidParameter(format!(
            "gamma bounds must satisfy 0 < lo < hi, got ({g_lo}, {g_hi})"
        )));
    }
    let bounds = [(a_lo.ln(), a_hi.ln()), (g_lo.ln(), g_hi.ln())];

    let gamma_start = median(x).clamp(g_lo, g_hi);
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let attempts = opts.max_attempts.max(MIN_FIT_ATTEMPTS);

    for attempt in 1..=attempts {
        let start = if attempt == 1 {
            vec![0.0_f64.clamp(bounds[0].0, bounds[0].1), gamma_start.ln()]
        } else {
            bounds
                .iter()
                .map(|&(lo, hi)| rng.gen_range(lo..hi))
                .collect()
        };
        let problem = HillLeastSquares {
            x,
            y: &y_norm,
            bounds,
        };
        let result = run_simplex(problem, start, opts)?;
        if result.converged && result.value.is_finite() {
            let curve = HillCurve {
                alpha: result.point[0].exp(),
                gamma: result.point[1].exp(),
            };
            let (sse, scale) = scaled_sse(&curve, x, &y_norm);
            let n = x.len() as f64;
            let y_mean = y.iter().sum::<f64>() / n;
            let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
            let ss_res = sse * y_scale * y_scale;
            tracing::debug!(
                attempt,
                iterations = result.iterations,
                alpha = curve.alpha,
                gamma = curve.gamma,
                "hill saturation fit converged"
            );
            return Ok(HillFit {
                curve,
                scale: scale * y_scale,
                fit_error: (sse / n).sqrt() * y_scale,
                r2: 1.0 - ss_res / ss_tot.max(1e-12),
                attempts: attempt,
                iterations: result.iterations,
            });
        }
        tracing::warn!(
            attempt,
            attempts,
            iterations = result.iterations,
            "hill saturation fit did not converge, retrying from a new start"
        );
    }

    Err(MmmError::FitDivergence { attempts })
}

/// Normalized squared error over `(ln alpha, ln gamma)`. Points outside the bounds
/// cost `+inf`, which keeps the simplex inside the box.
struct HillLeastSquares<'a> {
    x: &'a [f64],
    y: &'a [f64],
    bounds: [(f64, f64); 2],
}

impl CostFunction for HillLeastSquares<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, ArgminError> {
        let inside = p
            .iter()
            .zip(self.bounds.iter())
            .all(|(&v, &(lo, hi))| v >= lo && v <= hi);
        if !inside {
            return Ok(f64::INFINITY);
        }
        let curve = HillCurve {
            alpha: p[0].exp(),
            gamma: p[1].exp(),
        };
        let sse = scaled_sse(&curve, self.x, self.y).0;
        Ok(if sse.is_nan() { f64::INFINITY } else { sse })
    }
}

struct SimplexRun {
    point: Vec<f64>,
    value: f64,
    iterations: usize,
    converged: bool,
}

fn run_simplex(
    problem: HillLeastSquares<'_>,
    start: Vec<f64>,
    opts: &FitOptions,
) -> Result<SimplexRun, MmmError> {
    let mut vertices = vec![start.clone()];
    for i in 0..start.len() {
        let mut vertex = start.clone();
        vertex[i] += opts.initial_step;
        vertices.push(vertex);
    }
    let solver = NelderMead::new(vertices)
        .with_sd_tolerance(opts.ftol)
        .map_err(|e| MmmError::Solver(e.to_string()))?;
    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(opts.max_iter as u64))
        .run()
        .map_err(|e| MmmError::Solver(e.to_string()))?;

    let state = result.state();
    let converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );
    Ok(SimplexRun {
        point: state.get_best_param().cloned().unwrap_or(start),
        value: state.get_best_cost(),
        iterations: state.get_iter() as usize,
        converged,
    })
}

/// Squared error of the best non-negative `scale * curve(x)` against `y`.
fn scaled_sse(curve: &HillCurve, x: &[f64], y: &[f64]) -> (f64, f64) {
    let h = curve.apply_series(x);
    let hh: f64 = h.iter().map(|v| v * v).sum();
    let hy: f64 = h.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let scale = if hh > 1e-300 { (hy / hh).max(0.0) } else { 0.0 };
    let sse = h
        .iter()
        .zip(y.iter())
        .map(|(a, b)| (scale * a - b).powi(2))
        .sum();
    (sse, scale)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}
