//! Constrained budget allocation over channel response curves.
//!
//! Problems have the form `maximize f(x)` subject to `min_i <= x_i <= max_i` and
//! `Σ x_i <= budget`. They are solved by projected-gradient ascent with Armijo
//! backtracking, restarted from several feasible points. A run is converged once the
//! projected gradient step is stationary relative to the budget; the result is
//! reported as a global optimum only when the scalarized objective is concave.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::defaults::DEFAULT_ROI_SPEND_FLOOR;
use crate::types::{
    AllocationPlan, Channel, ConvergenceStatus, MmmError, Objective, OptimizationResult,
    OptimizerOptions, ParetoOptions,
};

const ARMIJO_C: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const PARETO_EPS: f64 = 1e-9;

/// Weighted sum of objectives over a box-and-budget feasible set.
struct Problem<'a> {
    channels: &'a [Channel],
    lower: Vec<f64>,
    upper: Vec<f64>,
    budget: f64,
    /// `(objective, weight)` pairs; the scalarized objective is `Σ weight * value`.
    terms: Vec<(Objective, f64)>,
}

struct Run {
    x: Vec<f64>,
    value: f64,
    converged: bool,
    iterations: usize,
}

impl<'a> Problem<'a> {
    fn new(
        channels: &'a [Channel],
        budget: f64,
        terms: Vec<(Objective, f64)>,
    ) -> Result<Self, MmmError> {
        if channels.is_empty() {
            return Err(MmmError::EmptyInput);
        }
        if !budget.is_finite() || budget < 0.0 {
            return Err(MmmError::InvalidParameter(format!(
                "total budget must be finite and non-negative, got {budget}"
            )));
        }
        let mut lower = Vec::with_capacity(channels.len());
        let mut upper = Vec::with_capacity(channels.len());
        for channel in channels {
            channel.bounds.validate()?;
            channel.share.validate()?;
            lower.push(channel.bounds.min.max(channel.share.min_pct * budget));
            upper.push(channel.bounds.max.min(channel.share.max_pct * budget).min(budget));
        }
        let min_total: f64 = lower.iter().sum();
        if budget < min_total {
            return Err(MmmError::InfeasibleBudget { budget, min_total });
        }
        for ((channel, &lo), &hi) in channels.iter().zip(lower.iter()).zip(upper.iter()) {
            if lo > hi {
                return Err(MmmError::InvalidParameter(format!(
                    "channel {} has no feasible spend: lower limit {lo} exceeds upper limit {hi}",
                    channel.name
                )));
            }
        }
        Ok(Self {
            channels,
            lower,
            upper,
            budget,
            terms,
        })
    }

    fn roi_floor(&self) -> f64 {
        (self.budget * DEFAULT_ROI_SPEND_FLOOR).max(f64::MIN_POSITIVE)
    }

    fn revenue(&self, x: &[f64]) -> f64 {
        self.channels
            .iter()
            .zip(x.iter())
            .map(|(c, &s)| c.response(s))
            .sum()
    }

    fn objective_value(&self, objective: Objective, x: &[f64]) -> f64 {
        let revenue = self.revenue(x);
        let spend: f64 = x.iter().sum();
        match objective {
            Objective::Revenue => revenue,
            Objective::Roi => revenue / spend.max(self.roi_floor()),
            Objective::Profit => revenue - spend,
        }
    }

    fn value(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(objective, w)| w * self.objective_value(objective, x))
            .sum()
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let marginal: Vec<f64> = self
            .channels
            .iter()
            .zip(x.iter())
            .map(|(c, &s)| c.marginal_response(s))
            .collect();
        let revenue = self.revenue(x);
        let spend: f64 = x.iter().sum();
        let floor = self.roi_floor();

        let mut grad = vec![0.0; x.len()];
        for &(objective, w) in &self.terms {
            for (g, &m) in grad.iter_mut().zip(marginal.iter()) {
                *g += w * match objective {
                    Objective::Revenue => m,
                    Objective::Roi if spend > floor => m / spend - revenue / (spend * spend),
                    Objective::Roi => m / floor,
                    Objective::Profit => m - 1.0,
                };
            }
        }
        grad
    }

    /// Euclidean projection onto `{lower <= x <= upper, Σx <= budget}`.
    ///
    /// Clamps to the box; if that overshoots the budget, solves
    /// `Σ clamp(y - τ) = budget` for the shift `τ`, which is piecewise linear in `τ`
    /// between the breakpoints `y_i - upper_i` and `y_i - lower_i`.
    fn project(&self, y: &[f64]) -> Vec<f64> {
        let clamped = |tau: f64| -> Vec<f64> {
            y.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .map(|(&v, (&lo, &hi))| (v - tau).clamp(lo, hi))
                .collect()
        };
        let total = |tau: f64| clamped(tau).iter().sum::<f64>();
        if total(0.0) <= self.budget {
            return clamped(0.0);
        }

        let mut breakpoints: Vec<f64> = y
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .flat_map(|(&v, (&lo, &hi))| [v - hi, v - lo])
            .filter(|&t| t > 0.0)
            .collect();
        breakpoints.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let (mut t0, mut h0) = (0.0, total(0.0));
        for t1 in breakpoints {
            let h1 = total(t1);
            if h1 <= self.budget {
                let tau = if h0 > h1 {
                    t0 + (h0 - self.budget) * (t1 - t0) / (h0 - h1)
                } else {
                    t1
                };
                return clamped(tau.clamp(t0, t1));
            }
            t0 = t1;
            h0 = h1;
        }
        // Only reachable when Σ lower > budget, which `Problem::new` rejects.
        self.lower.clone()
    }

    fn is_concave(&self) -> bool {
        self.terms
            .iter()
            .all(|(objective, w)| *w == 0.0 || objective.preserves_concavity())
            && self.channels.iter().all(|c| c.saturation.is_concave())
    }

    fn starts(&self, multi_start: bool) -> Vec<Vec<f64>> {
        let n = self.channels.len();
        let mut starts = vec![self.project(&vec![self.budget / n as f64; n])];
        if !multi_start {
            return starts;
        }

        let half: Vec<f64> = self
            .channels
            .iter()
            .map(|c| c.half_saturation_spend())
            .collect();
        let half_total: f64 = half.iter().sum();
        if half_total > 0.0 && half_total.is_finite() {
            let proportional: Vec<f64> =
                half.iter().map(|h| self.budget * h / half_total).collect();
            starts.push(self.project(&proportional));
        }

        let free = self.budget - self.lower.iter().sum::<f64>();
        for i in 0..n {
            let mut corner = self.lower.clone();
            corner[i] = (self.lower[i] + free).min(self.upper[i]);
            starts.push(self.project(&corner));
        }
        starts
    }

    /// Projected-gradient ascent from `start`.
    ///
    /// Trial steps use the Barzilai-Borwein estimate `|Δx|² / -(Δx·Δg)`, capped at the
    /// step that moves the whole budget, and are halved until the Armijo condition holds.
    fn ascend(&self, start: Vec<f64>, opts: &OptimizerOptions) -> Run {
        let mut x = start;
        let mut f = self.value(&x);
        let mut previous: Option<(Vec<f64>, Vec<f64>)> = None;
        let tol = opts.tolerance * self.budget.max(1.0);

        for iteration in 0..opts.max_iter {
            let g = self.gradient(&x);
            let g_max = g.iter().map(|v| v.abs()).fold(0.0, f64::max);
            if g_max == 0.0 || !g_max.is_finite() {
                return Run {
                    x,
                    value: f,
                    converged: g_max == 0.0,
                    iterations: iteration,
                };
            }

            let s_ref = self.budget.max(1.0) / g_max;
            let stride = |step: f64| -> Vec<f64> {
                let y: Vec<f64> = x.iter().zip(g.iter()).map(|(&xi, &gi)| xi + step * gi).collect();
                self.project(&y)
            };
            let reference = stride(s_ref);
            let stationarity = reference
                .iter()
                .zip(x.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            if stationarity <= tol {
                return Run {
                    x,
                    value: f,
                    converged: true,
                    iterations: iteration,
                };
            }

            let mut step = match &previous {
                Some((px, pg)) => {
                    let dx: Vec<f64> = x.iter().zip(px.iter()).map(|(a, b)| a - b).collect();
                    let dxdx: f64 = dx.iter().map(|v| v * v).sum();
                    let curvature: f64 = -dx
                        .iter()
                        .zip(g.iter().zip(pg.iter()))
                        .map(|(d, (gn, go))| d * (gn - go))
                        .sum::<f64>();
                    if curvature > 0.0 && dxdx > 0.0 {
                        (dxdx / curvature).min(s_ref)
                    } else {
                        s_ref
                    }
                }
                None => s_ref,
            };
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let candidate = stride(step);
                let ascent: f64 = candidate
                    .iter()
                    .zip(x.iter())
                    .zip(g.iter())
                    .map(|((c, xi), gi)| gi * (c - xi))
                    .sum();
                let f_new = self.value(&candidate);
                if ascent > 0.0 && f_new >= f + ARMIJO_C * ascent {
                    accepted = Some((candidate, f_new));
                    break;
                }
                step *= 0.5;
            }
            match accepted {
                Some((candidate, f_new)) => {
                    let old = std::mem::replace(&mut x, candidate);
                    previous = Some((old, g));
                    f = f_new;
                }
                // No representable improvement along the projected arc.
                None => {
                    return Run {
                        x,
                        value: f,
                        converged: true,
                        iterations: iteration + 1,
                    }
                }
            }
        }

        Run {
            x,
            value: f,
            converged: false,
            iterations: opts.max_iter,
        }
    }

    fn solve(&self, opts: &OptimizerOptions) -> (Run, ConvergenceStatus) {
        let mut best: Option<Run> = None;
        for (k, start) in self.starts(opts.multi_start).into_iter().enumerate() {
            let run = self.ascend(start, opts);
            debug!(
                start = k,
                value = run.value,
                iterations = run.iterations,
                converged = run.converged,
                "optimizer run finished"
            );
            let better = match &best {
                None => true,
                Some(b) => {
                    run.value > b.value + PARETO_EPS * (1.0 + b.value.abs())
                        || (run.converged && !b.converged && run.value >= b.value - PARETO_EPS)
                }
            };
            if better {
                best = Some(run);
            }
        }
        // `starts` always yields at least the equal split.
        let run = best.unwrap_or(Run {
            x: self.lower.clone(),
            value: self.value(&self.lower),
            converged: false,
            iterations: 0,
        });
        let status = if !run.converged {
            warn!(
                iterations = run.iterations,
                "optimizer hit its iteration cap before meeting tolerance"
            );
            ConvergenceStatus::Nonconverged {
                iterations: run.iterations,
            }
        } else if self.is_concave() {
            ConvergenceStatus::Converged
        } else {
            ConvergenceStatus::LocalOptimum
        };
        (run, status)
    }

    fn plan(&self, x: &[f64]) -> Result<AllocationPlan, MmmError> {
        AllocationPlan::new(
            self.channels.iter().map(|c| c.name.clone()).collect(),
            x.iter().map(|v| v.max(0.0)).collect(),
        )
    }
}

/// Best allocation of `total_budget` for one objective, with default
/// [`OptimizerOptions`].
///
/// # Arguments
/// * `channels` - Channels with response curves, spend bounds and budget shares
/// * `total_budget` - Upper limit on total spend across all channels
/// * `objective` - Quantity to maximize
///
/// # Returns
/// The allocation plan, its predicted outcome and how the search ended.
pub fn single_objective_optimizer(
    channels: &[Channel],
    total_budget: f64,
    objective: Objective,
) -> Result<OptimizationResult, MmmError> {
    single_objective_optimizer_with(
        channels,
        total_budget,
        objective,
        &OptimizerOptions::default(),
    )
}

/// Best allocation of `total_budget` across `channels` for one objective.
///
/// Each channel's spend stays within its bounds and its share of the budget (the
/// upper limit capped at the budget) and total spend never exceeds the budget. Hitting the iteration cap is
/// reported through [`ConvergenceStatus::Nonconverged`] rather than as an error.
///
/// # Errors
/// `InfeasibleBudget` if the budget is below the sum of minimum spends,
/// `EmptyInput` without channels, `InvalidParameter` for a negative budget, malformed
/// bounds, or a channel whose minimum exceeds its maximum once shares are applied.
pub fn single_objective_optimizer_with(
    channels: &[Channel],
    total_budget: f64,
    objective: Objective,
    opts: &OptimizerOptions,
) -> Result<OptimizationResult, MmmError> {
    let problem = Problem::new(channels, total_budget, vec![(objective, 1.0)])?;
    let (run, status) = problem.solve(opts);
    let contributions: Vec<f64> = channels
        .iter()
        .zip(run.x.iter())
        .map(|(c, &s)| c.response(s))
        .collect();
    Ok(OptimizationResult {
        objective,
        plan: problem.plan(&run.x)?,
        predicted_outcome: problem.objective_value(objective, &run.x),
        predicted_revenue: contributions.iter().sum(),
        contributions,
        status,
        iterations: run.iterations,
    })
}

/// One non-dominated allocation with the weights that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint {
    pub plan: AllocationPlan,
    pub weights: Vec<f64>,
    /// Raw objective values, in the frontier's objective order.
    pub objective_values: Vec<f64>,
    pub status: ConvergenceStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParetoFrontier {
    pub objectives: Vec<Objective>,
    /// Sorted by the first objective, best first.
    pub points: Vec<ParetoPoint>,
}

impl ParetoFrontier {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Pareto frontier across `objectives` with default [`ParetoOptions`].
///
/// # Arguments
/// * `channels` - Channels with response curves, spend bounds and budget shares
/// * `total_budget` - Upper limit on total spend across all channels
/// * `objectives` - Objectives traded off against each other, at least one
///
/// # Returns
/// Non-dominated allocations sorted by the first objective, best first.
pub fn multi_objective_optimizer(
    channels: &[Channel],
    total_budget: f64,
    objectives: &[Objective],
) -> Result<ParetoFrontier, MmmError> {
    multi_objective_optimizer_with(channels, total_budget, objectives, &ParetoOptions::default())
}

/// Pareto frontier by weighted-sum scalarization over a simplex lattice of weights.
///
/// Each objective is divided by its single-objective optimum so weights compare
/// like with like. Near-duplicate and dominated points are removed.
pub fn multi_objective_optimizer_with(
    channels: &[Channel],
    total_budget: f64,
    objectives: &[Objective],
    opts: &ParetoOptions,
) -> Result<ParetoFrontier, MmmError> {
    if objectives.is_empty() {
        return Err(MmmError::EmptyInput);
    }
    if opts.weight_steps == 0 {
        return Err(MmmError::InvalidParameter(
            "pareto weight_steps must be at least 1".to_string(),
        ));
    }

    let mut scales = Vec::with_capacity(objectives.len());
    for &objective in objectives {
        let best =
            single_objective_optimizer_with(channels, total_budget, objective, &opts.optimizer)?;
        scales.push(best.predicted_outcome.abs().max(1e-12));
    }
    let eps: Vec<f64> = scales.iter().map(|s| PARETO_EPS * s.max(1.0)).collect();

    let mut candidates: Vec<ParetoPoint> = Vec::new();
    for weights in weight_lattice(objectives.len(), opts.weight_steps) {
        let terms = objectives
            .iter()
            .zip(weights.iter().zip(scales.iter()))
            .map(|(&o, (&w, &s))| (o, w / s))
            .collect();
        let problem = Problem::new(channels, total_budget, terms)?;
        let (run, status) = problem.solve(&opts.optimizer);
        let objective_values = objectives
            .iter()
            .map(|&o| problem.objective_value(o, &run.x))
            .collect();
        let point = ParetoPoint {
            plan: problem.plan(&run.x)?,
            weights,
            objective_values,
            status,
        };
        let duplicate = candidates.iter().any(|p| {
            p.objective_values
                .iter()
                .zip(point.objective_values.iter())
                .zip(eps.iter())
                .all(|((a, b), e)| (a - b).abs() <= *e)
        });
        if !duplicate {
            candidates.push(point);
        }
    }

    let dominated = |p: &ParetoPoint, q: &ParetoPoint| {
        let pairs = || {
            p.objective_values
                .iter()
                .zip(q.objective_values.iter())
                .zip(eps.iter())
        };
        pairs().all(|((pv, qv), e)| *qv >= pv - e) && pairs().any(|((pv, qv), e)| *qv > pv + e)
    };
    let mut points: Vec<ParetoPoint> = candidates
        .iter()
        .filter(|p| !candidates.iter().any(|q| dominated(p, q)))
        .cloned()
        .collect();
    points.sort_by(|a, b| {
        b.objective_values[0]
            .partial_cmp(&a.objective_values[0])
            .unwrap_or(Ordering::Equal)
    });
    debug!(
        candidates = candidates.len(),
        points = points.len(),
        "pareto frontier built"
    );

    Ok(ParetoFrontier {
        objectives: objectives.to_vec(),
        points,
    })
}

/// Every weight vector with entries in `{0, 1/steps, ..., 1}` summing to one.
fn weight_lattice(dims: usize, steps: usize) -> Vec<Vec<f64>> {
    fn fill(dims: usize, remaining: usize, steps: usize, prefix: &mut Vec<usize>, out: &mut Vec<Vec<f64>>) {
        if prefix.len() + 1 == dims {
            prefix.push(remaining);
            out.push(prefix.iter().map(|&k| k as f64 / steps as f64).collect());
            prefix.pop();
            return;
        }
        for k in (0..=remaining).rev() {
            prefix.push(k);
            fill(dims, remaining - k, steps, prefix, out);
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    if dims > 0 {
        fill(dims, steps, steps, &mut Vec::with_capacity(dims), &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saturation::HillCurve;
    use crate::types::{ShareBounds, SpendBounds};
    use approx::assert_abs_diff_eq;

    fn channel(id: usize, name: &str, alpha: f64, gamma: f64, beta: f64) -> Channel {
        Channel::new(id, name, 0.0, HillCurve::new(alpha, gamma).unwrap(), beta)
            .unwrap()
            .with_bounds(SpendBounds::new(0.0, 2000.0).unwrap())
    }

    fn tv_digital() -> Vec<Channel> {
        vec![
            channel(0, "TV", 1.0, 1000.0, 2.0),
            channel(1, "Digital", 1.5, 500.0, 3.0),
        ]
    }

    fn concave_mix() -> Vec<Channel> {
        vec![
            channel(0, "TV", 0.8, 900.0, 5000.0),
            channel(1, "Digital", 1.0, 300.0, 2500.0),
            channel(2, "Radio", 0.6, 200.0, 800.0),
        ]
    }

    fn brute_force(channels: &[Channel], budget: f64, step: f64) -> f64 {
        let steps = (2000.0 / step) as usize;
        let mut best = f64::MIN;
        for i in 0..=steps {
            for j in 0..=steps {
                let (a, b) = (i as f64 * step, j as f64 * step);
                if a + b <= budget {
                    best = best.max(channels[0].response(a) + channels[1].response(b));
                }
            }
        }
        best
    }

    #[test]
    fn test_matches_brute_force_grid() {
        let channels = tv_digital();
        let result = single_objective_optimizer(&channels, 2000.0, Objective::Revenue).unwrap();
        let grid = brute_force(&channels, 2000.0, 5.0);

        assert!(result.plan.total() <= 2000.0 + 1e-9);
        assert!(result.predicted_revenue >= grid - 1e-9);
        assert!(result.predicted_revenue - grid < 1e-3);
        assert_abs_diff_eq!(result.predicted_revenue, 3.253_059_686, epsilon = 1e-6);
        assert_abs_diff_eq!(result.plan.spend_for("TV").unwrap(), 794.5, epsilon = 0.5);
        // Digital's S-curve rules out a global guarantee.
        assert_eq!(result.status, ConvergenceStatus::LocalOptimum);
    }

    #[test]
    fn test_concave_problem_is_global() {
        let result =
            single_objective_optimizer(&concave_mix(), 1500.0, Objective::Revenue).unwrap();
        assert_eq!(result.status, ConvergenceStatus::Converged);
        assert!((result.plan.total() - 1500.0).abs() < 1e-6);
        let sum: f64 = result.contributions.iter().sum();
        assert_abs_diff_eq!(sum, result.predicted_revenue, epsilon = 1e-9);
    }

    #[test]
    fn test_revenue_monotone_in_budget() {
        let channels = concave_mix();
        let mut previous = f64::MIN;
        for &budget in &[0.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0] {
            let result = single_objective_optimizer(&channels, budget, Objective::Revenue).unwrap();
            assert!(result.predicted_revenue >= previous - 1e-9);
            assert!(result.plan.total() <= budget + 1e-9);
            previous = result.predicted_revenue;
        }
    }

    #[test]
    fn test_bounds_respected() {
        let mut channels = concave_mix();
        channels[0].bounds = SpendBounds::new(100.0, 300.0).unwrap();
        channels[2].bounds = SpendBounds::new(250.0, f64::INFINITY).unwrap();
        let result = single_objective_optimizer(&channels, 1200.0, Objective::Revenue).unwrap();
        for (c, (_, spend)) in channels.iter().zip(result.plan.iter()) {
            assert!(c.bounds.contains(spend, 1e-9), "{} = {spend}", c.name);
        }
    }

    #[test]
    fn test_infeasible_budget() {
        let mut channels = tv_digital();
        for c in channels.iter_mut() {
            c.bounds = SpendBounds::new(500.0, 2000.0).unwrap();
        }
        let err = single_objective_optimizer(&channels, 800.0, Objective::Revenue).unwrap_err();
        assert!(matches!(
            err,
            MmmError::InfeasibleBudget { min_total, .. } if (min_total - 1000.0).abs() < 1e-12
        ));
    }

    #[test]
    fn test_malformed_bounds_are_rejected() {
        let mut channels = tv_digital();
        channels[0].bounds = SpendBounds { min: 10.0, max: 5.0 };
        assert!(matches!(
            single_objective_optimizer(&channels, 100.0, Objective::Revenue),
            Err(MmmError::InvalidParameter(_))
        ));

        let loaded: Result<SpendBounds, _> = serde_json::from_str(r#"{"min":10.0,"max":5.0}"#);
        assert!(loaded.is_err());
    }

    #[test]
    fn test_budget_share_limits() {
        let channels = vec![
            channel(0, "TV", 1.0, 1000.0, 2.0)
                .with_share_bounds(ShareBounds::new(0.2, 0.5).unwrap()),
            channel(1, "Digital", 1.5, 500.0, 3.0)
                .with_share_bounds(ShareBounds::new(0.0, 0.3).unwrap()),
        ];
        let result = single_objective_optimizer(&channels, 2000.0, Objective::Revenue).unwrap();
        let tv = result.plan.spend_for("TV").unwrap();
        let digital = result.plan.spend_for("Digital").unwrap();
        assert!((400.0 - 1e-9..=1000.0 + 1e-9).contains(&tv), "TV = {tv}");
        assert!(digital <= 600.0 + 1e-9, "Digital = {digital}");
        // Revenue is increasing in spend, so both capped channels sit at their caps.
        assert_abs_diff_eq!(tv, 1000.0, epsilon = 1e-3);
        assert_abs_diff_eq!(digital, 600.0, epsilon = 1e-3);

        let greedy = vec![
            channel(0, "TV", 1.0, 1000.0, 2.0)
                .with_share_bounds(ShareBounds::new(0.7, 1.0).unwrap()),
            channel(1, "Digital", 1.5, 500.0, 3.0)
                .with_share_bounds(ShareBounds::new(0.5, 1.0).unwrap()),
        ];
        assert!(matches!(
            single_objective_optimizer(&greedy, 2000.0, Objective::Revenue),
            Err(MmmError::InfeasibleBudget { .. })
        ));

        let mut clash = tv_digital();
        clash[0].bounds = SpendBounds::new(900.0, 2000.0).unwrap();
        clash[0].share = ShareBounds::new(0.0, 0.25).unwrap();
        assert!(matches!(
            single_objective_optimizer(&clash, 2000.0, Objective::Revenue),
            Err(MmmError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_iteration_cap_is_flagged() {
        let opts = OptimizerOptions {
            max_iter: 1,
            multi_start: false,
            ..Default::default()
        };
        let result =
            single_objective_optimizer_with(&tv_digital(), 2000.0, Objective::Revenue, &opts)
                .unwrap();
        assert_eq!(result.status, ConvergenceStatus::Nonconverged { iterations: 1 });
        assert!(result.plan.total() <= 2000.0 + 1e-9);
    }

    #[test]
    fn test_profit_and_roi_objectives() {
        let channels = concave_mix();
        let profit = single_objective_optimizer(&channels, 4000.0, Objective::Profit).unwrap();
        let revenue = single_objective_optimizer(&channels, 4000.0, Objective::Revenue).unwrap();
        assert!(profit.plan.total() <= revenue.plan.total() + 1e-6);
        assert!(profit.predicted_outcome >= revenue.predicted_revenue - revenue.plan.total() - 1e-2);

        let roi = single_objective_optimizer(&channels, 4000.0, Objective::Roi).unwrap();
        assert!(!roi.status.is_global());
        assert!(roi.predicted_outcome >= revenue.predicted_revenue / revenue.plan.total() - 1e-9);
    }

    #[test]
    fn test_projection_onto_budget() {
        let channels = concave_mix();
        let problem = Problem::new(&channels, 100.0, vec![(Objective::Revenue, 1.0)]).unwrap();
        let x = problem.project(&[80.0, 60.0, -5.0]);
        assert_abs_diff_eq!(x.iter().sum::<f64>(), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[0], 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[1], 40.0, epsilon = 1e-9);
        assert_eq!(x[2], 0.0);
    }

    #[test]
    fn test_weight_lattice() {
        let w = weight_lattice(2, 4);
        assert_eq!(w.len(), 5);
        assert_eq!(w[0], vec![1.0, 0.0]);
        assert_eq!(weight_lattice(3, 2).len(), 6);
        assert!(weight_lattice(3, 5)
            .iter()
            .all(|v| (v.iter().sum::<f64>() - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_pareto_points_are_non_dominated() {
        let channels = concave_mix();
        let frontier =
            multi_objective_optimizer(&channels, 3000.0, &[Objective::Revenue, Objective::Roi])
                .unwrap();
        assert!(!frontier.is_empty());
        for p in &frontier.points {
            assert!(p.plan.total() <= 3000.0 + 1e-9);
            for q in &frontier.points {
                let all_ge = q
                    .objective_values
                    .iter()
                    .zip(p.objective_values.iter())
                    .all(|(a, b)| a >= b);
                let any_gt = q
                    .objective_values
                    .iter()
                    .zip(p.objective_values.iter())
                    .any(|(a, b)| a > b);
                assert!(!(all_ge && any_gt), "{:?} dominates {:?}", q.objective_values, p.objective_values);
            }
        }
        for pair in frontier.points.windows(2) {
            assert!(pair[0].objective_values[0] >= pair[1].objective_values[0]);
        }
        let json = serde_json::to_string(&frontier).unwrap();
        assert!(json.contains("objective_values"));
    }

    #[test]
    fn test_pareto_rejects_empty_objectives() {
        assert!(matches!(
            multi_objective_optimizer(&tv_digital(), 1000.0, &[]),
            Err(MmmError::EmptyInput)
        ));
    }
}
