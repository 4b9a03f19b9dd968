//! What-if evaluation of allocation plans and one-at-a-time sensitivity.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{Adjustment, AllocationPlan, Channel, MmmError, OptimizationResult};

const BOUNDS_TOLERANCE: f64 = 1e-9;

/// A named, user-supplied allocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub plan: AllocationPlan,
}

impl Scenario {
    pub fn new(name: impl Into<String>, plan: AllocationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }

    /// A scenario expressed as changes to `base`, e.g. "cut TV by half".
    pub fn from_adjustments(
        name: impl Into<String>,
        base: &AllocationPlan,
        changes: &[(&str, Adjustment)],
    ) -> Result<Self, MmmError> {
        Ok(Self::new(name, base.adjusted(changes)?))
    }
}

/// Forward evaluation of one scenario. The plan is expressed in channel order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub plan: AllocationPlan,
    pub predicted_revenue: f64,
    pub contributions: Vec<f64>,
    pub total_spend: f64,
    pub roi: f64,
    /// Every channel's spend lies within its bounds.
    pub within_bounds: bool,
}

impl ScenarioOutcome {
    /// Revenue left on the table relative to an optimized allocation.
    pub fn gap_to(&self, optimum: &OptimizationResult) -> f64 {
        optimum.predicted_revenue - self.predicted_revenue
    }
}

/// Evaluate each plan against the channels' response curves. No optimization.
///
/// Channels missing from a plan get zero spend.
///
/// # Errors
/// `UnknownChannel` if a plan names a channel that is not in `channels`.
pub fn scenario_analysis(
    channels: &[Channel],
    scenarios: &[Scenario],
) -> Result<Vec<ScenarioOutcome>, MmmError> {
    if channels.is_empty() {
        return Err(MmmError::EmptyInput);
    }
    scenarios
        .iter()
        .map(|scenario| {
            let spend = scenario.plan.aligned_to(channels)?;
            let contributions: Vec<f64> = channels
                .iter()
                .zip(spend.iter())
                .map(|(c, &s)| c.response(s))
                .collect();
            let predicted_revenue: f64 = contributions.iter().sum();
            let total_spend: f64 = spend.iter().sum();
            let within_bounds = channels
                .iter()
                .zip(spend.iter())
                .all(|(c, &s)| c.bounds.contains(s, BOUNDS_TOLERANCE));
            Ok(ScenarioOutcome {
                name: scenario.name.clone(),
                plan: AllocationPlan::new(channels.iter().map(|c| c.name.clone()).collect(), spend)?,
                predicted_revenue,
                contributions,
                total_spend,
                roi: if total_spend > 0.0 {
                    predicted_revenue / total_spend
                } else {
                    0.0
                },
                within_bounds,
            })
        })
        .collect()
}

/// A scenario outcome measured against a base allocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub outcome: ScenarioOutcome,
    /// Predicted revenue minus the base plan's predicted revenue.
    pub change_vs_base: f64,
    /// `change_vs_base` in percent of the base revenue; zero when the base predicts none.
    pub change_pct: f64,
}

/// Evaluate `base` and every scenario, reporting each against the base.
///
/// The first entry is the base plan itself, named `"base"`, with zero change.
///
/// # Errors
/// As [`scenario_analysis`].
pub fn compare_scenarios(
    channels: &[Channel],
    base: &AllocationPlan,
    scenarios: &[Scenario],
) -> Result<Vec<ScenarioComparison>, MmmError> {
    let mut all = Vec::with_capacity(scenarios.len() + 1);
    all.push(Scenario::new("base", base.clone()));
    all.extend(scenarios.iter().cloned());
    let outcomes = scenario_analysis(channels, &all)?;
    let base_revenue = outcomes
        .first()
        .map(|o| o.predicted_revenue)
        .unwrap_or_default();
    Ok(outcomes
        .into_iter()
        .map(|outcome| {
            let change_vs_base = outcome.predicted_revenue - base_revenue;
            ScenarioComparison {
                change_pct: if base_revenue > 0.0 {
                    100.0 * change_vs_base / base_revenue
                } else {
                    0.0
                },
                change_vs_base,
                outcome,
            }
        })
        .collect())
}

/// Outcome range from moving one channel's spend by `±perturbation_pct`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensitivityEntry {
    pub channel: String,
    pub base_spend: f64,
    pub low_spend: f64,
    pub high_spend: f64,
    pub low_outcome: f64,
    pub high_outcome: f64,
    pub spread: f64,
}

/// Tornado-chart data, widest spread first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub base_outcome: f64,
    pub perturbation_pct: f64,
    pub entries: Vec<SensitivityEntry>,
}

/// Perturb each channel's spend by `±perturbation_pct` around `optimal_plan`, others
/// held fixed, and record the predicted revenue at both ends.
///
/// A channel with zero spend in the plan is moved from 0 up to `perturbation_pct` of
/// its half-saturation spend instead, so unfunded channels still show their upside.
/// Entries are ranked by spread, ties broken by channel name.
///
/// # Errors
/// `InvalidParameter` unless `0 < perturbation_pct <= 1`, `UnknownChannel` if the
/// plan names a channel that is not in `channels`.
pub fn sensitivity_analysis(
    optimal_plan: &AllocationPlan,
    channels: &[Channel],
    perturbation_pct: f64,
) -> Result<SensitivityReport, MmmError> {
    if !(perturbation_pct > 0.0 && perturbation_pct <= 1.0) {
        return Err(MmmError::InvalidParameter(format!(
            "perturbation must be in (0, 1], got {perturbation_pct}"
        )));
    }
    if channels.is_empty() {
        return Err(MmmError::EmptyInput);
    }
    let spend = optimal_plan.aligned_to(channels)?;
    let base: Vec<f64> = channels
        .iter()
        .zip(spend.iter())
        .map(|(c, &s)| c.response(s))
        .collect();
    let base_outcome: f64 = base.iter().sum();

    let mut entries: Vec<SensitivityEntry> = channels
        .iter()
        .enumerate()
        .map(|(i, channel)| {
            let base_spend = spend[i];
            let (low_spend, high_spend) = if base_spend > 0.0 {
                (
                    base_spend * (1.0 - perturbation_pct),
                    base_spend * (1.0 + perturbation_pct),
                )
            } else {
                (0.0, perturbation_pct * channel.half_saturation_spend())
            };
            let others = base_outcome - base[i];
            let low_outcome = others + channel.response(low_spend);
            let high_outcome = others + channel.response(high_spend);
            SensitivityEntry {
                channel: channel.name.clone(),
                base_spend,
                low_spend,
                high_spend,
                low_outcome,
                high_outcome,
                spread: (high_outcome - low_outcome).abs(),
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        b.spread
            .partial_cmp(&a.spread)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.channel.cmp(&b.channel))
    });

    Ok(SensitivityReport {
        base_outcome,
        perturbation_pct,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saturation::HillCurve;
    use crate::optimizer::single_objective_optimizer;
    use crate::types::{ConvergenceStatus, Objective, SpendBounds};
    use approx::assert_abs_diff_eq;

    fn channels() -> Vec<Channel> {
        vec![
            Channel::new(0, "TV", 0.0, HillCurve::new(1.0, 1000.0).unwrap(), 2.0)
                .unwrap()
                .with_bounds(SpendBounds::new(0.0, 2000.0).unwrap()),
            Channel::new(1, "Digital", 0.0, HillCurve::new(1.5, 500.0).unwrap(), 3.0)
                .unwrap()
                .with_bounds(SpendBounds::new(0.0, 2000.0).unwrap()),
            Channel::new(2, "Print", 0.0, HillCurve::new(0.9, 300.0).unwrap(), 0.0).unwrap(),
        ]
    }

    #[test]
    fn test_scenario_forward_evaluation() {
        let base = AllocationPlan::from_pairs([("TV", 1000.0), ("Digital", 1000.0)]).unwrap();
        let shifted = base
            .adjusted(&[("TV", Adjustment::Scale(1.5)), ("Digital", Adjustment::Set(0.0))])
            .unwrap();
        let outcomes = scenario_analysis(
            &channels(),
            &[Scenario::new("even", base), Scenario::new("tv heavy", shifted)],
        )
        .unwrap();

        let even = &outcomes[0];
        assert_eq!(even.plan.channels, vec!["TV", "Digital", "Print"]);
        assert_eq!(even.plan.spend_for("Print"), Some(0.0));
        assert_abs_diff_eq!(even.contributions[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(even.roi, even.predicted_revenue / 2000.0, epsilon = 1e-12);
        assert!(even.within_bounds);

        let heavy = &outcomes[1];
        assert_eq!(heavy.plan.spend_for("TV"), Some(2500.0));
        assert!(!heavy.within_bounds);
    }

    #[test]
    fn test_gap_to_optimum() {
        let outcome = ScenarioOutcome {
            name: "x".to_string(),
            plan: AllocationPlan::from_pairs([("TV", 10.0)]).unwrap(),
            predicted_revenue: 2.5,
            contributions: vec![2.5],
            total_spend: 10.0,
            roi: 0.25,
            within_bounds: true,
        };
        let optimum = OptimizationResult {
            objective: Objective::Revenue,
            plan: AllocationPlan::from_pairs([("TV", 10.0)]).unwrap(),
            predicted_outcome: 3.0,
            predicted_revenue: 3.0,
            contributions: vec![3.0],
            status: ConvergenceStatus::Converged,
            iterations: 4,
        };
        assert_abs_diff_eq!(outcome.gap_to(&optimum), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_channel_in_scenario() {
        let plan = AllocationPlan::from_pairs([("Radio", 10.0)]).unwrap();
        assert!(matches!(
            scenario_analysis(&channels(), &[Scenario::new("bad", plan)]),
            Err(MmmError::UnknownChannel(_))
        ));
    }

    #[test]
    fn test_sensitivity_spread_tracks_beta() {
        let plan = AllocationPlan::from_pairs([("TV", 800.0), ("Digital", 1200.0), ("Print", 300.0)])
            .unwrap();
        let report = sensitivity_analysis(&plan, &channels(), 0.1).unwrap();
        assert_eq!(report.entries.len(), 3);

        let print = report.entries.iter().find(|e| e.channel == "Print").unwrap();
        assert_eq!(print.spread, 0.0);
        for e in report.entries.iter().filter(|e| e.channel != "Print") {
            assert!(e.spread > 0.0);
            assert!(e.high_outcome > report.base_outcome);
            assert!(e.low_outcome < report.base_outcome);
        }
        assert_eq!(report.entries.last().map(|e| e.channel.as_str()), Some("Print"));
        assert!(report.entries[0].spread >= report.entries[1].spread);
    }

    #[test]
    fn test_sensitivity_of_unfunded_channel() {
        let tv_digital = &channels()[..2];
        let best = single_objective_optimizer(tv_digital, 300.0, Objective::Revenue).unwrap();
        let report = sensitivity_analysis(&best.plan, tv_digital, 0.1).unwrap();
        for entry in &report.entries {
            assert!(entry.spread > 0.0, "{} has zero spread", entry.channel);
        }

        let plan = AllocationPlan::from_pairs([("TV", 0.0), ("Digital", 300.0)]).unwrap();
        let report = sensitivity_analysis(&plan, tv_digital, 0.1).unwrap();
        let tv = report.entries.iter().find(|e| e.channel == "TV").unwrap();
        assert_eq!(tv.low_spend, 0.0);
        // Half-saturation spend for TV is gamma = 1000.
        assert_abs_diff_eq!(tv.high_spend, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(tv.low_outcome, report.base_outcome, epsilon = 1e-12);
        assert_abs_diff_eq!(
            tv.spread,
            tv_digital[0].response(100.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_scenarios_against_base() {
        let base = AllocationPlan::from_pairs([("TV", 1000.0), ("Digital", 500.0)]).unwrap();
        let cut = Scenario::from_adjustments("cut tv", &base, &[("TV", Adjustment::Scale(-0.5))])
            .unwrap();
        let double = Scenario::from_adjustments(
            "double digital",
            &base,
            &[("Digital", Adjustment::Scale(1.0))],
        )
        .unwrap();
        let rows = compare_scenarios(&channels(), &base, &[cut, double]).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].outcome.name, "base");
        assert_eq!(rows[0].change_vs_base, 0.0);
        // TV 1000 -> 1.0, Digital 500 -> 1.5: base revenue 2.5.
        assert_abs_diff_eq!(rows[0].outcome.predicted_revenue, 2.5, epsilon = 1e-12);
        // TV 500 -> 2/3: a drop of 1/3.
        assert_abs_diff_eq!(rows[1].change_vs_base, -1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[1].change_pct, -100.0 / 7.5, epsilon = 1e-9);
        assert!(rows[2].change_vs_base > 0.0);

        assert!(Scenario::from_adjustments("bad", &base, &[("Radio", Adjustment::Set(1.0))]).is_err());
    }

    #[test]
    fn test_sensitivity_is_deterministic_and_validated() {
        let plan = AllocationPlan::from_pairs([("TV", 800.0), ("Digital", 1200.0)]).unwrap();
        let a = sensitivity_analysis(&plan, &channels(), 0.2).unwrap();
        let b = sensitivity_analysis(&plan, &channels(), 0.2).unwrap();
        assert_eq!(a, b);
        assert!(sensitivity_analysis(&plan, &channels(), 0.0).is_err());
        assert!(sensitivity_analysis(&plan, &channels(), 1.5).is_err());
    }
}
