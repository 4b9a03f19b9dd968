//! # mmm_budget
//!
//! A Rust library for marketing mix modelling and budget allocation.
//!
//! The pipeline runs leaves first:
//!
//! * **Adstock**: geometric (or Weibull / delayed / peaked) carryover of past spend
//! * **Saturation**: Hill curves, fitted by bounded nonlinear least squares and inverted analytically,
//!   plus logistic and Michaelis-Menten families for comparison
//! * **Decomposition**: ridge attribution of sales into baseline, controls and channels
//! * **ROAS**: average, incremental (counterfactual) and marginal return on spend
//! * **Optimization**: constrained single-objective allocation and weighted-sum Pareto frontiers
//! * **Scenarios**: what-if evaluation of user plans against a base, and tornado-style sensitivity
//!
//! ## Example
//!
//! ```
//! use mmm_budget::{
//!     sensitivity_analysis, single_objective_optimizer, Channel, HillCurve, Objective,
//!     SpendBounds,
//! };
//!
//! let bounds = SpendBounds::new(0.0, 2000.0).unwrap();
//! let channels = vec![
//!     Channel::new(0, "TV", 0.0, HillCurve::new(1.0, 1000.0).unwrap(), 2.0)
//!         .unwrap()
//!         .with_bounds(bounds),
//!     Channel::new(1, "Digital", 0.0, HillCurve::new(1.5, 500.0).unwrap(), 3.0)
//!         .unwrap()
//!         .with_bounds(bounds),
//! ];
//!
//! let best = single_objective_optimizer(&channels, 2000.0, Objective::Revenue).unwrap();
//! assert!(best.plan.total() <= 2000.0 + 1e-9);
//! println!("plan: {:?}  revenue: {:.4}  status: {:?}", best.plan.spend, best.predicted_revenue, best.status);
//!
//! let tornado = sensitivity_analysis(&best.plan, &channels, 0.1).unwrap();
//! for entry in &tornado.entries {
//!     println!("{}: {:.4} .. {:.4}", entry.channel, entry.low_outcome, entry.high_outcome);
//! }
//! ```

// Module declarations
pub mod adstock;
pub mod data;
pub mod decomposition;
mod defaults;
mod design;
pub mod model;
pub mod optimizer;
mod ridge;
pub mod roas;
pub mod saturation;
pub mod scenario;
mod types;

// Re-export public types
pub use adstock::{AdstockKernel, AdstockedSeries};
pub use data::{Observation, ObservationWindow};
pub use decomposition::{ComponentSeries, DecompositionResult, StepKind, WaterfallStep};
pub use design::ControlSet;
pub use model::MarketingMixModel;
pub use optimizer::{ParetoFrontier, ParetoPoint};
pub use roas::{ChannelRoas, IncrementalRoas, MarginalRoas, SpendRecommendation};
pub use saturation::{HillCurve, HillFit, ResponseCurve, SaturatedResponse};
pub use scenario::{
    Scenario, ScenarioComparison, ScenarioOutcome, SensitivityEntry, SensitivityReport,
};
pub use types::{
    Adjustment, AllocationPlan, Channel, ChannelSpec, ControlSpec, ConvergenceStatus,
    DecompositionOptions, FitOptions, MmmError, ModelConfig, Objective, OptimizationResult,
    OptimizerOptions, ParetoOptions, SaturationSpec, ShareBounds, SpendBounds,
};

pub use defaults::DEFAULT_PERTURBATION_PCT;

// Re-export main public functions
pub use adstock::{adstock, get_adstock_curve};
pub use decomposition::{create_waterfall_data, decompose_sales, decompose_sales_with};
pub use optimizer::{
    multi_objective_optimizer, multi_objective_optimizer_with, single_objective_optimizer,
    single_objective_optimizer_with,
};
pub use roas::{
    calculate_channel_roas, calculate_incremental_roas, calculate_marginal_roas,
    channel_roas_summary, incremental_roas_summary, marginal_roas_for_plan,
};
pub use saturation::{
    calculate_optimal_spend, calculate_optimal_spend_for, fit_hill_saturation,
    fit_hill_saturation_with, saturate,
};
pub use scenario::{compare_scenarios, scenario_analysis, sensitivity_analysis};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};

    const PERIODS: usize = 104;

    /// Two years of weekly data with known TV / Digital / Search effects.
    fn weekly_window() -> ObservationWindow {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let dates: Vec<NaiveDate> = (0..PERIODS)
            .map(|t| start + Duration::weeks(t as i64))
            .collect();
        let tv: Vec<f64> = (0..PERIODS)
            .map(|t| if t % 6 < 3 { 900.0 + 40.0 * (t % 5) as f64 } else { 150.0 })
            .collect();
        let digital: Vec<f64> = (0..PERIODS)
            .map(|t| 300.0 + 120.0 * ((t as f64) * 0.37).sin().abs())
            .collect();
        let search: Vec<f64> = (0..PERIODS)
            .map(|t| 100.0 + 60.0 * ((t as f64) * 0.83).cos().abs())
            .collect();

        let tv_ad = adstock(&tv, 0.5, false).unwrap();
        let search_ad = adstock(&search, 0.2, false).unwrap();
        let tv_curve = HillCurve::new(0.9, 1500.0).unwrap();
        let digital_curve = HillCurve::new(1.0, 400.0).unwrap();
        let search_curve = HillCurve::new(0.7, 120.0).unwrap();
        let sales: Vec<f64> = (0..PERIODS)
            .map(|t| {
                let season = 80.0 * (2.0 * std::f64::consts::PI * t as f64 / 52.0).sin();
                5000.0
                    + 3.0 * t as f64
                    + season
                    + 2400.0 * tv_curve.apply(tv_ad[t])
                    + 1500.0 * digital_curve.apply(digital[t])
                    + 700.0 * search_curve.apply(search_ad[t])
            })
            .collect();

        ObservationWindow::from_columns(
            vec!["TV".into(), "Digital".into(), "Search".into()],
            &dates,
            &sales,
            &[tv, digital, search],
        )
        .unwrap()
    }

    fn config() -> ModelConfig {
        let cap = SpendBounds::new(0.0, 3000.0).unwrap();
        let mut config = ModelConfig::new(vec![
            ChannelSpec::new("TV")
                .with_decay(0.5)
                .with_curve(HillCurve::new(0.9, 1500.0).unwrap())
                .with_bounds(cap),
            ChannelSpec::new("Digital")
                .with_decay(0.0)
                .with_curve(HillCurve::new(1.0, 400.0).unwrap())
                .with_bounds(cap),
            ChannelSpec::new("Search")
                .with_decay(0.2)
                .with_curve(HillCurve::new(0.7, 120.0).unwrap())
                .with_bounds(SpendBounds::new(50.0, 1000.0).unwrap()),
        ]);
        config.decomposition.ridge_lambda = 0.0;
        config
    }

    #[test]
    fn test_end_to_end_attribution() {
        let model = MarketingMixModel::fit(&weekly_window(), &config()).unwrap();
        let decomposition = model.decomposition();

        assert!(decomposition.max_reconstruction_error() < 1e-6);
        assert!(decomposition.r2 > 0.9999);
        assert!(decomposition.clipped_channels.is_empty());
        assert_abs_diff_eq!(model.channel("TV").unwrap().beta, 2400.0, epsilon = 1e-3);
        assert_abs_diff_eq!(model.channel("Search").unwrap().beta, 700.0, epsilon = 1e-3);

        let steps = decomposition.waterfall();
        let observed: f64 = weekly_window().sales().iter().sum();
        assert_eq!(steps.last().map(|s| s.value), Some(observed));
        assert_eq!(
            steps.iter().filter(|s| s.kind == StepKind::Control).count(),
            3
        );
    }

    #[test]
    fn test_end_to_end_roas() {
        let model = MarketingMixModel::fit(&weekly_window(), &config()).unwrap();
        let summary = channel_roas_summary(&model);
        let share: f64 = summary.iter().map(|r| r.contribution_share).sum();
        assert_abs_diff_eq!(share, 1.0, epsilon = 1e-9);
        assert!(summary.iter().all(|r| r.roas > 0.0));

        // No interaction terms, so removing a channel removes exactly its contribution.
        for inc in incremental_roas_summary(&model).unwrap() {
            let attributed = model.decomposition().channel_total(&inc.channel).unwrap();
            assert_abs_diff_eq!(inc.incremental_sales, attributed, epsilon = 1e-6);
            assert!(inc.lift_pct > 0.0);
        }
    }

    #[test]
    fn test_end_to_end_allocation() {
        let model = MarketingMixModel::fit(&weekly_window(), &config()).unwrap();
        let channels = model.channels();
        let budget = 2000.0;

        let best = single_objective_optimizer(channels, budget, Objective::Revenue).unwrap();
        assert_eq!(best.status, ConvergenceStatus::Converged);
        assert!(best.plan.total() <= budget + 1e-9);
        assert!(best.plan.spend_for("Search").unwrap() >= 50.0 - 1e-9);

        let even = AllocationPlan::from_pairs([
            ("TV", 650.0),
            ("Digital", 650.0),
            ("Search", 700.0),
        ])
        .unwrap();
        let outcomes = scenario_analysis(channels, &[Scenario::new("even split", even)]).unwrap();
        assert!(outcomes[0].within_bounds);
        assert!(outcomes[0].gap_to(&best) >= -1e-6);

        // At an interior optimum, marginal returns equalize across unconstrained channels.
        let marginal = marginal_roas_for_plan(channels, &best.plan).unwrap();
        assert_eq!(marginal.len(), 3);
        let interior: Vec<f64> = marginal
            .iter()
            .filter(|m| {
                let bounds = model.channel(&m.channel).unwrap().bounds;
                m.spend > bounds.min + 1e-6 && m.spend < bounds.max - 1e-6
            })
            .map(|m| m.marginal_roas)
            .collect();
        assert!(interior.len() >= 2, "{marginal:?}");
        let (lo, hi) = interior
            .iter()
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        assert!(lo > 0.0);
        assert!((hi - lo) / hi < 1e-2, "marginal ROAS not equalized: {marginal:?}");

        let tornado = sensitivity_analysis(&best.plan, channels, DEFAULT_PERTURBATION_PCT).unwrap();
        assert_abs_diff_eq!(tornado.base_outcome, best.predicted_revenue, epsilon = 1e-9);
        assert!(tornado.entries.iter().all(|e| e.spread > 0.0));
    }

    #[test]
    fn test_end_to_end_pareto_export() {
        let model = MarketingMixModel::fit(&weekly_window(), &config()).unwrap();
        let opts = ParetoOptions {
            weight_steps: 4,
            ..Default::default()
        };
        let frontier = multi_objective_optimizer_with(
            model.channels(),
            2500.0,
            &[Objective::Revenue, Objective::Profit],
            &opts,
        )
        .unwrap();
        assert!(!frontier.is_empty());
        assert!(frontier.points.len() <= 5);

        let json = serde_json::to_string(&frontier).unwrap();
        let back: ParetoFrontier = serde_json::from_str(&json).unwrap();
        assert_eq!(back.objectives, frontier.objectives);
        assert_eq!(back.points.len(), frontier.points.len());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let json = serde_json::to_string(&config()).unwrap();
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.channels, config().channels);

        let bad = json.replace("\"gamma\":1500.0", "\"gamma\":-1.0");
        assert!(serde_json::from_str::<ModelConfig>(&bad).is_err());
        let inverted = json.replace("\"max\":1000.0", "\"max\":10.0");
        assert!(serde_json::from_str::<ModelConfig>(&inverted).is_err());

        // Default channels are unbounded above.
        let mut open = config();
        open.channels.push(ChannelSpec::new("Radio"));
        let json = serde_json::to_string(&open).unwrap();
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.channels, open.channels);
        assert_eq!(back.channels[3].bounds, SpendBounds::default());
    }
}
