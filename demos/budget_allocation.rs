//! Fit a model on synthetic weekly data, then allocate a budget across channels.
//!
//! Walks the whole pipeline: attribution, ROAS, optimal allocation, what-if scenarios
//! against the optimum and a tornado-style sensitivity table.
//!
//! Run with: cargo run --example budget_allocation

use chrono::{Duration, NaiveDate};
use mmm_budget::{
    adstock, channel_roas_summary, incremental_roas_summary, marginal_roas_for_plan,
    scenario_analysis, sensitivity_analysis, single_objective_optimizer, Adjustment,
    ChannelSpec, HillCurve, MarketingMixModel, ModelConfig, Objective, ObservationWindow,
    Scenario, SpendBounds, DEFAULT_PERTURBATION_PCT,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let window = synthetic_window()?;
    println!("=== Marketing Mix: Budget Allocation ===\n");
    println!(
        "Dataset: {} weeks, channels {:?}",
        window.len(),
        window.channel_names()
    );

    let config = ModelConfig::new(vec![
        ChannelSpec::new("TV")
            .with_decay(0.6)
            .with_curve(HillCurve::new(0.8, 2000.0)?)
            .with_bounds(SpendBounds::new(200.0, 4000.0)?),
        ChannelSpec::new("Digital")
            .with_decay(0.1)
            .with_curve(HillCurve::new(1.0, 600.0)?)
            .with_bounds(SpendBounds::new(0.0, 3000.0)?),
        ChannelSpec::new("Radio")
            .with_decay(0.3)
            .with_curve(HillCurve::new(0.7, 250.0)?)
            .with_bounds(SpendBounds::new(0.0, 1000.0)?),
    ]);
    let model = MarketingMixModel::fit(&window, &config)?;
    let decomposition = model.decomposition();

    println!("\n--- Attribution ---");
    println!("  Baseline / week: {:.2}", decomposition.baseline);
    println!("  R²:              {:.4}", decomposition.r2);
    println!("  RMSE:            {:.2}", decomposition.rmse);
    for step in decomposition.waterfall() {
        println!(
            "  {:<12} {:>14.2}  (running {:>14.2})",
            step.label, step.value, step.cumulative
        );
    }

    println!("\n--- Return on ad spend ---");
    for roas in channel_roas_summary(&model) {
        println!(
            "  {:<8} spend={:>10.0}  contribution={:>10.0}  ROAS={:.3}  share={:.1}%",
            roas.channel,
            roas.total_spend,
            roas.total_contribution,
            roas.roas,
            100.0 * roas.contribution_share
        );
    }
    for inc in incremental_roas_summary(&model)? {
        println!(
            "  {:<8} iROAS={:.3}  lift={:.2}%",
            inc.channel, inc.iroas, inc.lift_pct
        );
    }

    let budget = 5000.0;
    let channels = model.channels();
    let best = single_objective_optimizer(channels, budget, Objective::Revenue)?;
    println!("\n--- Optimal weekly allocation (budget {budget:.0}) ---");
    for ((name, spend), contribution) in best.plan.iter().zip(best.contributions.iter()) {
        println!("  {name:<8} {spend:>9.2}  -> {contribution:>9.2}");
    }
    println!(
        "  Predicted revenue: {:.2}  status: {:?}  iterations: {}",
        best.predicted_revenue, best.status, best.iterations
    );
    for m in marginal_roas_for_plan(channels, &best.plan)? {
        println!(
            "  {:<8} mROAS={:.3}  {:?}",
            m.channel, m.marginal_roas, m.recommendation
        );
    }

    println!("\n--- What-if scenarios ---");
    let shifted = best.plan.adjusted(&[
        ("TV", Adjustment::Scale(-0.2)),
        ("Digital", Adjustment::Shift(300.0)),
    ])?;
    let flat = best
        .plan
        .adjusted(&[("Radio", Adjustment::Set(0.0))])?;
    let outcomes = scenario_analysis(
        channels,
        &[
            Scenario::new("optimum", best.plan.clone()),
            Scenario::new("tv -20%, digital +300", shifted),
            Scenario::new("no radio", flat),
        ],
    )?;
    for outcome in &outcomes {
        println!(
            "  {:<24} revenue={:>9.2}  spend={:>8.0}  ROI={:.3}  gap={:>8.2}  in-bounds={}",
            outcome.name,
            outcome.predicted_revenue,
            outcome.total_spend,
            outcome.roi,
            outcome.gap_to(&best),
            outcome.within_bounds
        );
    }

    println!("\n--- Sensitivity (±10%) ---");
    let tornado = sensitivity_analysis(&best.plan, channels, DEFAULT_PERTURBATION_PCT)?;
    for entry in &tornado.entries {
        println!(
            "  {:<8} {:>9.2} .. {:>9.2}  spread={:.3}",
            entry.channel, entry.low_outcome, entry.high_outcome, entry.spread
        );
    }

    Ok(())
}

/// 78 weeks of spend and sales generated from known curves plus trend and seasonality.
fn synthetic_window() -> Result<ObservationWindow, Box<dyn std::error::Error>> {
    let weeks = 78;
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).ok_or("bad start date")?;
    let dates: Vec<NaiveDate> = (0..weeks).map(|t| start + Duration::weeks(t as i64)).collect();

    let tv: Vec<f64> = (0..weeks)
        .map(|t| if (t / 4) % 2 == 0 { 3000.0 + 25.0 * (t % 7) as f64 } else { 400.0 })
        .collect();
    let digital: Vec<f64> = (0..weeks)
        .map(|t| 900.0 + 350.0 * ((t as f64) * 0.45).sin())
        .collect();
    let radio: Vec<f64> = (0..weeks)
        .map(|t| 300.0 + 150.0 * ((t as f64) * 0.9).cos())
        .collect();

    let tv_curve = HillCurve::new(0.8, 2000.0)?;
    let digital_curve = HillCurve::new(1.0, 600.0)?;
    let radio_curve = HillCurve::new(0.7, 250.0)?;
    let tv_ad = adstock(&tv, 0.6, false)?;
    let digital_ad = adstock(&digital, 0.1, false)?;
    let radio_ad = adstock(&radio, 0.3, false)?;

    let sales: Vec<f64> = (0..weeks)
        .map(|t| {
            let season = 400.0 * (2.0 * std::f64::consts::PI * t as f64 / 52.0).cos();
            let noise = 60.0 * ((t as f64) * 2.7).sin();
            20_000.0
                + 15.0 * t as f64
                + season
                + noise
                + 9000.0 * tv_curve.apply(tv_ad[t])
                + 5000.0 * digital_curve.apply(digital_ad[t])
                + 1800.0 * radio_curve.apply(radio_ad[t])
        })
        .collect();

    Ok(ObservationWindow::from_columns(
        vec!["TV".into(), "Digital".into(), "Radio".into()],
        &dates,
        &sales,
        &[tv, digital, radio],
    )?)
}
