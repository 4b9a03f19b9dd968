//! Build revenue / ROI and revenue / profit Pareto frontiers and export them to CSV.
//!
//! Each frontier point is written as one row with its weights, objective values and
//! per-channel spend, to a timestamped file for later charting.
//!
//! Run with: cargo run --release --example pareto_export

use chrono::Local;
use serde::Serialize;
use std::fs::File;
use mmm_budget::{
    multi_objective_optimizer_with, Channel, HillCurve, Objective, ParetoFrontier,
    ParetoOptions, SpendBounds,
};

/// One frontier point flattened into a CSV row.
#[derive(Debug, Serialize)]
struct FrontierRow {
    frontier: String,
    point: usize,
    weights: String,
    first_objective: f64,
    second_objective: f64,
    status: String,
    tv_spend: f64,
    digital_spend: f64,
    search_spend: f64,
    total_spend: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let channels = vec![
        Channel::new(0, "TV", 0.5, HillCurve::new(0.9, 3000.0)?, 18_000.0)?
            .with_bounds(SpendBounds::new(500.0, 6000.0)?),
        Channel::new(1, "Digital", 0.1, HillCurve::new(1.0, 900.0)?, 7_500.0)?
            .with_bounds(SpendBounds::new(0.0, 4000.0)?),
        Channel::new(2, "Search", 0.0, HillCurve::new(0.6, 300.0)?, 2_500.0)?
            .with_bounds(SpendBounds::new(100.0, 1500.0)?),
    ];
    let budget = 8000.0;
    let opts = ParetoOptions {
        weight_steps: 20,
        ..Default::default()
    };

    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let filename = format!("pareto_frontier_{}.csv", timestamp);
    let file = File::create(&filename)?;
    let mut wtr = csv::Writer::from_writer(file);

    println!("=== Pareto frontiers (budget {budget:.0}) ===");
    for objectives in [
        [Objective::Revenue, Objective::Roi],
        [Objective::Revenue, Objective::Profit],
    ] {
        let frontier = multi_objective_optimizer_with(&channels, budget, &objectives, &opts)?;
        println!(
            "\n--- {} vs {}: {} points ---",
            objectives[0],
            objectives[1],
            frontier.len()
        );
        write_frontier(&mut wtr, &frontier)?;
    }

    wtr.flush()?;
    println!("\nResults saved in '{}'.", filename);
    Ok(())
}

fn write_frontier(
    wtr: &mut csv::Writer<File>,
    frontier: &ParetoFrontier,
) -> Result<(), Box<dyn std::error::Error>> {
    let label = frontier
        .objectives
        .iter()
        .map(|o| o.label())
        .collect::<Vec<_>>()
        .join("/");
    for (i, point) in frontier.points.iter().enumerate() {
        let spend = |name: &str| point.plan.spend_for(name).unwrap_or(0.0);
        println!(
            "  #{:<2} w={:?}  {:>12.2}  {:>10.4}  TV={:>7.0} Digital={:>7.0} Search={:>6.0}",
            i,
            point.weights,
            point.objective_values[0],
            point.objective_values[1],
            spend("TV"),
            spend("Digital"),
            spend("Search")
        );
        wtr.serialize(FrontierRow {
            frontier: label.clone(),
            point: i,
            weights: format!("{:?}", point.weights),
            first_objective: point.objective_values[0],
            second_objective: point.objective_values[1],
            status: format!("{:?}", point.status),
            tv_spend: spend("TV"),
            digital_spend: spend("Digital"),
            search_spend: spend("Search"),
            total_spend: point.plan.total(),
        })?;
    }
    Ok(())
}
