//! Fit Hill saturation curves to noisy response data and compare adstock kernels.
//!
//! Run with: cargo run --example curve_fitting

use mmm_budget::{
    calculate_optimal_spend, calculate_optimal_spend_for, fit_hill_saturation,
    fit_hill_saturation_with, get_adstock_curve, AdstockKernel, FitOptions, HillCurve,
    ResponseCurve,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Hill Saturation Fitting ===\n");
    let truth = HillCurve::new(1.4, 750.0)?;
    let spend: Vec<f64> = (1..=40).map(|i| 60.0 * i as f64).collect();
    let response: Vec<f64> = spend
        .iter()
        .enumerate()
        .map(|(i, &x)| 12_000.0 * truth.apply(x) + 150.0 * ((i as f64) * 1.9).sin())
        .collect();

    let fit = fit_hill_saturation(&spend, &response)?;
    println!(
        "Default options:  alpha={:.3}  gamma={:.1}  scale={:.1}  RMSE={:.2}  R²={:.4}  (attempt {}, {} iterations)",
        fit.curve.alpha(),
        fit.curve.gamma(),
        fit.scale,
        fit.fit_error,
        fit.r2,
        fit.attempts,
        fit.iterations
    );

    let tight = FitOptions {
        alpha_bounds: (0.5, 1.0),
        seed: 42,
        ..Default::default()
    };
    match fit_hill_saturation_with(&spend, &response, &tight) {
        Ok(f) => println!(
            "Concave-only:     alpha={:.3}  gamma={:.1}  RMSE={:.2}",
            f.curve.alpha(),
            f.curve.gamma(),
            f.fit_error
        ),
        Err(e) => println!("Concave-only fit failed: {e}"),
    }

    println!("\nSpend needed to reach a saturation level on the fitted curve:");
    for target in [0.25, 0.5, 0.75, 0.9] {
        let x = calculate_optimal_spend(fit.curve.alpha(), fit.curve.gamma(), target)?;
        println!("  {:>4.0}% -> {:>9.1}", 100.0 * target, x);
    }

    println!("\nSpend reaching 80% of each family's ceiling:");
    let families = [
        ("hill", ResponseCurve::from(fit.curve)),
        ("michaelis-menten", ResponseCurve::michaelis_menten(1.0, fit.curve.gamma())?),
        ("logistic", ResponseCurve::logistic(4.0 / fit.curve.gamma(), fit.curve.gamma(), 1.0)?),
    ];
    for (label, curve) in &families {
        println!("  {:<17} {:>9.1}", label, calculate_optimal_spend_for(curve, 0.8)?);
    }

    println!("\n=== Adstock kernels (8-week horizon) ===\n");
    let kernels = [
        ("geometric 0.6", AdstockKernel::Geometric { decay_rate: 0.6, normalize: true }),
        (
            "weibull k=2",
            AdstockKernel::Weibull { shape: 2.0, scale: 3.0, max_lag: 8, peak_delay: 0 },
        ),
        (
            "weibull +1wk",
            AdstockKernel::Weibull { shape: 2.0, scale: 3.0, max_lag: 8, peak_delay: 1 },
        ),
        ("delayed 0.5", AdstockKernel::Delayed { theta: 0.5, max_lag: 8 }),
        (
            "carryover p=2",
            AdstockKernel::Carryover { peak: 2, decay: 0.5, concentration: 1.5 },
        ),
    ];
    println!("raw geometric weights: {:?}", get_adstock_curve(0.6, 8)?);
    for (label, kernel) in &kernels {
        let weights = kernel.weights(8)?;
        let formatted: Vec<String> = weights.iter().map(|w| format!("{w:.3}")).collect();
        println!("  {:<14} [{}]", label, formatted.join(", "));
    }

    Ok(())
}
