//! Default constants for curve fitting, attribution and budget optimization.

pub const DEFAULT_DECAY_RATE: f64 = 0.5;
pub const DEFAULT_SEASONAL_PERIOD: usize = 52;
pub const DEFAULT_RIDGE_LAMBDA: f64 = 1.0;
pub const DEFAULT_STANDARDIZE: bool = true;
pub const DEFAULT_SEED: u64 = 7;

pub const DEFAULT_FIT_ATTEMPTS: usize = 5;
pub const MIN_FIT_ATTEMPTS: usize = 3;
pub const DEFAULT_NM_MAX_ITER: usize = 2_000;
pub const DEFAULT_NM_FTOL: f64 = 1e-12;
pub const DEFAULT_NM_STEP: f64 = 0.5;
pub const DEFAULT_ALPHA_BOUNDS: (f64, f64) = (0.1, 5.0);
pub const DEFAULT_GAMMA_LOWER_FACTOR: f64 = 0.1;
pub const DEFAULT_GAMMA_UPPER_FACTOR: f64 = 2.0;

pub const DEFAULT_OPT_MAX_ITER: usize = 1_000;
pub const DEFAULT_OPT_TOL: f64 = 1e-7;
pub const DEFAULT_PARETO_STEPS: usize = 10;
pub const DEFAULT_ROI_SPEND_FLOOR: f64 = 0.01;

pub const DEFAULT_PERTURBATION_PCT: f64 = 0.1;
pub const DEFAULT_MARGINAL_STEP_PCT: f64 = 0.01;
pub const MROAS_INCREASE_THRESHOLD: f64 = 1.5;
pub const MROAS_MAINTAIN_THRESHOLD: f64 = 1.0;

