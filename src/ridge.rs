use linfa::dataset::Dataset;
use linfa::traits::Fit;
use linfa_linear::LinearRegression;
use ndarray::{s, Array1, Array2, Axis};

use crate::types::MmmError;

/// Columns with a standard deviation below this carry no signal and get a zero coefficient.
const MIN_COLUMN_STD: f64 = 1e-12;

/// Ridge coefficients on the original column scale.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RidgeFit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Augment design matrix and target for ridge regression via Tikhonov method.
///
/// Solving `min ||[X; sqrt(λ)I]β - [y; 0]||²` with ordinary least squares is
/// equivalent to `min ||Xβ - y||² + λ||β||²`.
fn augment_for_ridge(
    x_raw: &Array2<f64>,
    y: &Array1<f64>,
    lambda: f64,
) -> (Array2<f64>, Array1<f64>) {
    if lambda <= 0.0 {
        return (x_raw.clone(), y.clone());
    }

    let (n, p) = x_raw.dim();
    let sqrt_l = lambda.sqrt();

    let mut x_aug = Array2::<f64>::zeros((n + p, p));
    x_aug.slice_mut(s![0..n, ..]).assign(x_raw);
    for j in 0..p {
        x_aug[[n + j, j]] = sqrt_l;
    }

    let mut y_aug = Array1::<f64>::zeros(n + p);
    y_aug.slice_mut(s![0..n]).assign(y);

    (x_aug, y_aug)
}

/// Fit `y ≈ intercept + X β` with an L2 penalty on β.
///
/// Columns are centred (and scaled to unit variance when `standardize` is set) before
/// penalizing, and the intercept is recovered from the means so it is never shrunk.
/// Columns flagged inactive, or with no variance, are left out and get a zero
/// coefficient.
pub(crate) fn fit_ridge(
    x: &Array2<f64>,
    y: &Array1<f64>,
    lambda: f64,
    standardize: bool,
    active: &[bool],
) -> Result<RidgeFit, MmmError> {
    let (n, p) = x.dim();
    if n == 0 {
        return Err(MmmError::EmptyInput);
    }
    if y.len() != n {
        return Err(MmmError::DimensionMismatch {
            expected: n,
            found: y.len(),
        });
    }
    if active.len() != p {
        return Err(MmmError::DimensionMismatch {
            expected: p,
            found: active.len(),
        });
    }
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(MmmError::InvalidParameter(format!(
            "ridge lambda must be finite and non-negative, got {lambda}"
        )));
    }

    let y_mean = y.mean().unwrap_or(0.0);
    let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
    let stds = x.std_axis(Axis(0), 0.0);

    let used: Vec<usize> = (0..p)
        .filter(|&j| active[j] && stds[j] > MIN_COLUMN_STD)
        .collect();
    if used.is_empty() {
        return Ok(RidgeFit {
            coefficients: vec![0.0; p],
            intercept: y_mean,
        });
    }

    let scales: Vec<f64> = used
        .iter()
        .map(|&j| if standardize { stds[j] } else { 1.0 })
        .collect();
    let mut x_used = Array2::<f64>::zeros((n, used.len()));
    for (k, &j) in used.iter().enumerate() {
        for r in 0..n {
            x_used[[r, k]] = (x[[r, j]] - means[j]) / scales[k];
        }
    }
    let y_centered = y.mapv(|v| v - y_mean);

    let (x_fit, y_fit) = augment_for_ridge(&x_used, &y_centered, lambda);
    let dataset = Dataset::new(x_fit, y_fit);
    let fitted = LinearRegression::new()
        .with_intercept(false)
        .fit(&dataset)
        .map_err(|e| MmmError::Linalg(format!("{:?}", e)))?;

    let mut coefficients = vec![0.0; p];
    for (k, &j) in used.iter().enumerate() {
        let beta = fitted.params()[k] / scales[k];
        if !beta.is_finite() {
            return Err(MmmError::Linalg(format!(
                "non-finite coefficient for column {j}"
            )));
        }
        coefficients[j] = beta;
    }
    let intercept = y_mean
        - used
            .iter()
            .map(|&j| coefficients[j] * means[j])
            .sum::<f64>();

    Ok(RidgeFit {
        coefficients,
        intercept,
    })
}

/// Compute RMSE and R² metrics.
pub(crate) fn compute_metrics(y_actual: &Array1<f64>, y_pred: &Array1<f64>) -> (f64, f64) {
    let n = y_actual.len() as f64;

    let ss_res: f64 = y_actual
        .iter()
        .zip(y_pred.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    let rmse = (ss_res / n).sqrt();

    let y_mean = y_actual.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_actual.iter().map(|&v| (v - y_mean).powi(2)).sum();
    let r2 = 1.0 - ss_res / ss_tot.max(1e-12);

    (rmse, r2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design() -> (Array2<f64>, Array1<f64>) {
        let x1 = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let x2 = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let mut x = Array2::<f64>::zeros((8, 2));
        let mut y = Array1::<f64>::zeros(8);
        for r in 0..8 {
            x[[r, 0]] = x1[r];
            x[[r, 1]] = x2[r];
            y[r] = 10.0 + 2.0 * x1[r] + 0.5 * x2[r];
        }
        (x, y)
    }

    #[test]
    fn test_ridge_augmentation() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let y = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let lambda = 0.5;

        let (x_aug, y_aug) = augment_for_ridge(&x, &y, lambda);

        assert_eq!(x_aug.shape(), &[5, 2]);
        assert_eq!(y_aug.len(), 5);
        assert_eq!(x_aug[[0, 1]], 2.0);
        assert!((x_aug[[3, 0]] - lambda.sqrt()).abs() < 1e-10);
        assert!((x_aug[[4, 1]] - lambda.sqrt()).abs() < 1e-10);
        assert!(x_aug[[3, 1]].abs() < 1e-10);
        assert_eq!(y_aug[4], 0.0);
    }

    #[test]
    fn test_unpenalized_fit_recovers_coefficients() {
        let (x, y) = design();
        let fit = fit_ridge(&x, &y, 0.0, true, &[true, true]).unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((fit.coefficients[1] - 0.5).abs() < 1e-6);
        assert!((fit.intercept - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let (x, y) = design();
        let ols = fit_ridge(&x, &y, 0.0, true, &[true, true]).unwrap();
        let ridge = fit_ridge(&x, &y, 5.0, true, &[true, true]).unwrap();
        let norm = |f: &RidgeFit| f.coefficients.iter().map(|c| c * c).sum::<f64>();
        assert!(norm(&ridge) < norm(&ols));
    }

    #[test]
    fn test_inactive_and_constant_columns() {
        let (mut x, y) = design();
        let fit = fit_ridge(&x, &y, 0.1, true, &[true, false]).unwrap();
        assert_eq!(fit.coefficients[1], 0.0);

        x.column_mut(1).fill(4.0);
        let fit = fit_ridge(&x, &y, 0.1, false, &[true, true]).unwrap();
        assert_eq!(fit.coefficients[1], 0.0);

        let fit = fit_ridge(&x, &y, 0.1, true, &[false, false]).unwrap();
        assert!((fit.intercept - y.mean().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_fit_validation() {
        let (x, y) = design();
        assert!(matches!(
            fit_ridge(&x, &y, 1.0, true, &[true]),
            Err(MmmError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            fit_ridge(&x, &y, -1.0, true, &[true, true]),
            Err(MmmError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_metrics_perfect_fit() {
        let y = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let (rmse, r2) = compute_metrics(&y, &y);
        assert_eq!(rmse, 0.0);
        assert!((r2 - 1.0).abs() < 1e-12);
    }
}
