//! Adstock transformations: carryover of past spend into present response.
//!
//! Normalization convention: a normalized geometric adstock is the recurrence output
//! divided by the geometric-series sum `1 / (1 - decay)`, so a unit impulse carries a
//! total mass of 1 and a constant spend series converges to itself.

use serde::{Deserialize, Serialize};

use crate::types::MmmError;

/// Adstocked spend for one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdstockedSeries {
    pub channel: String,
    pub values: Vec<f64>,
}

pub(crate) fn validate_decay(decay_rate: f64) -> Result<(), MmmError> {
    if !(0.0..1.0).contains(&decay_rate) {
        return Err(MmmError::InvalidParameter(format!(
            "decay rate must be in [0, 1), got {decay_rate}"
        )));
    }
    Ok(())
}

/// Geometric adstock.
///
/// Formula: `adstock[0] = spend[0]`, `adstock[t] = spend[t] + decay_rate * adstock[t-1]`,
/// scaled by `1 - decay_rate` when `normalize` is set.
///
/// # Errors
/// `InvalidParameter` if `decay_rate` is outside `[0, 1)`.
pub fn adstock(spend: &[f64], decay_rate: f64, normalize: bool) -> Result<Vec<f64>, MmmError> {
    validate_decay(decay_rate)?;
    let mut out = Vec::with_capacity(spend.len());
    let mut carry = 0.0;
    for &s in spend {
        carry = s + decay_rate * carry;
        out.push(carry);
    }
    if normalize {
        let scale = 1.0 - decay_rate;
        for v in out.iter_mut() {
            *v *= scale;
        }
    }
    Ok(out)
}

/// Decay weights `[decay^0, decay^1, ..., decay^(horizon-1)]` for diagnostics.
pub fn get_adstock_curve(decay_rate: f64, horizon: usize) -> Result<Vec<f64>, MmmError> {
    validate_decay(decay_rate)?;
    let mut weights = Vec::with_capacity(horizon);
    let mut w = 1.0;
    for _ in 0..horizon {
        weights.push(w);
        w *= decay_rate;
    }
    Ok(weights)
}

/// Level a constant per-period spend of 1 converges to under geometric adstock.
pub fn steady_state_multiplier(decay_rate: f64, normalize: bool) -> f64 {
    if normalize {
        1.0
    } else {
        1.0 / (1.0 - decay_rate)
    }
}

/// Finite and infinite carryover kernels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AdstockKernel {
    Geometric { decay_rate: f64, normalize: bool },
    /// Discretized Weibull lag distribution; `shape > 1` delays the peak effect.
    ///
    /// The distribution starts `peak_delay` periods after the spend, so earlier lags
    /// carry no weight.
    Weibull {
        shape: f64,
        scale: f64,
        max_lag: usize,
        #[serde(default)]
        peak_delay: usize,
    },
    /// Geometric retention truncated at `max_lag` periods.
    Delayed { theta: f64, max_lag: usize },
    /// Build-up to a peak at lag `peak`, then geometric decay.
    ///
    /// Before the peak the weight is `(lag / peak)^concentration`, so a larger
    /// `concentration` sharpens the peak. After it the weight falls by `decay` per
    /// period. The kernel spans `peak + 20 / (1 - decay)` lags.
    Carryover {
        peak: usize,
        decay: f64,
        concentration: f64,
    },
}

impl AdstockKernel {
    pub fn validate(&self) -> Result<(), MmmError> {
        match *self {
            Self::Geometric { decay_rate, .. } => validate_decay(decay_rate),
            Self::Weibull {
                shape,
                scale,
                max_lag,
                peak_delay,
            } => {
                if !(shape > 0.0 && scale > 0.0) || !shape.is_finite() || !scale.is_finite() {
                    return Err(MmmError::InvalidParameter(format!(
                        "weibull shape and scale must be positive, got shape={shape}, scale={scale}"
                    )));
                }
                if max_lag <= peak_delay {
                    return Err(MmmError::InvalidParameter(format!(
                        "weibull max_lag must exceed peak_delay {peak_delay}, got {max_lag}"
                    )));
                }
                Ok(())
            }
            Self::Delayed { theta, max_lag } => {
                validate_decay(theta)?;
                if max_lag == 0 {
                    return Err(MmmError::InvalidParameter(
                        "delayed adstock max_lag must be at least 1".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Carryover {
                decay,
                concentration,
                ..
            } => {
                validate_decay(decay)?;
                if !(concentration.is_finite() && concentration > 0.0) {
                    return Err(MmmError::InvalidParameter(format!(
                        "carryover concentration must be positive, got {concentration}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Lag weights, index 0 applying to the current period.
    pub fn weights(&self, horizon: usize) -> Result<Vec<f64>, MmmError> {
        self.validate()?;
        match *self {
            Self::Geometric {
                decay_rate,
                normalize,
            } => {
                let mut w = get_adstock_curve(decay_rate, horizon)?;
                if normalize {
                    for v in w.iter_mut() {
                        *v *= 1.0 - decay_rate;
                    }
                }
                Ok(w)
            }
            Self::Weibull {
                shape,
                scale,
                max_lag,
                peak_delay,
            } => {
                let cdf = |t: f64| 1.0 - (-(t / scale).powf(shape)).exp();
                let raw: Vec<f64> = (0..max_lag)
                    .map(|l| match l.checked_sub(peak_delay) {
                        Some(k) => cdf(k as f64 + 1.0) - cdf(k as f64),
                        None => 0.0,
                    })
                    .collect();
                Ok(truncate(normalized(raw), horizon))
            }
            Self::Delayed { theta, max_lag } => {
                let raw = get_adstock_curve(theta, max_lag)?;
                Ok(truncate(normalized(raw), horizon))
            }
            Self::Carryover {
                peak,
                decay,
                concentration,
            } => {
                let span = peak + (20.0 / (1.0 - decay)) as usize;
                let raw: Vec<f64> = (0..span)
                    .map(|l| {
                        if l > peak {
                            decay.powi((l - peak) as i32)
                        } else if peak == 0 {
                            1.0
                        } else {
                            (l as f64 / peak as f64).powf(concentration)
                        }
                    })
                    .collect();
                Ok(truncate(normalized(raw), horizon))
            }
        }
    }

    /// Convolve a spend series with this kernel.
    pub fn apply(&self, spend: &[f64]) -> Result<Vec<f64>, MmmError> {
        if let Self::Geometric {
            decay_rate,
            normalize,
        } = *self
        {
            return adstock(spend, decay_rate, normalize);
        }
        let weights = self.weights(spend.len())?;
        let mut out = vec![0.0; spend.len()];
        for (t, slot) in out.iter_mut().enumerate() {
            *slot = weights
                .iter()
                .enumerate()
                .take(t + 1)
                .map(|(lag, &w)| w * spend[t - lag])
                .sum();
        }
        Ok(out)
    }
}

fn normalized(mut weights: Vec<f64>) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights.iter_mut() {
            *w /= sum;
        }
    }
    weights
}

fn truncate(mut weights: Vec<f64>, horizon: usize) -> Vec<f64> {
    weights.truncate(horizon);
    weights
}
