//! End-to-end model: adstock, saturation and attribution over one observation window.

use std::thread;

use tracing::{debug, info};

use crate::adstock::{adstock, AdstockedSeries};
use crate::data::ObservationWindow;
use crate::decomposition::{decompose_sales_with, DecompositionResult};
use crate::design::ControlSet;
use crate::saturation::{fit_hill_saturation_with, HillCurve, HillFit, SaturatedResponse};
use crate::types::{Channel, ChannelSpec, FitOptions, MmmError, ModelConfig, SaturationSpec};

/// A fitted marketing mix model.
///
/// Channels carry their fitted curves and the betas estimated by the decomposition,
/// so they can be handed straight to the optimizer.
#[derive(Clone, Debug)]
pub struct MarketingMixModel {
    channels: Vec<Channel>,
    curve_fits: Vec<Option<HillFit>>,
    controls: ControlSet,
    decomposition: DecompositionResult,
}

/// Adstocked series and resolved curve for one configured channel.
struct PreparedChannel {
    spend: Vec<f64>,
    adstocked: AdstockedSeries,
    curve: HillCurve,
    fit: Option<HillFit>,
}

impl MarketingMixModel {
    /// Fit every configured channel against `window` and decompose its sales.
    ///
    /// Curve fits are independent per channel and are all joined before the
    /// decomposition runs.
    ///
    /// # Errors
    /// `EmptyInput` with no channels configured, `UnknownChannel` for a channel missing
    /// from the window, fit and decomposition errors otherwise.
    pub fn fit(window: &ObservationWindow, config: &ModelConfig) -> Result<Self, MmmError> {
        if config.channels.is_empty() {
            return Err(MmmError::EmptyInput);
        }
        let sales = window.sales();
        let sales_floor = sales.iter().copied().fold(f64::INFINITY, f64::min);
        let response: Vec<f64> = sales.iter().map(|s| s - sales_floor).collect();

        let mut inputs = Vec::with_capacity(config.channels.len());
        for (idx, spec) in config.channels.iter().enumerate() {
            let column = window
                .channel_index(&spec.name)
                .ok_or_else(|| MmmError::UnknownChannel(spec.name.clone()))?;
            let spend = window
                .spend_series(column)
                .ok_or_else(|| MmmError::UnknownChannel(spec.name.clone()))?;
            let fit_opts = FitOptions {
                seed: config.fit.seed.wrapping_add(idx as u64),
                ..config.fit.clone()
            };
            inputs.push((spec, spend, fit_opts));
        }

        let prepared: Vec<PreparedChannel> = if config.parallel_fit {
            thread::scope(|scope| {
                let handles: Vec<_> = inputs
                    .iter()
                    .map(|(spec, spend, fit_opts)| {
                        let response = &response;
                        let normalize = config.normalize_adstock;
                        let handle = scope.spawn(move || {
                            prepare_channel(spec, spend, response, normalize, fit_opts)
                        });
                        (spec.name.clone(), handle)
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(name, handle)| {
                        handle
                            .join()
                            .map_err(|_| MmmError::WorkerPanicked(name))?
                    })
                    .collect::<Result<Vec<_>, MmmError>>()
            })?
        } else {
            inputs
                .iter()
                .map(|(spec, spend, fit_opts)| {
                    prepare_channel(spec, spend, &response, config.normalize_adstock, fit_opts)
                })
                .collect::<Result<Vec<_>, MmmError>>()?
        };

        let saturated: Vec<SaturatedResponse> = prepared
            .iter()
            .map(|p| SaturatedResponse {
                channel: p.adstocked.channel.clone(),
                values: p.curve.apply_series(&p.adstocked.values),
            })
            .collect();
        let controls = ControlSet::from_spec(&config.controls, window.len())?;
        let decomposition =
            decompose_sales_with(&saturated, &sales, &controls, &config.decomposition)?;

        let mut channels = Vec::with_capacity(prepared.len());
        let mut curve_fits = Vec::with_capacity(prepared.len());
        for (idx, (p, spec)) in prepared.into_iter().zip(config.channels.iter()).enumerate() {
            let beta = decomposition.channels[idx].coefficient;
            let channel = Channel::new(idx, spec.name.clone(), spec.decay_rate, p.curve, beta)?
                .with_spend(p.spend)
                .with_bounds(spec.bounds)
                .with_share_bounds(spec.share)
                .with_normalized_adstock(config.normalize_adstock);
            channels.push(channel);
            curve_fits.push(p.fit);
        }

        info!(
            channels = channels.len(),
            periods = window.len(),
            r2 = decomposition.r2,
            rmse = decomposition.rmse,
            clipped = decomposition.clipped_channels.len(),
            "marketing mix model fitted"
        );

        Ok(Self {
            channels,
            curve_fits,
            controls,
            decomposition,
        })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn decomposition(&self) -> &DecompositionResult {
        &self.decomposition
    }

    pub fn controls(&self) -> &ControlSet {
        &self.controls
    }

    /// The saturation fit for `name`; `None` for fixed curves or unknown channels.
    pub fn curve_fit(&self, name: &str) -> Option<&HillFit> {
        let idx = self.channels.iter().position(|c| c.name == name)?;
        self.curve_fits[idx].as_ref()
    }

    /// Predicted sales for alternative spend series over the fitted window.
    ///
    /// `spend` holds one series per channel in model order; controls and the baseline
    /// stay at their in-sample values.
    pub fn predict(&self, spend: &[Vec<f64>]) -> Result<Vec<f64>, MmmError> {
        if spend.len() != self.channels.len() {
            return Err(MmmError::DimensionMismatch {
                expected: self.channels.len(),
                found: spend.len(),
            });
        }
        let n = self.decomposition.n_periods();
        let mut prediction: Vec<f64> = (0..n)
            .map(|t| {
                self.decomposition.baseline
                    + self
                        .decomposition
                        .controls
                        .iter()
                        .map(|c| c.values[t])
                        .sum::<f64>()
            })
            .collect();

        for (channel, series) in self.channels.iter().zip(spend.iter()) {
            if series.len() != n {
                return Err(MmmError::DimensionMismatch {
                    expected: n,
                    found: series.len(),
                });
            }
            let adstocked = adstock(series, channel.decay_rate, channel.normalize_adstock)?;
            for (p, a) in prediction.iter_mut().zip(adstocked.iter()) {
                *p += channel.beta * channel.saturation.apply(*a);
            }
        }
        Ok(prediction)
    }

    /// Predicted sales with `channel`'s spend zeroed and every other channel as observed.
    pub fn predict_without(&self, channel: &str) -> Result<Vec<f64>, MmmError> {
        if self.channel(channel).is_none() {
            return Err(MmmError::UnknownChannel(channel.to_string()));
        }
        let spend: Vec<Vec<f64>> = self
            .channels
            .iter()
            .map(|c| {
                if c.name == channel {
                    vec![0.0; c.spend.len()]
                } else {
                    c.spend.clone()
                }
            })
            .collect();
        self.predict(&spend)
    }

    /// In-sample prediction at the observed spend.
    pub fn predict_observed(&self) -> Result<Vec<f64>, MmmError> {
        let spend: Vec<Vec<f64>> = self.channels.iter().map(|c| c.spend.clone()).collect();
        self.predict(&spend)
    }
}

fn prepare_channel(
    spec: &ChannelSpec,
    spend: &[f64],
    response: &[f64],
    normalize: bool,
    fit_opts: &FitOptions,
) -> Result<PreparedChannel, MmmError> {
    let adstocked = AdstockedSeries {
        channel: spec.name.clone(),
        values: adstock(spend, spec.decay_rate, normalize)?,
    };
    let (curve, fit) = match &spec.saturation {
        SaturationSpec::Fixed(curve) => (*curve, None),
        SaturationSpec::Fit => {
            let fit = fit_hill_saturation_with(&adstocked.values, response, fit_opts)?;
            debug!(
                channel = %spec.name,
                alpha = fit.curve.alpha(),
                gamma = fit.curve.gamma(),
                r2 = fit.r2,
                "channel saturation fitted"
            );
            (fit.curve, Some(fit))
        }
    };
    Ok(PreparedChannel {
        spend: spend.to_vec(),
        adstocked,
        curve,
        fit,
    })
}
