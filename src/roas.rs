//! Return-on-ad-spend metrics: average, incremental and marginal.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_MARGINAL_STEP_PCT, MROAS_INCREASE_THRESHOLD, MROAS_MAINTAIN_THRESHOLD,
};
use crate::model::MarketingMixModel;
use crate::types::{AllocationPlan, Channel, MmmError};

/// Attributed revenue per unit of spend; zero when nothing was spent.
pub fn calculate_channel_roas(spend: f64, contribution: f64) -> f64 {
    if spend <= 0.0 {
        0.0
    } else {
        contribution / spend
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelRoas {
    pub channel: String,
    pub total_spend: f64,
    pub total_contribution: f64,
    pub roas: f64,
    /// Share of all media contribution.
    pub contribution_share: f64,
}

/// Window-level ROAS for every channel of a fitted model, in model order.
pub fn channel_roas_summary(model: &MarketingMixModel) -> Vec<ChannelRoas> {
    let decomposition = model.decomposition();
    let media_total: f64 = decomposition.channels.iter().map(|c| c.total()).sum();
    model
        .channels()
        .iter()
        .zip(decomposition.channels.iter())
        .map(|(channel, component)| {
            let total_spend: f64 = channel.spend.iter().sum();
            let total_contribution = component.total();
            ChannelRoas {
                channel: channel.name.clone(),
                total_spend,
                total_contribution,
                roas: calculate_channel_roas(total_spend, total_contribution),
                contribution_share: if media_total > 0.0 {
                    total_contribution / media_total
                } else {
                    0.0
                },
            }
        })
        .collect()
}

/// Counterfactual comparison of a channel's window with and without its spend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncrementalRoas {
    pub channel: String,
    pub total_spend: f64,
    pub sales_with: f64,
    pub sales_without: f64,
    pub incremental_sales: f64,
    pub iroas: f64,
    /// Incremental sales relative to the counterfactual, in percent.
    pub lift_pct: f64,
}

pub fn calculate_incremental_roas(
    model: &MarketingMixModel,
    channel: &str,
) -> Result<IncrementalRoas, MmmError> {
    let ch = model
        .channel(channel)
        .ok_or_else(|| MmmError::UnknownChannel(channel.to_string()))?;
    let sales_with: f64 = model.predict_observed()?.iter().sum();
    let sales_without: f64 = model.predict_without(channel)?.iter().sum();
    let incremental_sales = sales_with - sales_without;
    let total_spend: f64 = ch.spend.iter().sum();
    Ok(IncrementalRoas {
        channel: channel.to_string(),
        total_spend,
        sales_with,
        sales_without,
        incremental_sales,
        iroas: calculate_channel_roas(total_spend, incremental_sales),
        lift_pct: if sales_without.abs() > 0.0 {
            100.0 * incremental_sales / sales_without
        } else {
            0.0
        },
    })
}

pub fn incremental_roas_summary(
    model: &MarketingMixModel,
) -> Result<Vec<IncrementalRoas>, MmmError> {
    model
        .channels()
        .iter()
        .map(|c| calculate_incremental_roas(model, &c.name))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendRecommendation {
    Increase,
    Maintain,
    Decrease,
}

impl SpendRecommendation {
    pub fn from_marginal_roas(mroas: f64) -> Self {
        if mroas > MROAS_INCREASE_THRESHOLD {
            Self::Increase
        } else if mroas > MROAS_MAINTAIN_THRESHOLD {
            Self::Maintain
        } else {
            Self::Decrease
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginalRoas {
    pub channel: String,
    pub spend: f64,
    pub marginal_roas: f64,
    pub recommendation: SpendRecommendation,
}

/// Finite-difference slope of the channel's response at `current_spend`.
///
/// Central difference with a step of 1% of spend; at zero spend, a forward
/// difference with a step of 1% of the half-saturation spend.
pub fn calculate_marginal_roas(
    channel: &Channel,
    current_spend: f64,
) -> Result<MarginalRoas, MmmError> {
    if !current_spend.is_finite() || current_spend < 0.0 {
        return Err(MmmError::InvalidParameter(format!(
            "spend must be finite and non-negative, got {current_spend}"
        )));
    }
    let marginal_roas = if current_spend > 0.0 {
        let h = current_spend * DEFAULT_MARGINAL_STEP_PCT;
        (channel.response(current_spend + h) - channel.response(current_spend - h)) / (2.0 * h)
    } else {
        let h = channel.half_saturation_spend() * DEFAULT_MARGINAL_STEP_PCT;
        (channel.response(h) - channel.response(0.0)) / h
    };
    Ok(MarginalRoas {
        channel: channel.name.clone(),
        spend: current_spend,
        marginal_roas,
        recommendation: SpendRecommendation::from_marginal_roas(marginal_roas),
    })
}

/// Marginal ROAS of every channel at the plan's spend, highest first.
pub fn marginal_roas_for_plan(
    channels: &[Channel],
    plan: &AllocationPlan,
) -> Result<Vec<MarginalRoas>, MmmError> {
    let spend = plan.aligned_to(channels)?;
    let mut out = channels
        .iter()
        .zip(spend.iter())
        .map(|(c, &s)| calculate_marginal_roas(c, s))
        .collect::<Result<Vec<_>, MmmError>>()?;
    out.sort_by(|a, b| {
        b.marginal_roas
            .partial_cmp(&a.marginal_roas)
            .unwrap_or(Ordering::Equal)
    });
    Ok(out)
}
