use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::MmmError;

/// One period of observed sales and per-channel spend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub total_sales: f64,
    /// Spend per channel, in the window's channel order.
    pub spend: Vec<f64>,
}

/// Time-ordered observations for a fixed set of channels. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationWindow {
    channel_names: Vec<String>,
    records: Vec<Observation>,
}

impl ObservationWindow {
    /// Validate and wrap observation records.
    ///
    /// # Errors
    /// `EmptyInput` without records or channels, `DimensionMismatch` when a record's
    /// spend vector does not have one entry per channel, `InvalidParameter` for
    /// non-increasing dates, non-finite values or negative spend.
    pub fn new(channel_names: Vec<String>, records: Vec<Observation>) -> Result<Self, MmmError> {
        if records.is_empty() || channel_names.is_empty() {
            return Err(MmmError::EmptyInput);
        }
        for (i, name) in channel_names.iter().enumerate() {
            if channel_names[..i].contains(name) {
                return Err(MmmError::InvalidParameter(format!(
                    "duplicate channel name '{name}'"
                )));
            }
        }
        for (i, rec) in records.iter().enumerate() {
            if rec.spend.len() != channel_names.len() {
                return Err(MmmError::DimensionMismatch {
                    expected: channel_names.len(),
                    found: rec.spend.len(),
                });
            }
            if !rec.total_sales.is_finite() {
                return Err(MmmError::InvalidParameter(format!(
                    "sales on {} is not finite",
                    rec.date
                )));
            }
            if rec.spend.iter().any(|s| !s.is_finite() || *s < 0.0) {
                return Err(MmmError::InvalidParameter(format!(
                    "spend on {} must be finite and non-negative",
                    rec.date
                )));
            }
            if i > 0 && rec.date <= records[i - 1].date {
                return Err(MmmError::InvalidParameter(format!(
                    "dates must be strictly increasing ({} follows {})",
                    rec.date,
                    records[i - 1].date
                )));
            }
        }
        Ok(Self {
            channel_names,
            records,
        })
    }

    /// Build a window from column-oriented data (one spend column per channel).
    pub fn from_columns(
        channel_names: Vec<String>,
        dates: &[NaiveDate],
        sales: &[f64],
        spend: &[Vec<f64>],
    ) -> Result<Self, MmmError> {
        if spend.len() != channel_names.len() {
            return Err(MmmError::DimensionMismatch {
                expected: channel_names.len(),
                found: spend.len(),
            });
        }
        let n = validate_aligned(spend, Some(sales))?;
        if dates.len() != n {
            return Err(MmmError::DimensionMismatch {
                expected: n,
                found: dates.len(),
            });
        }
        let records = (0..n)
            .map(|t| Observation {
                date: dates[t],
                total_sales: sales[t],
                spend: spend.iter().map(|col| col[t]).collect(),
            })
            .collect();
        Self::new(channel_names, records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn records(&self) -> &[Observation] {
        &self.records
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channel_names.iter().position(|c| c == name)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn sales(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.total_sales).collect()
    }

    pub fn spend_series(&self, channel: usize) -> Option<Vec<f64>> {
        if channel >= self.channel_names.len() {
            return None;
        }
        Some(self.records.iter().map(|r| r.spend[channel]).collect())
    }
}

/// Check that all series (and the optional target) share one length, and return it.
///
/// # Errors
/// `EmptyInput` for no series or zero-length series, `DimensionMismatch` otherwise.
pub(crate) fn validate_aligned(
    series: &[Vec<f64>],
    target: Option<&[f64]>,
) -> Result<usize, MmmError> {
    let len = match (series.first(), target) {
        (Some(first), _) => first.len(),
        (None, Some(t)) => t.len(),
        (None, None) => return Err(MmmError::EmptyInput),
    };
    if len == 0 {
        return Err(MmmError::EmptyInput);
    }
    for s in series.iter() {
        if s.len() != len {
            return Err(MmmError::DimensionMismatch {
                expected: len,
                found: s.len(),
            });
        }
    }
    if let Some(t) = target {
        if t.len() != len {
            return Err(MmmError::DimensionMismatch {
                expected: len,
                found: t.len(),
            });
        }
    }
    Ok(len)
}
