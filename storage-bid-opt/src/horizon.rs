use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use storage_model::market::DateSeries;
use tracing::debug;

use crate::error::{BidError, BidResult};

/// Inclusive forecast window of the auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastWindow {
    pub since: NaiveDate,
    pub till: NaiveDate,
}

impl ForecastWindow {
    pub fn new(since: NaiveDate, till: NaiveDate) -> Self {
        Self { since, till }
    }

    /// Whole days between `since` and `till`.
    pub fn day_span(&self) -> i64 {
        (self.till - self.since).num_days()
    }
}

/// Number of trading days the model optimizes over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Horizon {
    pub steps: usize,
    /// Demand dates without a price, i.e. days without a trading session.
    pub excluded_dates: Vec<NaiveDate>,
}

impl Horizon {
    /// `T = (till - since).days - |demand dates without price| + 1`
    pub fn resolve(
        window: ForecastWindow,
        prices: &DateSeries,
        demand: &DateSeries,
    ) -> BidResult<Self> {
        if window.till < window.since {
            return Err(BidError::InvalidRange(format!(
                "forecast ends on {} before it starts on {}",
                window.till, window.since
            )));
        }

        let excluded_dates = demand.dates_missing_from(prices);
        let steps = window.day_span() - excluded_dates.len() as i64 + 1;
        if steps <= 0 {
            return Err(BidError::InvalidRange(format!(
                "window {}..={} leaves {} trading days after excluding {} non-trading dates",
                window.since,
                window.till,
                steps,
                excluded_dates.len()
            )));
        }

        debug!(steps, excluded = excluded_dates.len(), "resolved forecast horizon");
        Ok(Self {
            steps: steps as usize,
            excluded_dates,
        })
    }

    /// First `steps` values of `series`, positionally.
    pub fn take(&self, series: &DateSeries, label: &str) -> BidResult<Vec<f64>> {
        if series.len() < self.steps {
            return Err(BidError::Structural(format!(
                "{} has {} values, the horizon needs {}",
                label,
                series.len(),
                self.steps
            )));
        }
        Ok(series.points[..self.steps].iter().map(|point| point.value).collect())
    }

    /// Restricts `series` to the dates traded in `prices`, then takes the
    /// first `steps` values.
    pub fn take_aligned(
        &self,
        series: &DateSeries,
        prices: &DateSeries,
        label: &str,
    ) -> BidResult<Vec<f64>> {
        self.take(&series.restricted_to(prices), label)
    }
}
