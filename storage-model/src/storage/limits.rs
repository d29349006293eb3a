use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ParameterError;

/// Caps on the traded volume per time step.
///
/// Buying is a positive trade, selling a negative one. `None` leaves that
/// side of the trade unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./storage.ts")]
pub struct TradeLimits {
    /// Maximum volume bought in one time step.
    pub buying: Option<f64>,
    /// Maximum volume sold in one time step.
    pub selling: Option<f64>,
}

impl TradeLimits {
    /// Same cap for buying and selling.
    pub fn symmetric(limit: f64) -> Self {
        Self {
            buying: Some(limit),
            selling: Some(limit),
        }
    }

    pub fn asymmetric(buying: f64, selling: f64) -> Self {
        Self {
            buying: Some(buying),
            selling: Some(selling),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Lower bound of the trading variable (`-selling`).
    pub fn lower_bound(&self) -> f64 {
        self.selling.map_or(f64::NEG_INFINITY, |limit| -limit)
    }

    /// Upper bound of the trading variable (`buying`).
    pub fn upper_bound(&self) -> f64 {
        self.buying.unwrap_or(f64::INFINITY)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, limit) in [("limit_buying", self.buying), ("limit_selling", self.selling)] {
            if let Some(value) = limit {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(ParameterError::Negative { name, value });
                }
            }
        }
        Ok(())
    }
}
