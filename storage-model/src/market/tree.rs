use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::market::series::ScenarioSet;

/// Price and demand scenarios for the multi-stage market.
///
/// The day-ahead stage is the cross product of `day_ahead_prices` and
/// `day_ahead_demand`. Every day-ahead scenario is further crossed with the
/// within-day price scenarios and with the within-day demand realizations that
/// belong to its day-ahead demand member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./market.ts")]
pub struct ScenarioTree {
    /// Day-ahead price scenarios.
    pub day_ahead_prices: ScenarioSet,
    /// Day-ahead demand scenarios.
    pub day_ahead_demand: ScenarioSet,
    /// Within-day price scenarios, independent of the day-ahead draw.
    pub within_day_prices: ScenarioSet,
    /// Within-day demand realizations; entry `j` holds the realizations
    /// conditional on day-ahead demand scenario `j`.
    pub within_day_demand: Vec<ScenarioSet>,
}

impl ScenarioTree {
    /// Number of within-day demand realizations per day-ahead demand scenario,
    /// taken from the first conditional set.
    pub fn within_day_demand_count(&self) -> usize {
        self.within_day_demand.first().map_or(0, ScenarioSet::len)
    }
}
