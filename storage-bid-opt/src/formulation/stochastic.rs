//! Scenario-tree auctions with a day-ahead and a within-day stage.
//!
//! The day-ahead stage trades once per `(price, demand)` scenario. Every
//! within-day scenario trades the deviation from its parent's day-ahead
//! schedule against a within-day price and a demand realization drawn from
//! the parent's demand member. Capacity and the settlement mode are shared
//! by all scenarios.

use storage_model::market::{DateSeries, ScenarioSet, ScenarioTree};
use storage_model::storage::{
    FlexibleStochasticParameters, FormulationKind, StochasticParameters, TradeLimits,
};
use tracing::debug;

use crate::config::OptimizerConfig;
use crate::error::{BidError, BidResult};
use crate::formulation::solve_model;
use crate::horizon::{ForecastWindow, Horizon};
use crate::model::{
    CapacitySpec, FlowSpec, MarketData, MultiplierSpec, StorageModel, SurchargeSpec, TreeMarket,
};
use crate::result::{OptimizationResult, OutputSelection};
use crate::scenario::ScenarioIndexMapper;

fn first_member<'a>(set: &'a ScenarioSet, label: &str) -> BidResult<&'a DateSeries> {
    set.first()
        .ok_or_else(|| BidError::Structural(format!("{} has no scenario", label)))
}

/// Checks the tree shape and cuts every member to the horizon.
pub fn resolve_tree(
    window: ForecastWindow,
    tree: &ScenarioTree,
) -> BidResult<(Horizon, TreeMarket)> {
    let reference_prices = first_member(&tree.day_ahead_prices, "day-ahead prices")?;
    let reference_demand = first_member(&tree.day_ahead_demand, "day-ahead demand")?;
    first_member(&tree.within_day_prices, "within-day prices")?;

    if tree.within_day_demand.len() != tree.day_ahead_demand.len() {
        return Err(BidError::Structural(format!(
            "{} within-day demand sets for {} day-ahead demand scenarios",
            tree.within_day_demand.len(),
            tree.day_ahead_demand.len()
        )));
    }
    let realizations = tree.within_day_demand_count();
    if realizations == 0 || tree.within_day_demand.iter().any(|set| set.len() != realizations) {
        return Err(BidError::Structural(
            "within-day demand sets need one shared, positive realization count".to_string(),
        ));
    }

    let price_dates = reference_prices.date_set();
    if tree.day_ahead_prices.iter().any(|member| member.date_set() != price_dates) {
        return Err(BidError::Structural(
            "day-ahead price scenarios cover different dates".to_string(),
        ));
    }

    let horizon = Horizon::resolve(window, reference_prices, reference_demand)?;

    let day_ahead_prices = tree
        .day_ahead_prices
        .iter()
        .map(|member| horizon.take(member, "day-ahead prices"))
        .collect::<BidResult<Vec<_>>>()?;
    let day_ahead_demand = tree
        .day_ahead_demand
        .iter()
        .map(|member| horizon.take_aligned(member, reference_prices, "day-ahead demand"))
        .collect::<BidResult<Vec<_>>>()?;
    let within_day_prices = tree
        .within_day_prices
        .iter()
        .map(|member| horizon.take_aligned(member, reference_prices, "within-day prices"))
        .collect::<BidResult<Vec<_>>>()?;
    let within_day_demand = tree
        .within_day_demand
        .iter()
        .map(|set| {
            set.iter()
                .map(|member| horizon.take_aligned(member, reference_prices, "within-day demand"))
                .collect::<BidResult<Vec<_>>>()
        })
        .collect::<BidResult<Vec<_>>>()?;

    let mapper = ScenarioIndexMapper::new(
        day_ahead_prices.len(),
        day_ahead_demand.len(),
        within_day_prices.len(),
        realizations,
    );
    debug!(
        day_ahead = mapper.day_ahead_count(),
        within_day = mapper.within_day_count(),
        "resolved scenario tree"
    );

    Ok((
        horizon,
        TreeMarket {
            mapper,
            day_ahead_prices,
            day_ahead_demand,
            within_day_prices,
            within_day_demand,
        },
    ))
}

/// Capacity is a first-stage decision, flows run at their default rates.
pub fn optimize_two_stage(
    window: ForecastWindow,
    storage_bid: f64,
    parameters: &StochasticParameters,
    tree: &ScenarioTree,
    trade_limits: TradeLimits,
    output: OutputSelection,
    config: &OptimizerConfig,
) -> BidResult<OptimizationResult> {
    parameters.validate()?;
    trade_limits.validate()?;
    let (horizon, market) = resolve_tree(window, tree)?;

    let model = StorageModel {
        steps: horizon.steps,
        capacity: CapacitySpec::Decision {
            ceiling: parameters.storage_available,
        },
        capacity_price: storage_bid,
        injection: FlowSpec::plain(parameters.injection_rate),
        withdrawal: FlowSpec::plain(parameters.withdrawal_rate),
        settlement_price: parameters.settlement_price,
        trade_limits,
        closing: config.closing_for(FormulationKind::TwoStageStochastic),
        market: MarketData::Tree(market),
    };

    solve_model(FormulationKind::TwoStageStochastic, &model, output, config)
}

/// Capacity is known; each flow may be sped up by an extra factor in
/// `[0, max - 1]` on top of the default rate.
#[allow(clippy::too_many_arguments)]
pub fn optimize_three_stage(
    window: ForecastWindow,
    storage_bid: f64,
    parameters: &FlexibleStochasticParameters,
    capacity: f64,
    tree: &ScenarioTree,
    trade_limits: TradeLimits,
    output: OutputSelection,
    config: &OptimizerConfig,
) -> BidResult<OptimizationResult> {
    parameters.validate()?;
    trade_limits.validate()?;
    let (horizon, market) = resolve_tree(window, tree)?;

    let extra_speed = |max_multiplier: f64| MultiplierSpec::Range {
        lower: 0.0,
        upper: max_multiplier - 1.0,
        offset: 1.0,
    };
    let model = StorageModel {
        steps: horizon.steps,
        capacity: CapacitySpec::Fixed(capacity),
        capacity_price: storage_bid,
        injection: FlowSpec {
            rate: parameters.injection_rate,
            multiplier: extra_speed(parameters.max_injection_multiplier),
            surcharge: SurchargeSpec::PerMultiplier {
                slope: parameters.injection_surcharge(capacity),
                baseline: 0.0,
            },
        },
        withdrawal: FlowSpec {
            rate: parameters.withdrawal_rate,
            multiplier: extra_speed(parameters.max_withdrawal_multiplier),
            surcharge: SurchargeSpec::PerMultiplier {
                slope: parameters.withdrawal_surcharge(capacity),
                baseline: 0.0,
            },
        },
        settlement_price: parameters.settlement_price,
        trade_limits,
        closing: config.closing_for(FormulationKind::ThreeStageStochastic),
        market: MarketData::Tree(market),
    };

    solve_model(FormulationKind::ThreeStageStochastic, &model, output, config)
}
