//! Entry points of the bidding engine, one per formulation family.

pub mod deterministic;
pub mod flexibility;
pub mod stochastic;

use serde::{Deserialize, Serialize};
use storage_model::market::{DateSeries, ScenarioTree};
use storage_model::storage::{FormulationKind, FormulationParameters, TradeLimits};
use storage_model::ParameterError;
use tracing::{debug, info, warn};

use crate::config::OptimizerConfig;
use crate::error::{BidError, BidResult};
use crate::horizon::{ForecastWindow, Horizon};
use crate::model::{StorageModel, build_model};
use crate::result::{OptimizationResult, OutputSelection, extract_result};
use crate::solver::{GoodLpAdapter, SolverAdapter};

/// Market data of one call: a single forecast, or a scenario tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketInput {
    Single { prices: DateSeries, demand: DateSeries },
    Tree(ScenarioTree),
}

/// A complete bidding call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    pub window: ForecastWindow,
    /// Price offered per unit of storage capacity.
    pub storage_bid: f64,
    pub parameters: FormulationParameters,
    pub market: MarketInput,
    /// Trade caps for the variants that take them from the caller.
    pub trade_limit: Option<TradeLimits>,
    /// Storage size for the fixed-capacity variants.
    pub fixed_capacity: Option<f64>,
    #[serde(default)]
    pub output: OutputSelection,
}

/// Runs the formulation selected by `request.parameters`.
pub fn run(request: &BidRequest, config: &OptimizerConfig) -> BidResult<OptimizationResult> {
    let kind = request.parameters.kind();
    request.parameters.validate()?;
    if let Some(limits) = &request.trade_limit {
        limits.validate()?;
    }
    if request.fixed_capacity.is_some() && !kind.has_fixed_capacity() {
        warn!(formulation = %kind, "ignoring the fixed capacity, this formulation decides it");
    }

    match (&request.parameters, &request.market) {
        (
            FormulationParameters::Deterministic(parameters),
            MarketInput::Single { prices, demand },
        ) => {
            deterministic::optimize_deterministic(
                request.window,
                request.storage_bid,
                parameters,
                prices,
                demand,
                request.output,
                config,
            )
        }
        (FormulationParameters::FreeRange(parameters), MarketInput::Single { prices, demand }) => {
            flexibility::optimize_free_range(
                request.window,
                request.storage_bid,
                parameters,
                prices,
                demand,
                required_limit(request, kind)?,
                request.output,
                config,
            )
        }
        (FormulationParameters::FixedRange(parameters), MarketInput::Single { prices, demand }) => {
            flexibility::optimize_fixed_range(
                request.window,
                request.storage_bid,
                parameters,
                required_capacity(request, kind)?,
                prices,
                demand,
                required_limit(request, kind)?,
                request.output,
                config,
            )
        }
        (FormulationParameters::TwoStageStochastic(parameters), MarketInput::Tree(tree)) => {
            stochastic::optimize_two_stage(
                request.window,
                request.storage_bid,
                parameters,
                tree,
                request.trade_limit.unwrap_or_default(),
                request.output,
                config,
            )
        }
        (FormulationParameters::ThreeStageStochastic(parameters), MarketInput::Tree(tree)) => {
            stochastic::optimize_three_stage(
                request.window,
                request.storage_bid,
                parameters,
                required_capacity(request, kind)?,
                tree,
                request.trade_limit.unwrap_or_default(),
                request.output,
                config,
            )
        }
        (_, market) => Err(BidError::Structural(format!(
            "{} expects {} market data, got {}",
            kind,
            if kind.is_stochastic() { "scenario tree" } else { "single series" },
            match market {
                MarketInput::Single { .. } => "a single series",
                MarketInput::Tree(_) => "a scenario tree",
            }
        ))),
    }
}

fn required_limit(request: &BidRequest, kind: FormulationKind) -> BidResult<TradeLimits> {
    request
        .trade_limit
        .ok_or_else(|| BidError::Structural(format!("{} needs a trade limit", kind)))
}

fn required_capacity(request: &BidRequest, kind: FormulationKind) -> BidResult<f64> {
    let capacity = request
        .fixed_capacity
        .ok_or_else(|| BidError::Structural(format!("{} needs a fixed storage capacity", kind)))?;
    if !capacity.is_finite() || capacity < 0.0 {
        return Err(ParameterError::Negative {
            name: "fixed_capacity",
            value: capacity,
        }
        .into());
    }
    Ok(capacity)
}

/// Horizon and positional price and demand values of a single forecast.
pub(crate) fn single_market(
    window: ForecastWindow,
    prices: &DateSeries,
    demand: &DateSeries,
) -> BidResult<(Horizon, Vec<f64>, Vec<f64>)> {
    let horizon = Horizon::resolve(window, prices, demand)?;
    let price_values = horizon.take(prices, "prices")?;
    let demand_values = horizon.take_aligned(demand, prices, "demand")?;
    Ok((horizon, price_values, demand_values))
}

/// Builds `model` on a fresh adapter, solves it and extracts the selected
/// output.
pub(crate) fn solve_model(
    kind: FormulationKind,
    model: &StorageModel,
    output: OutputSelection,
    config: &OptimizerConfig,
) -> BidResult<OptimizationResult> {
    let mut adapter = GoodLpAdapter::new(config);
    let built = build_model(&mut adapter, model)?;

    if config.verbose {
        info!(
            formulation = %kind,
            steps = model.steps,
            variables = adapter.declarations().len(),
            constraints = adapter.constraint_count(),
            "solving bidding model"
        );
    }

    let status = adapter.solve();
    let result = extract_result(&adapter, status, &built.first_stage, output)?;

    let elapsed_ms = adapter.solve_duration().map_or(0, |d| d.as_millis() as u64);
    let objective = result.objective;
    if config.verbose {
        info!(formulation = %kind, objective, elapsed_ms, "bidding model solved");
    } else {
        debug!(formulation = %kind, objective, elapsed_ms, "bidding model solved");
    }
    Ok(result)
}
