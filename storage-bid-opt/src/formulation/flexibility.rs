//! Auctions where the storage may run its flows faster than the default
//! rate at a surcharge.

use storage_model::market::DateSeries;
use storage_model::storage::{
    FixedRangeParameters, FormulationKind, FreeRangeParameters, TradeLimits,
};

use crate::config::OptimizerConfig;
use crate::error::BidResult;
use crate::formulation::{single_market, solve_model};
use crate::horizon::ForecastWindow;
use crate::model::{
    CapacitySpec, FlowSpec, MarketData, MultiplierSpec, StorageModel, SurchargeSpec,
};
use crate::result::{OptimizationResult, OutputSelection};

/// Capacity is a decision and the fastest offered flows are always
/// available. Their cost is a constant surcharge per unit of capacity.
#[allow(clippy::too_many_arguments)]
pub fn optimize_free_range(
    window: ForecastWindow,
    storage_bid: f64,
    parameters: &FreeRangeParameters,
    prices: &DateSeries,
    demand: &DateSeries,
    trade_limits: TradeLimits,
    output: OutputSelection,
    config: &OptimizerConfig,
) -> BidResult<OptimizationResult> {
    parameters.validate()?;
    trade_limits.validate()?;
    let (horizon, prices, demand) = single_market(window, prices, demand)?;

    let model = StorageModel {
        steps: horizon.steps,
        capacity: CapacitySpec::Decision {
            ceiling: parameters.storage_available,
        },
        capacity_price: storage_bid,
        injection: FlowSpec {
            rate: parameters.min_injection_rate,
            multiplier: MultiplierSpec::Default,
            surcharge: SurchargeSpec::PerCapacity(parameters.injection_surcharge()),
        },
        withdrawal: FlowSpec {
            rate: parameters.min_withdrawal_rate,
            multiplier: MultiplierSpec::Default,
            surcharge: SurchargeSpec::PerCapacity(parameters.withdrawal_surcharge()),
        },
        settlement_price: parameters.settlement_price,
        trade_limits,
        closing: config.closing_for(FormulationKind::FreeRange),
        market: MarketData::Single { prices, demand },
    };

    solve_model(FormulationKind::FreeRange, &model, output, config)
}

/// Capacity is known and the flow multipliers are decisions in
/// `[1, max]`, each unit above one charged per capacity-scaled surcharge.
#[allow(clippy::too_many_arguments)]
pub fn optimize_fixed_range(
    window: ForecastWindow,
    storage_bid: f64,
    parameters: &FixedRangeParameters,
    capacity: f64,
    prices: &DateSeries,
    demand: &DateSeries,
    trade_limits: TradeLimits,
    output: OutputSelection,
    config: &OptimizerConfig,
) -> BidResult<OptimizationResult> {
    parameters.validate()?;
    trade_limits.validate()?;
    let (horizon, prices, demand) = single_market(window, prices, demand)?;

    let model = StorageModel {
        steps: horizon.steps,
        capacity: CapacitySpec::Fixed(capacity),
        capacity_price: storage_bid,
        injection: FlowSpec {
            rate: parameters.injection_rate,
            multiplier: MultiplierSpec::Range {
                lower: 1.0,
                upper: parameters.max_injection_multiplier,
                offset: 0.0,
            },
            surcharge: SurchargeSpec::PerMultiplier {
                slope: parameters.injection_surcharge(capacity),
                baseline: 1.0,
            },
        },
        withdrawal: FlowSpec {
            rate: parameters.withdrawal_rate,
            multiplier: MultiplierSpec::Range {
                lower: 1.0,
                upper: parameters.max_withdrawal_multiplier,
                offset: 0.0,
            },
            surcharge: SurchargeSpec::PerMultiplier {
                slope: parameters.withdrawal_surcharge(capacity),
                baseline: 1.0,
            },
        },
        settlement_price: parameters.settlement_price,
        trade_limits,
        closing: config.closing_for(FormulationKind::FixedRange),
        market: MarketData::Single { prices, demand },
    };

    solve_model(FormulationKind::FixedRange, &model, output, config)
}

#[cfg(test)]
mod tests {
    use storage_model::storage::FormulationParameters;

    use super::*;
    use crate::error::BidError;
    use crate::formulation::tests::{day, single, window};
    use crate::formulation::{BidRequest, run};
    use crate::result::ResultVariables;

    const TOLERANCE: f64 = 1e-6;
    const CHEAP_SPEEDUP: [f64; 7] = [2.0, 2.0, 48.0, 48.0, 2.0, 2.0, 0.0];
    const EXPENSIVE_SPEEDUP: [f64; 7] = [2.0, 2.0, 960.0, 960.0, 2.0, 2.0, 0.0];

    fn fixed_request(bundle: &[f64], output: OutputSelection) -> BidRequest {
        BidRequest {
            window: window(3),
            storage_bid: 1.0,
            parameters: FormulationParameters::from_bundle(FormulationKind::FixedRange, bundle)
                .unwrap(),
            market: single(&[10.0, 50.0, 10.0], &[0.0; 3]),
            trade_limit: Some(TradeLimits::symmetric(100.0)),
            fixed_capacity: Some(10.0),
            output,
        }
    }

    #[test]
    fn test_fixed_range_buys_full_speedup() {
        // Each multiplier unit costs 10 / (2 * 24) * 48 = 10 and doubles
        // the tradable volume from 5 to 10.
        let request = fixed_request(&CHEAP_SPEEDUP, OutputSelection::Full);
        let result = run(&request, &OptimizerConfig::default()).unwrap();

        assert!((result.objective + 470.0).abs() < TOLERANCE);
        assert!((result.value("injection_multiplier").unwrap() - 2.0).abs() < TOLERANCE);
        assert!((result.value("withdrawal_multiplier").unwrap() - 2.0).abs() < TOLERANCE);
        assert_eq!(result.capacity(), Some(10.0));

        let injection = result.series("injection", 3).unwrap();
        let withdrawal = result.series("withdrawal", 3).unwrap();
        for t in 0..3 {
            assert!(injection[t] <= 10.0 / 2.0 * 2.0 + TOLERANCE);
            assert!(withdrawal[t] <= 10.0 / 2.0 * 2.0 + TOLERANCE);
        }
    }

    #[test]
    fn test_fixed_range_skips_expensive_speedup() {
        // A multiplier unit now costs 10 / (2 * 24) * 960 = 200 per flow,
        // more than the 5 extra units per flow can earn.
        let request = fixed_request(&EXPENSIVE_SPEEDUP, OutputSelection::Full);
        let result = run(&request, &OptimizerConfig::default()).unwrap();

        assert!((result.value("injection_multiplier").unwrap() - 1.0).abs() < TOLERANCE);
        assert!((result.value("withdrawal_multiplier").unwrap() - 1.0).abs() < TOLERANCE);
        // buy 5 at 10, sell 5 at 50 and 5 at 10, fixed capacity costs 10
        assert!((result.objective + 240.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_fixed_range_capacity_only_returns_input() {
        let request = fixed_request(&CHEAP_SPEEDUP, OutputSelection::CapacityOnly);
        let result = run(&request, &OptimizerConfig::default()).unwrap();
        assert_eq!(result.variables, ResultVariables::Capacity(10.0));
    }

    #[test]
    fn test_fixed_range_needs_capacity_and_limit() {
        let mut request = fixed_request(&CHEAP_SPEEDUP, OutputSelection::Full);
        request.fixed_capacity = None;
        assert!(matches!(
            run(&request, &OptimizerConfig::default()),
            Err(BidError::Structural(_))
        ));

        let mut request = fixed_request(&CHEAP_SPEEDUP, OutputSelection::Full);
        request.trade_limit = None;
        assert!(matches!(
            run(&request, &OptimizerConfig::default()),
            Err(BidError::Structural(_))
        ));
    }

    #[test]
    fn test_free_range_uses_fastest_rate() {
        let parameters =
            FreeRangeParameters::from_bundle(&[10.0, 2.0, 2.0, 1.0, 1.0, 48.0, 48.0, 0.0]).unwrap();
        let result = optimize_free_range(
            window(3),
            1.0,
            &parameters,
            &DateSeries::daily(day(1), &[10.0, 50.0, 10.0]),
            &DateSeries::daily(day(1), &[0.0; 3]),
            TradeLimits::symmetric(100.0),
            OutputSelection::Full,
            &OptimizerConfig::default(),
        )
        .unwrap();

        // each flexibility surcharge is 1 / 48 * 48 * (2 / 1 - 1) = 1 per capacity unit
        assert!((result.objective + 470.0).abs() < TOLERANCE);
        assert!((result.capacity().unwrap() - 10.0).abs() < TOLERANCE);
        assert!((result.value("injection[0]").unwrap() - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_free_range_trade_limit_binds() {
        let parameters =
            FreeRangeParameters::from_bundle(&[10.0, 2.0, 2.0, 1.0, 1.0, 48.0, 48.0, 0.0]).unwrap();
        let result = optimize_free_range(
            window(3),
            1.0,
            &parameters,
            &DateSeries::daily(day(1), &[10.0, 50.0, 10.0]),
            &DateSeries::daily(day(1), &[0.0; 3]),
            TradeLimits::symmetric(4.0),
            OutputSelection::Full,
            &OptimizerConfig::default(),
        )
        .unwrap();

        for trade in result.series("trade", 3).unwrap() {
            assert!(trade.abs() <= 4.0 + TOLERANCE);
        }
    }
}
