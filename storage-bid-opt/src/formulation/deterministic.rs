use storage_model::market::DateSeries;
use storage_model::storage::{DeterministicParameters, FormulationKind, TradeLimits};

use crate::config::OptimizerConfig;
use crate::error::BidResult;
use crate::formulation::{single_market, solve_model};
use crate::horizon::ForecastWindow;
use crate::model::{CapacitySpec, FlowSpec, MarketData, StorageModel};
use crate::result::{OptimizationResult, OutputSelection};

/// Single-scenario auction: capacity is a decision up to the available
/// storage, flows run at their default rates and trading is capped
/// asymmetrically.
pub fn optimize_deterministic(
    window: ForecastWindow,
    storage_bid: f64,
    parameters: &DeterministicParameters,
    prices: &DateSeries,
    demand: &DateSeries,
    output: OutputSelection,
    config: &OptimizerConfig,
) -> BidResult<OptimizationResult> {
    parameters.validate()?;
    let (horizon, prices, demand) = single_market(window, prices, demand)?;

    let model = StorageModel {
        steps: horizon.steps,
        capacity: CapacitySpec::Decision {
            ceiling: parameters.storage_available,
        },
        capacity_price: storage_bid,
        injection: FlowSpec::plain(parameters.default_injection_rate),
        withdrawal: FlowSpec::plain(parameters.default_withdrawal_rate),
        settlement_price: parameters.settlement_price,
        trade_limits: TradeLimits::asymmetric(parameters.limit_buying, parameters.limit_selling),
        closing: config.closing_for(FormulationKind::Deterministic),
        market: MarketData::Single { prices, demand },
    };

    solve_model(FormulationKind::Deterministic, &model, output, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HorizonClosing;
    use crate::error::BidError;
    use crate::formulation::tests::{day, window};
    use crate::result::OptimizationResult;

    const TOLERANCE: f64 = 1e-6;

    fn parameters(injection_rate: f64, settlement_price: f64) -> DeterministicParameters {
        DeterministicParameters {
            storage_available: 10.0,
            default_injection_rate: injection_rate,
            default_withdrawal_rate: 1.0,
            settlement_price,
            limit_buying: 100.0,
            limit_selling: 100.0,
        }
    }

    fn solve(
        prices: &[f64],
        demand: &[f64],
        parameters: &DeterministicParameters,
        config: &OptimizerConfig,
    ) -> BidResult<OptimizationResult> {
        optimize_deterministic(
            window(prices.len() as u32),
            1.0,
            parameters,
            &DateSeries::daily(day(1), prices),
            &DateSeries::daily(day(1), demand),
            OutputSelection::Full,
            config,
        )
    }

    fn assert_trajectory_invariants(
        result: &OptimizationResult,
        demand: &[f64],
        p: &DeterministicParameters,
    ) {
        let steps = demand.len();
        let capacity = result.capacity().unwrap();
        let trade = result.series("trade", steps).unwrap();
        let level = result.series("level", steps).unwrap();
        let injection = result.series("injection", steps).unwrap();
        let withdrawal = result.series("withdrawal", steps).unwrap();

        assert!(level[0].abs() < TOLERANCE);
        assert!(level[steps - 1].abs() < TOLERANCE);
        for t in 0..steps {
            assert!((trade[t] - injection[t] + withdrawal[t] - demand[t]).abs() < TOLERANCE);
            assert!(level[t] <= capacity + TOLERANCE);
            assert!(injection[t] <= capacity / p.default_injection_rate + TOLERANCE);
            assert!(withdrawal[t] <= capacity / p.default_withdrawal_rate + TOLERANCE);
            assert!(trade[t] <= p.limit_buying + TOLERANCE);
            assert!(trade[t] >= -p.limit_selling - TOLERANCE);
            if t >= 1 {
                let carried = level[t - 1] + injection[t - 1] - withdrawal[t - 1];
                assert!((level[t] - carried).abs() < TOLERANCE);
            }
        }
    }

    #[test]
    fn test_arbitrage_without_settlement() {
        let p = parameters(1.0, 0.0);
        let result =
            solve(&[10.0, 50.0, 10.0], &[0.0; 3], &p, &OptimizerConfig::default()).unwrap();

        // buy 10 at 10, sell 10 at 50 and 10 at 10, pay 10 for the capacity
        assert!((result.objective + 490.0).abs() < TOLERANCE);
        assert!((result.capacity().unwrap() - 10.0).abs() < TOLERANCE);
        assert!((result.value("injection[0]").unwrap() - 10.0).abs() < TOLERANCE);
        assert!((result.value("withdrawal[1]").unwrap() - 10.0).abs() < TOLERANCE);
        assert!((result.value("withdrawal[2]").unwrap() - 10.0).abs() < TOLERANCE);
        assert_trajectory_invariants(&result, &[0.0; 3], &p);
    }

    #[test]
    fn test_closing_policy_override() {
        let p = parameters(1.0, 0.0);
        let config =
            OptimizerConfig::default().with_closing(HorizonClosing::EmptyStorageNoFinalWithdrawal);
        let result = solve(&[10.0, 50.0, 10.0], &[0.0; 3], &p, &config).unwrap();

        assert!((result.objective + 390.0).abs() < TOLERANCE);
        assert!(result.value("withdrawal[2]").unwrap().abs() < TOLERANCE);
    }

    #[test]
    fn test_settlement_on_injection_when_cheaper() {
        // Injection takes two days, so the injected volume is half the capacity.
        let p = parameters(2.0, 5.0);
        let result =
            solve(&[10.0, 50.0, 10.0], &[0.0; 3], &p, &OptimizerConfig::default()).unwrap();

        assert!((result.objective + 265.0).abs() < TOLERANCE);
        assert!((result.value("settlement_mode").unwrap() - 1.0).abs() < TOLERANCE);
        assert!((result.value("settlement_injection").unwrap() - 5.0).abs() < TOLERANCE);
        assert_trajectory_invariants(&result, &[0.0; 3], &p);
    }

    #[test]
    fn test_settlement_on_capacity_when_cheaper() {
        // Two full cycles inject twice the capacity.
        let p = parameters(1.0, 5.0);
        let prices = [10.0, 50.0, 10.0, 50.0, 10.0];
        let result = solve(&prices, &[0.0; 5], &p, &OptimizerConfig::default()).unwrap();

        assert!((result.objective + 840.0).abs() < TOLERANCE);
        assert!(result.value("settlement_mode").unwrap().abs() < TOLERANCE);
        assert_trajectory_invariants(&result, &[0.0; 5], &p);
    }

    #[test]
    fn test_objective_matches_recomputation() {
        let p = parameters(1.0, 3.0);
        let prices = [20.0, 35.0, 12.0, 44.0];
        let demand = [1.0, 0.0, 2.0, 1.5];
        let result = solve(&prices, &demand, &p, &OptimizerConfig::default()).unwrap();

        let capacity = result.capacity().unwrap();
        let mode = result.value("settlement_mode").unwrap().round();
        let injected: f64 = result.series("injection", 4).unwrap().iter().sum();
        let trading: f64 = result
            .series("trade", 4)
            .unwrap()
            .iter()
            .zip(prices)
            .map(|(trade, price)| trade * price)
            .sum();
        let settlement = p.settlement_price * (mode * injected + (1.0 - mode) * capacity);
        assert!((result.objective - (capacity + settlement + trading)).abs() < 1e-5);
        assert_trajectory_invariants(&result, &demand, &p);
    }

    #[test]
    fn test_capacity_only_output() {
        let p = parameters(1.0, 0.0);
        let result = optimize_deterministic(
            window(3),
            1.0,
            &p,
            &DateSeries::daily(day(1), &[10.0, 50.0, 10.0]),
            &DateSeries::daily(day(1), &[0.0; 3]),
            OutputSelection::CapacityOnly,
            &OptimizerConfig::default(),
        )
        .unwrap();
        assert_eq!(result.value("level[0]"), None);
        assert!((result.capacity().unwrap() - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_unmet_demand_is_not_optimal() {
        let mut p = parameters(1.0, 0.0);
        p.limit_buying = 1.0;
        p.limit_selling = 1.0;
        let err = solve(&[10.0, 50.0, 10.0], &[1000.0; 3], &p, &OptimizerConfig::default())
            .unwrap_err();
        assert!(matches!(err, BidError::NotOptimal { .. }));
    }

    #[test]
    fn test_non_trading_days_shorten_horizon() {
        let p = parameters(1.0, 0.0);
        // No price on the 2nd; demand covers every day.
        let prices = DateSeries::from_pairs(vec![(day(1), 10.0), (day(3), 50.0), (day(4), 10.0)]);
        let demand = DateSeries::daily(day(1), &[0.0; 4]);
        let result = optimize_deterministic(
            window(4),
            1.0,
            &p,
            &prices,
            &demand,
            OutputSelection::Full,
            &OptimizerConfig::default(),
        )
        .unwrap();

        assert!((result.objective + 490.0).abs() < TOLERANCE);
        assert!(result.series("trade", 3).is_some());
        assert_eq!(result.value("trade[3]"), None);
    }
}
