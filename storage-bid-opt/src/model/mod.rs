//! Assembly of the mixed-integer bidding model.
//!
//! Every formulation reduces its inputs to a [`StorageModel`]: a horizon,
//! a capacity that is either fixed or decided, flow settings for injection
//! and withdrawal, and the market data of one scenario or a scenario tree.
//! [`build_model`] declares the variables, emits the constraints and sets
//! the objective on a [`SolverAdapter`].

pub mod constraints;
pub mod objective;
pub mod variables;

use good_lp::solvers::ObjectiveDirection;
use storage_model::storage::TradeLimits;
use tracing::debug;

use crate::config::HorizonClosing;
use crate::error::{BidError, BidResult};
use crate::scenario::ScenarioIndexMapper;
use crate::solver::SolverAdapter;

pub use objective::ObjectiveTerms;
pub use variables::{CapacityTerm, FirstStage, MultiplierTerm, StageLabel, StageVariables};

/// Storage capacity handed to the model builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacitySpec {
    /// Known size, no capacity variable is declared.
    Fixed(f64),
    /// Capacity is a decision in `[0, ceiling]`.
    Decision { ceiling: f64 },
}

/// How far a flow may exceed its default speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MultiplierSpec {
    Default,
    /// A multiplier variable in `[lower, upper]`; the flow factor is the
    /// variable plus `offset`.
    Range { lower: f64, upper: f64, offset: f64 },
}

/// Objective surcharge paid for a flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurchargeSpec {
    None,
    /// Charged per unit of capacity.
    PerCapacity(f64),
    /// `slope * (multiplier - baseline)`.
    PerMultiplier { slope: f64, baseline: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSpec {
    /// Days needed to fill (or empty) the storage at the factor-one speed.
    pub rate: f64,
    pub multiplier: MultiplierSpec,
    pub surcharge: SurchargeSpec,
}

impl FlowSpec {
    pub fn plain(rate: f64) -> Self {
        Self {
            rate,
            multiplier: MultiplierSpec::Default,
            surcharge: SurchargeSpec::None,
        }
    }
}

/// Day-ahead and within-day series of a scenario tree, cut to the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeMarket {
    pub mapper: ScenarioIndexMapper,
    /// `[i][t]`
    pub day_ahead_prices: Vec<Vec<f64>>,
    /// `[j][t]`
    pub day_ahead_demand: Vec<Vec<f64>>,
    /// `[k][t]`
    pub within_day_prices: Vec<Vec<f64>>,
    /// `[j][l][t]`
    pub within_day_demand: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketData {
    Single { prices: Vec<f64>, demand: Vec<f64> },
    Tree(TreeMarket),
}

/// Everything needed to assemble one bidding model.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageModel {
    pub steps: usize,
    pub capacity: CapacitySpec,
    /// Cost per unit of capacity, the auction bid.
    pub capacity_price: f64,
    pub injection: FlowSpec,
    pub withdrawal: FlowSpec,
    pub settlement_price: f64,
    pub trade_limits: TradeLimits,
    pub closing: HorizonClosing,
    pub market: MarketData,
}

/// Variables and objective of an assembled model.
#[derive(Debug, Clone)]
pub struct BuiltModel {
    pub first_stage: FirstStage,
    /// The only stage of a single-scenario model.
    pub day_ahead: StageVariables,
    pub within_day: Option<StageVariables>,
    pub objective: ObjectiveTerms,
}

impl StorageModel {
    fn check(&self) -> BidResult<()> {
        if self.steps == 0 {
            return Err(BidError::InvalidRange("the horizon has no time step".to_string()));
        }
        if matches!(self.capacity, CapacitySpec::Decision { .. })
            && [self.injection.multiplier, self.withdrawal.multiplier]
                .iter()
                .any(|multiplier| *multiplier != MultiplierSpec::Default)
        {
            return Err(BidError::Structural(
                "flow multipliers require a fixed storage capacity".to_string(),
            ));
        }

        let short = |label: &str, series: &[f64]| -> BidResult<()> {
            if series.len() < self.steps {
                return Err(BidError::Structural(format!(
                    "{} has {} values, the horizon needs {}",
                    label,
                    series.len(),
                    self.steps
                )));
            }
            Ok(())
        };
        match &self.market {
            MarketData::Single { prices, demand } => {
                short("prices", prices)?;
                short("demand", demand)
            }
            MarketData::Tree(tree) => {
                let mapper = tree.mapper;
                let (p, d) = (tree.day_ahead_prices.len(), tree.day_ahead_demand.len());
                let (q, r) = (
                    tree.within_day_prices.len(),
                    tree.within_day_demand.first().map_or(0, Vec::len),
                );
                let consistent = mapper == ScenarioIndexMapper::new(p, d, q, r)
                    && tree.within_day_demand.len() == d
                    && tree.within_day_demand.iter().all(|set| set.len() == r);
                if !consistent || mapper.within_day_count() == 0 {
                    return Err(BidError::Structural(
                        "scenario tree series do not match the scenario counts".to_string(),
                    ));
                }
                tree.day_ahead_prices.iter().try_for_each(|s| short("day-ahead prices", s))?;
                tree.day_ahead_demand.iter().try_for_each(|s| short("day-ahead demand", s))?;
                tree.within_day_prices.iter().try_for_each(|s| short("within-day prices", s))?;
                tree.within_day_demand
                    .iter()
                    .flatten()
                    .try_for_each(|s| short("within-day demand", s))
            }
        }
    }
}

/// Declares variables, adds every constraint and sets the minimization
/// objective on `adapter`.
pub fn build_model<A: SolverAdapter>(
    adapter: &mut A,
    model: &StorageModel,
) -> BidResult<BuiltModel> {
    model.check()?;

    let first_stage = variables::declare_first_stage(
        adapter,
        model.capacity,
        &model.injection,
        &model.withdrawal,
    );

    let (day_ahead, within_day) = match &model.market {
        MarketData::Single { demand, .. } => {
            let label = StageLabel::Single;
            let stage =
                variables::declare_stage(adapter, label, model.steps, 1, model.trade_limits);
            constraints::add_single_balance(adapter, &stage, demand);
            constraints::add_storage_dynamics(
                adapter,
                label,
                &stage,
                &first_stage,
                model,
                model.closing,
            )?;
            (stage, None)
        }
        MarketData::Tree(tree) => {
            let day_ahead = variables::declare_stage(
                adapter,
                StageLabel::DayAhead,
                model.steps,
                tree.mapper.day_ahead_count(),
                model.trade_limits,
            );
            let within_day = variables::declare_stage(
                adapter,
                StageLabel::WithinDay,
                model.steps,
                tree.mapper.within_day_count(),
                model.trade_limits,
            );
            constraints::add_day_ahead_balance(adapter, &day_ahead, tree);
            constraints::add_within_day_balance(adapter, &day_ahead, &within_day, tree);
            constraints::add_storage_dynamics(
                adapter,
                StageLabel::DayAhead,
                &day_ahead,
                &first_stage,
                model,
                model.closing,
            )?;
            // the closing policy only governs the day-ahead schedule
            constraints::add_storage_dynamics(
                adapter,
                StageLabel::WithinDay,
                &within_day,
                &first_stage,
                model,
                HorizonClosing::EmptyStorage,
            )?;
            (day_ahead, Some(within_day))
        }
    };

    let objective = objective::compose_objective(
        adapter,
        model,
        &first_stage,
        &day_ahead,
        within_day.as_ref(),
    );
    adapter.set_objective(objective.total(), ObjectiveDirection::Minimisation);

    debug!(
        steps = model.steps,
        variables = adapter.declarations().len(),
        constraints = adapter.constraint_count(),
        "assembled bidding model"
    );

    Ok(BuiltModel {
        first_stage,
        day_ahead,
        within_day,
        objective,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::OptimizerConfig;
    use crate::solver::{GoodLpAdapter, SolveStatus};

    pub(crate) fn single_model(prices: &[f64], capacity: CapacitySpec) -> StorageModel {
        StorageModel {
            steps: prices.len(),
            capacity,
            capacity_price: 1.0,
            injection: FlowSpec::plain(1.0),
            withdrawal: FlowSpec::plain(1.0),
            settlement_price: 0.0,
            trade_limits: TradeLimits::symmetric(100.0),
            closing: HorizonClosing::EmptyStorage,
            market: MarketData::Single {
                prices: prices.to_vec(),
                demand: vec![0.0; prices.len()],
            },
        }
    }

    #[test]
    fn test_multiplier_needs_fixed_capacity() {
        let mut model = single_model(&[1.0, 2.0], CapacitySpec::Decision { ceiling: 5.0 });
        model.injection.multiplier = MultiplierSpec::Range {
            lower: 1.0,
            upper: 2.0,
            offset: 0.0,
        };
        let mut adapter = GoodLpAdapter::new(&OptimizerConfig::default());
        assert!(matches!(build_model(&mut adapter, &model), Err(BidError::Structural(_))));
    }

    #[test]
    fn test_short_market_series_rejected() {
        let mut model = single_model(&[1.0, 2.0, 3.0], CapacitySpec::Fixed(5.0));
        model.steps = 4;
        let mut adapter = GoodLpAdapter::new(&OptimizerConfig::default());
        assert!(matches!(build_model(&mut adapter, &model), Err(BidError::Structural(_))));
    }

    #[test]
    fn test_objective_terms_match_solution() {
        let model = single_model(&[10.0, 50.0, 10.0], CapacitySpec::Decision { ceiling: 10.0 });
        let mut adapter = GoodLpAdapter::new(&OptimizerConfig::default());
        let built = build_model(&mut adapter, &model).unwrap();
        assert_eq!(adapter.solve(), SolveStatus::Optimal);

        let values: HashMap<_, _> = adapter
            .declarations()
            .iter()
            .map(|declared| {
                let value = adapter.variable_value(declared.variable).unwrap();
                (declared.variable, value)
            })
            .collect();
        let terms = &built.objective;
        assert!((terms.capacity_cost.eval_with(&values) - 10.0).abs() < 1e-6);
        assert!(terms.flexibility_cost.eval_with(&values).abs() < 1e-6);
        assert!(terms.settlement_cost.eval_with(&values).abs() < 1e-6);
        assert!((terms.trading_cost.eval_with(&values) + 500.0).abs() < 1e-6);
        let total = terms.total().eval_with(&values);
        assert!((total - adapter.objective_value().unwrap()).abs() < 1e-6);

        assert_eq!(built.day_ahead.scenarios(), 1);
        assert_eq!(built.day_ahead.steps(), 3);
        assert!(built.within_day.is_none());
    }

    #[test]
    fn test_tree_model_has_within_day_stage() {
        let mut model = single_model(&[10.0, 50.0, 10.0], CapacitySpec::Fixed(5.0));
        let series = |values: &[f64]| vec![values.to_vec()];
        model.market = MarketData::Tree(TreeMarket {
            mapper: ScenarioIndexMapper::new(1, 1, 2, 1),
            day_ahead_prices: series(&[10.0, 50.0, 10.0]),
            day_ahead_demand: series(&[0.0; 3]),
            within_day_prices: vec![vec![12.0, 48.0, 9.0], vec![8.0, 52.0, 11.0]],
            within_day_demand: vec![series(&[0.0; 3])],
        });
        let mut adapter = GoodLpAdapter::new(&OptimizerConfig::default());
        let built = build_model(&mut adapter, &model).unwrap();

        assert_eq!(built.day_ahead.scenarios(), 1);
        let within_day = built.within_day.as_ref().unwrap();
        assert_eq!(within_day.scenarios(), 2);
        assert_eq!(within_day.steps(), 3);
    }

    #[test]
    fn test_constraint_count_single_scenario() {
        let model = single_model(&[10.0, 50.0, 10.0], CapacitySpec::Decision { ceiling: 10.0 });
        let mut adapter = GoodLpAdapter::new(&OptimizerConfig::default());
        build_model(&mut adapter, &model).unwrap();

        // per step: balance, capacity, two rate bounds; two conservation
        // steps, two boundary rows; three rows per settlement product
        assert_eq!(adapter.constraint_count(), 3 * 4 + 2 + 2 + 2 * 3);
    }
}
