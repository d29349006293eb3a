use good_lp::{Expression, Variable, constraint};

use crate::model::variables::{CapacityTerm, FirstStage, MultiplierTerm, StageVariables};
use crate::model::{MarketData, StorageModel, SurchargeSpec};
use crate::solver::{SolverAdapter, VariableDeclaration};

/// The objective split into the parts it is assembled from.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveTerms {
    pub capacity_cost: Expression,
    pub flexibility_cost: Expression,
    pub settlement_cost: Expression,
    pub trading_cost: Expression,
}

impl ObjectiveTerms {
    pub fn total(&self) -> Expression {
        self.capacity_cost.clone()
            + self.flexibility_cost.clone()
            + self.settlement_cost.clone()
            + self.trading_cost.clone()
    }
}

/// Declares `z = binary * value` through the usual big-M rows, with
/// `0 <= value <= bound`.
pub fn linearize_product<A: SolverAdapter>(
    adapter: &mut A,
    name: &str,
    binary: Variable,
    value: Expression,
    bound: f64,
) -> Variable {
    let product = adapter.declare_variable(VariableDeclaration::continuous(name, 0.0, bound));
    adapter.add_constraint(&format!("{}_off", name), constraint!(product <= bound * binary));
    adapter.add_constraint(&format!("{}_cap", name), constraint!(product <= value.clone()));
    adapter.add_constraint(
        &format!("{}_on", name),
        constraint!(product >= value - bound + bound * binary),
    );
    product
}

fn flow_surcharge(
    surcharge: &SurchargeSpec,
    capacity: &CapacityTerm,
    multiplier: &MultiplierTerm,
) -> Expression {
    match (*surcharge, multiplier.variable()) {
        (SurchargeSpec::None, _) => Expression::default(),
        (SurchargeSpec::PerCapacity(cost), _) => capacity.expression() * cost,
        (SurchargeSpec::PerMultiplier { slope, baseline }, Some(variable)) => {
            Expression::from(variable) * slope - slope * baseline
        }
        // no multiplier to charge for
        (SurchargeSpec::PerMultiplier { .. }, None) => Expression::default(),
    }
}

/// Mean over scenarios of the volume injected over the horizon.
fn mean_injection(stage: &StageVariables) -> Expression {
    let weight = 1.0 / stage.scenarios() as f64;
    let mut volume = Expression::default();
    for injection in &stage.injection {
        for &flow in injection {
            volume += flow * weight;
        }
    }
    volume
}

/// Expected trading cost. Buying is positive, so selling earns revenue.
fn trading_cost(
    model: &StorageModel,
    day_ahead: &StageVariables,
    within_day: Option<&StageVariables>,
) -> Expression {
    let mut cost = Expression::default();
    match &model.market {
        MarketData::Single { prices, .. } => {
            for (t, &trade) in day_ahead.trade[0].iter().enumerate() {
                cost += trade * prices[t];
            }
        }
        MarketData::Tree(tree) => {
            let day_ahead_weight = 1.0 / tree.mapper.day_ahead_count() as f64;
            for (a, scenario) in tree.mapper.day_ahead_scenarios() {
                let prices = &tree.day_ahead_prices[scenario.price];
                for (t, &trade) in day_ahead.trade[a].iter().enumerate() {
                    cost += trade * (prices[t] * day_ahead_weight);
                }

                if let Some(within_day) = within_day {
                    let within_day_weight = 1.0 / tree.mapper.within_day_count() as f64;
                    for (b, child) in tree.mapper.within_day_children(scenario) {
                        let prices = &tree.within_day_prices[child.within_day_price];
                        for (t, &trade) in within_day.trade[b].iter().enumerate() {
                            cost += trade * (prices[t] * within_day_weight);
                        }
                    }
                }
            }
        }
    }
    cost
}

/// Composes the minimization objective
///
/// `bid * C + surcharges + price * (u * X + (1 - u) * C) + trading`
///
/// where `X` is the injected volume of the last stage, averaged over its
/// scenarios, and `u` the settlement mode. Both products with `u` are
/// linearized.
pub fn compose_objective<A: SolverAdapter>(
    adapter: &mut A,
    model: &StorageModel,
    first_stage: &FirstStage,
    day_ahead: &StageVariables,
    within_day: Option<&StageVariables>,
) -> ObjectiveTerms {
    let capacity = &first_stage.capacity;
    let mode = first_stage.settlement_mode;

    let capacity_cost = capacity.expression() * model.capacity_price;
    let injection_surcharge = flow_surcharge(
        &model.injection.surcharge,
        capacity,
        &first_stage.injection_multiplier,
    );
    let withdrawal_surcharge = flow_surcharge(
        &model.withdrawal.surcharge,
        capacity,
        &first_stage.withdrawal_multiplier,
    );
    let flexibility_cost = injection_surcharge + withdrawal_surcharge;

    let settled_stage = within_day.unwrap_or(day_ahead);
    let max_factor = first_stage.injection_multiplier.max_factor();
    let volume_bound =
        model.steps as f64 * capacity.ceiling() * max_factor / model.injection.rate;
    let settled_volume = linearize_product(
        adapter,
        "settlement_injection",
        mode,
        mean_injection(settled_stage),
        volume_bound,
    );
    let settled_capacity = match *capacity {
        CapacityTerm::Fixed(value) => Expression::from(value) - value * mode,
        CapacityTerm::Decision { variable, ceiling } => {
            let product = linearize_product(
                adapter,
                "settlement_capacity",
                mode,
                Expression::from(variable),
                ceiling,
            );
            variable - product
        }
    };
    let settlement_cost = (settled_volume + settled_capacity) * model.settlement_price;

    ObjectiveTerms {
        capacity_cost,
        flexibility_cost,
        settlement_cost,
        trading_cost: trading_cost(model, day_ahead, within_day),
    }
}

#[cfg(test)]
mod tests {
    use good_lp::solvers::ObjectiveDirection;

    use super::*;
    use crate::config::OptimizerConfig;
    use crate::solver::{GoodLpAdapter, SolveStatus};

    fn product_optimum(direction: ObjectiveDirection, fix_binary: f64) -> f64 {
        let mut adapter = GoodLpAdapter::new(&OptimizerConfig::default());
        let x = adapter.declare_variable(VariableDeclaration::continuous("x", 0.0, 8.0));
        let u = adapter.declare_variable(VariableDeclaration::binary("u"));
        adapter.add_constraint("fix_x", constraint!(x == 6.0));
        adapter.add_constraint("fix_u", constraint!(u == fix_binary));
        let z = linearize_product(&mut adapter, "z", u, Expression::from(x), 8.0);
        adapter.set_objective(Expression::from(z), direction);
        assert_eq!(adapter.solve(), SolveStatus::Optimal);
        adapter.variable_value(z).unwrap()
    }

    #[test]
    fn test_product_is_exact_in_both_modes() {
        for direction in [ObjectiveDirection::Minimisation, ObjectiveDirection::Maximisation] {
            let off = product_optimum(direction, 0.0);
            let on = product_optimum(direction, 1.0);
            assert!(off.abs() < 1e-6);
            assert!((on - 6.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_surcharge_per_multiplier() {
        let mut adapter = GoodLpAdapter::new(&OptimizerConfig::default());
        let m = adapter.declare_variable(VariableDeclaration::continuous("m", 1.0, 3.0));
        let multiplier = MultiplierTerm::Decision {
            variable: m,
            offset: 0.0,
            upper: 3.0,
        };
        let surcharge = flow_surcharge(
            &SurchargeSpec::PerMultiplier {
                slope: 10.0,
                baseline: 1.0,
            },
            &CapacityTerm::Fixed(4.0),
            &multiplier,
        );
        let at = std::collections::HashMap::from([(m, 2.5)]);
        assert!((surcharge.eval_with(&at) - 15.0).abs() < 1e-9);

        let per_capacity = flow_surcharge(
            &SurchargeSpec::PerCapacity(0.5),
            &CapacityTerm::Fixed(4.0),
            &multiplier,
        );
        assert!((per_capacity.eval_with(&at) - 2.0).abs() < 1e-9);
    }
}
