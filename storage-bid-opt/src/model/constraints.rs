use good_lp::{Expression, constraint};

use crate::config::HorizonClosing;
use crate::error::{BidError, BidResult};
use crate::model::variables::{CapacityTerm, FirstStage, MultiplierTerm, StageLabel, StageVariables};
use crate::model::{StorageModel, TreeMarket};
use crate::solver::SolverAdapter;

/// Largest flow per step: `capacity / rate * factor`.
///
/// Only linear when either the capacity is fixed or the factor is the
/// default one.
pub fn flow_limit(
    capacity: &CapacityTerm,
    multiplier: &MultiplierTerm,
    rate: f64,
) -> BidResult<Expression> {
    match (capacity, multiplier) {
        (_, MultiplierTerm::Default) => Ok(capacity.expression() * (1.0 / rate)),
        (CapacityTerm::Fixed(value), MultiplierTerm::Decision { variable, offset, .. }) => {
            let per_factor = value / rate;
            Ok(Expression::from(*variable) * per_factor + per_factor * offset)
        }
        (CapacityTerm::Decision { .. }, MultiplierTerm::Decision { .. }) => {
            Err(BidError::Structural(
                "flow multipliers require a fixed storage capacity".to_string(),
            ))
        }
    }
}

/// `trade[t] - injection[t] + withdrawal[t] = demand[t]`
pub fn add_single_balance<A: SolverAdapter>(
    adapter: &mut A,
    stage: &StageVariables,
    demand: &[f64],
) {
    let trade = &stage.trade[0];
    let injection = &stage.injection[0];
    let withdrawal = &stage.withdrawal[0];
    for t in 0..stage.steps() {
        let demand_t = demand[t];
        adapter.add_constraint(
            &StageLabel::Single.name("balance", t, 0),
            constraint!(trade[t] - injection[t] + withdrawal[t] == demand_t),
        );
    }
}

/// Day-ahead balance per scenario `a = (i, j)` against demand member `j`.
pub fn add_day_ahead_balance<A: SolverAdapter>(
    adapter: &mut A,
    stage: &StageVariables,
    tree: &TreeMarket,
) {
    for (a, scenario) in tree.mapper.day_ahead_scenarios() {
        let demand = &tree.day_ahead_demand[scenario.demand];
        let trade = &stage.trade[a];
        let injection = &stage.injection[a];
        let withdrawal = &stage.withdrawal[a];
        for t in 0..stage.steps() {
            let demand_t = demand[t];
            adapter.add_constraint(
                &StageLabel::DayAhead.name("balance", t, a),
                constraint!(trade[t] - injection[t] + withdrawal[t] == demand_t),
            );
        }
    }
}

/// Within-day balance on the deviation from the day-ahead schedule of the
/// parent scenario:
///
/// `trade_wd - (injection_da - injection_wd) + (withdrawal_da - withdrawal_wd)
///     = demand_da - demand_wd`
pub fn add_within_day_balance<A: SolverAdapter>(
    adapter: &mut A,
    day_ahead: &StageVariables,
    within_day: &StageVariables,
    tree: &TreeMarket,
) {
    for (a, parent) in tree.mapper.day_ahead_scenarios() {
        let demand_da = &tree.day_ahead_demand[parent.demand];
        for (b, scenario) in tree.mapper.within_day_children(parent) {
            let demand_wd = &tree.within_day_demand[parent.demand][scenario.within_day_demand];
            for t in 0..within_day.steps() {
                let deviation = demand_da[t] - demand_wd[t];
                adapter.add_constraint(
                    &StageLabel::WithinDay.name("balance", t, b),
                    constraint!(
                        within_day.trade[b][t] - day_ahead.injection[a][t]
                            + within_day.injection[b][t]
                            + day_ahead.withdrawal[a][t]
                            - within_day.withdrawal[b][t]
                            == deviation
                    ),
                );
            }
        }
    }
}

/// Capacity, rate, conservation and boundary rows for every scenario of a
/// stage.
pub fn add_storage_dynamics<A: SolverAdapter>(
    adapter: &mut A,
    label: StageLabel,
    stage: &StageVariables,
    first_stage: &FirstStage,
    model: &StorageModel,
    closing: HorizonClosing,
) -> BidResult<()> {
    let capacity = first_stage.capacity.expression();
    let injection_limit = flow_limit(
        &first_stage.capacity,
        &first_stage.injection_multiplier,
        model.injection.rate,
    )?;
    let withdrawal_limit = flow_limit(
        &first_stage.capacity,
        &first_stage.withdrawal_multiplier,
        model.withdrawal.rate,
    )?;
    let last = stage.steps() - 1;

    for s in 0..stage.scenarios() {
        let level = &stage.level[s];
        let injection = &stage.injection[s];
        let withdrawal = &stage.withdrawal[s];

        for t in 0..stage.steps() {
            adapter.add_constraint(
                &label.name("capacity", t, s),
                constraint!(level[t] <= capacity.clone()),
            );
            adapter.add_constraint(
                &label.name("injection_rate", t, s),
                constraint!(injection[t] <= injection_limit.clone()),
            );
            adapter.add_constraint(
                &label.name("withdrawal_rate", t, s),
                constraint!(withdrawal[t] <= withdrawal_limit.clone()),
            );
            if t >= 1 {
                adapter.add_constraint(
                    &label.name("conservation", t, s),
                    constraint!(level[t] == level[t - 1] + injection[t - 1] - withdrawal[t - 1]),
                );
            }
        }

        adapter.add_constraint(
            &label.name("initial_level", 0, s),
            constraint!(level[0] == 0.0),
        );
        adapter.add_constraint(
            &label.name("final_level", last, s),
            constraint!(level[last] == 0.0),
        );
        if closing.forbids_final_withdrawal() {
            adapter.add_constraint(
                &label.name("final_withdrawal", last, s),
                constraint!(withdrawal[last] == 0.0),
            );
        }
    }

    Ok(())
}
