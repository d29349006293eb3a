use good_lp::{Expression, Variable};
use storage_model::storage::TradeLimits;

use crate::model::{CapacitySpec, FlowSpec, MultiplierSpec};
use crate::solver::{SolverAdapter, VariableDeclaration};

/// Storage capacity as it appears in the model.
#[derive(Debug, Clone, Copy)]
pub enum CapacityTerm {
    Fixed(f64),
    Decision { variable: Variable, ceiling: f64 },
}

impl CapacityTerm {
    pub fn expression(&self) -> Expression {
        match *self {
            CapacityTerm::Fixed(capacity) => Expression::from(capacity),
            CapacityTerm::Decision { variable, .. } => Expression::from(variable),
        }
    }

    /// Largest value the capacity can take.
    pub fn ceiling(&self) -> f64 {
        match *self {
            CapacityTerm::Fixed(capacity) => capacity,
            CapacityTerm::Decision { ceiling, .. } => ceiling,
        }
    }
}

/// Factor applied to the default flow speed.
#[derive(Debug, Clone, Copy)]
pub enum MultiplierTerm {
    Default,
    /// Flow factor is `variable + offset`.
    Decision {
        variable: Variable,
        offset: f64,
        upper: f64,
    },
}

impl MultiplierTerm {
    pub fn max_factor(&self) -> f64 {
        match *self {
            MultiplierTerm::Default => 1.0,
            MultiplierTerm::Decision { offset, upper, .. } => upper + offset,
        }
    }

    pub fn variable(&self) -> Option<Variable> {
        match *self {
            MultiplierTerm::Default => None,
            MultiplierTerm::Decision { variable, .. } => Some(variable),
        }
    }
}

/// Decisions taken once, before any scenario unfolds.
#[derive(Debug, Clone, Copy)]
pub struct FirstStage {
    pub capacity: CapacityTerm,
    /// 1 bills the settlement on injected volume, 0 on contracted capacity.
    pub settlement_mode: Variable,
    pub injection_multiplier: MultiplierTerm,
    pub withdrawal_multiplier: MultiplierTerm,
}

/// Per-(scenario, time) variables of one market stage, indexed `[scenario][t]`.
#[derive(Debug, Clone, Default)]
pub struct StageVariables {
    pub trade: Vec<Vec<Variable>>,
    pub level: Vec<Vec<Variable>>,
    pub injection: Vec<Vec<Variable>>,
    pub withdrawal: Vec<Vec<Variable>>,
}

impl StageVariables {
    pub fn scenarios(&self) -> usize {
        self.trade.len()
    }

    pub fn steps(&self) -> usize {
        self.trade.first().map_or(0, Vec::len)
    }
}

/// Suffix and indexing used when naming the variables of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLabel {
    /// Single implicit scenario, names like `trade[3]`.
    Single,
    /// Day-ahead stage, names like `trade_da[3,1]`.
    DayAhead,
    /// Within-day stage, names like `trade_wd[3,7]`.
    WithinDay,
}

impl StageLabel {
    pub fn name(self, base: &str, t: usize, scenario: usize) -> String {
        match self {
            StageLabel::Single => format!("{}[{}]", base, t),
            StageLabel::DayAhead => format!("{}_da[{},{}]", base, t, scenario),
            StageLabel::WithinDay => format!("{}_wd[{},{}]", base, t, scenario),
        }
    }
}

fn declare_multiplier<A: SolverAdapter>(
    adapter: &mut A,
    name: &str,
    spec: &MultiplierSpec,
) -> MultiplierTerm {
    match *spec {
        MultiplierSpec::Default => MultiplierTerm::Default,
        MultiplierSpec::Range { lower, upper, offset } => MultiplierTerm::Decision {
            variable: adapter.declare_variable(VariableDeclaration::continuous(name, lower, upper)),
            offset,
            upper,
        },
    }
}

/// Declares the first-stage scalars: capacity, settlement mode and the flow
/// multipliers where flexibility is modeled.
pub fn declare_first_stage<A: SolverAdapter>(
    adapter: &mut A,
    capacity: CapacitySpec,
    injection: &FlowSpec,
    withdrawal: &FlowSpec,
) -> FirstStage {
    let capacity = match capacity {
        CapacitySpec::Fixed(value) => CapacityTerm::Fixed(value),
        CapacitySpec::Decision { ceiling } => {
            let declaration = VariableDeclaration::continuous("capacity", 0.0, ceiling);
            CapacityTerm::Decision {
                variable: adapter.declare_variable(declaration),
                ceiling,
            }
        }
    };
    let settlement_mode = adapter.declare_variable(VariableDeclaration::binary("settlement_mode"));
    let injection_multiplier =
        declare_multiplier(adapter, "injection_multiplier", &injection.multiplier);
    let withdrawal_multiplier =
        declare_multiplier(adapter, "withdrawal_multiplier", &withdrawal.multiplier);

    FirstStage {
        capacity,
        settlement_mode,
        injection_multiplier,
        withdrawal_multiplier,
    }
}

/// Declares trading, storage level, injection and withdrawal variables for
/// every scenario and time step of a stage.
pub fn declare_stage<A: SolverAdapter>(
    adapter: &mut A,
    label: StageLabel,
    steps: usize,
    scenarios: usize,
    limits: TradeLimits,
) -> StageVariables {
    let mut stage = StageVariables {
        trade: Vec::with_capacity(scenarios),
        level: Vec::with_capacity(scenarios),
        injection: Vec::with_capacity(scenarios),
        withdrawal: Vec::with_capacity(scenarios),
    };

    for scenario in 0..scenarios {
        let mut trade = Vec::with_capacity(steps);
        let mut level = Vec::with_capacity(steps);
        let mut injection = Vec::with_capacity(steps);
        let mut withdrawal = Vec::with_capacity(steps);
        for t in 0..steps {
            // buying is positive, selling negative
            trade.push(adapter.declare_variable(VariableDeclaration::continuous(
                label.name("trade", t, scenario),
                limits.lower_bound(),
                limits.upper_bound(),
            )));
            let non_negative =
                |base: &str| VariableDeclaration::non_negative(label.name(base, t, scenario));
            level.push(adapter.declare_variable(non_negative("level")));
            injection.push(adapter.declare_variable(non_negative("injection")));
            withdrawal.push(adapter.declare_variable(non_negative("withdrawal")));
        }
        stage.trade.push(trade);
        stage.level.push(level);
        stage.injection.push(injection);
        stage.withdrawal.push(withdrawal);
    }

    stage
}
