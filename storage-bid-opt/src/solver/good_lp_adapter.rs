use std::collections::HashMap;
use std::time::{Duration, Instant};

use good_lp::solvers::{ObjectiveDirection, SolutionStatus};
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    variable,
};
use tracing::{debug, trace, warn};

use crate::config::{OptimizerConfig, SolverBackend};
use crate::solver::{
    DeclaredVariable, SolveStatus, SolverAdapter, VariableDeclaration, VariableKind,
};

/// [`SolverAdapter`] backed by `good_lp`.
pub struct GoodLpAdapter {
    backend: SolverBackend,
    time_limit: Option<Duration>,
    verbose: bool,
    variables: Option<ProblemVariables>,
    declared: Vec<DeclaredVariable>,
    positions: HashMap<Variable, usize>,
    constraints: Vec<Constraint>,
    constraint_total: usize,
    objective: Option<(Expression, ObjectiveDirection)>,
    objective_value: Option<f64>,
    values: Option<Vec<f64>>,
    solve_duration: Option<Duration>,
}

impl GoodLpAdapter {
    pub fn new(config: &OptimizerConfig) -> Self {
        Self {
            backend: config.backend,
            time_limit: config.time_limit,
            verbose: config.verbose,
            variables: Some(ProblemVariables::new()),
            declared: Vec::new(),
            positions: HashMap::new(),
            constraints: Vec::new(),
            constraint_total: 0,
            objective: None,
            objective_value: None,
            values: None,
            solve_duration: None,
        }
    }

    pub fn solve_duration(&self) -> Option<Duration> {
        self.solve_duration
    }

    fn record<S: Solution>(&mut self, solution: &S, objective: &Expression) -> SolveStatus {
        #[allow(unreachable_patterns)]
        match solution.status() {
            SolutionStatus::Optimal => {}
            SolutionStatus::GapLimit => debug!("solver stopped at the configured MIP gap"),
            SolutionStatus::TimeLimit => return SolveStatus::TimeLimitReached,
            _ => return SolveStatus::Failed("unexpected solution status".to_string()),
        }

        self.values = Some(
            self.declared
                .iter()
                .map(|declared| solution.value(declared.variable))
                .collect(),
        );
        self.objective_value = Some(objective.eval_with(solution));
        SolveStatus::Optimal
    }
}

fn status_from_error(error: ResolutionError) -> SolveStatus {
    match error {
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        ResolutionError::Unbounded => SolveStatus::Unbounded,
        other => SolveStatus::Failed(other.to_string()),
    }
}

impl SolverAdapter for GoodLpAdapter {
    fn declare_variable(&mut self, declaration: VariableDeclaration) -> Variable {
        let mut definition = variable().name(declaration.name.clone());
        if declaration.kind == VariableKind::Binary {
            definition = definition.binary();
        } else {
            if declaration.lower.is_finite() {
                definition = definition.min(declaration.lower);
            }
            if declaration.upper.is_finite() {
                definition = definition.max(declaration.upper);
            }
        }

        let variables = self.variables.get_or_insert_with(ProblemVariables::new);
        let handle = variables.add(definition);
        self.positions.insert(handle, self.declared.len());
        self.declared.push(DeclaredVariable {
            variable: handle,
            declaration,
        });
        handle
    }

    fn add_constraint(&mut self, name: &str, constraint: Constraint) {
        trace!(constraint = name, "added constraint");
        self.constraints.push(constraint);
        self.constraint_total += 1;
    }

    fn set_objective(&mut self, objective: Expression, direction: ObjectiveDirection) {
        self.objective = Some((objective, direction));
    }

    fn solve(&mut self) -> SolveStatus {
        let Some((objective, direction)) = self.objective.clone() else {
            return SolveStatus::Failed("no objective was set".to_string());
        };
        let Some(variables) = self.variables.take() else {
            return SolveStatus::Failed("model was already solved".to_string());
        };
        let constraints = std::mem::take(&mut self.constraints);
        let problem = variables.optimise(direction, objective.clone());
        let start_time = Instant::now();

        let status = match self.backend {
            SolverBackend::Highs => {
                let mut model = problem.using(good_lp::solvers::highs::highs);
                model.set_verbose(self.verbose);
                if let Some(limit) = self.time_limit {
                    model = model.set_time_limit(limit.as_secs_f64());
                }
                for constraint in constraints {
                    model.add_constraint(constraint);
                }
                match model.solve() {
                    Ok(solution) => self.record(&solution, &objective),
                    Err(e) => status_from_error(e),
                }
            }
            #[cfg(feature = "scip")]
            SolverBackend::Scip => {
                if self.time_limit.is_some() {
                    warn!("time limit is only enforced by the HiGHS backend, solving without one");
                }
                let mut model = problem.using(good_lp::solvers::scip::scip);
                for constraint in constraints {
                    model.add_constraint(constraint);
                }
                match model.solve() {
                    Ok(solution) => self.record(&solution, &objective),
                    Err(e) => status_from_error(e),
                }
            }
        };

        let elapsed = start_time.elapsed();
        self.solve_duration = Some(elapsed);
        if !status.is_optimal() {
            warn!(
                status = %status,
                elapsed_ms = elapsed.as_millis() as u64,
                "solve finished without an optimum"
            );
        }
        status
    }

    fn objective_value(&self) -> Option<f64> {
        self.objective_value
    }

    fn variable_value(&self, variable: Variable) -> Option<f64> {
        let position = *self.positions.get(&variable)?;
        self.values.as_ref().map(|values| values[position])
    }

    fn declarations(&self) -> &[DeclaredVariable] {
        &self.declared
    }

    fn constraint_count(&self) -> usize {
        self.constraint_total
    }
}
