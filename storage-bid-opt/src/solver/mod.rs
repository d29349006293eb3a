//! Narrow contract between the model builder and the mixed-integer solver.

pub mod good_lp_adapter;

use std::fmt;

use good_lp::solvers::ObjectiveDirection;
use good_lp::{Constraint, Expression, Variable};

pub use good_lp_adapter::GoodLpAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Continuous,
    Binary,
}

/// A decision variable to be declared on the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub kind: VariableKind,
    pub lower: f64,
    pub upper: f64,
}

impl VariableDeclaration {
    pub fn continuous(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Continuous,
            lower,
            upper,
        }
    }

    pub fn non_negative(name: impl Into<String>) -> Self {
        Self::continuous(name, 0.0, f64::INFINITY)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Binary,
            lower: 0.0,
            upper: 1.0,
        }
    }
}

/// A declaration together with the handle the adapter returned for it.
#[derive(Debug, Clone)]
pub struct DeclaredVariable {
    pub variable: Variable,
    pub declaration: VariableDeclaration,
}

/// Terminal state of a solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimitReached,
    Failed(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => f.write_str("optimal"),
            SolveStatus::Infeasible => f.write_str("infeasible"),
            SolveStatus::Unbounded => f.write_str("unbounded"),
            SolveStatus::TimeLimitReached => f.write_str("time limit reached"),
            SolveStatus::Failed(reason) => write!(f, "solver failed: {}", reason),
        }
    }
}

/// Builds and solves one model. Implementations are created per call and
/// never shared between models.
pub trait SolverAdapter {
    fn declare_variable(&mut self, declaration: VariableDeclaration) -> Variable;

    fn add_constraint(&mut self, name: &str, constraint: Constraint);

    fn set_objective(&mut self, objective: Expression, direction: ObjectiveDirection);

    /// Runs the solve. Values are only available after an optimal status.
    fn solve(&mut self) -> SolveStatus;

    fn objective_value(&self) -> Option<f64>;

    fn variable_value(&self, variable: Variable) -> Option<f64>;

    /// Every declared variable, in declaration order.
    fn declarations(&self) -> &[DeclaredVariable];

    fn constraint_count(&self) -> usize;
}
