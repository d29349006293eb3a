use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{BidError, BidResult};
use crate::model::{CapacityTerm, FirstStage};
use crate::solver::{SolveStatus, SolverAdapter};

/// Which variable values a call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSelection {
    #[default]
    Full,
    CapacityOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultVariables {
    /// Every declared variable by name, in declaration order.
    Full(IndexMap<String, f64>),
    Capacity(f64),
}

/// Optimal objective and the selected variable values of one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub objective: f64,
    pub variables: ResultVariables,
}

impl OptimizationResult {
    pub fn value(&self, name: &str) -> Option<f64> {
        match &self.variables {
            ResultVariables::Full(values) => values.get(name).copied(),
            ResultVariables::Capacity(capacity) => (name == "capacity").then_some(*capacity),
        }
    }

    /// Values of `base[0]..base[steps - 1]`.
    pub fn series(&self, base: &str, steps: usize) -> Option<Vec<f64>> {
        (0..steps).map(|t| self.value(&format!("{}[{}]", base, t))).collect()
    }

    /// Values of `base[0,scenario]..base[steps - 1,scenario]`.
    pub fn scenario_series(&self, base: &str, scenario: usize, steps: usize) -> Option<Vec<f64>> {
        (0..steps)
            .map(|t| self.value(&format!("{}[{},{}]", base, t, scenario)))
            .collect()
    }

    /// Contracted capacity, when present in the selected output.
    pub fn capacity(&self) -> Option<f64> {
        self.value("capacity")
    }
}

/// Reads the solution off `adapter` after `status` was reported.
///
/// A fixed capacity has no variable; it is reported under `capacity` in
/// both selections.
pub fn extract_result<A: SolverAdapter>(
    adapter: &A,
    status: SolveStatus,
    first_stage: &FirstStage,
    output: OutputSelection,
) -> BidResult<OptimizationResult> {
    if !status.is_optimal() {
        return Err(BidError::NotOptimal { status });
    }
    let missing = || BidError::NotOptimal {
        status: SolveStatus::Failed("optimal status without solution values".to_string()),
    };
    let objective = adapter.objective_value().ok_or_else(missing)?;

    let capacity = match first_stage.capacity {
        CapacityTerm::Fixed(value) => value,
        CapacityTerm::Decision { variable, .. } => {
            adapter.variable_value(variable).ok_or_else(missing)?
        }
    };

    let variables = match output {
        OutputSelection::CapacityOnly => ResultVariables::Capacity(capacity),
        OutputSelection::Full => {
            let mut values = IndexMap::with_capacity(adapter.declarations().len() + 1);
            if let CapacityTerm::Fixed(value) = first_stage.capacity {
                values.insert("capacity".to_string(), value);
            }
            for declared in adapter.declarations() {
                let value = adapter.variable_value(declared.variable).ok_or_else(missing)?;
                values.insert(declared.declaration.name.clone(), value);
            }
            ResultVariables::Full(values)
        }
    };

    Ok(OptimizationResult { objective, variables })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(entries: &[(&str, f64)]) -> OptimizationResult {
        OptimizationResult {
            objective: -1.0,
            variables: ResultVariables::Full(
                entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ),
        }
    }

    #[test]
    fn test_series_lookup() {
        let result = full(&[("level[0]", 0.0), ("level[1]", 4.0), ("trade_da[1,2]", 3.0)]);
        assert_eq!(result.series("level", 2), Some(vec![0.0, 4.0]));
        assert_eq!(result.series("level", 3), None);
        assert_eq!(result.scenario_series("trade_da", 2, 1), None);
        assert_eq!(result.value("trade_da[1,2]"), Some(3.0));
    }

    #[test]
    fn test_capacity_only_lookup() {
        let result = OptimizationResult {
            objective: 0.0,
            variables: ResultVariables::Capacity(7.5),
        };
        assert_eq!(result.capacity(), Some(7.5));
        assert_eq!(result.value("level[0]"), None);
    }

    #[test]
    fn test_result_serializes_in_declaration_order() {
        let result = full(&[("capacity", 2.0), ("settlement_mode", 1.0), ("trade[0]", -2.0)]);
        let json = serde_json::to_string(&result).unwrap();
        let expected = concat!(
            r#"{"objective":-1.0,"variables":{"full":"#,
            r#"{"capacity":2.0,"settlement_mode":1.0,"trade[0]":-2.0}}}"#,
        );
        assert_eq!(json, expected);
    }
}
