use thiserror::Error;

use crate::storage::parameters::FormulationKind;

/// Errors raised while unpacking or validating storage parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("{kind} expects {expected} parameters ({fields}), got {found}")]
    ArityMismatch {
        kind: FormulationKind,
        expected: usize,
        found: usize,
        fields: String,
    },
    #[error("{name} must be strictly positive, got {value}")]
    NonPositiveRate { name: &'static str, value: f64 },
    #[error("{minimum_name} ({minimum}) must not exceed {default_name} ({default})")]
    MinimumAboveDefault {
        minimum_name: &'static str,
        minimum: f64,
        default_name: &'static str,
        default: f64,
    },
    #[error("{name} must be at least 1, got {value}")]
    MultiplierBelowOne { name: &'static str, value: f64 },
    #[error("{name} must be a finite non-negative number, got {value}")]
    Negative { name: &'static str, value: f64 },
}
