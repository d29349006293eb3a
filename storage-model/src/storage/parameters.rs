use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ParameterError;

/// Rates are quoted in days needed to fill or empty the storage, surcharges
/// per hour of flexibility.
pub const HOURS_PER_DAY: f64 = 24.0;

/// The five bidding formulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "./storage.ts")]
pub enum FormulationKind {
    /// Single scenario, fixed product range, no flexibility.
    Deterministic,
    /// Fixed storage capacity, flexibility multipliers are decisions.
    FixedRange,
    /// Storage capacity is a decision, flexibility priced at a fixed surcharge.
    FreeRange,
    /// Day-ahead and within-day scenario tree, capacity is a decision.
    TwoStageStochastic,
    /// Scenario tree with fixed capacity and flexibility multipliers.
    ThreeStageStochastic,
}

impl FormulationKind {
    pub const ALL: [FormulationKind; 5] = [
        FormulationKind::Deterministic,
        FormulationKind::FixedRange,
        FormulationKind::FreeRange,
        FormulationKind::TwoStageStochastic,
        FormulationKind::ThreeStageStochastic,
    ];

    /// Field order of the positional parameter bundle.
    pub fn bundle_fields(self) -> &'static [&'static str] {
        match self {
            FormulationKind::Deterministic => &[
                "storage_available",
                "default_injection_rate",
                "default_withdrawal_rate",
                "settlement_price",
                "limit_buying",
                "limit_selling",
            ],
            FormulationKind::FixedRange | FormulationKind::ThreeStageStochastic => &[
                "injection_rate",
                "withdrawal_rate",
                "additional_injection_cost",
                "additional_withdrawal_cost",
                "max_injection_multiplier",
                "max_withdrawal_multiplier",
                "settlement_price",
            ],
            FormulationKind::FreeRange => &[
                "storage_available",
                "default_injection_rate",
                "default_withdrawal_rate",
                "min_injection_rate",
                "min_withdrawal_rate",
                "additional_injection_cost",
                "additional_withdrawal_cost",
                "settlement_price",
            ],
            FormulationKind::TwoStageStochastic => &[
                "storage_available",
                "injection_rate",
                "withdrawal_rate",
                "settlement_price",
            ],
        }
    }

    pub fn bundle_len(self) -> usize {
        self.bundle_fields().len()
    }

    pub fn is_stochastic(self) -> bool {
        matches!(
            self,
            FormulationKind::TwoStageStochastic | FormulationKind::ThreeStageStochastic
        )
    }

    /// Whether the storage capacity is supplied by the caller instead of
    /// being a first-stage decision.
    pub fn has_fixed_capacity(self) -> bool {
        matches!(
            self,
            FormulationKind::FixedRange | FormulationKind::ThreeStageStochastic
        )
    }
}

impl fmt::Display for FormulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormulationKind::Deterministic => "deterministic",
            FormulationKind::FixedRange => "fixed-range",
            FormulationKind::FreeRange => "free-range",
            FormulationKind::TwoStageStochastic => "two-stage stochastic",
            FormulationKind::ThreeStageStochastic => "three-stage stochastic",
        };
        f.write_str(name)
    }
}

fn unpack<const N: usize>(
    kind: FormulationKind,
    bundle: &[f64],
) -> Result<[f64; N], ParameterError> {
    bundle
        .try_into()
        .map_err(|_| ParameterError::ArityMismatch {
            kind,
            expected: N,
            found: bundle.len(),
            fields: kind.bundle_fields().join(", "),
        })
}

fn positive(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::NonPositiveRate { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ParameterError::Negative { name, value })
    }
}

fn multiplier(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value >= 1.0 {
        Ok(())
    } else {
        Err(ParameterError::MultiplierBelowOne { name, value })
    }
}

/// Per-unit surcharge for running a flow at `default_rate / min_rate` times
/// its default speed, spread over the hours of the default fill time.
pub fn flexibility_surcharge(default_rate: f64, min_rate: f64, additional_cost: f64) -> f64 {
    1.0 / (default_rate * HOURS_PER_DAY) * additional_cost * (default_rate / min_rate - 1.0)
}

/// Surcharge per unit of multiplier above the default rate when the
/// storage capacity is known.
pub fn capacity_scaled_surcharge(rate: f64, additional_cost: f64, capacity: f64) -> f64 {
    capacity / (rate * HOURS_PER_DAY) * additional_cost
}

/// Parameters of the deterministic auction with asymmetric trade caps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./storage.ts")]
pub struct DeterministicParameters {
    /// Physical ceiling of the storage capacity.
    pub storage_available: f64,
    /// Days needed to fill the storage at the default injection speed.
    pub default_injection_rate: f64,
    /// Days needed to empty the storage at the default withdrawal speed.
    pub default_withdrawal_rate: f64,
    /// Price of the settlement billing, per injected unit or per capacity unit.
    pub settlement_price: f64,
    /// Maximum volume bought per time step.
    pub limit_buying: f64,
    /// Maximum volume sold per time step.
    pub limit_selling: f64,
}

impl DeterministicParameters {
    pub fn from_bundle(bundle: &[f64]) -> Result<Self, ParameterError> {
        let [
            storage_available,
            default_injection_rate,
            default_withdrawal_rate,
            settlement_price,
            limit_buying,
            limit_selling,
        ] = unpack::<6>(FormulationKind::Deterministic, bundle)?;
        let parameters = Self {
            storage_available,
            default_injection_rate,
            default_withdrawal_rate,
            settlement_price,
            limit_buying,
            limit_selling,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        non_negative("storage_available", self.storage_available)?;
        positive("default_injection_rate", self.default_injection_rate)?;
        positive("default_withdrawal_rate", self.default_withdrawal_rate)?;
        non_negative("limit_buying", self.limit_buying)?;
        non_negative("limit_selling", self.limit_selling)
    }
}

/// Parameters of the auction where capacity is a decision and extra
/// flexibility comes at a fixed surcharge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./storage.ts")]
pub struct FreeRangeParameters {
    pub storage_available: f64,
    pub default_injection_rate: f64,
    pub default_withdrawal_rate: f64,
    /// Fastest injection on offer; a smaller rate allows a larger flow.
    pub min_injection_rate: f64,
    /// Fastest withdrawal on offer.
    pub min_withdrawal_rate: f64,
    pub additional_injection_cost: f64,
    pub additional_withdrawal_cost: f64,
    pub settlement_price: f64,
}

impl FreeRangeParameters {
    pub fn from_bundle(bundle: &[f64]) -> Result<Self, ParameterError> {
        let [
            storage_available,
            default_injection_rate,
            default_withdrawal_rate,
            min_injection_rate,
            min_withdrawal_rate,
            additional_injection_cost,
            additional_withdrawal_cost,
            settlement_price,
        ] = unpack::<8>(FormulationKind::FreeRange, bundle)?;
        let parameters = Self {
            storage_available,
            default_injection_rate,
            default_withdrawal_rate,
            min_injection_rate,
            min_withdrawal_rate,
            additional_injection_cost,
            additional_withdrawal_cost,
            settlement_price,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        non_negative("storage_available", self.storage_available)?;
        positive("default_injection_rate", self.default_injection_rate)?;
        positive("default_withdrawal_rate", self.default_withdrawal_rate)?;
        positive("min_injection_rate", self.min_injection_rate)?;
        positive("min_withdrawal_rate", self.min_withdrawal_rate)?;
        if self.min_injection_rate > self.default_injection_rate {
            return Err(ParameterError::MinimumAboveDefault {
                minimum_name: "min_injection_rate",
                minimum: self.min_injection_rate,
                default_name: "default_injection_rate",
                default: self.default_injection_rate,
            });
        }
        if self.min_withdrawal_rate > self.default_withdrawal_rate {
            return Err(ParameterError::MinimumAboveDefault {
                minimum_name: "min_withdrawal_rate",
                minimum: self.min_withdrawal_rate,
                default_name: "default_withdrawal_rate",
                default: self.default_withdrawal_rate,
            });
        }
        Ok(())
    }

    /// Surcharge per unit of capacity for the injection flexibility.
    pub fn injection_surcharge(&self) -> f64 {
        flexibility_surcharge(
            self.default_injection_rate,
            self.min_injection_rate,
            self.additional_injection_cost,
        )
    }

    /// Surcharge per unit of capacity for the withdrawal flexibility.
    pub fn withdrawal_surcharge(&self) -> f64 {
        flexibility_surcharge(
            self.default_withdrawal_rate,
            self.min_withdrawal_rate,
            self.additional_withdrawal_cost,
        )
    }
}

/// Parameters of the fixed-capacity auction where the flow multipliers
/// are decisions in `[1, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./storage.ts")]
pub struct FixedRangeParameters {
    pub injection_rate: f64,
    pub withdrawal_rate: f64,
    pub additional_injection_cost: f64,
    pub additional_withdrawal_cost: f64,
    /// Largest factor the injection flow can be sped up by.
    pub max_injection_multiplier: f64,
    /// Largest factor the withdrawal flow can be sped up by.
    pub max_withdrawal_multiplier: f64,
    pub settlement_price: f64,
}

/// Parameters of the fixed-capacity scenario-tree auction. The multipliers
/// are expressed as the extra speed above the default rate, in `[0, max - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./storage.ts")]
pub struct FlexibleStochasticParameters {
    pub injection_rate: f64,
    pub withdrawal_rate: f64,
    pub additional_injection_cost: f64,
    pub additional_withdrawal_cost: f64,
    pub max_injection_multiplier: f64,
    pub max_withdrawal_multiplier: f64,
    pub settlement_price: f64,
}

macro_rules! flexible_parameters {
    ($record:ident, $kind:expr) => {
        impl $record {
            pub fn from_bundle(bundle: &[f64]) -> Result<Self, ParameterError> {
                let [
                    injection_rate,
                    withdrawal_rate,
                    additional_injection_cost,
                    additional_withdrawal_cost,
                    max_injection_multiplier,
                    max_withdrawal_multiplier,
                    settlement_price,
                ] = unpack::<7>($kind, bundle)?;
                let parameters = Self {
                    injection_rate,
                    withdrawal_rate,
                    additional_injection_cost,
                    additional_withdrawal_cost,
                    max_injection_multiplier,
                    max_withdrawal_multiplier,
                    settlement_price,
                };
                parameters.validate()?;
                Ok(parameters)
            }

            pub fn validate(&self) -> Result<(), ParameterError> {
                positive("injection_rate", self.injection_rate)?;
                positive("withdrawal_rate", self.withdrawal_rate)?;
                multiplier("max_injection_multiplier", self.max_injection_multiplier)?;
                multiplier("max_withdrawal_multiplier", self.max_withdrawal_multiplier)
            }

            /// Injection surcharge per unit of multiplier above the default rate.
            pub fn injection_surcharge(&self, capacity: f64) -> f64 {
                capacity_scaled_surcharge(
                    self.injection_rate,
                    self.additional_injection_cost,
                    capacity,
                )
            }

            /// Withdrawal surcharge per unit of multiplier above the default rate.
            pub fn withdrawal_surcharge(&self, capacity: f64) -> f64 {
                capacity_scaled_surcharge(
                    self.withdrawal_rate,
                    self.additional_withdrawal_cost,
                    capacity,
                )
            }
        }
    };
}

flexible_parameters!(FixedRangeParameters, FormulationKind::FixedRange);
flexible_parameters!(FlexibleStochasticParameters, FormulationKind::ThreeStageStochastic);

/// Parameters of the scenario-tree auction without flexibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./storage.ts")]
pub struct StochasticParameters {
    pub storage_available: f64,
    pub injection_rate: f64,
    pub withdrawal_rate: f64,
    pub settlement_price: f64,
}

impl StochasticParameters {
    pub fn from_bundle(bundle: &[f64]) -> Result<Self, ParameterError> {
        let [storage_available, injection_rate, withdrawal_rate, settlement_price] =
            unpack::<4>(FormulationKind::TwoStageStochastic, bundle)?;
        let parameters = Self {
            storage_available,
            injection_rate,
            withdrawal_rate,
            settlement_price,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        non_negative("storage_available", self.storage_available)?;
        positive("injection_rate", self.injection_rate)?;
        positive("withdrawal_rate", self.withdrawal_rate)
    }
}

/// Storage parameters tagged by the formulation they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "./storage.ts")]
pub enum FormulationParameters {
    Deterministic(DeterministicParameters),
    FixedRange(FixedRangeParameters),
    FreeRange(FreeRangeParameters),
    TwoStageStochastic(StochasticParameters),
    ThreeStageStochastic(FlexibleStochasticParameters),
}

impl FormulationParameters {
    /// Unpacks a positional bundle in the field order of `kind`.
    pub fn from_bundle(kind: FormulationKind, bundle: &[f64]) -> Result<Self, ParameterError> {
        Ok(match kind {
            FormulationKind::Deterministic => {
                Self::Deterministic(DeterministicParameters::from_bundle(bundle)?)
            }
            FormulationKind::FixedRange => {
                Self::FixedRange(FixedRangeParameters::from_bundle(bundle)?)
            }
            FormulationKind::FreeRange => {
                Self::FreeRange(FreeRangeParameters::from_bundle(bundle)?)
            }
            FormulationKind::TwoStageStochastic => {
                Self::TwoStageStochastic(StochasticParameters::from_bundle(bundle)?)
            }
            FormulationKind::ThreeStageStochastic => {
                Self::ThreeStageStochastic(FlexibleStochasticParameters::from_bundle(bundle)?)
            }
        })
    }

    pub fn kind(&self) -> FormulationKind {
        match self {
            Self::Deterministic(_) => FormulationKind::Deterministic,
            Self::FixedRange(_) => FormulationKind::FixedRange,
            Self::FreeRange(_) => FormulationKind::FreeRange,
            Self::TwoStageStochastic(_) => FormulationKind::TwoStageStochastic,
            Self::ThreeStageStochastic(_) => FormulationKind::ThreeStageStochastic,
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        match self {
            Self::Deterministic(p) => p.validate(),
            Self::FixedRange(p) => p.validate(),
            Self::FreeRange(p) => p.validate(),
            Self::TwoStageStochastic(p) => p.validate(),
            Self::ThreeStageStochastic(p) => p.validate(),
        }
    }

    pub fn settlement_price(&self) -> f64 {
        match self {
            Self::Deterministic(p) => p.settlement_price,
            Self::FixedRange(p) => p.settlement_price,
            Self::FreeRange(p) => p.settlement_price,
            Self::TwoStageStochastic(p) => p.settlement_price,
            Self::ThreeStageStochastic(p) => p.settlement_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_arity_per_kind() {
        let lens: Vec<usize> = FormulationKind::ALL.iter().map(|k| k.bundle_len()).collect();
        assert_eq!(lens, vec![6, 7, 8, 4, 7]);
    }

    const DETERMINISTIC_BUNDLE: [f64; 6] = [100.0, 2.0, 3.0, 0.5, 10.0, 8.0];

    #[test]
    fn test_unpack_deterministic_bundle() {
        let kind = FormulationKind::Deterministic;
        let parameters = FormulationParameters::from_bundle(kind, &DETERMINISTIC_BUNDLE).unwrap();
        let FormulationParameters::Deterministic(p) = parameters else {
            panic!("wrong variant: {:?}", parameters);
        };
        assert_eq!(p.storage_available, 100.0);
        assert_eq!(p.default_injection_rate, 2.0);
        assert_eq!(p.default_withdrawal_rate, 3.0);
        assert_eq!(p.settlement_price, 0.5);
        assert_eq!(p.limit_buying, 10.0);
        assert_eq!(p.limit_selling, 8.0);
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        // A deterministic bundle handed to the free-range variant must not be
        // silently re-interpreted.
        let err =
            FormulationParameters::from_bundle(FormulationKind::FreeRange, &DETERMINISTIC_BUNDLE)
                .unwrap_err();
        match err {
            ParameterError::ArityMismatch {
                kind,
                expected,
                found,
                ..
            } => {
                assert_eq!(kind, FormulationKind::FreeRange);
                assert_eq!(expected, 8);
                assert_eq!(found, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_free_range_surcharge() {
        let p =
            FreeRangeParameters::from_bundle(&[10.0, 2.0, 4.0, 1.0, 1.0, 48.0, 96.0, 0.0]).unwrap();
        // 1 / (2 * 24) * 48 * (2 / 1 - 1) = 1
        assert!((p.injection_surcharge() - 1.0).abs() < 1e-12);
        // 1 / (4 * 24) * 96 * (4 / 1 - 1) = 3
        assert!((p.withdrawal_surcharge() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_minimum_and_default_rate_costs_nothing() {
        assert_eq!(flexibility_surcharge(3.0, 3.0, 120.0), 0.0);
    }

    #[test]
    fn test_minimum_rate_above_default_rejected() {
        let err = FreeRangeParameters::from_bundle(&[10.0, 2.0, 2.0, 3.0, 1.0, 1.0, 1.0, 0.0])
            .unwrap_err();
        assert!(matches!(
            err,
            ParameterError::MinimumAboveDefault {
                minimum_name: "min_injection_rate",
                ..
            }
        ));
    }

    #[test]
    fn test_capacity_scaled_surcharge() {
        let p = FixedRangeParameters::from_bundle(&[2.0, 4.0, 48.0, 48.0, 2.0, 1.5, 0.0]).unwrap();
        assert!((p.injection_surcharge(10.0) - 10.0).abs() < 1e-12);
        assert!((p.withdrawal_surcharge(10.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            StochasticParameters::from_bundle(&[10.0, 0.0, 1.0, 0.0]),
            Err(ParameterError::NonPositiveRate {
                name: "injection_rate",
                ..
            })
        ));
        assert!(matches!(
            FlexibleStochasticParameters::from_bundle(&[1.0, 1.0, 0.0, 0.0, 0.5, 2.0, 0.0]),
            Err(ParameterError::MultiplierBelowOne { .. })
        ));
        assert!(matches!(
            DeterministicParameters::from_bundle(&[10.0, 1.0, 1.0, 0.0, -1.0, 1.0]),
            Err(ParameterError::Negative { name: "limit_buying", .. })
        ));
    }

    #[test]
    fn test_fixed_capacity_kinds() {
        let fixed: Vec<FormulationKind> = FormulationKind::ALL
            .into_iter()
            .filter(|kind| kind.has_fixed_capacity())
            .collect();
        assert_eq!(
            fixed,
            vec![FormulationKind::FixedRange, FormulationKind::ThreeStageStochastic]
        );
    }

    #[test]
    fn test_tagged_parameters_type_declaration() {
        let declaration = FormulationParameters::decl();
        assert!(declaration.contains("FormulationParameters"));
        assert!(declaration.contains("\"fixed_range\""));
        assert!(declaration.contains("FlexibleStochasticParameters"));
    }
}
