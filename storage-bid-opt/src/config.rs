use std::time::Duration;

use storage_model::storage::FormulationKind;

/// Backend that solves the assembled mixed-integer model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverBackend {
    #[default]
    Highs,
    #[cfg(feature = "scip")]
    Scip,
}

/// Constraints placed on the last time step of the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizonClosing {
    /// `level[T-1] = 0`.
    EmptyStorage,
    /// `level[T-1] = 0` and `withdrawal[T-1] = 0`.
    EmptyStorageNoFinalWithdrawal,
}

impl HorizonClosing {
    /// Closing rule each formulation family was designed with. The
    /// scenario-tree formulations forbid the final withdrawal in the
    /// day-ahead stage, the single-scenario ones do not.
    pub fn default_for(kind: FormulationKind) -> Self {
        if kind.is_stochastic() {
            HorizonClosing::EmptyStorageNoFinalWithdrawal
        } else {
            HorizonClosing::EmptyStorage
        }
    }

    pub fn forbids_final_withdrawal(self) -> bool {
        matches!(self, HorizonClosing::EmptyStorageNoFinalWithdrawal)
    }
}

/// Configuration struct holding the solve settings shared by all formulations
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub backend: SolverBackend,
    /// Wall-clock limit handed to the backend; reaching it fails the call.
    pub time_limit: Option<Duration>,
    /// Print the solver log and report the model summary at info level.
    pub verbose: bool,
    /// Replaces the formulation's default closing rule when set.
    pub closing: Option<HorizonClosing>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Highs,
            time_limit: None,
            verbose: false,
            closing: None,
        }
    }
}

impl OptimizerConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_closing(mut self, closing: HorizonClosing) -> Self {
        self.closing = Some(closing);
        self
    }

    pub fn closing_for(&self, kind: FormulationKind) -> HorizonClosing {
        self.closing.unwrap_or_else(|| HorizonClosing::default_for(kind))
    }
}
