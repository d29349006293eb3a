use storage_model::ParameterError;
use thiserror::Error;

use crate::solver::SolveStatus;

/// Errors surfaced by the bidding entry points.
#[derive(Debug, Error)]
pub enum BidError {
    /// The forecast window is reversed or leaves no trading day.
    #[error("invalid forecast range: {0}")]
    InvalidRange(String),
    /// Input shapes do not fit together (scenario sets, series lengths, variant).
    #[error("malformed model input: {0}")]
    Structural(String),
    #[error(transparent)]
    Parameters(#[from] ParameterError),
    /// The solver finished without an optimal solution.
    #[error("optimization did not reach an optimal solution: {status}")]
    NotOptimal { status: SolveStatus },
    #[error("market data unavailable: {0:#}")]
    MarketData(#[from] anyhow::Error),
}

pub type BidResult<T> = Result<T, BidError>;
