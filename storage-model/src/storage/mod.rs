pub mod limits;
pub mod parameters;

pub use limits::TradeLimits;
pub use parameters::{
    DeterministicParameters, FixedRangeParameters, FlexibleStochasticParameters, FormulationKind,
    FormulationParameters, FreeRangeParameters, StochasticParameters,
};
