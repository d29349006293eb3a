pub mod config;
pub mod data;
pub mod error;
pub mod formulation;
pub mod horizon;
pub mod model;
pub mod result;
pub mod scenario;
pub mod solver;

// Re-export commonly used items for convenience
pub use config::{HorizonClosing, OptimizerConfig, SolverBackend};
pub use error::{BidError, BidResult};
pub use formulation::{BidRequest, MarketInput, run};
pub use horizon::ForecastWindow;
pub use result::{OptimizationResult, OutputSelection, ResultVariables};
