pub mod series;
pub mod tree;

pub use series::{DateSeries, DatedValue, ScenarioSet};
pub use tree::ScenarioTree;
