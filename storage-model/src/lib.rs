pub mod error;
pub mod market;
pub mod storage;

pub use error::ParameterError;
