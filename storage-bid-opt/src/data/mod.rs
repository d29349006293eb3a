//! Market-data collaborator: forecast files, their JSON cache and the
//! provider seam the bidding calls read from.

pub mod provider;
pub mod workbook;

pub use provider::{MarketDataProvider, WorkbookMarketData};
pub use workbook::{CacheStatus, Loaded, MarketWorkbook, load_workbook};
