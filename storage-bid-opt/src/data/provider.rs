use anyhow::{Context, Result};
use storage_model::market::DateSeries;

use crate::data::workbook::MarketWorkbook;
use crate::error::BidResult;
use crate::formulation::MarketInput;

/// Source of the price and demand forecasts of a single-scenario call.
pub trait MarketDataProvider {
    fn prices(&self) -> Result<DateSeries>;

    fn demand(&self) -> Result<DateSeries>;

    fn market_input(&self) -> BidResult<MarketInput> {
        Ok(MarketInput::Single {
            prices: self.prices()?,
            demand: self.demand()?,
        })
    }
}

/// Serves prices and demand from two named sheets of a workbook.
#[derive(Debug, Clone)]
pub struct WorkbookMarketData {
    pub workbook: MarketWorkbook,
    pub price_sheet: String,
    pub demand_sheet: String,
}

impl WorkbookMarketData {
    pub fn new(
        workbook: MarketWorkbook,
        price_sheet: impl Into<String>,
        demand_sheet: impl Into<String>,
    ) -> Self {
        Self {
            workbook,
            price_sheet: price_sheet.into(),
            demand_sheet: demand_sheet.into(),
        }
    }

    fn sheet(&self, name: &str) -> Result<DateSeries> {
        self.workbook
            .sheet(name)
            .cloned()
            .with_context(|| format!("Sheet '{}' not found in market data", name))
    }
}

impl MarketDataProvider for WorkbookMarketData {
    fn prices(&self) -> Result<DateSeries> {
        self.sheet(&self.price_sheet)
    }

    fn demand(&self) -> Result<DateSeries> {
        self.sheet(&self.demand_sheet)
    }
}
