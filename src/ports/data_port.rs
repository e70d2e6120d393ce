//! Data access port trait.

use crate::domain::error::BacktestError;
use crate::domain::prices::{PriceTable, WeightTable};

pub trait DataPort {
    /// Load and validate the full price grid.
    fn load_prices(&self) -> Result<PriceTable, BacktestError>;

    /// Load and validate the dated weight schedule.
    fn load_weights(&self) -> Result<WeightTable, BacktestError>;
}
