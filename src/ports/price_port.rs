//! Price lookup port consumed by the ledger.

use crate::domain::error::BacktestError;
use crate::domain::prices::PriceRow;
use chrono::NaiveDate;

/// Read-only close-price lookup.
///
/// Implementations must be side-effect free: the ledger asks for exactly the
/// row at the rebalance date and nothing later.
pub trait PriceSource {
    fn row_at(&self, date: NaiveDate) -> Result<&PriceRow, BacktestError>;

    /// All dates with a price row, ascending.
    fn timestamps(&self) -> Vec<NaiveDate>;
}
