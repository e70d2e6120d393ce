//! Share positions held by the ledger.

use std::collections::BTreeMap;
use std::collections::btree_map;

use super::prices::PriceRow;

/// Whole-share holdings keyed by asset.
///
/// An asset with no entry is a zero position. Entries are created the first
/// time an asset is traded (even by a zero-share trade) and are never pruned,
/// so an asset that was exited stays visible with quantity 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Positions {
    shares: BTreeMap<String, i64>,
}

impl Positions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity held, zero when the asset has never been traded.
    pub fn get(&self, asset: &str) -> i64 {
        self.shares.get(asset).copied().unwrap_or(0)
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.shares.contains_key(asset)
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, i64> {
        self.shares.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, i64> {
        &self.shares
    }

    /// Add `delta` shares, creating the entry if needed.
    pub(crate) fn apply(&mut self, asset: &str, delta: i64) {
        *self.shares.entry(asset.to_string()).or_insert(0) += delta;
    }

    /// Market value of every held asset at `prices`.
    ///
    /// Returns the first asset lacking a price as the error.
    pub fn market_value(&self, prices: &PriceRow) -> Result<f64, String> {
        let mut total = 0.0;
        for (asset, &quantity) in &self.shares {
            if quantity == 0 {
                continue;
            }
            match prices.get(asset) {
                Some(&price) => total += quantity as f64 * price,
                None => return Err(asset.clone()),
            }
        }
        Ok(total)
    }
}

impl<'a> IntoIterator for &'a Positions {
    type Item = (&'a String, &'a i64);
    type IntoIter = btree_map::Iter<'a, String, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.shares.iter()
    }
}
