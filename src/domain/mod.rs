//! Core domain types and logic.

pub mod prices;
pub mod position;
pub mod sizer;
pub mod ledger;
pub mod policy;
pub mod backtest;
pub mod stats;
pub mod config_validation;
pub mod error;
