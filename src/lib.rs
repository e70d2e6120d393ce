//! stratbt: weight-driven portfolio backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], composition in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
