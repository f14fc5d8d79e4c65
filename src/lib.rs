//! Time-of-use cost simulator for sites with solar generation and battery storage.

pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
pub mod io;
pub mod reporting;
/// Named scenario runs and cost-benefit comparison.
pub mod scenario;
pub mod series;
/// Dispatch engine, policies, and per-run totals.
pub mod sim;
pub mod tariff;
