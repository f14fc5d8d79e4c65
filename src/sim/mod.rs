pub mod engine;
/// Post-hoc totals per scenario run.
pub mod kpi;
/// Dispatch policies and efficiency conventions.
pub mod policy;
pub mod power_balance;
pub mod types;
