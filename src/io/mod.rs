/// CSV export of dispatch results.
pub mod export;
