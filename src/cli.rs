//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

use crate::scenario::PRICE_DRIVEN;

#[derive(Debug, Parser)]
#[command(name = "pv-battery-sim")]
#[command(author, version, about = "Time-of-use cost simulator for solar and battery sites")]
#[command(
    long_about = "Runs the baseline, solar-only, fixed-window, and price-driven scenarios over \
    one energy series and reports savings against the grid-only baseline.\n\
    \nData Sources:\n  \
    - Preset: --preset <name> (phase_i, phase_ii)\n  \
    - Config: --scenario <path.toml>\n  \
    - Metered CSV: --input <path.csv> (Timestamp, Load_kW, Solar_kW, TariffRate)\n\
    \nExamples:\n  \
    pv-battery-sim\n  \
    pv-battery-sim --preset phase_ii --days 7 --json\n  \
    pv-battery-sim --input site.csv --telemetry-out dispatch.csv"
)]
pub struct CliArgs {
    /// Load configuration from a TOML file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (phase_i, phase_ii)
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Read the energy series from a CSV file instead of generating one
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Override the random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the number of simulated days
    #[arg(long)]
    pub days: Option<usize>,

    /// Export one scenario's per-interval results to CSV
    #[arg(long, value_name = "PATH")]
    pub telemetry_out: Option<PathBuf>,

    /// Scenario exported by --telemetry-out
    #[arg(long, value_name = "NAME", default_value = PRICE_DRIVEN)]
    pub telemetry_scenario: String,

    /// Print the cost-benefit comparison as JSON on stdout
    #[arg(long)]
    pub json: bool,
}
