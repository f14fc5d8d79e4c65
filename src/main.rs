//! Simulator entry point: CLI wiring and config-driven scenario runs.

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pv_battery_sim::cli::CliArgs;
use pv_battery_sim::config::ScenarioConfig;
use pv_battery_sim::io::export::export_csv;
use pv_battery_sim::reporting::{print_report, to_json};
use pv_battery_sim::scenario::{BASELINE, CostBenefit, run_scenarios};
use pv_battery_sim::series::loader::load_csv;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();

    let args = CliArgs::parse();
    run(&args)
}

fn load_config(args: &CliArgs) -> anyhow::Result<ScenarioConfig> {
    let mut config = match (&args.scenario, &args.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path)
            .with_context(|| format!("failed to load scenario `{}`", path.display()))?,
        (None, Some(name)) => ScenarioConfig::from_preset(name)?,
        (None, None) => ScenarioConfig::phase_i(),
    };

    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(days) = args.days {
        config.simulation.days = days;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        bail!("invalid configuration ({} error(s))", errors.len());
    }
    Ok(config)
}

fn run(args: &CliArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    info!(
        sites = config.sites.len(),
        days = config.simulation.days,
        steps_per_day = config.simulation.steps_per_day,
        seed = config.simulation.seed,
        "configuration loaded"
    );

    let series = match &args.input {
        Some(path) => load_csv(path, &config.tariff, config.dt_hours())
            .with_context(|| format!("failed to load series `{}`", path.display()))?,
        None => config.build_series().context("failed to generate series")?,
    };
    info!(
        intervals = series.len(),
        load_kwh = series.total_load_kwh(),
        solar_kwh = series.total_solar_kwh(),
        "series ready"
    );

    let spec = config.battery.to_spec();
    let scenarios = config.policy.scenarios();
    let outcomes = run_scenarios(&scenarios, &series, &spec, config.simulation.initial_soc_kwh)?;
    let cost_benefit = CostBenefit::from_outcomes(&outcomes, BASELINE)?;
    info!(scenarios = outcomes.len(), "simulation complete");

    if let Some(path) = &args.telemetry_out {
        let Some(outcome) = outcomes.iter().find(|o| o.name == args.telemetry_scenario) else {
            bail!(
                "unknown telemetry scenario `{}`, available: {}",
                args.telemetry_scenario,
                outcomes.iter().map(|o| o.name.as_str()).collect::<Vec<_>>().join(", ")
            );
        };
        export_csv(&outcome.results, path)
            .with_context(|| format!("failed to write telemetry `{}`", path.display()))?;
        info!(path = %path.display(), scenario = %outcome.name, "telemetry exported");
    }

    if args.json {
        println!("{}", to_json(&cost_benefit)?);
    } else {
        print_report(&cost_benefit);
    }
    Ok(())
}
