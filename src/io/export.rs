//! CSV export for per-interval dispatch results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::IntervalResult;

/// Column header for CSV interval export.
const HEADER: &str = "timestamp,tier,tariff_rate,load_kwh,solar_kwh,soc_kwh,\
                      charge_kwh,solar_charge_kwh,grid_charge_kwh,discharge_kwh,\
                      discharge_delivered_kwh,import_kwh,export_kwh,cost";

/// Timestamp layout used in exported files; the loader accepts it back.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exports dispatch results to a CSV file at the given path.
///
/// Writes a header row followed by one data row per interval. Produces
/// byte-identical output for identical inputs.
///
/// # Arguments
///
/// * `results` - Complete dispatch results for one scenario
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[IntervalResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes dispatch results as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[IntervalResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        wtr.write_record(&[
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            r.tier.to_string(),
            format!("{:.4}", r.tariff_rate),
            format!("{:.4}", r.load_kwh),
            format!("{:.4}", r.solar_kwh),
            format!("{:.4}", r.soc_kwh),
            format!("{:.4}", r.charge_kwh),
            format!("{:.4}", r.solar_charge_kwh),
            format!("{:.4}", r.grid_charge_kwh),
            format!("{:.4}", r.discharge_kwh),
            format!("{:.4}", r.discharge_delivered_kwh),
            format!("{:.4}", r.import_kwh),
            format!("{:.4}", r.export_kwh),
            format!("{:.4}", r.cost),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
