use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::{EnergySeries, Interval};
use crate::error::{Result, SimError};
use crate::tariff::TariffSchedule;

/// Timestamp column name.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
/// Site load column name (kW).
pub const LOAD_COLUMN: &str = "Load_kW";
/// Solar generation column name (kW).
pub const SOLAR_COLUMN: &str = "Solar_kW";
/// Import price column name (per kWh).
pub const TARIFF_COLUMN: &str = "TariffRate";

/// Columns every input file must carry, in lookup order.
pub const REQUIRED_COLUMNS: [&str; 4] = [TIMESTAMP_COLUMN, LOAD_COLUMN, SOLAR_COLUMN, TARIFF_COLUMN];

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Loads a series from a CSV file at `path`.
///
/// # Errors
///
/// See [`read_csv`]; additionally returns [`SimError::Io`] if the file cannot be opened.
pub fn load_csv(path: &Path, schedule: &TariffSchedule, dt_hours: f64) -> Result<EnergySeries> {
    let file = File::open(path)?;
    let series = read_csv(BufReader::new(file), schedule, dt_hours)?;
    debug!(path = %path.display(), intervals = series.len(), "loaded series");
    Ok(series)
}

/// Reads a series from CSV with columns `Timestamp`, `Load_kW`, `Solar_kW`, `TariffRate`.
///
/// The header is checked before any row is parsed. Extra columns are ignored.
/// Rates come from the file; the tier of each interval is derived from `schedule`.
/// Rows whose rate differs from the schedule's are reported in a single warning.
///
/// # Errors
///
/// - [`SimError::Schema`] naming the first missing required column.
/// - [`SimError::InvalidRecord`] for an unparseable timestamp or number.
/// - [`SimError::Configuration`] if the parsed intervals do not form a valid series.
pub fn read_csv(
    reader: impl Read,
    schedule: &TariffSchedule,
    dt_hours: f64,
) -> Result<EnergySeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut columns = [0_usize; 4];
    for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SimError::Schema {
                column: name.to_string(),
            })?;
    }
    let [ts_col, load_col, solar_col, rate_col] = columns;

    let mut intervals = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // header is row 1
        let row = i + 2;

        let raw_ts = record.get(ts_col).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| SimError::InvalidRecord {
            row,
            column: TIMESTAMP_COLUMN.to_string(),
            value: raw_ts.to_string(),
        })?;

        intervals.push(Interval {
            timestamp,
            duration_hours: dt_hours,
            load_kw: parse_number(&record, load_col, row, LOAD_COLUMN)?,
            solar_kw: parse_number(&record, solar_col, row, SOLAR_COLUMN)?,
            tariff_rate: parse_number(&record, rate_col, row, TARIFF_COLUMN)?,
            tier: schedule.tier_for(timestamp),
        });
    }

    let mismatched = rate_mismatches(&intervals, schedule);
    if let Some(first) = mismatched.first() {
        warn!(
            rows = mismatched.len(),
            first = %first,
            "file tariff rates differ from the schedule; tiers follow the schedule"
        );
    }

    EnergySeries::new(dt_hours, intervals)
}

/// Timestamps of intervals whose rate differs from the schedule's rate.
fn rate_mismatches(intervals: &[Interval], schedule: &TariffSchedule) -> Vec<NaiveDateTime> {
    intervals
        .iter()
        .filter(|iv| (schedule.rate_for(iv.timestamp).0 - iv.tariff_rate).abs() > 1e-9)
        .map(|iv| iv.timestamp)
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn parse_number(record: &csv::StringRecord, col: usize, row: usize, column: &str) -> Result<f64> {
    let raw = record.get(col).unwrap_or_default();
    raw.parse::<f64>().map_err(|_| SimError::InvalidRecord {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })
}
