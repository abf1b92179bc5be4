//! Comparison of simulated air temperatures with VDI 6007 reference results.

use std::path::Path;

use itertools::Itertools;
use log::warn;

use crate::error::Error;
use crate::tools::{kelvin_to_celsius, mean};

/// Days of the horizon the reference results are given for.
pub const REFERENCE_DAYS: [usize; 3] = [1, 10, 60];

/// Reference air temperatures, hourly means in °C, one column per reference day.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceResults {
    pub days: Vec<(usize, Vec<f64>)>,
}

impl ReferenceResults {
    pub fn day(&self, day: usize) -> Option<&[f64]> {
        self.days
            .iter()
            .find(|(d, _)| *d == day)
            .map(|(_, values)| values.as_slice())
    }
}

/// Simulated and reference hourly air temperatures of one day.
#[derive(Clone, Debug, PartialEq)]
pub struct DayComparison {
    pub day: usize,
    pub simulated: Vec<f64>,
    pub reference: Vec<f64>,
    pub max_deviation: f64,
}

/// Means over consecutive full hours. A trailing partial hour is dropped.
pub fn hourly_means(series: &[f64], steps_per_hour: usize) -> Vec<f64> {
    if steps_per_hour == 0 {
        return Vec::new();
    }
    series
        .chunks_exact(steps_per_hour)
        .filter_map(mean)
        .collect()
}

/// The 24 hourly values of day `day` (1-based), if the series covers it.
pub fn day_window(hourly: &[f64], day: usize) -> Option<&[f64]> {
    let start = day.checked_sub(1)? * 24;
    hourly.get(start..start + 24)
}

pub fn max_abs_deviation(simulated: &[f64], reference: &[f64]) -> Result<f64, Error> {
    if simulated.len() != reference.len() {
        return Err(Error::DimensionMismatch {
            signal: "reference".into(),
            expected: simulated.len(),
            found: reference.len(),
        });
    }
    Ok(simulated
        .iter()
        .zip(reference)
        .map(|(s, r)| (s - r).abs())
        .fold(0.0, f64::max))
}

/// Read a reference file: 24 rows of three comma separated temperatures in °C, the
/// hourly mean air temperature of days 1, 10 and 60. Lines starting with `#` are ignored.
pub fn load_reference<P: AsRef<Path>>(path: P) -> Result<ReferenceResults, Error> {
    let path = path.as_ref();
    let malformed = |reason: String| Error::MalformedReferenceFile {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))?;

    let mut rows = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        if record.len() != REFERENCE_DAYS.len() {
            return Err(malformed(format!(
                "row {row} has {} columns, expected {}",
                record.len(),
                REFERENCE_DAYS.len()
            )));
        }
        let values = record
            .iter()
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|e| malformed(format!("row {row}: {field:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(values);
    }
    if rows.len() != 24 {
        return Err(malformed(format!("{} rows, expected 24", rows.len())));
    }

    let days = REFERENCE_DAYS
        .iter()
        .enumerate()
        .map(|(column, day)| (*day, rows.iter().map(|row| row[column]).collect_vec()))
        .collect();
    Ok(ReferenceResults { days })
}

/// Hourly means of a simulated air temperature series (K) in °C, compared with the
/// reference days it covers.
pub fn compare(
    air_temperature: &[f64],
    steps_per_hour: usize,
    reference: &ReferenceResults,
) -> Result<Vec<DayComparison>, Error> {
    let hourly = hourly_means(air_temperature, steps_per_hour)
        .into_iter()
        .map(kelvin_to_celsius)
        .collect_vec();

    let mut comparisons = Vec::new();
    for (day, expected) in reference.days.iter() {
        let Some(simulated) = day_window(&hourly, *day) else {
            warn!("Simulation does not cover reference day {}", day);
            continue;
        };
        comparisons.push(DayComparison {
            day: *day,
            simulated: simulated.to_vec(),
            reference: expected.clone(),
            max_deviation: max_abs_deviation(simulated, expected)?,
        });
    }
    Ok(comparisons)
}
