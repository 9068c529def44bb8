//! Record time axes.
//!
//! Time variables carry a CF-style `units` attribute of the form
//! `"<unit> since <reference date>"`. Values are copied from source to
//! destination for the selected records and converted between reference
//! epochs when both sides declare units.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ndarray::Array1;
use tracing::{debug, warn};

use crate::error::{RegridError, Result};
use crate::store::{RecordSource, RecordStore};

/// Unit of a time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Parse a unit name, singular or plural, case-insensitive.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Some(Self::Seconds),
            "min" | "mins" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hours),
            "d" | "day" | "days" => Some(Self::Days),
            _ => None,
        }
    }

    /// Length of one unit in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 86400.0,
        }
    }
}

/// Parsed `"<unit> since <epoch>"` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub epoch: NaiveDateTime,
}

impl TimeUnits {
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || RegridError::incompatible_field("time", format!("unrecognised units '{}'", s));

        let (unit, epoch) = s.trim().split_once(" since ").ok_or_else(invalid)?;
        let unit = TimeUnit::from_str(unit.trim()).ok_or_else(invalid)?;
        let epoch = parse_epoch(epoch.trim()).ok_or_else(invalid)?;
        Ok(Self { unit, epoch })
    }

    /// Convert `value` in these units to `target` units.
    pub fn convert(&self, value: f64, target: &TimeUnits) -> f64 {
        let offset = (self.epoch - target.epoch).num_milliseconds() as f64 / 1000.0;
        (value * self.unit.seconds() + offset) / target.unit.seconds()
    }
}

fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    let s = s
        .trim_end_matches("UTC")
        .trim_end_matches('Z')
        .trim();
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn units_of<S: RecordSource + ?Sized>(store: &S, name: &str) -> Option<String> {
    store
        .attribute(name, "units")
        .and_then(|v| v.as_str().map(str::to_string))
}

/// First of `candidates` present in `source`.
pub fn find_time_variable<'a, S: RecordSource + ?Sized>(
    source: &S,
    candidates: &'a [String],
) -> Option<&'a str> {
    candidates
        .iter()
        .map(String::as_str)
        .find(|name| source.contains(name))
}

/// Copy the time values of `records` from `source_var` into `output_var`.
///
/// Values are converted when both variables carry parseable `units`; a
/// missing attribute on either side copies them unchanged. Does nothing and
/// returns `false` when the output has no such variable.
pub fn propagate_time<S, D>(
    source: &S,
    source_var: &str,
    records: &[usize],
    output: &mut D,
    output_var: &str,
) -> Result<bool>
where
    S: RecordSource + ?Sized,
    D: RecordStore + ?Sized,
{
    if !output.contains(output_var) {
        debug!(variable = output_var, "Output has no time axis");
        return Ok(false);
    }

    let times = source.read_variable(source_var)?;
    let mut values = Vec::with_capacity(records.len());
    for &record in records {
        let value = times.iter().nth(record).copied().ok_or(RegridError::RecordOutOfRange {
            record,
            available: times.len(),
        })?;
        values.push(value);
    }

    let conversion = match (units_of(source, source_var), units_of(output, output_var)) {
        (Some(from), Some(to)) => Some((TimeUnits::parse(&from)?, TimeUnits::parse(&to)?)),
        (from, to) => {
            if from.is_some() != to.is_some() {
                warn!(
                    source = source_var,
                    output = output_var,
                    "Time units declared on one side only, copying raw values"
                );
            }
            None
        }
    };
    if let Some((from, to)) = conversion {
        values.iter_mut().for_each(|v| *v = from.convert(*v, &to));
    }

    let values = Array1::from(values).into_dyn();
    let available = output.shape(output_var)?.first().copied().unwrap_or(0);
    if available == values.len() {
        output.write_variable(output_var, values.view())?;
    } else {
        for (i, value) in values.iter().enumerate() {
            let scalar = ndarray::arr0(*value).into_dyn();
            output.write_record(output_var, i, scalar.view())?;
        }
    }
    Ok(true)
}
