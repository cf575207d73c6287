//! Brings raw XEMA tables into the canonical schema: columns are renamed first and then
//! coerced to their canonical types, so type maps are always keyed by canonical names.
//!
//! Upstream schema drift is tolerated. Absent columns are skipped and values that don't
//! fit become null. A column that cannot be converted at all is left untouched with a
//! warning.

use crate::types::column_type::ColumnType;
use crate::types::dataset::{RenameMap, TypeMap};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use polars::prelude::*;
use std::collections::HashSet;

/// Layouts tried, in order, for datetime columns without an explicit format
/// (after RFC 3339).
const FALLBACK_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    // Offsets without a colon, as written by the CSV writer.
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%d/%m/%Y %I:%M:%S %p",
    "%Y-%m-%d",
];

/// Returns a renamed and retyped copy of `frame`; the input is left untouched.
///
/// Missing values, and values that cannot be converted, end up as nulls. Integer
/// columns become nullable `Int64` and datetime columns become `Datetime(ms, "UTC")`.
///
/// # Examples
///
/// ```
/// use polars::prelude::*;
/// use xema::{standardize, ColumnType, RenameMap, TypeMap};
///
/// let raw = df!("LAT" => ["41.39", "n/a"]).unwrap();
/// let renames = RenameMap::from([("LAT".to_string(), "latitud".to_string())]);
/// let types = TypeMap::from([("latitud".to_string(), ColumnType::Float)]);
///
/// let standard = standardize(&raw, Some(&renames), Some(&types));
/// let latitud = standard.column("latitud").unwrap().f64().unwrap();
/// assert_eq!(latitud.get(0), Some(41.39));
/// assert_eq!(latitud.get(1), None);
/// ```
pub fn standardize(
    frame: &DataFrame,
    rename_map: Option<&RenameMap>,
    type_map: Option<&TypeMap>,
) -> DataFrame {
    let mut standardized = frame.clone();

    let rename_map = rename_map.filter(|map| !map.is_empty());
    let type_map = type_map.filter(|map| !map.is_empty());
    if rename_map.is_none() && type_map.is_none() {
        warn!("No column mapping or dtype map provided; returning copy of original DataFrame.");
        return standardized;
    }

    if let Some(renames) = rename_map {
        rename_columns(&mut standardized, renames);
    }
    if let Some(types) = type_map {
        coerce_columns(&mut standardized, types);
    }
    standardized
}

fn rename_columns(frame: &mut DataFrame, renames: &RenameMap) {
    let current: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let renamed: Vec<String> = current
        .iter()
        .map(|name| renames.get(name).unwrap_or(name).clone())
        .collect();
    if renamed == current {
        return;
    }

    let unique: HashSet<&String> = renamed.iter().collect();
    if unique.len() == renamed.len() {
        if let Err(e) = frame.set_column_names(renamed.iter().map(String::as_str)) {
            warn!("Failed to rename columns: {}; leaving names as-is.", e);
        }
        return;
    }

    // Some targets collide: apply what can be applied one column at a time.
    for (old, new) in current.iter().zip(renamed.iter()) {
        if old == new {
            continue;
        }
        if let Err(e) = frame.rename(old, new.as_str().into()) {
            warn!(
                "Failed to rename column '{}' to '{}': {}; leaving it as-is.",
                old, new, e
            );
        }
    }
}

fn coerce_columns(frame: &mut DataFrame, types: &TypeMap) {
    for (name, column_type) in types {
        let Ok(column) = frame.column(name) else {
            continue;
        };
        let series = column.as_materialized_series().clone();

        match coerce_series(&series, column_type) {
            Ok(coerced) => {
                if let Err(e) = frame.with_column(coerced) {
                    warn!("Failed to replace column '{}': {}; leaving as-is.", name, e);
                }
            }
            Err(e) => warn!(
                "Failed to cast column '{}' to {}: {}; leaving as-is.",
                name, column_type, e
            ),
        }
    }
}

/// Converts one series to `column_type`, turning values that don't fit into nulls.
pub(crate) fn coerce_series(series: &Series, column_type: &ColumnType) -> PolarsResult<Series> {
    let coerced = match column_type {
        ColumnType::String => return series.cast(&DataType::String),
        ColumnType::Float => parse_floats(series)?.into_series(),
        ColumnType::Integer => to_integer(series)?,
        ColumnType::UtcDatetime(format) => to_utc_datetime(series, format.as_deref())?,
    };

    let newly_missing = coerced.null_count().saturating_sub(series.null_count());
    if newly_missing > 0 {
        warn!(
            "{} value(s) in column '{}' could not be converted to {} and are now missing.",
            newly_missing,
            series.name(),
            column_type
        );
    } else {
        debug!("Converted column '{}' to {}", series.name(), column_type);
    }
    Ok(coerced)
}

fn parse_floats(series: &Series) -> PolarsResult<Float64Chunked> {
    let values: Float64Chunked = match series.dtype() {
        DataType::Float64
        | DataType::Float32
        | DataType::Int64
        | DataType::Int32
        | DataType::UInt64
        | DataType::UInt32 => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|value| value.filter(|value| value.is_finite()))
            .collect(),
        _ => {
            let text = series.cast(&DataType::String)?;
            text.str()?
                .into_iter()
                .map(|value| {
                    value
                        .and_then(|value| value.trim().parse::<f64>().ok())
                        .filter(|value| value.is_finite())
                })
                .collect()
        }
    };
    Ok(values.with_name(series.name().clone()))
}

fn to_integer(series: &Series) -> PolarsResult<Series> {
    if series.dtype() == &DataType::Int64 {
        return Ok(series.clone());
    }

    let floats = parse_floats(series)?;
    let unrepresentable = (&floats).into_iter().flatten().any(|value| {
        value.fract() != 0.0 || value < i64::MIN as f64 || value >= i64::MAX as f64
    });
    if unrepresentable {
        warn!(
            "Column '{}' holds non-integral or out of range values; keeping it as float.",
            series.name()
        );
        return Ok(floats.into_series());
    }

    let integers: Int64Chunked = (&floats)
        .into_iter()
        .map(|value| value.map(|value| value as i64))
        .collect();
    Ok(integers.with_name(series.name().clone()).into_series())
}

fn to_utc_datetime(series: &Series, format: Option<&str>) -> PolarsResult<Series> {
    if let DataType::Datetime(_, _) = series.dtype() {
        return series.cast(&DataType::Datetime(
            TimeUnit::Milliseconds,
            Some("UTC".into()),
        ));
    }

    let text = series.cast(&DataType::String)?;
    let millis: Int64Chunked = text
        .str()?
        .into_iter()
        .map(|value| {
            value
                .and_then(|value| parse_utc_datetime(value.trim(), format))
                .map(|datetime| datetime.timestamp_millis())
        })
        .collect();
    Ok(millis
        .with_name(series.name().clone())
        .into_datetime(TimeUnit::Milliseconds, Some("UTC".into()))
        .into_series())
}

/// Parses a timestamp as UTC, using `format` when given and the common layouts otherwise.
/// Values carrying an offset are converted to UTC; naive values are taken to be UTC.
pub fn parse_utc_datetime(value: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    match format {
        Some(format) => parse_with_format(value, format),
        None => DateTime::parse_from_rfc3339(value)
            .map(|datetime| datetime.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                FALLBACK_DATETIME_FORMATS
                    .iter()
                    .find_map(|format| parse_with_format(value, format))
            }),
    }
}

fn parse_with_format(value: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_str(value, format) {
        return Some(datetime.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(value, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
