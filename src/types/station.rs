//! Typed view over the rows of a standardized XEMA station table.

use crate::stations::radius_filter::DISTANCE_COLUMN;
use crate::tables::error::TableError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A single XEMA automatic weather station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Station code, e.g. `"X4"` for Barcelona - el Raval.
    pub code: String,
    pub name: Option<String>,
    /// Station type code (`codi_tipus`), `"A"` for automatic stations.
    pub station_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Altitude above sea level in meters.
    pub altitude: Option<f64>,
    pub municipality: Option<String>,
    pub county: Option<String>,
    pub province: Option<String>,
    /// Distance to the search point, only set on radius search results.
    pub distance_km: Option<f64>,
}

impl StationRecord {
    /// Extracts one record per row of a station table.
    ///
    /// Only `codi_estacio` is required. Other columns are read when present, and rows
    /// without a station code are skipped.
    pub fn from_frame(frame: &DataFrame) -> Result<Vec<StationRecord>, TableError> {
        let codes = frame
            .column("codi_estacio")
            .map_err(|e| TableError::MissingColumn("codi_estacio".to_string(), e))?
            .cast(&DataType::String)?;
        let codes = codes.str()?;

        let names = text_column(frame, "nom_estacio")?;
        let types = text_column(frame, "codi_tipus")?;
        let municipalities = text_column(frame, "nom_municipi")?;
        let counties = text_column(frame, "nom_comarca")?;
        let provinces = text_column(frame, "nom_provincia")?;
        let latitudes = float_column(frame, "latitud")?;
        let longitudes = float_column(frame, "longitud")?;
        let altitudes = float_column(frame, "altitud")?;
        let distances = float_column(frame, DISTANCE_COLUMN)?;

        let records = (0..frame.height())
            .filter_map(|row| {
                let code = codes.get(row)?;
                Some(StationRecord {
                    code: code.to_string(),
                    name: text_at(&names, row),
                    station_type: text_at(&types, row),
                    latitude: float_at(&latitudes, row),
                    longitude: float_at(&longitudes, row),
                    altitude: float_at(&altitudes, row),
                    municipality: text_at(&municipalities, row),
                    county: text_at(&counties, row),
                    province: text_at(&provinces, row),
                    distance_km: float_at(&distances, row),
                })
            })
            .collect();
        Ok(records)
    }
}

fn text_column(frame: &DataFrame, name: &str) -> PolarsResult<Option<StringChunked>> {
    match frame.column(name) {
        Ok(column) => Ok(Some(column.cast(&DataType::String)?.str()?.clone())),
        Err(_) => Ok(None),
    }
}

fn float_column(frame: &DataFrame, name: &str) -> PolarsResult<Option<Float64Chunked>> {
    match frame.column(name) {
        Ok(column) => Ok(Some(column.cast(&DataType::Float64)?.f64()?.clone())),
        Err(_) => Ok(None),
    }
}

fn text_at(column: &Option<StringChunked>, row: usize) -> Option<String> {
    column.as_ref()?.get(row).map(str::to_string)
}

fn float_at(column: &Option<Float64Chunked>, row: usize) -> Option<f64> {
    column.as_ref()?.get(row)
}
