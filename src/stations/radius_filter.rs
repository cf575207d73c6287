use crate::stations::geodesy::distance_km;
use crate::tables::error::TableError;
use crate::tables::table_io::load_csv;
use log::{error, info, warn};
use polars::prelude::*;
use std::path::PathBuf;

pub const LATITUDE_COLUMN: &str = "latitud";
pub const LONGITUDE_COLUMN: &str = "longitud";
pub const DISTANCE_COLUMN: &str = "dist_km";

/// Where the station table comes from.
#[derive(Debug, Clone)]
pub enum StationSource {
    Frame(DataFrame),
    /// A CSV file, loaded with [`crate::load_csv`].
    Path(PathBuf),
}

impl From<DataFrame> for StationSource {
    fn from(frame: DataFrame) -> Self {
        StationSource::Frame(frame)
    }
}

impl From<PathBuf> for StationSource {
    fn from(path: PathBuf) -> Self {
        StationSource::Path(path)
    }
}

/// Stations within `radius_km` of `(lat, lon)`, closest first.
///
/// The result carries an extra `dist_km` column. Stations without coordinates are
/// dropped. Any failure (unreadable file, missing coordinate columns) is logged and
/// yields an empty frame.
pub fn stations_within_radius(
    lat: f64,
    lon: f64,
    radius_km: f64,
    source: impl Into<StationSource>,
) -> DataFrame {
    match try_stations_within_radius(lat, lon, radius_km, source.into()) {
        Ok(stations) => stations,
        Err(e) => {
            error!("An error occurred while getting the stations: {}", e);
            DataFrame::empty()
        }
    }
}

fn try_stations_within_radius(
    lat: f64,
    lon: f64,
    radius_km: f64,
    source: StationSource,
) -> Result<DataFrame, TableError> {
    let mut stations = match source {
        StationSource::Frame(frame) => {
            info!("Using DataFrame provided as data source.");
            frame
        }
        StationSource::Path(path) => {
            info!("Loading XEMA station data from {}...", path.display());
            load_csv(&path)?
        }
    };

    if stations.height() == 0 {
        warn!("No station data found. Returning empty DataFrame.");
        return Ok(stations);
    }

    let distances = distance_column(&stations, lat, lon)?;
    let within = distances.lt_eq(radius_km);
    stations.with_column(distances.into_series())?;

    let filtered = stations
        .filter(&within)?
        .sort([DISTANCE_COLUMN], SortMultipleOptions::default())?;
    info!(
        "Found {} stations within the {} km radius.",
        filtered.height(),
        radius_km
    );
    Ok(filtered)
}

fn distance_column(stations: &DataFrame, lat: f64, lon: f64) -> Result<Float64Chunked, TableError> {
    let latitudes = coordinate(stations, LATITUDE_COLUMN)?;
    let longitudes = coordinate(stations, LONGITUDE_COLUMN)?;

    let distances: Float64Chunked = latitudes
        .f64()?
        .into_iter()
        .zip(longitudes.f64()?.into_iter())
        .map(|(station_lat, station_lon)| match (station_lat, station_lon) {
            (Some(station_lat), Some(station_lon)) => {
                Some(distance_km(lat, lon, station_lat, station_lon))
            }
            _ => None,
        })
        .collect();
    Ok(distances.with_name(DISTANCE_COLUMN.into()))
}

fn coordinate(stations: &DataFrame, name: &str) -> Result<Column, TableError> {
    stations
        .column(name)
        .map_err(|e| TableError::MissingColumn(name.to_string(), e))?
        .cast(&DataType::Float64)
        .map_err(TableError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::geodesy::EARTH_RADIUS_KM;
    use crate::tables::table_io::save_csv;
    use tempfile::tempdir;

    // Degrees of longitude along the equator that correspond to `km`.
    fn lon_for_km(km: f64) -> f64 {
        (km / EARTH_RADIUS_KM).to_degrees()
    }

    fn stations() -> DataFrame {
        df!(
            "codi_estacio" => ["FAR", "NEAR", "MID"],
            "nom_estacio" => ["Far", "Near", "Mid"],
            "latitud" => [0.0, 0.0, 0.0],
            "longitud" => [lon_for_km(10.0), lon_for_km(1.0), lon_for_km(5.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_keeps_stations_inside_radius_sorted_by_distance() -> PolarsResult<()> {
        let found = stations_within_radius(0.0, 0.0, 6.0, stations());

        assert_eq!(found.height(), 2);
        let codes = found.column("codi_estacio")?.str()?;
        assert_eq!(codes.get(0), Some("NEAR"));
        assert_eq!(codes.get(1), Some("MID"));

        let distances = found.column(DISTANCE_COLUMN)?.f64()?;
        assert!((distances.get(0).unwrap() - 1.0).abs() < 1e-6);
        assert!((distances.get(1).unwrap() - 5.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_radius_is_inclusive() -> PolarsResult<()> {
        let frame = df!("latitud" => [0.0], "longitud" => [0.0])?;
        let found = stations_within_radius(0.0, 0.0, 0.0, frame);
        assert_eq!(found.height(), 1);
        Ok(())
    }

    #[test]
    fn test_text_coordinates_and_missing_values() -> PolarsResult<()> {
        let frame = df!(
            "codi_estacio" => ["A", "B", "C"],
            "latitud" => [Some("41.39"), None, Some("41.40")],
            "longitud" => [Some("2.17"), Some("2.17"), Some("n/a")],
        )?;
        let found = stations_within_radius(41.39, 2.17, 50.0, frame);
        assert_eq!(found.height(), 1);
        assert_eq!(found.column("codi_estacio")?.str()?.get(0), Some("A"));
        Ok(())
    }

    #[test]
    fn test_empty_table_yields_empty_result() {
        let found = stations_within_radius(0.0, 0.0, 100.0, DataFrame::empty());
        assert_eq!(found.height(), 0);
    }

    #[test]
    fn test_missing_columns_yield_empty_result() -> PolarsResult<()> {
        let frame = df!("codi_estacio" => ["A"], "lat" => [0.0], "lon" => [0.0])?;
        let found = stations_within_radius(0.0, 0.0, 100.0, frame);
        assert_eq!(found.height(), 0);
        assert_eq!(found.width(), 0);
        Ok(())
    }

    #[test]
    fn test_loads_stations_from_path() -> Result<(), TableError> {
        let dir = tempdir().map_err(|e| TableError::Io("tempdir".into(), e))?;
        let path = dir.path().join("stations_raw_metadata.csv");
        save_csv(&stations(), &path, true)?;

        let found = stations_within_radius(0.0, 0.0, 20.0, path);
        assert_eq!(found.height(), 3);
        assert_eq!(found.column("codi_estacio")?.str()?.get(2), Some("FAR"));

        let missing = stations_within_radius(0.0, 0.0, 20.0, dir.path().join("nope.csv"));
        assert_eq!(missing.height(), 0);
        Ok(())
    }
}
