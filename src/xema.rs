//! Main entry point of the crate: a client for the XEMA datasets on the Catalan open data
//! portal. It fetches readings and station metadata through SODA pagination, keeps local
//! copies of the reference tables and searches stations around a location.

use crate::error::XemaError;
use crate::fetching::page_source::{HttpPageSource, PageSource, DEFAULT_TIMEOUT};
use crate::fetching::paginated_fetcher::PaginatedFetcher;
use crate::schema::standardizer::standardize;
use crate::stations::radius_filter::stations_within_radius;
use crate::tables::error::TableError;
use crate::tables::table_io::{load_csv_as_text, save_csv};
use crate::types::dataset::Dataset;
use crate::types::filter::FilterSpec;
use crate::types::station::StationRecord;
use crate::utils::{ensure_dir_exists, get_data_dir};
use bon::bon;
use log::info;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cap on the number of rows accumulated by [`Xema::fetch`].
pub const DEFAULT_MAX_ROWS: usize = 50_000;
/// Default search radius of [`Xema::find_stations`], in kilometers.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// A geographical coordinate: latitude first, longitude second, both in degrees.
///
/// # Examples
///
/// ```
/// use xema::LatLon;
///
/// let barcelona = LatLon(41.3874, 2.1686);
/// assert_eq!(barcelona.0, 41.3874);
/// assert_eq!(barcelona.1, 2.1686);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// Client for the XEMA weather network datasets.
///
/// Reference tables (stations and variables) are stored as CSV files in a data folder and
/// reused by later calls. Readings are always fetched from the portal.
///
/// # Examples
///
/// ```rust
/// # use xema::{Xema, XemaError};
/// # async fn run() -> Result<(), XemaError> {
/// // Uses the default data folder and no app token.
/// let client = Xema::new().await?;
///
/// // Or configure it.
/// let client = Xema::connect()
///     .data_folder("/tmp/xema")
///     .app_token("my-socrata-token")
///     .call()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Xema<S = HttpPageSource> {
    fetcher: PaginatedFetcher<S>,
    data_dir: PathBuf,
}

#[bon]
impl Xema<HttpPageSource> {
    /// Creates a client storing its tables in the default data folder
    /// (e.g. `~/.local/share/xema_rs` on Linux), without an app token.
    ///
    /// # Errors
    ///
    /// Returns [`XemaError::DataDirResolution`] if the data folder cannot be determined and
    /// [`XemaError::DataDirCreation`] if it cannot be created.
    pub async fn new() -> Result<Self, XemaError> {
        Self::connect().call().await
    }

    /// Creates a configured client.
    ///
    /// # Arguments
    ///
    /// * `.data_folder(impl Into<PathBuf>)`: Optional. Where reference tables are kept; created if needed.
    /// * `.app_token(impl Into<String>)`: Optional. Socrata app token, sent as `X-App-Token`. Empty tokens are ignored.
    /// * `.request_timeout(Duration)`: Optional. Per-request timeout, defaults to 30 seconds.
    #[builder]
    pub async fn connect(
        #[builder(into)] data_folder: Option<PathBuf>,
        #[builder(into)] app_token: Option<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, XemaError> {
        let data_folder = match data_folder {
            Some(folder) => folder,
            None => get_data_dir().map_err(XemaError::DataDirResolution)?,
        };
        let source = HttpPageSource::new(app_token, request_timeout.unwrap_or(DEFAULT_TIMEOUT))?;
        Self::with_source(source, data_folder).await
    }
}

#[bon]
impl<S: PageSource> Xema<S> {
    /// Creates a client on top of any [`PageSource`].
    pub async fn with_source(source: S, data_folder: PathBuf) -> Result<Self, XemaError> {
        ensure_dir_exists(&data_folder)
            .await
            .map_err(|e| XemaError::DataDirCreation(data_folder.clone(), e))?;
        Ok(Self {
            fetcher: PaginatedFetcher::new(source),
            data_dir: data_folder,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Local file holding the copy of `dataset`.
    pub fn table_path(&self, dataset: Dataset) -> PathBuf {
        self.data_dir.join(dataset.file_name())
    }

    /// Fetches the raw rows of a dataset, every column as text.
    ///
    /// Never fails: a transport error is logged and an empty frame is returned.
    ///
    /// # Arguments
    ///
    /// * `.dataset(Dataset)`: **Required.** The resource to query.
    /// * `.filters(&FilterSpec)`: Optional structured filters, turned into a `$where` clause.
    /// * `.raw_filter(&str)`: Optional literal `$where` clause; takes precedence over `filters`.
    /// * `.page_size(usize)`: Optional. Rows per request, defaults to `5000`.
    /// * `.max_rows(usize)`: Optional. Stop once this many rows were accumulated, defaults to `50000`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use xema::{Dataset, FilterSpec, Xema, XemaError};
    /// # async fn run() -> Result<(), XemaError> {
    /// let client = Xema::new().await?;
    /// let filters = FilterSpec::new()
    ///     .with("codi_estacio", "X4")
    ///     .with("codi_variable", 32);
    ///
    /// let raw = client
    ///     .fetch()
    ///     .dataset(Dataset::WeatherData)
    ///     .filters(&filters)
    ///     .max_rows(1_000)
    ///     .call()
    ///     .await;
    /// println!("{}", raw.head(Some(5)));
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn fetch(
        &self,
        dataset: Dataset,
        filters: Option<&FilterSpec>,
        raw_filter: Option<&str>,
        page_size: Option<usize>,
        max_rows: Option<usize>,
    ) -> DataFrame {
        self.fetcher
            .fetch()
            .endpoint(&dataset.endpoint())
            .maybe_filters(filters)
            .maybe_raw_filter(raw_filter)
            .maybe_page_size(page_size)
            .max_rows(max_rows.unwrap_or(DEFAULT_MAX_ROWS))
            .call()
            .await
    }

    /// Fetches weather readings and brings them into the canonical schema: numeric
    /// codes and values, UTC reading times.
    ///
    /// Takes the same options as [`Xema::fetch`], minus the dataset.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use xema::{Condition, FilterSpec, Operator, Xema, XemaFrameExt};
    /// # use polars::prelude::IntoLazy;
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Xema::new().await?;
    /// let filters = FilterSpec::new()
    ///     .with("codi_estacio", "X4")
    ///     .with(
    ///         "data_lectura",
    ///         Condition::all(vec![
    ///             Condition::compare(Operator::GtEq, "01/03/2024 12:00:00 AM"),
    ///             Condition::compare(Operator::Lt, "02/03/2024 12:00:00 AM"),
    ///         ]),
    ///     );
    ///
    /// let readings = client.weather_data().filters(&filters).call().await;
    /// let variables = client.reference_table(xema::Dataset::Variables).await?;
    /// let named = readings
    ///     .lazy()
    ///     .with_variable_names(variables.lazy())
    ///     .collect()?;
    /// println!("{}", named);
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn weather_data(
        &self,
        filters: Option<&FilterSpec>,
        raw_filter: Option<&str>,
        page_size: Option<usize>,
        max_rows: Option<usize>,
    ) -> DataFrame {
        let dataset = Dataset::WeatherData;
        let raw = self
            .fetch()
            .dataset(dataset)
            .maybe_filters(filters)
            .maybe_raw_filter(raw_filter)
            .maybe_page_size(page_size)
            .maybe_max_rows(max_rows)
            .call()
            .await;
        standardize(&raw, Some(&dataset.rename_map()), Some(&dataset.type_map()))
    }

    /// Downloads the stations and variables tables, standardizes them and saves them in
    /// the data folder.
    ///
    /// # Arguments
    ///
    /// * `.overwrite(bool)`: Optional. Replace existing files, defaults to `true`.
    ///
    /// # Returns
    ///
    /// The path each table was written to.
    ///
    /// # Errors
    ///
    /// Unlike [`Xema::fetch`], transport failures are returned as [`XemaError::Fetch`].
    /// [`TableError::FileExists`] is returned when a file exists and `overwrite` is off.
    #[builder]
    pub async fn download_reference_tables(
        &self,
        overwrite: Option<bool>,
    ) -> Result<HashMap<Dataset, PathBuf>, XemaError> {
        let overwrite = overwrite.unwrap_or(true);
        let mut paths = HashMap::new();
        for dataset in Dataset::REFERENCE {
            let path = self.download_table(dataset, overwrite).await?;
            paths.insert(dataset, path);
        }
        Ok(paths)
    }

    /// Loads the local copy of a reference table in the canonical schema, downloading it
    /// first when it is missing.
    ///
    /// The copy is read back as text before standardizing, so zero-padded codes such as
    /// `codi_provincia` keep their leading zeros. A missing readings table is downloaded
    /// up to [`DEFAULT_MAX_ROWS`] rows.
    pub async fn reference_table(&self, dataset: Dataset) -> Result<DataFrame, XemaError> {
        let path = self.table_path(dataset);
        if !path.exists() {
            info!("No local copy of the {} table; downloading it.", dataset);
            self.download_table(dataset, true).await?;
        }

        let raw = tokio::task::spawn_blocking(move || load_csv_as_text(&path))
            .await
            .map_err(TableError::from)??;
        Ok(standardize(
            &raw,
            Some(&dataset.rename_map()),
            Some(&dataset.type_map()),
        ))
    }

    /// Finds the stations within a radius of a location, closest first.
    ///
    /// The stations table is read from the data folder, and downloaded when missing.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.** Center of the search.
    /// * `.radius_km(f64)`: Optional. Search radius, defaults to `10.0`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use xema::{LatLon, Xema, XemaError};
    /// # async fn run() -> Result<(), XemaError> {
    /// let client = Xema::new().await?;
    /// let stations = client
    ///     .find_stations()
    ///     .location(LatLon(41.3874, 2.1686))
    ///     .radius_km(15.0)
    ///     .call()
    ///     .await?;
    /// for station in stations {
    ///     println!("{} at {:.1} km", station.code, station.distance_km.unwrap_or_default());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn find_stations(
        &self,
        location: LatLon,
        radius_km: Option<f64>,
    ) -> Result<Vec<StationRecord>, XemaError> {
        let radius_km = radius_km.unwrap_or(DEFAULT_RADIUS_KM);
        let stations = self.reference_table(Dataset::Stations).await?;
        let nearby = stations_within_radius(location.0, location.1, radius_km, stations);
        Ok(StationRecord::from_frame(&nearby)?)
    }

    async fn download_table(&self, dataset: Dataset, overwrite: bool) -> Result<PathBuf, XemaError> {
        let path = self.table_path(dataset);
        if path.exists() && !overwrite {
            return Err(TableError::FileExists(path).into());
        }

        info!("Downloading the {} table...", dataset);
        let raw = self
            .fetcher
            .try_fetch()
            .endpoint(&dataset.endpoint())
            .max_rows(DEFAULT_MAX_ROWS)
            .call()
            .await?;
        let table = standardize(&raw, Some(&dataset.rename_map()), Some(&dataset.type_map()));

        let target = path.clone();
        tokio::task::spawn_blocking(move || save_csv(&table, &target, overwrite))
            .await
            .map_err(TableError::from)??;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetching::paginated_fetcher::tests::{readings_page, ScriptedSource};
    use crate::fetching::paginated_fetcher::DEFAULT_PAGE_SIZE;
    use polars::prelude::{DataType, TimeUnit};
    use tempfile::tempdir;

    const STATIONS_CSV: &str = "codi_estacio,nom_estacio,codi_tipus,latitud,longitud,altitud,nom_comarca,data_inici\n\
        UG,Girona,A,41.9794,2.8214,72,Gironès,2000-01-01T00:00:00.000\n\
        D5,Barcelona - Observatori Fabra,A,41.4184,2.1239,411,Barcelonès,1996-01-01T00:00:00.000\n\
        X4,Barcelona - el Raval,A,41.3839,2.1679,33,Barcelonès,2006-01-01T00:00:00.000\n";

    const VARIABLES_CSV: &str = "codi_variable,nom_variable,unitat,acronim\n\
        32,Temperatura,°C,T\n\
        33,Humitat relativa,%,HR\n";

    const PADDED_CODES_CSV: &str = "codi_estacio,nom_estacio,latitud,longitud,codi_municipi,codi_provincia,data_inici\n\
        X4,Barcelona - el Raval,41.3839,2.1679,080193,08,2006-01-01T00:00:00.000\n\
        D5,Barcelona - Observatori Fabra,41.4184,2.1239,080193,08,1996-01-01T00:00:00.000\n";

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    async fn client(source: ScriptedSource, dir: &Path) -> Xema<ScriptedSource> {
        Xema::with_source(source, dir.join("data")).await.unwrap()
    }

    #[tokio::test]
    async fn test_with_source_creates_data_folder() {
        let dir = tempdir().unwrap();
        let xema = client(ScriptedSource::new(vec![]), dir.path()).await;
        assert!(xema.data_dir().is_dir());
        assert_eq!(
            xema.table_path(Dataset::Stations),
            dir.path().join("data").join("stations_raw_metadata.csv")
        );
    }

    #[tokio::test]
    async fn test_weather_data_is_standardized() {
        init_logger();
        let dir = tempdir().unwrap();
        let xema = client(ScriptedSource::new(vec![Ok(readings_page(0, 3))]), dir.path()).await;

        let readings = xema.weather_data().call().await;

        assert_eq!(readings.height(), 3);
        assert_eq!(
            readings.column("data_lectura").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into()))
        );
        assert_eq!(
            readings.column("valor_lectura").unwrap().dtype(),
            &DataType::Float64
        );
        assert_eq!(readings.column("codi_estacio").unwrap().dtype(), &DataType::String);

        let urls = xema.fetcher.source().requested_urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("nzvn-apee.csv?$limit=5000"), "{}", urls[0]);
    }

    #[tokio::test]
    async fn test_fetch_stops_at_max_rows() {
        let dir = tempdir().unwrap();
        let xema = client(ScriptedSource::repeating(readings_page(0, 2)), dir.path()).await;

        let raw = xema
            .fetch()
            .dataset(Dataset::WeatherData)
            .page_size(2)
            .max_rows(5)
            .call()
            .await;

        assert_eq!(raw.height(), 6);
        assert_eq!(xema.fetcher.source().requested_urls().len(), 3);
    }

    #[tokio::test]
    async fn test_download_reference_tables() {
        init_logger();
        let dir = tempdir().unwrap();
        let source = ScriptedSource::new(vec![
            Ok(STATIONS_CSV.to_string()),
            Ok(VARIABLES_CSV.to_string()),
        ]);
        let xema = client(source, dir.path()).await;

        let paths = xema.download_reference_tables().call().await.unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[&Dataset::Stations].ends_with("stations_raw_metadata.csv"));
        assert!(paths[&Dataset::Variables].is_file());

        let urls = xema.fetcher.source().requested_urls();
        assert!(urls[0].contains("yqwd-vj5e.csv"));
        assert!(urls[1].contains("4fb2-n3yi.csv"));

        let variables = xema.reference_table(Dataset::Variables).await.unwrap();
        assert_eq!(variables.height(), 2);
        assert_eq!(
            variables.column("codi_variable").unwrap().dtype(),
            &DataType::Float64
        );
        // Served from disk, no new request.
        assert_eq!(xema.fetcher.source().requested_urls().len(), 2);
    }

    #[tokio::test]
    async fn test_download_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let xema = client(ScriptedSource::repeating(VARIABLES_CSV.to_string()), dir.path()).await;

        xema.download_reference_tables().call().await.unwrap();
        let result = xema.download_reference_tables().overwrite(false).call().await;

        assert!(matches!(
            result,
            Err(XemaError::Table(TableError::FileExists(_)))
        ));
    }

    #[tokio::test]
    async fn test_download_failure_is_returned() {
        let dir = tempdir().unwrap();
        let xema = client(ScriptedSource::new(vec![Err(500)]), dir.path()).await;

        let result = xema.download_reference_tables().call().await;

        assert!(matches!(result, Err(XemaError::Fetch(_))));
        assert!(!xema.table_path(Dataset::Stations).exists());
    }

    #[tokio::test]
    async fn test_find_stations_downloads_missing_table() {
        init_logger();
        let dir = tempdir().unwrap();
        let xema = client(ScriptedSource::new(vec![Ok(STATIONS_CSV.to_string())]), dir.path()).await;
        let barcelona = LatLon(41.3874, 2.1686);

        let stations = xema.find_stations().location(barcelona).call().await.unwrap();

        let codes: Vec<&str> = stations.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, ["X4", "D5"]);
        assert!(stations[0].distance_km.unwrap() < 1.0);
        assert_eq!(stations[1].altitude, Some(411.0));
        assert_eq!(stations[1].county.as_deref(), Some("Barcelonès"));

        // The second search is served from the saved table.
        let wide = xema
            .find_stations()
            .location(barcelona)
            .radius_km(100.0)
            .call()
            .await
            .unwrap();
        assert_eq!(wide.len(), 3);
        assert_eq!(wide[2].code, "UG");
        assert_eq!(xema.fetcher.source().requested_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_reference_table_survives_disk_round_trip() {
        init_logger();
        let dir = tempdir().unwrap();
        let xema = client(ScriptedSource::new(vec![Ok(PADDED_CODES_CSV.to_string())]), dir.path()).await;

        // First call downloads and saves, second reads the saved copy.
        let downloaded = xema.reference_table(Dataset::Stations).await.unwrap();
        let reloaded = xema.reference_table(Dataset::Stations).await.unwrap();
        assert_eq!(xema.fetcher.source().requested_urls().len(), 1);

        for stations in [&downloaded, &reloaded] {
            let provinces = stations.column("codi_provincia").unwrap().str().unwrap();
            assert_eq!(provinces.get(0), Some("08"));
            let municipalities = stations.column("codi_municipi").unwrap().str().unwrap();
            assert_eq!(municipalities.get(1), Some("080193"));
            assert_eq!(
                stations.column("latitud").unwrap().dtype(),
                &DataType::Float64
            );
            let started = stations.column("data_inici").unwrap();
            assert_eq!(
                started.dtype(),
                &DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into()))
            );
            assert_eq!(started.null_count(), 0);
        }
        assert!(downloaded.equals_missing(&reloaded));
    }

    #[tokio::test]
    async fn test_readings_table_download_is_capped() {
        let dir = tempdir().unwrap();
        let full_page = readings_page(0, DEFAULT_PAGE_SIZE);
        let xema = client(ScriptedSource::repeating(full_page), dir.path()).await;

        let readings = xema.reference_table(Dataset::WeatherData).await.unwrap();

        assert_eq!(readings.height(), DEFAULT_MAX_ROWS);
        assert_eq!(
            xema.fetcher.source().requested_urls().len(),
            DEFAULT_MAX_ROWS / DEFAULT_PAGE_SIZE
        );
    }
}
