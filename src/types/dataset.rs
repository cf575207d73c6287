//! The XEMA resources published on the Catalan open data portal, together with the
//! column maps used to bring each of them into the canonical schema.

use crate::types::column_type::ColumnType;
use std::collections::HashMap;
use std::fmt;

const RESOURCE_BASE_URL: &str = "https://analisi.transparenciacatalunya.cat/resource";

/// Source column name to canonical column name.
pub type RenameMap = HashMap<String, String>;
/// Canonical column name to target type.
pub type TypeMap = HashMap<String, ColumnType>;

/// One of the XEMA datasets served by the SODA endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Station metadata: code, name, coordinates, municipality, ...
    Stations,
    /// Measured variables: code, name, unit, ...
    Variables,
    /// Individual station readings.
    WeatherData,
}

impl Dataset {
    pub const REFERENCE: [Dataset; 2] = [Dataset::Stations, Dataset::Variables];

    pub fn resource_id(&self) -> &'static str {
        match self {
            Dataset::Stations => "yqwd-vj5e",
            Dataset::Variables => "4fb2-n3yi",
            Dataset::WeatherData => "nzvn-apee",
        }
    }

    /// CSV query endpoint of the dataset.
    pub fn endpoint(&self) -> String {
        format!("{}/{}.csv", RESOURCE_BASE_URL, self.resource_id())
    }

    /// File name used for the local backup of the dataset.
    pub fn file_name(&self) -> &'static str {
        match self {
            Dataset::Stations => "stations_raw_metadata.csv",
            Dataset::Variables => "variables_raw_metadata.csv",
            Dataset::WeatherData => "downloaded_weather_data.csv",
        }
    }

    fn columns(&self) -> Vec<(&'static str, ColumnType)> {
        match self {
            Dataset::Stations => vec![
                ("codi_estacio", ColumnType::String),
                ("nom_estacio", ColumnType::String),
                ("codi_tipus", ColumnType::String),
                ("latitud", ColumnType::Float),
                ("longitud", ColumnType::Float),
                // Point data is kept as text.
                ("geocoded_column", ColumnType::String),
                ("emplacament", ColumnType::String),
                ("altitud", ColumnType::Float),
                ("codi_municipi", ColumnType::String),
                ("nom_municipi", ColumnType::String),
                ("codi_comarca", ColumnType::String),
                ("nom_comarca", ColumnType::String),
                ("codi_provincia", ColumnType::String),
                ("nom_provincia", ColumnType::String),
                ("codi_xarxa", ColumnType::String),
                ("nom_xarxa", ColumnType::String),
                ("codi_estat_ema", ColumnType::String),
                ("nom_estat_ema", ColumnType::String),
                ("data_inici", ColumnType::utc_datetime()),
                ("data_fi", ColumnType::utc_datetime()),
            ],
            Dataset::Variables => vec![
                ("codi_variable", ColumnType::Float),
                ("nom_variable", ColumnType::String),
                ("unitat", ColumnType::String),
                ("acronim", ColumnType::String),
                ("codi_tipus_var", ColumnType::String),
                ("decimals", ColumnType::Float),
            ],
            Dataset::WeatherData => vec![
                ("id", ColumnType::String),
                ("codi_estacio", ColumnType::String),
                // Published as text in some exports; kept numeric so it joins with the variables table.
                ("codi_variable", ColumnType::Float),
                ("data_lectura", ColumnType::utc_datetime()),
                ("data_extrem", ColumnType::utc_datetime()),
                ("valor_lectura", ColumnType::Float),
                ("codi_estat", ColumnType::String),
                ("codi_base", ColumnType::String),
            ],
        }
    }

    /// Maps the API field names onto the canonical column names.
    ///
    /// The portal already publishes canonical names, so this is the identity over the
    /// known columns. It is kept explicit so that a renamed upstream field only needs
    /// an entry here.
    pub fn rename_map(&self) -> RenameMap {
        self.columns()
            .into_iter()
            .map(|(name, _)| (name.to_string(), name.to_string()))
            .collect()
    }

    pub fn type_map(&self) -> TypeMap {
        self.columns()
            .into_iter()
            .map(|(name, column_type)| (name.to_string(), column_type))
            .collect()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dataset::Stations => "stations",
            Dataset::Variables => "variables",
            Dataset::WeatherData => "weather_data",
        };
        f.write_str(name)
    }
}
