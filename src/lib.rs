mod error;
mod fetching;
mod frame_ext;
mod schema;
mod soql;
mod stations;
mod tables;
mod types;
mod utils;
mod xema;

pub use error::XemaError;
pub use xema::*;

pub use fetching::error::FetchError;
pub use fetching::page_source::{HttpPageSource, PageSource, DEFAULT_TIMEOUT, USER_AGENT};
pub use fetching::paginated_fetcher::{PaginatedFetcher, DEFAULT_PAGE_SIZE};

pub use frame_ext::XemaFrameExt;

pub use schema::standardizer::{parse_utc_datetime, standardize};
pub use soql::where_clause::build_where_clause;

pub use stations::geodesy::{
    circle, close_ring, destination_point, distance_km, DEFAULT_CIRCLE_POINTS, EARTH_RADIUS_KM,
};
pub use stations::radius_filter::{stations_within_radius, StationSource};

pub use tables::error::TableError;
pub use tables::table_io::{load_csv, load_csv_as_text, save_csv};

pub use types::column_type::ColumnType;
pub use types::dataset::{Dataset, RenameMap, TypeMap};
pub use types::filter::{Condition, FilterSpec, FilterValue, Operator};
pub use types::station::StationRecord;
