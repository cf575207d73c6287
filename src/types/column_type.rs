use std::fmt;

/// Canonical target type of a standardized column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    /// Nullable 64-bit integer.
    Integer,
    Float,
    /// UTC timestamp, optionally parsed with an explicit `chrono` format string.
    UtcDatetime(Option<String>),
}

impl ColumnType {
    /// UTC timestamp parsed by trying the common layouts.
    pub fn utc_datetime() -> Self {
        ColumnType::UtcDatetime(None)
    }

    /// UTC timestamp parsed with the given `chrono` format.
    pub fn utc_datetime_with_format(format: impl Into<String>) -> Self {
        ColumnType::UtcDatetime(Some(format.into()))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => f.write_str("string"),
            ColumnType::Integer => f.write_str("integer"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::UtcDatetime(None) => f.write_str("datetime_utc"),
            ColumnType::UtcDatetime(Some(format)) => write!(f, "datetime_utc({})", format),
        }
    }
}
