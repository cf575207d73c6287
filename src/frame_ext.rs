use chrono::{DateTime, Utc};
use polars::prelude::{col, lit, DataType, JoinArgs, JoinType, LazyFrame, TimeUnit};

pub trait XemaFrameExt {
    /// Keeps readings whose `data_lectura` lies within `[start, end]`.
    ///
    /// Expects the standardized (UTC datetime) reading column. Both bounds are compared
    /// as epoch milliseconds, so the column's time zone does not matter.
    fn filter_reading_period(self, start: DateTime<Utc>, end: DateTime<Utc>) -> LazyFrame;

    /// Keeps the rows of one station (`codi_estacio`).
    fn filter_station(self, code: &str) -> LazyFrame;

    /// Adds a `variable_name` column looked up from a variables table.
    ///
    /// Left join on `codi_variable`: readings with an unknown variable code are kept with
    /// a null name. Codes are compared as floats on both sides.
    fn with_variable_names(self, variables: LazyFrame) -> LazyFrame;
}

impl XemaFrameExt for LazyFrame {
    fn filter_reading_period(self, start: DateTime<Utc>, end: DateTime<Utc>) -> LazyFrame {
        let read_at = || col("data_lectura").dt().timestamp(TimeUnit::Milliseconds);
        self.filter(
            read_at()
                .gt_eq(lit(start.timestamp_millis()))
                .and(read_at().lt_eq(lit(end.timestamp_millis()))),
        )
    }

    fn filter_station(self, code: &str) -> LazyFrame {
        self.filter(col("codi_estacio").eq(lit(code.to_string())))
    }

    fn with_variable_names(self, variables: LazyFrame) -> LazyFrame {
        let names = variables.select([
            col("codi_variable").cast(DataType::Float64),
            col("nom_variable")
                .cast(DataType::String)
                .alias("variable_name"),
        ]);
        self.with_column(col("codi_variable").cast(DataType::Float64))
            .join(
                names,
                [col("codi_variable")],
                [col("codi_variable")],
                JoinArgs::new(JoinType::Left),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::standardizer::standardize;
    use crate::types::column_type::ColumnType;
    use crate::types::dataset::TypeMap;
    use chrono::TimeZone;
    use polars::prelude::*;

    fn readings() -> DataFrame {
        let raw = df!(
            "codi_estacio" => ["X4", "X4", "D5", "X4"],
            "codi_variable" => ["32", "33", "32", "35"],
            "data_lectura" => [
                "2024-03-01T00:00:00.000",
                "2024-03-01T00:30:00.000",
                "2024-03-02T00:00:00.000",
                "2024-03-03T12:00:00.000",
            ],
            "valor_lectura" => ["11.2", "78", "10.4", "0.0"],
        )
        .unwrap();
        let types: TypeMap = [
            ("codi_variable".to_string(), ColumnType::Float),
            ("data_lectura".to_string(), ColumnType::utc_datetime()),
            ("valor_lectura".to_string(), ColumnType::Float),
        ]
        .into_iter()
        .collect();
        standardize(&raw, None, Some(&types))
    }

    #[test]
    fn test_filter_reading_period_is_inclusive() -> PolarsResult<()> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        let filtered = readings()
            .lazy()
            .filter_reading_period(start, end)
            .collect()?;

        assert_eq!(filtered.height(), 2);
        let stations = filtered.column("codi_estacio")?.str()?;
        assert_eq!(stations.get(0), Some("X4"));
        assert_eq!(stations.get(1), Some("D5"));
        Ok(())
    }

    #[test]
    fn test_filter_station() -> PolarsResult<()> {
        let filtered = readings().lazy().filter_station("X4").collect()?;
        assert_eq!(filtered.height(), 3);

        let none = readings().lazy().filter_station("ZZ").collect()?;
        assert_eq!(none.height(), 0);
        Ok(())
    }

    #[test]
    fn test_with_variable_names() -> PolarsResult<()> {
        let variables = df!(
            "codi_variable" => [32i64, 33],
            "nom_variable" => ["Temperatura", "Humitat relativa"],
        )?;

        let named = readings()
            .lazy()
            .with_variable_names(variables.lazy())
            .sort(["data_lectura"], SortMultipleOptions::default())
            .collect()?;

        assert_eq!(named.height(), 4);
        let names = named.column("variable_name")?.str()?;
        assert_eq!(names.get(0), Some("Temperatura"));
        assert_eq!(names.get(1), Some("Humitat relativa"));
        assert_eq!(names.get(2), Some("Temperatura"));
        assert_eq!(names.get(3), None);
        Ok(())
    }
}
