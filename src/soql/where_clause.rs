use crate::types::filter::{Condition, FilterSpec, FilterValue, Operator};
use chrono::NaiveDateTime;
use log::{debug, warn};

/// Fields holding reading timestamps; their filter values are given in
/// [`DATETIME_INPUT_FORMAT`] and must be rewritten before reaching the server.
pub const DATETIME_FIELDS: [&str; 2] = ["data_lectura", "data_extrem"];

/// Format of user supplied timestamps, e.g. `01/01/2009 12:00:00 AM`.
pub const DATETIME_INPUT_FORMAT: &str = "%d/%m/%Y %I:%M:%S %p";

/// Format the SODA endpoint expects for timestamp literals, e.g. `2009-01-01T00:00:00`.
pub const DATETIME_SOQL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Builds the SOQL `$where` clause for a request.
///
/// A non-empty `raw_filter` takes precedence and is returned trimmed. Otherwise each
/// field of `filters` becomes one clause and the clauses are joined with `AND`.
/// Returns an empty string when nothing applies.
///
/// Timestamp conditions that cannot be parsed are logged and left out of the clause
/// rather than failing the request, so the returned clause is best-effort.
///
/// # Examples
///
/// ```
/// use xema::{build_where_clause, Condition, FilterSpec, Operator};
///
/// let filters = FilterSpec::new()
///     .with("codi_estacio", "V4")
///     .with("data_lectura", Condition::compare(Operator::GtEq, "01/01/2009 12:00:00 AM"));
///
/// assert_eq!(
///     build_where_clause(Some(&filters), None),
///     "codi_estacio = 'V4' AND data_lectura >= '2009-01-01T00:00:00'"
/// );
/// ```
pub fn build_where_clause(filters: Option<&FilterSpec>, raw_filter: Option<&str>) -> String {
    if let Some(raw) = raw_filter.filter(|raw| !raw.is_empty()) {
        debug!("Using raw SOQL filter: {}", raw);
        return raw.trim().to_string();
    }
    let Some(filters) = filters else {
        return String::new();
    };

    let clauses: Vec<String> = filters
        .iter()
        .filter_map(|(field, condition)| {
            let is_datetime = DATETIME_FIELDS.contains(&field);
            render_condition(field, condition, is_datetime)
        })
        .collect();

    let where_clause = clauses.join(" AND ");
    debug!("Built SOQL where clause: {}", where_clause);
    where_clause
}

fn render_condition(field: &str, condition: &Condition, is_datetime: bool) -> Option<String> {
    match condition {
        Condition::Equals(value) => render_comparison(field, Operator::Eq, value, is_datetime),
        Condition::Compare(operator, value) => {
            render_comparison(field, *operator, value, is_datetime)
        }
        Condition::All(conditions) => {
            let parts: Vec<String> = conditions
                .iter()
                .filter_map(|condition| render_condition(field, condition, is_datetime))
                .collect();
            if parts.is_empty() {
                debug!("No usable conditions for filter '{}'; skipping it", field);
                None
            } else {
                Some(format!("({})", parts.join(" AND ")))
            }
        }
    }
}

fn render_comparison(
    field: &str,
    operator: Operator,
    value: &FilterValue,
    is_datetime: bool,
) -> Option<String> {
    if !is_datetime {
        return Some(format!("{} {} {}", field, operator, value.to_soql_literal()));
    }

    let input = value.to_string();
    match NaiveDateTime::parse_from_str(&input, DATETIME_INPUT_FORMAT) {
        Ok(datetime) => Some(format!(
            "{} {} '{}'",
            field,
            operator,
            datetime.format(DATETIME_SOQL_FORMAT)
        )),
        Err(e) => {
            warn!(
                "Could not parse date string '{}' for filter '{}': {}. This filter will be applied locally only.",
                input, field, e
            );
            None
        }
    }
}
