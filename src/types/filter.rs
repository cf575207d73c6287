//! Structured filter specifications that are translated into SOQL `$where` clauses.
//!
//! A [`FilterSpec`] maps field names to a [`Condition`]. A condition is either a bare
//! value (equality), an operator/value pair, or a sequence of conditions that must all
//! hold. Field order is preserved, so the generated clause is deterministic.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Comparison operators understood by the SODA query endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=", alias = "<>")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "like", alias = "LIKE")]
    Like,
    #[serde(rename = "not like", alias = "NOT LIKE")]
    NotLike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal on the right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FilterValue {
    /// Renders the value as a SOQL literal: text is single-quoted with embedded quotes
    /// doubled, numbers are emitted as-is.
    pub fn to_soql_literal(&self) -> String {
        match self {
            FilterValue::Text(text) => format!("'{}'", text.replace('\'', "''")),
            FilterValue::Integer(value) => value.to_string(),
            FilterValue::Float(value) => value.to_string(),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(text) => f.write_str(text),
            FilterValue::Integer(value) => write!(f, "{}", value),
            FilterValue::Float(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(value as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

/// The condition attached to a single field.
///
/// # Examples
///
/// ```
/// use xema::{Condition, Operator};
///
/// let station = Condition::equals("V4");
/// let window = Condition::all([
///     Condition::compare(Operator::GtEq, "01/01/2009 12:00:00 AM"),
///     Condition::compare(Operator::LtEq, "10/01/2009 12:00:00 AM"),
/// ]);
/// # let _ = (station, window);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ConditionRepr")]
pub enum Condition {
    /// `field = value`
    Equals(FilterValue),
    /// `field <op> value`
    Compare(Operator, FilterValue),
    /// Every sub-condition must hold; rendered parenthesized and AND-joined.
    All(Vec<Condition>),
}

impl Condition {
    pub fn equals(value: impl Into<FilterValue>) -> Self {
        Condition::Equals(value.into())
    }

    pub fn compare(operator: Operator, value: impl Into<FilterValue>) -> Self {
        Condition::Compare(operator, value.into())
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::All(conditions.into_iter().collect())
    }
}

impl From<FilterValue> for Condition {
    fn from(value: FilterValue) -> Self {
        Condition::Equals(value)
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::equals(value)
    }
}

impl From<i64> for Condition {
    fn from(value: i64) -> Self {
        Condition::equals(value)
    }
}

impl From<i32> for Condition {
    fn from(value: i32) -> Self {
        Condition::equals(value)
    }
}

impl From<f64> for Condition {
    fn from(value: f64) -> Self {
        Condition::equals(value)
    }
}

/// JSON shape of a condition: `"V4"`, `[">=", "01/01/2009 12:00:00 AM"]` or a list of those.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConditionRepr {
    Pair(Operator, FilterValue),
    Value(FilterValue),
    Sequence(Vec<ConditionRepr>),
}

impl From<ConditionRepr> for Condition {
    fn from(repr: ConditionRepr) -> Self {
        match repr {
            ConditionRepr::Pair(operator, value) => Condition::Compare(operator, value),
            ConditionRepr::Value(value) => Condition::Equals(value),
            ConditionRepr::Sequence(items) => {
                Condition::All(items.into_iter().map(Condition::from).collect())
            }
        }
    }
}

/// An ordered mapping from field name to [`Condition`].
///
/// Inserting a field that is already present replaces its condition in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    entries: Vec<(String, Condition)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.insert(field, condition);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, condition: impl Into<Condition>) {
        let field = field.into();
        let condition = condition.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = condition,
            None => self.entries.push((field, condition)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, condition)| condition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries
            .iter()
            .map(|(name, condition)| (name.as_str(), condition))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a filter spec from a JSON object, keeping the field order of the document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FilterSpecVisitor;

        impl<'de> Visitor<'de> for FilterSpecVisitor {
            type Value = FilterSpec;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of field names to filter conditions")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut spec = FilterSpec::new();
                while let Some((field, condition)) = map.next_entry::<String, Condition>()? {
                    spec.insert(field, condition);
                }
                Ok(spec)
            }
        }

        deserializer.deserialize_map(FilterSpecVisitor)
    }
}
