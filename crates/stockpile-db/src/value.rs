//! # Values and Rows
//!
//! Engine-neutral parameter and result types for the query facade.
//!
//! ## Why not hand out `SqliteRow`?
//! Route handlers only need "named columns with a value each". [`Row`] owns
//! its data, serializes straight to JSON, and keeps sqlx out of handler code.
//!
//! ```text
//! params![sku, 9.99, None::<String>]
//!     │
//!     ▼
//! Vec<Value> ──► bind ?1, ?2, ?3 ──► SQLite ──► SqliteRow ──► Row
//!                (never interpolated)                      [("sku", Text), ...]
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::error::{DbError, DbResult};

// =============================================================================
// Value
// =============================================================================

/// A single SQL value: a bound parameter or a column read back.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view. Booleans read as 0/1.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Floating-point view. Integers widen, since SQLite stores whole-number
    /// REALs compactly and may hand them back as INTEGER.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Real(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Blob(v) => serializer.serialize_bytes(v),
            Value::Bool(v) => serializer.serialize_bool(*v),
        }
    }
}

/// Builds a positional parameter list.
///
/// ```rust,ignore
/// db.query_one("SELECT * FROM products WHERE sku = ?1", &params!["SKU001"]).await?;
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($param:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($param)),+]
    };
}

/// Binds positional parameters onto a statement, in order.
pub(crate) fn bind_params<'q>(
    sql: &'q str,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            Value::Null => query.bind(None::<String>),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Blob(v) => query.bind(v.clone()),
            Value::Bool(v) => query.bind(*v),
        })
}

// =============================================================================
// Row
// =============================================================================

/// One result row: column names with their values, in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Builds a row from (name, value) pairs.
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Row { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Value of a column by name. The first match wins on duplicate names.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    fn require(&self, column: &str) -> DbResult<&Value> {
        self.get(column)
            .ok_or_else(|| DbError::Decode(format!("no column named '{}'", column)))
    }

    pub fn text(&self, column: &str) -> DbResult<String> {
        self.require(column)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DbError::decode(column, "TEXT"))
    }

    /// TEXT or NULL.
    pub fn opt_text(&self, column: &str) -> DbResult<Option<String>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            _ => Err(DbError::decode(column, "TEXT or NULL")),
        }
    }

    pub fn i64(&self, column: &str) -> DbResult<i64> {
        self.require(column)?
            .as_i64()
            .ok_or_else(|| DbError::decode(column, "INTEGER"))
    }

    pub fn f64(&self, column: &str) -> DbResult<f64> {
        self.require(column)?
            .as_f64()
            .ok_or_else(|| DbError::decode(column, "REAL"))
    }

    pub fn bool(&self, column: &str) -> DbResult<bool> {
        self.require(column)?
            .as_bool()
            .ok_or_else(|| DbError::decode(column, "BOOLEAN"))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl TryFrom<&SqliteRow> for Row {
    type Error = DbError;

    /// Reads every column using the value's runtime storage class.
    ///
    /// Columns declared `BOOLEAN` come back as [`Value::Bool`]; SQLite itself
    /// stores them as INTEGER.
    fn try_from(row: &SqliteRow) -> DbResult<Self> {
        let mut columns = Vec::with_capacity(row.len());

        for column in row.columns() {
            let index = column.ordinal();
            let raw = row.try_get_raw(index)?;

            let value = if raw.is_null() {
                Value::Null
            } else {
                let runtime_type = raw.type_info().name().to_string();
                let declared_bool = column.type_info().name() == "BOOLEAN";

                match runtime_type.as_str() {
                    "INTEGER" if declared_bool => Value::Bool(row.try_get_unchecked(index)?),
                    "INTEGER" => Value::Integer(row.try_get_unchecked(index)?),
                    "REAL" => Value::Real(row.try_get_unchecked(index)?),
                    "BLOB" => Value::Blob(row.try_get_unchecked(index)?),
                    _ => Value::Text(row.try_get_unchecked(index)?),
                }
            };

            columns.push((column.name().to_string(), value));
        }

        Ok(Row { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_macro_converts_each_argument() {
        let params = params!["SKU001", 9.5, 3_i64, None::<String>, true];

        assert_eq!(
            params,
            vec![
                Value::Text("SKU001".to_string()),
                Value::Real(9.5),
                Value::Integer(3),
                Value::Null,
                Value::Bool(true),
            ]
        );
        assert!(params!().is_empty());
    }

    #[test]
    fn test_typed_getters() {
        let row = Row::new(vec![
            ("sku".to_string(), Value::from("SKU001")),
            ("price".to_string(), Value::Integer(10)),
            ("category".to_string(), Value::Null),
        ]);

        assert_eq!(row.text("sku").unwrap(), "SKU001");
        assert_eq!(row.f64("price").unwrap(), 10.0);
        assert_eq!(row.opt_text("category").unwrap(), None);
        assert!(matches!(row.i64("sku"), Err(DbError::Decode(_))));
        assert!(matches!(row.text("missing"), Err(DbError::Decode(_))));
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new(vec![
            ("id".to_string(), Value::Integer(1)),
            ("name".to_string(), Value::from("Pen")),
            ("active".to_string(), Value::Bool(true)),
            ("note".to_string(), Value::Null),
        ]);

        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            serde_json::json!({ "id": 1, "name": "Pen", "active": true, "note": null })
        );
    }
}
