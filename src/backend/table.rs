//! In-memory result table.
//!
//! Columns and types are whatever the backend reports; no local schema or
//! constraint is applied.

use serde::Serialize;
use serde_json::{Number, Value};

/// Value type of a result column, inferred from the backend's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Double,
    Boolean,
    DateTime,
}

impl ColumnType {
    /// Map an XML Schema type name (with or without prefix) to a column type.
    pub fn from_xsd(type_name: &str) -> Self {
        let local = type_name.rsplit(':').next().unwrap_or(type_name);
        match local {
            "int" | "integer" | "long" | "short" | "byte" | "unsignedInt" | "unsignedLong"
            | "unsignedShort" | "unsignedByte" => ColumnType::Integer,
            "double" | "float" | "decimal" => ColumnType::Double,
            "boolean" => ColumnType::Boolean,
            "dateTime" => ColumnType::DateTime,
            _ => ColumnType::String,
        }
    }

    /// Convert raw text to a JSON value of this type.
    ///
    /// Text that does not parse as the declared type is kept as a string.
    /// Empty cells of non-string types are null.
    pub fn convert(self, raw: &str) -> Value {
        let text = raw.trim();
        if text.is_empty() && self != ColumnType::String {
            return Value::Null;
        }
        match self {
            ColumnType::Integer => text
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| text.parse::<u64>().map(Value::from))
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            ColumnType::Double => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            ColumnType::Boolean => match text {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            ColumnType::String | ColumnType::DateTime => Value::String(raw.to_string()),
        }
    }
}

/// A named, typed result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered rows of ordered values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Add a column after rows exist; earlier rows get null in that position.
    pub fn push_column(&mut self, column: Column) -> usize {
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        self.columns.len() - 1
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn into_parts(self) -> (Vec<Column>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }
}
