use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// One decoded row of a delimited input file.
///
/// A [`Record`] maps column names to string values, in the column order of the file header.
/// The header is shared between every record read from the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Record {
    /// Creates a new record from shared column names and the row values.
    ///
    /// The row reader guarantees that `values` has one entry per column.
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        debug_assert_eq!(columns.len(), values.len());

        Self { columns, values }
    }

    /// Returns the value of `column`, if the record has it.
    ///
    /// When a header repeats a column name, the first occurrence wins.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
            .map(String::as_str)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Iterates over `(column, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(column, value)| (column.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
