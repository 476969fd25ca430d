//! Reconstructed table model.

use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

/// A table reconstructed from positioned text.
///
/// Rows are stored positionally: `rows[i][j]` is the value of column
/// `headers[j]`. Every row has exactly `headers.len()` values. When
/// serialized, each row becomes an object keyed by header in header order.
/// A header text that occurs more than once yields a single key, placed at
/// its first occurrence and holding the value of its last column, the same
/// object a JS consumer gets by assigning the keys in order. `headers`
/// itself keeps every occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Header row.
    pub headers: Vec<String>,
    /// Data rows, aligned with `headers`.
    pub rows: Vec<Vec<String>>,
    /// Heuristic confidence score.
    pub confidence: f64,
}

impl Table {
    /// The table returned for input without any fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table, padding short rows with empty strings and truncating
    /// long ones to the header length.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>, confidence: f64) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self {
            headers,
            rows,
            confidence,
        }
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.headers.len()
    }

    /// Number of data rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the table has neither headers nor rows.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Index of the first column with the given header.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Values of the first column with the given header.
    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(header)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Value of a row under the given header.
    pub fn get(&self, row: usize, header: &str) -> Option<&str> {
        let idx = self.column_index(header)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Rows as `(header, value)` pairs in header order.
    pub fn records(&self) -> Vec<Vec<(&str, &str)>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter().map(String::as_str))
                    .collect()
            })
            .collect()
    }

    /// Render the table as an HTML `<table>` with a `<th>` header row.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<table>\n");

        if !self.headers.is_empty() {
            html.push_str("  <tr>\n");
            for header in &self.headers {
                html.push_str(&format!("    <th>{}</th>\n", escape_html(header)));
            }
            html.push_str("  </tr>\n");
        }

        for row in &self.rows {
            html.push_str("  <tr>\n");
            for value in row {
                html.push_str(&format!("    <td>{}</td>\n", escape_html(value)));
            }
            html.push_str("  </tr>\n");
        }

        html.push_str("</table>");
        html
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Table", 3)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field("rows", &Records(self))?;
        state.serialize_field("confidence", &self.confidence)?;
        state.end()
    }
}

struct Records<'a>(&'a Table);

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
        for row in &self.0.rows {
            seq.serialize_element(&Record {
                headers: &self.0.headers,
                values: row,
            })?;
        }
        seq.end()
    }
}

struct Record<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<(&str, &str)> = Vec::with_capacity(self.headers.len());
        for (header, value) in self.headers.iter().zip(self.values) {
            let (header, value) = (header.as_str(), value.as_str());
            match entries.iter_mut().find(|(key, _)| *key == header) {
                Some(entry) => entry.1 = value,
                None => entries.push((header, value)),
            }
        }

        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
