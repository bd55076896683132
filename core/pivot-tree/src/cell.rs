//! FILENAME: core/pivot-tree/src/cell.rs
//! PURPOSE: Defines the value held by a single cell of a streamed pivot row.
//! CONTEXT: Row nodes carry a `data` array of these values. The wire format
//! is plain JSON (number, string, bool or null), so the enum is untagged.

use serde::{Deserialize, Serialize};

/// Represents the raw data within a pivot cell as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the display value of the cell as a String.
    pub fn display_value(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => {
                if *b { "TRUE" } else { "FALSE" }.to_string()
            }
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_json_cells() {
        let cells: Vec<CellValue> = serde_json::from_str(r#"[1.5, "East", true, null]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                CellValue::Number(1.5),
                CellValue::Text("East".to_string()),
                CellValue::Boolean(true),
                CellValue::Empty,
            ]
        );
    }

    #[test]
    fn test_formats_whole_numbers_without_decimals() {
        assert_eq!(CellValue::Number(42.0).display_value(), "42");
        assert_eq!(CellValue::Number(0.25).display_value(), "0.25");
        assert_eq!(CellValue::Empty.display_value(), "");
    }
}
