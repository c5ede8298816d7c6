use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

//==============================================================================
// Column Kinds
//==============================================================================

/// Value kind of a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Text cells
    String,
    /// Whole numbers (any integer width)
    Int,
    /// Floating point numbers
    Float,
    /// Dates and date-times, stored as Excel serial numbers
    Date,
    /// TRUE / FALSE cells
    Bool,
}

impl Kind {
    /// Number format used when a column declares none
    pub fn default_format(self) -> Option<&'static str> {
        match self {
            Kind::Date => Some(crate::dates::DEFAULT_DATE_FORMAT),
            _ => None,
        }
    }

    /// Get the kind name as a string
    pub fn name(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Date => "date",
            Kind::Bool => "bool",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//==============================================================================
// Cells
//==============================================================================

/// The value held by a single worksheet cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Empty cells and blank strings both count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::String(_) => "string",
            CellValue::Number(_) => "number",
            CellValue::Bool(_) => "bool",
            CellValue::DateTime(_) => "datetime",
        }
    }

    /// Plain text rendering used for header matching and string fields
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(dt) => {
                crate::dates::format_datetime(dt, crate::dates::DEFAULT_DATETIME_FORMAT)
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

/// Render a number the way Excel shows it in a General cell: integral
/// values without a trailing `.0`
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A worksheet cell: a value plus an optional Excel number format
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub format: Option<String>,
}

impl Cell {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl From<CellValue> for Cell {
    fn from(value: CellValue) -> Self {
        Self {
            value,
            format: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_string_is_empty() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::String("  ".to_string()).is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
        assert!(!CellValue::Bool(false).is_empty());
    }

    #[test]
    fn test_number_text_rendering() {
        assert_eq!(CellValue::Number(100.0).to_text(), "100");
        assert_eq!(CellValue::Number(-3.0).to_text(), "-3");
        assert_eq!(CellValue::Number(2.5).to_text(), "2.5");
    }

    #[test]
    fn test_kind_default_format() {
        assert_eq!(Kind::Date.default_format(), Some("yyyy-mm-dd"));
        assert_eq!(Kind::Int.default_format(), None);
        assert_eq!(Kind::String.to_string(), "string");
    }
}
