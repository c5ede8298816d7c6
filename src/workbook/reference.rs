//! A1-style cell references (`A1`, `$B$7`, `'My Sheet'!A1:A3`)

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Last valid 0-based row index (Excel rows are 1..=1_048_576)
pub const MAX_ROW: usize = 1_048_575;
/// Last valid 0-based column index (Excel columns are A..=XFD)
pub const MAX_COL: usize = 16_383;

fn range_regex() -> Option<&'static Regex> {
    static RANGE: OnceLock<Option<Regex>> = OnceLock::new();
    RANGE
        .get_or_init(|| {
            Regex::new(
                r"^(?:'((?:[^']|'')+)'|([^!'\s][^!']*))!(\$?[A-Za-z]{1,3}\$?[0-9]+)(?::(\$?[A-Za-z]{1,3}\$?[0-9]+))?$",
            )
            .ok()
        })
        .as_ref()
}

fn cell_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").ok())
        .as_ref()
}

/// Convert a 0-based column index to Excel column letters
///
/// Examples:
/// - 0 → A
/// - 25 → Z
/// - 26 → AA
pub fn column_index_to_letter(index: usize) -> String {
    let mut result = String::new();
    let mut idx = index;

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}

/// Convert Excel column letters to a 0-based column index (A → 0, AA → 26)
pub fn column_letter_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let index = index - 1;
    (index <= MAX_COL).then_some(index)
}

/// Parse a single cell reference into 0-based `(row, col)`
pub fn parse_cell(reference: &str) -> Option<(usize, usize)> {
    let caps = cell_regex()?.captures(reference)?;
    let col = column_letter_to_index(&caps[1])?;
    let row: usize = caps[2].parse().ok()?;
    if row == 0 || row - 1 > MAX_ROW {
        return None;
    }
    Some((row - 1, col))
}

/// A rectangular range of cells on a named sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub sheet: String,
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl CellRange {
    /// Parse `Sheet!A1:B3`, `'Sheet Name'!$A$1` and similar.
    ///
    /// Returns `None` for anything that is not a sheet-qualified reference.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = range_regex()?.captures(text.trim())?;
        let sheet = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => quoted.as_str().replace("''", "'"),
            (None, Some(bare)) => bare.as_str().to_string(),
            (None, None) => return None,
        };

        let (r1, c1) = parse_cell(&caps[3])?;
        let (r2, c2) = match caps.get(4) {
            Some(end) => parse_cell(end.as_str())?,
            None => (r1, c1),
        };

        Some(Self {
            sheet,
            first_row: r1.min(r2),
            first_col: c1.min(c2),
            last_row: r1.max(r2),
            last_col: c1.max(c2),
        })
    }

    /// Absolute formula reference, e.g. `='Validation'!$A$1:$A$3`
    pub fn to_formula(&self) -> String {
        format!("={}", self)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}'!${}${}:${}${}",
            self.sheet.replace('\'', "''"),
            column_index_to_letter(self.first_col),
            self.first_row + 1,
            column_index_to_letter(self.last_col),
            self.last_row + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_to_letter() {
        assert_eq!(column_index_to_letter(0), "A");
        assert_eq!(column_index_to_letter(1), "B");
        assert_eq!(column_index_to_letter(25), "Z");
        assert_eq!(column_index_to_letter(26), "AA");
        assert_eq!(column_index_to_letter(701), "ZZ");
        assert_eq!(column_index_to_letter(702), "AAA");
    }

    #[test]
    fn test_column_letter_to_index() {
        assert_eq!(column_letter_to_index("A"), Some(0));
        assert_eq!(column_letter_to_index("z"), Some(25));
        assert_eq!(column_letter_to_index("AA"), Some(26));
        assert_eq!(column_letter_to_index("XFD"), Some(MAX_COL));
        assert_eq!(column_letter_to_index("XFE"), None);
        assert_eq!(column_letter_to_index(""), None);
    }

    #[test]
    fn test_parse_range() {
        let range = CellRange::parse("Validation!A1:A3").unwrap();
        assert_eq!(range.sheet, "Validation");
        assert_eq!((range.first_row, range.first_col), (0, 0));
        assert_eq!((range.last_row, range.last_col), (2, 0));
        assert_eq!(range.to_formula(), "='Validation'!$A$1:$A$3");
    }

    #[test]
    fn test_parse_quoted_and_single_cell() {
        let range = CellRange::parse("'It''s here'!$B$2").unwrap();
        assert_eq!(range.sheet, "It's here");
        assert_eq!((range.first_row, range.first_col), (1, 1));
        assert_eq!((range.last_row, range.last_col), (1, 1));
        assert_eq!(range.to_string(), "'It''s here'!$B$2:$B$2");
    }

    #[test]
    fn test_parse_rejects_non_references() {
        assert!(CellRange::parse("A1:A3").is_none());
        assert!(CellRange::parse("A,B,C").is_none());
        assert!(CellRange::parse("areas").is_none());
        assert!(CellRange::parse("Sheet!A0").is_none());
    }
}
