//! In-memory workbook document model
//!
//! Sheets hold rows of [`Cell`]s plus the column validations applied to them.
//! Decoding `.xlsx` bytes goes through calamine. Encoding depends on where
//! the workbook came from:
//! - Import: Excel (.xlsx) → [`Workbook`], keeping the raw package
//! - Export: [`Workbook`] → Excel (.xlsx) through rust_xlsxwriter
//! - Patch: edited cells and new validations spliced into the raw package

mod exporter;
mod importer;
mod package;
mod patch;
pub mod reference;
mod styles;
mod xml;

use crate::error::SheetMapResult;
use crate::types::{Cell, CellValue};
use crate::validation::ValidationSpec;
use package::Package;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

pub use reference::CellRange;

/// A validation constraint attached to one column over a span of rows
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValidation {
    pub column: usize,
    pub first_row: usize,
    pub last_row: usize,
    pub spec: ValidationSpec,
}

/// A named worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
    validations: Vec<ColumnValidation>,
    /// Cells written since the sheet was loaded
    edited: BTreeSet<(usize, usize)>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            validations: Vec::new(),
            edited: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of stored rows, trailing blank rows included
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    /// Cell value, `Empty` when the cell was never written
    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cell(row, col).map_or(&EMPTY, |cell| &cell.value)
    }

    /// Store a cell, growing the sheet as needed
    pub fn set_cell(&mut self, row: usize, col: usize, cell: impl Into<Cell>) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, Cell::default);
        }
        cells[col] = cell.into();
        self.edited.insert((row, col));
    }

    /// `(row, col)` of every cell written since load, in row-major order
    pub(crate) fn edited_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edited.iter().copied()
    }

    pub(crate) fn has_edits(&self) -> bool {
        !self.edited.is_empty() || !self.validations.is_empty()
    }

    pub(crate) fn mark_clean(&mut self) {
        self.edited.clear();
    }

    /// True when the row is missing or every cell in it is blank
    pub fn is_row_empty(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map_or(true, |cells| cells.iter().all(Cell::is_empty))
    }

    /// Index of the first row below all existing content
    pub fn next_free_row(&self) -> usize {
        (0..self.rows.len())
            .rev()
            .find(|&row| !self.is_row_empty(row))
            .map_or(0, |row| row + 1)
    }

    /// Find the first row that carries every title.
    ///
    /// Returns the row index and, per title, the column it sits in.
    pub fn locate_header(&self, titles: &[&str]) -> Option<(usize, Vec<usize>)> {
        self.rows.iter().enumerate().find_map(|(row, cells)| {
            let positions = header_positions(cells);
            titles
                .iter()
                .map(|title| positions.get(title.trim()).copied())
                .collect::<Option<Vec<usize>>>()
                .map(|columns| (row, columns))
        })
    }

    /// Titles absent from the row that carries the most of them.
    ///
    /// Banner rows above a header share no titles with it, so the row used
    /// for the comparison is the closest header candidate rather than the
    /// first non-empty row. With no candidate every title is missing.
    pub fn missing_titles<'t>(&self, titles: &[&'t str]) -> Vec<&'t str> {
        let best = self
            .rows
            .iter()
            .map(|cells| {
                let positions = header_positions(cells);
                titles
                    .iter()
                    .copied()
                    .filter(|title| !positions.contains_key(title.trim()))
                    .collect::<Vec<_>>()
            })
            .min_by_key(Vec::len);
        best.unwrap_or_else(|| titles.to_vec())
    }

    /// Validations added since the sheet was loaded
    pub fn validations(&self) -> &[ColumnValidation] {
        &self.validations
    }

    pub fn add_validation(&mut self, validation: ColumnValidation) {
        self.validations.push(validation);
    }
}

fn header_positions(cells: &[Cell]) -> HashMap<String, usize> {
    let mut positions = HashMap::new();
    for (col, cell) in cells.iter().enumerate() {
        if cell.is_empty() {
            continue;
        }
        positions
            .entry(cell.value.to_text().trim().to_string())
            .or_insert(col);
    }
    positions
}

/// An ordered collection of sheets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    /// Package the workbook was decoded from, patched on save
    package: Option<Package>,
}

impl Workbook {
    /// Create a blank workbook with no sheets
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an `.xlsx` file
    pub fn open<P: AsRef<Path>>(path: P) -> SheetMapResult<Self> {
        Self::from_bytes(&std::fs::read(path.as_ref())?)
    }

    /// Decode `.xlsx` bytes
    pub fn from_bytes(bytes: &[u8]) -> SheetMapResult<Self> {
        importer::read_workbook(bytes)
    }

    /// Drain a reader and decode its `.xlsx` bytes
    pub fn from_reader<R: Read>(mut reader: R) -> SheetMapResult<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    /// Get the named sheet, appending an empty one if absent
    pub fn sheet_or_insert(&mut self, name: &str) -> &mut Sheet {
        let idx = match self.sheets.iter().position(|sheet| sheet.name == name) {
            Some(idx) => idx,
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx]
    }

    /// Add a sheet, replacing any sheet with the same name in place
    pub(crate) fn insert_sheet(&mut self, sheet: Sheet) {
        match self.sheet_mut(&sheet.name) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
    }

    /// Write the workbook to an `.xlsx` file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SheetMapResult<()> {
        match &self.package {
            Some(package) => Ok(std::fs::write(path, patch::render_package(self, package)?)?),
            None => exporter::save(self, path.as_ref()),
        }
    }

    /// Encode the workbook as `.xlsx` bytes
    pub fn save_to_buffer(&self) -> SheetMapResult<Vec<u8>> {
        match &self.package {
            Some(package) => patch::render_package(self, package),
            None => exporter::save_to_buffer(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with_rows(rows: &[&[&str]]) -> Sheet {
        let mut sheet = Sheet::new("Data");
        for (r, cells) in rows.iter().enumerate() {
            for (c, text) in cells.iter().enumerate() {
                if !text.is_empty() {
                    sheet.set_cell(r, c, Cell::new(*text));
                }
            }
        }
        sheet
    }

    #[test]
    fn test_set_cell_grows_sheet() {
        let mut sheet = Sheet::new("Data");
        sheet.set_cell(2, 3, Cell::new(1.5));
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.value(2, 3), &CellValue::Number(1.5));
        assert_eq!(sheet.value(0, 0), &CellValue::Empty);
        assert!(sheet.is_row_empty(1));
    }

    #[test]
    fn test_next_free_row_ignores_trailing_blanks() {
        let mut sheet = sheet_with_rows(&[&["a"], &["b"]]);
        assert_eq!(sheet.next_free_row(), 2);
        sheet.set_cell(5, 0, Cell::new(""));
        assert_eq!(sheet.next_free_row(), 2);
        assert_eq!(Sheet::new("Empty").next_free_row(), 0);
    }

    #[test]
    fn test_locate_header_by_title() {
        let sheet = sheet_with_rows(&[&["Report"], &["", "Name", "Age"], &["", "Ann", "30"]]);
        let (row, columns) = sheet.locate_header(&["Age", "Name"]).unwrap();
        assert_eq!(row, 1);
        assert_eq!(columns, vec![2, 1]);
        assert!(sheet.locate_header(&["Name", "Missing"]).is_none());
    }

    #[test]
    fn test_missing_titles_skip_banner_rows() {
        let sheet = sheet_with_rows(&[&["Report"], &["Name", "Age"], &["Ann", "30"]]);
        assert_eq!(sheet.missing_titles(&["Name", "Age", "Score"]), vec!["Score"]);
        assert_eq!(Sheet::new("Empty").missing_titles(&["Name"]), vec!["Name"]);
    }

    #[test]
    fn test_writes_are_tracked_until_marked_clean() {
        let mut sheet = sheet_with_rows(&[&["a", "b"]]);
        assert_eq!(sheet.edited_cells().collect::<Vec<_>>(), vec![(0, 0), (0, 1)]);
        sheet.mark_clean();
        assert!(!sheet.has_edits());
        sheet.set_cell(3, 1, Cell::new(1.0));
        assert_eq!(sheet.edited_cells().collect::<Vec<_>>(), vec![(3, 1)]);
    }

    #[test]
    fn test_sheet_or_insert_keeps_order() {
        let mut workbook = Workbook::new();
        workbook.sheet_or_insert("B");
        workbook.sheet_or_insert("A");
        workbook.sheet_or_insert("B").set_cell(0, 0, Cell::new("x"));
        assert_eq!(workbook.sheet_names(), vec!["B", "A"]);
        assert_eq!(workbook.sheet("B").unwrap().row_count(), 1);
    }
}
