//! Excel importer implementation - Excel (.xlsx) → Workbook

use super::package::Package;
use super::{Sheet, Workbook};
use crate::dates;
use crate::error::{SheetMapError, SheetMapResult};
use crate::types::{Cell, CellValue};
use calamine::{Data, Range, Reader, Xlsx};
use std::io::Cursor;
use tracing::warn;

/// Decode every worksheet of an `.xlsx` file.
///
/// The raw package is kept so a later save can patch it. Cell values come
/// from calamine either way.
pub(super) fn read_workbook(bytes: &[u8]) -> SheetMapResult<Workbook> {
    let mut xlsx = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| SheetMapError::Import(format!("Failed to open Excel workbook: {}", e)))?;

    let mut workbook = Workbook::new();
    let sheet_names = xlsx.sheet_names().to_vec();

    for sheet_name in sheet_names {
        let range = xlsx.worksheet_range(&sheet_name).map_err(|e| {
            SheetMapError::Import(format!("Failed to read sheet '{}': {}", sheet_name, e))
        })?;
        let mut sheet = sheet_from_range(&sheet_name, &range);
        sheet.mark_clean();
        workbook.insert_sheet(sheet);
    }

    workbook.package = match Package::from_bytes(bytes) {
        Ok(package) => Some(package),
        Err(e) => {
            warn!(error = %e, "workbook package is not patchable, saving will re-encode it");
            None
        }
    };

    Ok(workbook)
}

/// Copy a calamine range into a sheet at its absolute positions
fn sheet_from_range(sheet_name: &str, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(sheet_name);

    // Ranges start at the first used cell, not at A1
    let Some((start_row, start_col)) = range.start() else {
        return sheet;
    };

    for (row, col, data) in range.used_cells() {
        let value = convert_data(data);
        if value.is_empty() {
            continue;
        }
        sheet.set_cell(
            start_row as usize + row,
            start_col as usize + col,
            Cell::from(value),
        );
    }

    sheet
}

/// Convert a calamine cell to a cell value
fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if dt.is_datetime() {
                dates::from_excel_serial(serial)
                    .map_or(CellValue::Number(serial), CellValue::DateTime)
            } else {
                // Durations stay numeric
                CellValue::Number(serial)
            }
        }
        Data::DateTimeIso(s) => {
            dates::parse_iso(s).map_or_else(|| CellValue::String(s.clone()), CellValue::DateTime)
        }
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}
