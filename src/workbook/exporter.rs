//! Excel exporter implementation - Workbook → Excel (.xlsx)

use super::{ColumnValidation, Workbook};
use crate::dates;
use crate::error::{SheetMapError, SheetMapResult};
use crate::types::{Cell, CellValue};
use crate::validation::ValidationSpec;
use rust_xlsxwriter::{DataValidation, Format, Formula, Worksheet};
use std::collections::HashMap;
use std::path::Path;

pub(super) fn save(workbook: &Workbook, output_path: &Path) -> SheetMapResult<()> {
    build(workbook)?
        .save(output_path)
        .map_err(|e| SheetMapError::Export(format!("Failed to save Excel file: {}", e)))
}

pub(super) fn save_to_buffer(workbook: &Workbook) -> SheetMapResult<Vec<u8>> {
    build(workbook)?
        .save_to_buffer()
        .map_err(|e| SheetMapError::Export(format!("Failed to encode Excel file: {}", e)))
}

/// Number formats are shared between cells that use the same pattern
#[derive(Default)]
struct FormatCache {
    formats: HashMap<String, Format>,
}

impl FormatCache {
    fn get(&mut self, pattern: &str) -> &Format {
        self.formats
            .entry(pattern.to_string())
            .or_insert_with(|| Format::new().set_num_format(pattern))
    }
}

fn build(workbook: &Workbook) -> SheetMapResult<rust_xlsxwriter::Workbook> {
    let mut output = rust_xlsxwriter::Workbook::new();
    let mut formats = FormatCache::default();

    for sheet in workbook.sheets() {
        let worksheet = output.add_worksheet();
        worksheet.set_name(sheet.name()).map_err(|e| {
            SheetMapError::Export(format!(
                "Failed to set worksheet name '{}': {}",
                sheet.name(),
                e
            ))
        })?;

        for (row_idx, cells) in sheet.rows().iter().enumerate() {
            let row = excel_row(row_idx)?;
            for (col_idx, cell) in cells.iter().enumerate() {
                write_cell(worksheet, row, excel_col(col_idx)?, cell, &mut formats)?;
            }
        }

        for validation in sheet.validations() {
            add_validation(worksheet, validation)?;
        }
    }

    // An .xlsx package needs at least one worksheet
    if workbook.sheets().is_empty() {
        output.add_worksheet();
    }

    Ok(output)
}

/// Write a single cell value based on its type
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    formats: &mut FormatCache,
) -> SheetMapResult<()> {
    let result = match (&cell.value, cell.format.as_deref()) {
        (CellValue::Empty, _) => return Ok(()),
        (CellValue::String(value), None) => worksheet.write_string(row, col, value),
        (CellValue::String(value), Some(pattern)) => {
            worksheet.write_string_with_format(row, col, value, formats.get(pattern))
        }
        (CellValue::Number(value), None) => worksheet.write_number(row, col, *value),
        (CellValue::Number(value), Some(pattern)) => {
            worksheet.write_number_with_format(row, col, *value, formats.get(pattern))
        }
        (CellValue::Bool(value), None) => worksheet.write_boolean(row, col, *value),
        (CellValue::Bool(value), Some(pattern)) => {
            worksheet.write_boolean_with_format(row, col, *value, formats.get(pattern))
        }
        (CellValue::DateTime(value), pattern) => {
            // Dates are serial numbers rendered through a date number format
            let pattern = pattern.unwrap_or(dates::DEFAULT_DATETIME_FORMAT);
            worksheet.write_number_with_format(
                row,
                col,
                dates::to_excel_serial(value),
                formats.get(pattern),
            )
        }
    };

    result.map(|_| ()).map_err(|e| {
        SheetMapError::Export(format!(
            "Failed to write {} cell at row {}, column {}: {}",
            cell.value.type_name(),
            row + 1,
            col + 1,
            e
        ))
    })
}

fn add_validation(worksheet: &mut Worksheet, validation: &ColumnValidation) -> SheetMapResult<()> {
    let rule = match &validation.spec {
        ValidationSpec::Range(range) => {
            DataValidation::new().allow_list_formula(Formula::new(range.to_formula()))
        }
        ValidationSpec::List(values) => DataValidation::new()
            .allow_list_strings(values.as_slice())
            .map_err(|e| SheetMapError::Validation(format!("Invalid list validation: {}", e)))?,
    };

    let col = excel_col(validation.column)?;
    worksheet
        .add_data_validation(
            excel_row(validation.first_row)?,
            col,
            excel_row(validation.last_row)?,
            col,
            &rule,
        )
        .map_err(|e| SheetMapError::Export(format!("Failed to add data validation: {}", e)))?;

    Ok(())
}

fn excel_row(row: usize) -> SheetMapResult<u32> {
    u32::try_from(row)
        .ok()
        .filter(|&r| r as usize <= super::reference::MAX_ROW)
        .ok_or_else(|| SheetMapError::Export(format!("Row {} exceeds the Excel row limit", row + 1)))
}

fn excel_col(col: usize) -> SheetMapResult<u16> {
    u16::try_from(col)
        .ok()
        .filter(|&c| c as usize <= super::reference::MAX_COL)
        .ok_or_else(|| {
            SheetMapError::Export(format!("Column {} exceeds the Excel column limit", col + 1))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::reference::MAX_ROW;

    #[test]
    fn test_excel_row_limits() {
        assert_eq!(excel_row(0).unwrap(), 0);
        assert_eq!(excel_row(MAX_ROW).unwrap(), MAX_ROW as u32);
        assert!(excel_row(MAX_ROW + 1).is_err());
        assert!(excel_col(16_384).is_err());
    }

    #[test]
    fn test_empty_workbook_still_encodes() {
        let bytes = save_to_buffer(&Workbook::new()).unwrap();
        // .xlsx files are zip packages
        assert_eq!(&bytes[..2], b"PK");
    }
}
