//! Worksheet rows → records

use crate::error::{SheetMapError, SheetMapResult};
use crate::schema::{self, CellField, Record, Schema};
use crate::types::CellValue;
use crate::workbook::{Sheet, Workbook};
use std::collections::HashMap;
use tracing::debug;

static EMPTY: CellValue = CellValue::Empty;

/// One data row, addressed by column title
pub struct RowReader<'a> {
    schema: &'a Schema,
    sheet: &'a Sheet,
    row: usize,
    columns: &'a HashMap<&'static str, usize>,
}

impl<'a> RowReader<'a> {
    /// 1-based Excel row number
    pub fn row_number(&self) -> usize {
        self.row + 1
    }

    /// Raw value of the cell under `title`
    pub fn value(&self, title: &str) -> Option<&'a CellValue> {
        let col = *self.columns.get(title)?;
        Some(self.sheet.value(self.row, col))
    }

    /// Convert the cell under `title` to the field type
    pub fn get<F: CellField>(&self, title: &str) -> SheetMapResult<F> {
        let column = self.schema.column(title).ok_or_else(|| {
            SheetMapError::Schema(format!(
                "Column '{}' is not declared for sheet '{}'",
                title,
                self.schema.sheet_name()
            ))
        })?;
        let value = self.value(title).unwrap_or(&EMPTY);

        F::from_cell(value, column.format()).map_err(|reason| SheetMapError::Conversion {
            sheet: self.sheet.name().to_string(),
            row: self.row_number(),
            column: title.to_string(),
            reason,
        })
    }
}

/// Decode the sheet named by `T`'s schema and append the records to `out`.
///
/// Reading stops at the first entirely empty row below the header, so rows
/// after an interior blank row are never read. `out` is only extended when
/// every row decodes.
pub(crate) fn read_records<T: Record>(
    workbook: &Workbook,
    out: &mut Vec<T>,
) -> SheetMapResult<usize> {
    let schema = schema::resolve::<T>()?;
    let sheet = workbook.sheet(schema.sheet_name()).ok_or_else(|| {
        SheetMapError::NotFound(format!(
            "Sheet '{}' does not exist in the input workbook",
            schema.sheet_name()
        ))
    })?;

    let titles = schema.titles();
    let (header_row, positions) = sheet
        .locate_header(&titles)
        .ok_or_else(|| missing_titles(sheet, &titles))?;
    let columns: HashMap<&'static str, usize> = titles.iter().copied().zip(positions).collect();

    let mut records = Vec::new();
    for row in header_row + 1..sheet.row_count() {
        if sheet.is_row_empty(row) {
            debug!(sheet = sheet.name(), row = row + 1, "stopped at empty row");
            break;
        }
        let reader = RowReader {
            schema: &schema,
            sheet,
            row,
            columns: &columns,
        };
        records.push(T::from_row(&reader)?);
    }

    let count = records.len();
    out.extend(records);
    debug!(sheet = sheet.name(), rows = count, "read records");
    Ok(count)
}

fn missing_titles(sheet: &Sheet, titles: &[&str]) -> SheetMapError {
    SheetMapError::Schema(format!(
        "Sheet '{}' header is missing column(s): {}",
        sheet.name(),
        sheet.missing_titles(titles).join(", ")
    ))
}
