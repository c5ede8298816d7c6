//! Records → worksheet rows

use crate::error::{SheetMapError, SheetMapResult};
use crate::schema::{self, CellField, Record, Schema};
use crate::types::{Cell, CellValue};
use crate::validation::{self, NamedLists, ValidationSpec};
use crate::workbook::reference::MAX_ROW;
use crate::workbook::{ColumnValidation, Sheet, Workbook};
use tracing::debug;

/// Excel's per-cell text limit
const MAX_CELL_CHARS: usize = 32_767;

/// Collects the cells of one record in schema order
pub struct RowWriter<'a> {
    schema: &'a Schema,
    row: usize,
    cells: Vec<CellValue>,
}

impl<'a> RowWriter<'a> {
    pub(crate) fn new(schema: &'a Schema, row: usize) -> Self {
        Self {
            schema,
            row,
            cells: vec![CellValue::Empty; schema.columns().len()],
        }
    }

    /// 1-based Excel row number the record will land on
    pub fn row_number(&self) -> usize {
        self.row + 1
    }

    /// Convert a field value and store it under its column title
    pub fn put<F: CellField>(&mut self, title: &str, value: &F) -> SheetMapResult<()> {
        let index = self.schema.position(title).ok_or_else(|| {
            SheetMapError::Schema(format!(
                "Column '{}' is not declared for sheet '{}'",
                title,
                self.schema.sheet_name()
            ))
        })?;

        let cell = value
            .to_cell()
            .and_then(check_cell)
            .map_err(|reason| SheetMapError::Conversion {
                sheet: self.schema.sheet_name().to_string(),
                row: self.row_number(),
                column: title.to_string(),
                reason,
            })?;

        self.cells[index] = cell;
        Ok(())
    }

    fn finish(self) -> Vec<CellValue> {
        self.cells
    }
}

fn check_cell(cell: CellValue) -> Result<CellValue, String> {
    if let CellValue::String(text) = &cell {
        let len = text.chars().count();
        if len > MAX_CELL_CHARS {
            return Err(format!(
                "text of {} characters exceeds the Excel cell limit of {}",
                len, MAX_CELL_CHARS
            ));
        }
    }
    Ok(cell)
}

/// Where a write lands inside its sheet
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    /// Row to emit the header on, `None` when a header already exists
    header_row: Option<usize>,
    data_start: usize,
    /// Physical column for each schema column
    columns: Vec<usize>,
}

impl Layout {
    fn plan(sheet: Option<&Sheet>, schema: &Schema, placeholder: bool) -> Self {
        let next_free = sheet.map_or(0, Sheet::next_free_row);

        if let Some((_, columns)) = sheet.and_then(|s| s.locate_header(&schema.titles())) {
            return Self {
                header_row: None,
                data_start: next_free,
                columns,
            };
        }

        let columns = (0..schema.columns().len()).collect();
        if placeholder {
            // The template content stands in for the header
            Self {
                header_row: None,
                data_start: next_free,
                columns,
            }
        } else {
            Self {
                header_row: Some(next_free),
                data_start: next_free + 1,
                columns,
            }
        }
    }

    /// Fail when the header or the last record would land below Excel's last row
    fn check_row_limit(&self, sheet: &str, count: usize) -> SheetMapResult<()> {
        let last = match (count, self.header_row) {
            (0, None) => return Ok(()),
            (0, Some(header)) => header,
            (count, _) => self.data_start + count - 1,
        };
        if last > MAX_ROW {
            return Err(SheetMapError::Export(format!(
                "Writing {} record(s) to sheet '{}' from row {} runs past the Excel row limit of {}",
                count,
                sheet,
                self.data_start + 1,
                MAX_ROW + 1
            )));
        }
        Ok(())
    }
}

/// Write records into the sheet named by `T`'s schema.
///
/// Schema, validation, row limit and conversion errors are raised before the
/// workbook is touched.
pub(crate) fn write_records<T: Record>(
    workbook: &mut Workbook,
    records: &[T],
    named: &NamedLists,
    placeholder: bool,
) -> SheetMapResult<()> {
    let schema = schema::resolve::<T>()?;
    let sheet_name = schema.sheet_name();

    let validations: Vec<(usize, ValidationSpec)> = schema
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(idx, column)| column.validation().map(|reference| (idx, reference)))
        .map(|(idx, reference)| {
            validation::resolve(reference, named, workbook).map(|spec| (idx, spec))
        })
        .collect::<SheetMapResult<_>>()?;

    let layout = Layout::plan(workbook.sheet(sheet_name), &schema, placeholder);
    layout.check_row_limit(sheet_name, records.len())?;

    let rows = records
        .iter()
        .enumerate()
        .map(|(offset, record)| {
            let mut row = RowWriter::new(&schema, layout.data_start + offset);
            record.to_row(&mut row)?;
            Ok(row.finish())
        })
        .collect::<SheetMapResult<Vec<_>>>()?;

    let sheet = workbook.sheet_or_insert(sheet_name);

    if let Some(header_row) = layout.header_row {
        for (column, &col) in schema.columns().iter().zip(&layout.columns) {
            sheet.set_cell(header_row, col, Cell::new(column.title()));
        }
    }

    for (offset, values) in rows.into_iter().enumerate() {
        let row = layout.data_start + offset;
        for ((value, column), &col) in values
            .into_iter()
            .zip(schema.columns())
            .zip(&layout.columns)
        {
            sheet.set_cell(
                row,
                col,
                Cell {
                    value,
                    format: column.format().map(str::to_string),
                },
            );
        }
    }

    if !records.is_empty() {
        let last_row = layout.data_start + records.len() - 1;
        for (idx, spec) in validations {
            sheet.add_validation(ColumnValidation {
                column: layout.columns[idx],
                first_row: layout.data_start,
                last_row,
                spec,
            });
        }
    }

    debug!(
        sheet = sheet_name,
        rows = records.len(),
        header = layout.header_row.is_some(),
        "wrote records"
    );

    Ok(())
}
