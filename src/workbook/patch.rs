//! Saving a template-backed workbook by patching its package
//!
//! Only cells written since the template was opened are re-encoded. Every
//! other cell keeps its original XML, including its style index, and parts
//! the model knows nothing about are copied through. New cells reuse the
//! style of the cell they replace.

use super::package::Package;
use super::reference::{self, column_index_to_letter};
use super::styles::StyleBook;
use super::xml::{attr, end_local, local_name, with_attr, with_attrs};
use super::{ColumnValidation, Sheet, Workbook};
use crate::dates;
use crate::error::{SheetMapError, SheetMapResult};
use crate::types::{Cell, CellValue};
use crate::validation::ValidationSpec;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use tracing::debug;

/// Starting point for sheets the template does not have
const EMPTY_WORKSHEET: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<dimension ref="A1"/><sheetData/>"#,
    r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    "</worksheet>"
);

/// Worksheet children that must come after `<dataValidations>`
const AFTER_VALIDATIONS: &[&str] = &[
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// Encode `workbook` on top of the package it was opened from
pub(super) fn render_package(workbook: &Workbook, template: &Package) -> SheetMapResult<Vec<u8>> {
    let mut package = template.clone();
    let mut styles = match package.styles_part().and_then(|path| package.part(path)) {
        Some(xml) => Some(StyleBook::parse(xml)?),
        None => None,
    };

    let mut patched = 0;
    for sheet in workbook.sheets() {
        match package.sheet_part(sheet.name()).map(str::to_string) {
            Some(path) => {
                if !sheet.has_edits() {
                    continue;
                }
                let xml = package.part(&path).ok_or_else(|| {
                    SheetMapError::Export(format!("Worksheet part '{}' is missing", path))
                })?;
                let xml = patch_worksheet(xml, sheet, &mut styles)?;
                package.set_part(&path, xml);
            }
            None => {
                let xml = patch_worksheet(EMPTY_WORKSHEET.as_bytes(), sheet, &mut styles)?;
                package.add_worksheet(sheet.name(), xml)?;
            }
        }
        patched += 1;
    }

    if let Some(book) = styles.as_ref().filter(|book| book.changed()) {
        if let Some(path) = package.styles_part().map(str::to_string) {
            let xml = book.render()?;
            package.set_part(&path, xml);
        }
    }

    debug!(sheets = patched, "patched template package");
    package.to_bytes()
}

/// One `<c>` element, kept as raw events
#[derive(Debug)]
struct CellXml {
    style: Option<u32>,
    events: Vec<Event<'static>>,
}

/// One `<row>` element: its attributes minus `r` and `spans`, plus its cells
#[derive(Debug)]
struct RowXml {
    start: BytesStart<'static>,
    cells: BTreeMap<usize, CellXml>,
}

#[derive(Debug, Default)]
struct SheetXml {
    /// Namespace prefix of the worksheet elements, `""` or `x:`
    prefix: String,
    rows: BTreeMap<usize, RowXml>,
    has_validation_list: bool,
    validation_count: usize,
}

impl SheetXml {
    fn name(&self, local: &str) -> String {
        format!("{}{}", self.prefix, local)
    }

    /// `A1:D9` over every stored cell
    fn dimension(&self) -> String {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for (&row, xml) in &self.rows {
            for &col in xml.cells.keys() {
                bounds = Some(match bounds {
                    None => (row, col, row, col),
                    Some((r0, c0, r1, c1)) => (r0.min(row), c0.min(col), r1.max(row), c1.max(col)),
                });
            }
        }
        match bounds {
            None => "A1".to_string(),
            Some((r0, c0, r1, c1)) if (r0, c0) == (r1, c1) => cell_ref(r0, c0),
            Some((r0, c0, r1, c1)) => format!("{}:{}", cell_ref(r0, c0), cell_ref(r1, c1)),
        }
    }
}

fn cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", column_index_to_letter(col), row + 1)
}

/// Rewrite the cells, dimension and validations of one worksheet part
fn patch_worksheet(
    xml: &[u8],
    sheet: &Sheet,
    styles: &mut Option<StyleBook>,
) -> SheetMapResult<Vec<u8>> {
    let mut model = read_sheet_data(xml)?;

    for (row, col) in sheet.edited_cells() {
        let prefix = model.prefix.clone();
        let entry = model.rows.entry(row).or_insert_with(|| RowXml {
            start: BytesStart::new(format!("{}row", prefix)),
            cells: BTreeMap::new(),
        });
        let base = entry.cells.get(&col).and_then(|cell| cell.style);
        match encode_cell(&prefix, row, col, base, sheet.cell(row, col), styles)? {
            Some(cell) => {
                entry.cells.insert(col, cell);
            }
            None => {
                entry.cells.remove(&col);
            }
        }
    }

    let validations: Vec<Event<'static>> = sheet
        .validations()
        .iter()
        .flat_map(|validation| validation_events(&model.prefix, validation))
        .collect();

    write_worksheet(xml, &model, &validations, sheet.validations().len())
}

/// First pass: index the `<sheetData>` rows and cells and count validations
fn read_sheet_data(xml: &[u8]) -> SheetMapResult<SheetXml> {
    let mut reader = Reader::from_reader(xml);
    let mut model = SheetXml::default();
    let mut in_data = false;
    let mut current_row = 0;
    let mut next_row = 0;
    let mut next_col = 0;

    loop {
        let event = reader.read_event()?;
        let (start, empty) = match &event {
            Event::Start(start) => (start, false),
            Event::Empty(start) => (start, true),
            Event::End(end) => {
                if end_local(end) == "sheetData" {
                    in_data = false;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let name = local_name(start).into_owned();
        match name.as_str() {
            "worksheet" => {
                let full = start.name().0;
                model.prefix = String::from_utf8_lossy(&full[..full.len() - name.len()]).into_owned();
            }
            "sheetData" => in_data = !empty,
            "row" if in_data => {
                current_row = attr(start, "r")?
                    .and_then(|r| r.parse::<usize>().ok())
                    .filter(|&r| r > 0)
                    .map_or(next_row, |r| r - 1);
                next_row = current_row + 1;
                next_col = 0;
                let stripped = with_attrs(start, &[("r", None), ("spans", None)])?;
                model.rows.insert(
                    current_row,
                    RowXml {
                        start: stripped,
                        cells: BTreeMap::new(),
                    },
                );
            }
            "c" if in_data => {
                let style = attr(start, "s")?.and_then(|s| s.parse::<u32>().ok());
                let position = attr(start, "r")?.and_then(|r| reference::parse_cell(&r));
                let (col, start) = match position {
                    Some((_, col)) => (col, start.clone().into_owned()),
                    None => (next_col, with_attr(start, "r", &cell_ref(current_row, next_col))?),
                };
                next_col = col + 1;

                let events = if empty {
                    vec![Event::Empty(start)]
                } else {
                    capture_element(&mut reader, start)?
                };
                if let Some(row) = model.rows.get_mut(&current_row) {
                    row.cells.insert(col, CellXml { style, events });
                }
            }
            "dataValidations" => model.has_validation_list = true,
            "dataValidation" => model.validation_count += 1,
            _ => {}
        }
    }

    Ok(model)
}

/// Events of an element from its start tag through the matching end tag
fn capture_element(
    reader: &mut Reader<&[u8]>,
    start: BytesStart<'static>,
) -> SheetMapResult<Vec<Event<'static>>> {
    let mut events = vec![Event::Start(start)];
    let mut depth = 1;
    while depth > 0 {
        let event = reader.read_event()?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(SheetMapError::Import("Truncated worksheet cell".into())),
            _ => {}
        }
        events.push(event.into_owned());
    }
    Ok(events)
}

/// XML for one model cell. `None` drops the cell element entirely.
fn encode_cell(
    prefix: &str,
    row: usize,
    col: usize,
    base: Option<u32>,
    cell: Option<&Cell>,
    styles: &mut Option<StyleBook>,
) -> SheetMapResult<Option<CellXml>> {
    let name = |local: &str| format!("{}{}", prefix, local);
    let Some(cell) = cell.filter(|cell| !cell.is_empty()) else {
        // A cleared cell keeps its formatting
        return Ok(base.map(|style| CellXml {
            style: Some(style),
            events: vec![Event::Empty(cell_start(prefix, row, col, Some(style), None))],
        }));
    };

    let pattern = match &cell.value {
        CellValue::DateTime(_) => Some(
            cell.format
                .as_deref()
                .unwrap_or(dates::DEFAULT_DATETIME_FORMAT),
        ),
        _ => cell.format.as_deref(),
    };
    let style = match (pattern, styles.as_mut()) {
        (Some(pattern), Some(book)) => Some(book.style_for(base, pattern)?),
        _ => base,
    };

    let mut events = Vec::with_capacity(8);
    match &cell.value {
        CellValue::String(text) => {
            events.push(Event::Start(cell_start(prefix, row, col, style, Some("inlineStr"))));
            events.push(Event::Start(BytesStart::new(name("is"))));
            let mut t = BytesStart::new(name("t"));
            t.push_attribute(("xml:space", "preserve"));
            events.push(Event::Start(t));
            events.push(text_event(text));
            events.push(Event::End(BytesEnd::new(name("t"))));
            events.push(Event::End(BytesEnd::new(name("is"))));
        }
        CellValue::Number(value) => {
            events.push(Event::Start(cell_start(prefix, row, col, style, None)));
            push_value(&mut events, prefix, &value.to_string());
        }
        CellValue::Bool(value) => {
            events.push(Event::Start(cell_start(prefix, row, col, style, Some("b"))));
            push_value(&mut events, prefix, if *value { "1" } else { "0" });
        }
        CellValue::DateTime(value) => {
            events.push(Event::Start(cell_start(prefix, row, col, style, None)));
            push_value(&mut events, prefix, &dates::to_excel_serial(value).to_string());
        }
        CellValue::Empty => return Ok(None),
    }
    events.push(Event::End(BytesEnd::new(name("c"))));

    Ok(Some(CellXml { style, events }))
}

fn cell_start(
    prefix: &str,
    row: usize,
    col: usize,
    style: Option<u32>,
    kind: Option<&str>,
) -> BytesStart<'static> {
    let mut start = BytesStart::new(format!("{}c", prefix));
    start.push_attribute(("r", cell_ref(row, col).as_str()));
    if let Some(style) = style {
        start.push_attribute(("s", style.to_string().as_str()));
    }
    if let Some(kind) = kind {
        start.push_attribute(("t", kind));
    }
    start
}

/// Text content with only `<`, `>` and `&` escaped, the way Excel writes it
fn text_event(content: &str) -> Event<'static> {
    Event::Text(BytesText::from_escaped(partial_escape(content).into_owned()))
}

fn push_value(events: &mut Vec<Event<'static>>, prefix: &str, text: &str) {
    let name = format!("{}v", prefix);
    events.push(Event::Start(BytesStart::new(name.clone())));
    events.push(text_event(text));
    events.push(Event::End(BytesEnd::new(name)));
}

/// `<dataValidation>` for a column span, as Excel writes list rules
fn validation_events(prefix: &str, validation: &ColumnValidation) -> Vec<Event<'static>> {
    let column = column_index_to_letter(validation.column);
    let sqref = if validation.first_row == validation.last_row {
        format!("{}{}", column, validation.first_row + 1)
    } else {
        format!(
            "{}{}:{}{}",
            column,
            validation.first_row + 1,
            column,
            validation.last_row + 1
        )
    };
    let formula = match &validation.spec {
        ValidationSpec::Range(range) => range.to_string(),
        ValidationSpec::List(values) => {
            let joined: Vec<String> = values.iter().map(|v| v.replace('"', "\"\"")).collect();
            format!("\"{}\"", joined.join(","))
        }
    };

    let mut start = BytesStart::new(format!("{}dataValidation", prefix));
    for (key, value) in [
        ("type", "list"),
        ("allowBlank", "1"),
        ("showInputMessage", "1"),
        ("showErrorMessage", "1"),
        ("sqref", sqref.as_str()),
    ] {
        start.push_attribute((key, value));
    }
    let formula_tag = format!("{}formula1", prefix);
    vec![
        Event::Start(start.clone()),
        Event::Start(BytesStart::new(formula_tag.clone())),
        text_event(&formula),
        Event::End(BytesEnd::new(formula_tag)),
        Event::End(start.to_end().into_owned()),
    ]
}

/// Second pass: stream the original part, swapping in the patched pieces
fn write_worksheet(
    xml: &[u8],
    model: &SheetXml,
    validations: &[Event<'static>],
    added: usize,
) -> SheetMapResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));
    let dimension = model.dimension();
    let validation_count = (model.validation_count + added).to_string();
    let mut pending = !validations.is_empty();
    let mut wrote_data = false;
    let mut depth = 0usize;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Eof => break,
            Event::Start(start) | Event::Empty(start) => {
                let empty = matches!(event, Event::Empty(_));
                let name = local_name(start).into_owned();
                let top_level = depth == 1;

                if top_level
                    && pending
                    && !model.has_validation_list
                    && AFTER_VALIDATIONS.contains(&name.as_str())
                {
                    if !wrote_data {
                        write_sheet_data(&mut writer, model)?;
                        wrote_data = true;
                    }
                    write_validation_list(&mut writer, model, validations, &validation_count)?;
                    pending = false;
                }

                match name.as_str() {
                    "sheetData" if top_level => {
                        write_sheet_data(&mut writer, model)?;
                        wrote_data = true;
                        if !empty {
                            reader.read_to_end(start.name())?;
                        }
                        continue;
                    }
                    "dimension" if top_level => {
                        let patched = with_attr(start, "ref", &dimension)?;
                        writer.write_event(if empty {
                            Event::Empty(patched)
                        } else {
                            Event::Start(patched)
                        })?;
                    }
                    "dataValidations" if top_level && pending => {
                        let patched = with_attr(start, "count", &validation_count)?;
                        if empty {
                            writer.write_event(Event::Start(patched.borrow()))?;
                            for validation in validations {
                                writer.write_event(validation.borrow())?;
                            }
                            writer.write_event(Event::End(patched.to_end()))?;
                            pending = false;
                        } else {
                            writer.write_event(Event::Start(patched))?;
                        }
                    }
                    _ => writer.write_event(event.borrow())?,
                }

                if !empty {
                    depth += 1;
                }
            }
            Event::End(end) => {
                if depth == 2 && pending && end_local(end) == "dataValidations" {
                    for validation in validations {
                        writer.write_event(validation.borrow())?;
                    }
                    pending = false;
                }
                if depth == 1 {
                    if !wrote_data {
                        write_sheet_data(&mut writer, model)?;
                        wrote_data = true;
                    }
                    if pending {
                        write_validation_list(&mut writer, model, validations, &validation_count)?;
                        pending = false;
                    }
                }
                depth = depth.saturating_sub(1);
                writer.write_event(event.borrow())?;
            }
            _ => writer.write_event(event.borrow())?,
        }
    }

    Ok(writer.into_inner())
}

fn write_sheet_data(writer: &mut Writer<Vec<u8>>, model: &SheetXml) -> SheetMapResult<()> {
    let data = BytesStart::new(model.name("sheetData"));
    if model.rows.is_empty() {
        writer.write_event(Event::Empty(data))?;
        return Ok(());
    }

    writer.write_event(Event::Start(data.borrow()))?;
    for (&index, row) in &model.rows {
        let mut start = BytesStart::new(model.name("row"));
        start.push_attribute(("r", (index + 1).to_string().as_str()));
        let mut has_attributes = false;
        for attribute in row.start.attributes() {
            start.push_attribute(attribute.map_err(quick_xml::Error::from)?);
            has_attributes = true;
        }
        if row.cells.is_empty() {
            if has_attributes {
                writer.write_event(Event::Empty(start))?;
            }
            continue;
        }

        writer.write_event(Event::Start(start.borrow()))?;
        for cell in row.cells.values() {
            for event in &cell.events {
                writer.write_event(event.borrow())?;
            }
        }
        writer.write_event(Event::End(start.to_end()))?;
    }
    writer.write_event(Event::End(data.to_end()))?;
    Ok(())
}

fn write_validation_list(
    writer: &mut Writer<Vec<u8>>,
    model: &SheetXml,
    validations: &[Event<'static>],
    count: &str,
) -> SheetMapResult<()> {
    let mut list = BytesStart::new(model.name("dataValidations"));
    list.push_attribute(("count", count));
    writer.write_event(Event::Start(list.borrow()))?;
    for validation in validations {
        writer.write_event(validation.borrow())?;
    }
    writer.write_event(Event::End(list.to_end()))?;
    Ok(())
}
