//! Data validation lists
//!
//! A column's validation reference resolves, in order, as:
//! 1. a sheet-qualified cell range (`Validation!A1:A3`) used as dropdown source
//! 2. an inline comma list (`A,B,C`)
//! 3. the name of a list registered through the session options

use crate::error::{SheetMapError, SheetMapResult};
use crate::workbook::{CellRange, Workbook};
use std::collections::HashMap;

/// Named validation lists: name → allowed values
pub type NamedLists = HashMap<String, Vec<String>>;

/// Excel limits the joined text of an inline list to 255 characters
const MAX_LIST_CHARS: usize = 255;

/// A resolved dropdown constraint
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationSpec {
    /// Allowed values come from an existing range of cells
    Range(CellRange),
    /// Allowed values are listed inline, in order
    List(Vec<String>),
}

/// Resolve a validation reference against the named lists and the target workbook
pub fn resolve(
    reference: &str,
    named: &NamedLists,
    workbook: &Workbook,
) -> SheetMapResult<ValidationSpec> {
    let reference = reference.trim();

    if let Some(range) = CellRange::parse(reference) {
        if !workbook.has_sheet(&range.sheet) {
            return Err(SheetMapError::Validation(format!(
                "Range '{}' refers to sheet '{}' which does not exist in the workbook",
                reference, range.sheet
            )));
        }
        return Ok(ValidationSpec::Range(range));
    }

    if reference.contains(',') {
        let values: Vec<String> = reference
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        return list_spec(reference, values);
    }

    match named.get(reference) {
        Some(values) => list_spec(reference, values.clone()),
        None => Err(SheetMapError::Validation(format!(
            "Unresolved validation reference '{}'",
            reference
        ))),
    }
}

fn list_spec(reference: &str, values: Vec<String>) -> SheetMapResult<ValidationSpec> {
    if values.is_empty() {
        return Err(SheetMapError::Validation(format!(
            "Validation list '{}' has no values",
            reference
        )));
    }

    // Excel joins list entries with commas
    let joined_len = values.iter().map(|v| v.chars().count()).sum::<usize>() + values.len() - 1;
    if joined_len > MAX_LIST_CHARS {
        return Err(SheetMapError::Validation(format!(
            "Validation list '{}' is {} characters long, Excel allows at most {}",
            reference, joined_len, MAX_LIST_CHARS
        )));
    }

    Ok(ValidationSpec::List(values))
}

/// Parse named validation lists from YAML:
///
/// ```yaml
/// areas: [North, South]
/// levels:
///   - gold
///   - silver
/// ```
pub fn parse_named_lists(yaml: &str) -> SheetMapResult<NamedLists> {
    Ok(serde_yaml::from_str(yaml)?)
}
