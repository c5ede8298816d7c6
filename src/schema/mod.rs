//! Record schemas
//!
//! A [`Record`] declares its sheet name and ordered columns. [`resolve`]
//! checks the declaration once per type and caches the resulting
//! [`Schema`] for the rest of the process.

mod field;
mod macros;

pub use field::CellField;

use crate::error::{SheetMapError, SheetMapResult};
use crate::reader::RowReader;
use crate::types::Kind;
use crate::writer::RowWriter;
use serde::Serialize;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A type that maps to one worksheet, one row per value.
///
/// Usually generated by [`record!`](crate::record).
pub trait Record: Sized + 'static {
    /// Name of the worksheet; empty means the declaration is incomplete
    const SHEET: &'static str;

    /// Columns in field declaration order
    fn columns() -> Vec<ColumnSpec>;

    /// Store every field into the row
    fn to_row(&self, row: &mut RowWriter<'_>) -> SheetMapResult<()>;

    /// Build a value from a data row
    fn from_row(row: &RowReader<'_>) -> SheetMapResult<Self>;
}

/// Column descriptor for one record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    title: &'static str,
    field: &'static str,
    kind: Kind,
    format: Option<&'static str>,
    validation: Option<&'static str>,
}

impl ColumnSpec {
    pub fn new(field: &'static str, title: &'static str, kind: Kind) -> Self {
        Self {
            title,
            field,
            kind,
            format: None,
            validation: None,
        }
    }

    pub fn with_format(mut self, format: Option<&'static str>) -> Self {
        self.format = format;
        self
    }

    pub fn with_validation(mut self, validation: Option<&'static str>) -> Self {
        self.validation = validation;
        self
    }

    pub fn title(&self) -> &'static str {
        self.title
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Excel number format, already defaulted by kind
    pub fn format(&self) -> Option<&'static str> {
        self.format
    }

    pub fn validation(&self) -> Option<&'static str> {
        self.validation
    }
}

/// Checked mapping between a record type and a sheet's columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    sheet_name: &'static str,
    columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Check a declaration and fill in default formats
    pub fn derive(sheet_name: &'static str, columns: Vec<ColumnSpec>) -> SheetMapResult<Self> {
        if sheet_name.trim().is_empty() {
            return Err(SheetMapError::Schema(
                "Record type has no sheet name declaration".to_string(),
            ));
        }

        if columns.is_empty() {
            return Err(SheetMapError::Schema(format!(
                "Record type for sheet '{}' maps no fields",
                sheet_name
            )));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if column.title.trim().is_empty() {
                return Err(SheetMapError::Schema(format!(
                    "Field '{}' of sheet '{}' has an empty title",
                    column.field, sheet_name
                )));
            }
            if !seen.insert(column.title.trim()) {
                return Err(SheetMapError::Schema(format!(
                    "Duplicate title '{}' in sheet '{}'",
                    column.title, sheet_name
                )));
            }
        }

        let columns = columns
            .into_iter()
            .map(|column| {
                let format = column.format.or_else(|| column.kind.default_format());
                column.with_format(format)
            })
            .collect();

        Ok(Self {
            sheet_name,
            columns,
        })
    }

    pub fn sheet_name(&self) -> &'static str {
        self.sheet_name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn titles(&self) -> Vec<&'static str> {
        self.columns.iter().map(ColumnSpec::title).collect()
    }

    /// Position of a title within the declared column order
    pub fn position(&self, title: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.title == title)
    }

    pub fn column(&self, title: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.title == title)
    }

    /// Render the schema as YAML for inspection
    pub fn to_yaml(&self) -> SheetMapResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

type SchemaCache = RwLock<HashMap<TypeId, Arc<Schema>>>;

fn cache() -> &'static SchemaCache {
    static CACHE: OnceLock<SchemaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Resolve the schema of `T`, deriving it on first use.
///
/// Failed derivations are not cached.
pub fn resolve<T: Record>() -> SheetMapResult<Arc<Schema>> {
    let type_id = TypeId::of::<T>();

    if let Some(schema) = cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return Ok(Arc::clone(schema));
    }

    let schema = Arc::new(Schema::derive(T::SHEET, T::columns())?);
    let mut schemas = cache().write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(schemas.entry(type_id).or_insert(schema)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_fills_date_format() {
        let schema = Schema::derive(
            "Orders",
            vec![
                ColumnSpec::new("day", "Day", Kind::Date),
                ColumnSpec::new("count", "Count", Kind::Int),
                ColumnSpec::new("when", "When", Kind::Date).with_format(Some("dd/mm/yyyy")),
            ],
        )
        .unwrap();

        assert_eq!(schema.columns()[0].format(), Some("yyyy-mm-dd"));
        assert_eq!(schema.columns()[1].format(), None);
        assert_eq!(schema.columns()[2].format(), Some("dd/mm/yyyy"));
        assert_eq!(schema.titles(), vec!["Day", "Count", "When"]);
        assert_eq!(schema.position("Count"), Some(1));
    }

    #[test]
    fn test_derive_rejects_missing_sheet() {
        let err = Schema::derive("  ", vec![ColumnSpec::new("a", "A", Kind::Int)]).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_derive_rejects_duplicate_titles() {
        let err = Schema::derive(
            "Data",
            vec![
                ColumnSpec::new("a", "Total", Kind::Int),
                ColumnSpec::new("b", "Total", Kind::Float),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate title 'Total'"));
    }

    #[test]
    fn test_derive_rejects_empty_title_and_no_columns() {
        assert!(Schema::derive("Data", vec![]).is_err());
        assert!(Schema::derive("Data", vec![ColumnSpec::new("a", "", Kind::Int)]).is_err());
    }

    #[test]
    fn test_schema_to_yaml() {
        let schema = Schema::derive(
            "Data",
            vec![ColumnSpec::new("area", "Area", Kind::String).with_validation(Some("A,B"))],
        )
        .unwrap();
        let yaml = schema.to_yaml().unwrap();
        assert!(yaml.contains("sheet_name: Data"));
        assert!(yaml.contains("kind: string"));
        assert!(yaml.contains("validation: A,B"));
    }
}
