use thiserror::Error;

pub type SheetMapResult<T> = Result<T, SheetMapError>;

#[derive(Error, Debug)]
pub enum SheetMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error in workbook package: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Zip error in workbook package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conversion error in sheet '{sheet}', row {row}, column '{column}': {reason}")]
    Conversion {
        sheet: String,
        /// 1-based row number as shown by Excel
        row: usize,
        column: String,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Session is closed")]
    Closed,
}

impl SheetMapError {
    pub fn is_schema(&self) -> bool {
        matches!(self, SheetMapError::Schema(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SheetMapError::Validation(_))
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, SheetMapError::Conversion { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SheetMapError::NotFound(_))
    }
}
