//! Error handling tests

use sheetmap::error::{SheetMapError, SheetMapResult};

#[test]
fn test_conversion_error_display() {
    let err = SheetMapError::Conversion {
        sheet: "Members".to_string(),
        row: 7,
        column: "Age".to_string(),
        reason: "expected an integer, found 'abc'".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Conversion error in sheet 'Members', row 7, column 'Age': expected an integer, found 'abc'"
    );
    assert!(err.is_conversion());
    assert!(!err.is_schema());
}

#[test]
fn test_schema_error_display() {
    let err = SheetMapError::Schema("Duplicate title 'Day' in sheet 'Orders'".to_string());
    assert_eq!(
        err.to_string(),
        "Schema error: Duplicate title 'Day' in sheet 'Orders'"
    );
    assert!(err.is_schema());
}

#[test]
fn test_validation_error_display() {
    let err = SheetMapError::Validation("Unresolved validation reference 'areas'".to_string());
    assert!(err.to_string().starts_with("Validation error:"));
    assert!(err.is_validation());
}

#[test]
fn test_not_found_error_display() {
    let err = SheetMapError::NotFound("Sheet 'Members' does not exist".to_string());
    assert_eq!(err.to_string(), "Not found: Sheet 'Members' does not exist");
    assert!(err.is_not_found());
}

#[test]
fn test_import_and_export_error_display() {
    let import = SheetMapError::Import("bad zip".to_string());
    assert_eq!(import.to_string(), "Import error: bad zip");

    let export = SheetMapError::Export("disk full".to_string());
    assert_eq!(export.to_string(), "Export error: disk full");
}

#[test]
fn test_closed_error_display() {
    assert_eq!(SheetMapError::Closed.to_string(), "Session is closed");
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: SheetMapError = io_err.into();
    assert!(matches!(err, SheetMapError::Io(_)));
    assert!(err.to_string().contains("file not found"));
}

#[test]
fn test_yaml_error_conversion() {
    let yaml_err = serde_yaml::from_str::<Vec<String>>("[unclosed").unwrap_err();
    let err: SheetMapError = yaml_err.into();
    assert!(matches!(err, SheetMapError::Yaml(_)));
    assert!(err.to_string().starts_with("YAML parsing error"));
}

#[test]
fn test_result_propagation() {
    fn parse(text: &str) -> SheetMapResult<Vec<String>> {
        Ok(serde_yaml::from_str(text)?)
    }
    assert_eq!(parse("[a, b]").unwrap(), vec!["a", "b"]);
    assert!(parse("{").is_err());
}

#[test]
fn test_zip_error_conversion() {
    let zip_err = zip::ZipArchive::new(std::io::Cursor::new(b"not a zip".to_vec())).unwrap_err();
    let err: SheetMapError = zip_err.into();
    assert!(matches!(err, SheetMapError::Zip(_)));
    assert!(err.to_string().starts_with("Zip error in workbook package"));
}
