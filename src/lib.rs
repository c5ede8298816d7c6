//! sheetmap - typed records ↔ Excel worksheets
//!
//! This library maps slices of plain Rust structs to `.xlsx` sheets and back.
//! A struct declares its sheet name and, per field, a column title plus an
//! optional number format and data validation.
//!
//! # Features
//!
//! - Declarative record schemas via [`record!`]
//! - Header-driven reading (column order in the file does not matter)
//! - Template workbooks and placeholder mode for writing into existing layouts,
//!   with the template's styles, merged cells and validations kept on save
//! - Dropdown validations from cell ranges, inline lists or named lists
//! - Date columns with Excel number formats
//!
//! # Example
//!
//! ```no_run
//! use sheetmap::{with_input, Session};
//!
//! sheetmap::record! {
//!     #[sheet(name = "Members")]
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct MemberStat {
//!         #[sheet(title = "Total")]
//!         pub total: i64,
//!         #[sheet(title = "New")]
//!         pub new: i64,
//!     }
//! }
//!
//! let mut session = Session::default();
//! session.write(&[MemberStat { total: 100, new: 50 }])?;
//! session.save_to_file("members.xlsx")?;
//!
//! let input = Session::new([with_input("members.xlsx")]);
//! let members: Vec<MemberStat> = input.read_all()?;
//! assert_eq!(members.len(), 1);
//! # Ok::<(), sheetmap::SheetMapError>(())
//! ```

pub mod dates;
pub mod error;
pub mod options;
pub mod reader;
pub mod schema;
pub mod session;
pub mod types;
pub mod validation;
pub mod workbook;
pub mod writer;

// Re-export commonly used types
pub use error::{SheetMapError, SheetMapResult};
pub use options::{
    as_placeholder, with_excel, with_input, with_template, with_validations, with_validations_yaml,
    OptionOutcome, OptionStatus, SessionOption, Source,
};
pub use reader::RowReader;
pub use schema::{CellField, ColumnSpec, Record, Schema};
pub use session::Session;
pub use types::{Cell, CellValue, Kind};
pub use validation::{NamedLists, ValidationSpec};
pub use workbook::{CellRange, ColumnValidation, Sheet, Workbook};
pub use writer::RowWriter;
