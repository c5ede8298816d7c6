//! Record schema declaration tests

use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use sheetmap::schema::resolve;
use sheetmap::{record, with_excel, Kind, Record, Session};
use std::sync::Arc;

record! {
    #[sheet(name = "Shifts")]
    #[derive(Debug, Clone, PartialEq)]
    pub struct Shift {
        #[sheet(title = "Day", format = "dd/mm/yyyy")]
        pub day: NaiveDate,
        #[sheet(title = "Starts")]
        pub starts: NaiveDateTime,
        #[sheet(title = "Staff", validation = "Ann,Bob")]
        pub staff: String,
        #[sheet(title = "Hours")]
        pub hours: f64,
        #[sheet(title = "Paid")]
        pub paid: bool,
        #[sheet(title = "Breaks")]
        pub breaks: Option<u8>,
    }
}

record! {
    /// Stock level of one item
    #[sheet(name = "Stock")]
    #[derive(Debug, Clone, PartialEq)]
    pub struct StockLevel {
        /// Catalogue code
        #[sheet(title = "Code")]
        pub code: String,
        /// Units on hand, counted at close
        #[sheet(title = "Units")]
        pub units: u32,
        #[sheet(title = "Reorder")]
        pub reorder: bool,
    }
}

record! {
    #[derive(Debug, Clone)]
    struct Unnamed {
        #[sheet(title = "Value")]
        value: i64,
    }
}

record! {
    #[sheet(name = "Dupes")]
    #[derive(Debug, Clone)]
    struct Duplicated {
        #[sheet(title = "Value")]
        first: i64,
        #[sheet(title = " Value ")]
        second: i64,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DERIVATION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_schema_follows_declaration_order() {
    let schema = resolve::<Shift>().unwrap();

    assert_eq!(Shift::SHEET, "Shifts");
    assert_eq!(schema.sheet_name(), "Shifts");
    assert_eq!(
        schema.titles(),
        vec!["Day", "Starts", "Staff", "Hours", "Paid", "Breaks"]
    );
    assert_eq!(schema.position("Hours"), Some(3));
    assert_eq!(schema.column("Day").unwrap().field(), "day");
}

#[test]
fn test_kinds_and_default_formats() {
    let schema = resolve::<Shift>().unwrap();
    let kinds: Vec<Kind> = schema.columns().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            Kind::Date,
            Kind::Date,
            Kind::String,
            Kind::Float,
            Kind::Bool,
            Kind::Int
        ]
    );

    assert_eq!(schema.column("Day").unwrap().format(), Some("dd/mm/yyyy"));
    assert_eq!(
        schema.column("Starts").unwrap().format(),
        Some("yyyy-mm-dd hh:mm:ss")
    );
    assert_eq!(schema.column("Hours").unwrap().format(), None);
    assert_eq!(schema.column("Staff").unwrap().validation(), Some("Ann,Bob"));
}

#[test]
fn test_documented_record_maps_like_plain_one() {
    let schema = resolve::<StockLevel>().unwrap();
    assert_eq!(schema.sheet_name(), "Stock");
    assert_eq!(schema.titles(), vec!["Code", "Units", "Reorder"]);

    let levels = vec![
        StockLevel {
            code: "A-100".to_string(),
            units: 12,
            reorder: false,
        },
        StockLevel {
            code: "B-200".to_string(),
            units: 0,
            reorder: true,
        },
    ];
    let mut session = Session::default();
    session.write(&levels).unwrap();

    let input = Session::new([with_excel(session.save_to_buffer().unwrap())]);
    assert_eq!(input.read_all::<StockLevel>().unwrap(), levels);
}

#[test]
fn test_schema_is_resolved_once() {
    let first = resolve::<Shift>().unwrap();
    let second = resolve::<Shift>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_schema_to_yaml() {
    let yaml = resolve::<Shift>().unwrap().to_yaml().unwrap();
    assert!(yaml.contains("sheet_name: Shifts"));
    assert!(yaml.contains("kind: date"));
    assert!(yaml.contains("Ann,Bob"));
}

// ═══════════════════════════════════════════════════════════════════════════
// DECLARATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_sheet_name_fails_before_writing() {
    let err = resolve::<Unnamed>().unwrap_err();
    assert!(err.is_schema());

    let mut session = Session::default();
    let err = session.write(&[Unnamed { value: 1 }]).unwrap_err();
    assert!(err.is_schema());
    assert!(session.workbook().unwrap().sheets().is_empty());
}

#[test]
fn test_duplicate_titles_are_rejected() {
    let err = resolve::<Duplicated>().unwrap_err();
    assert!(err.is_schema());
    assert!(err.to_string().contains("Value"));

    // A failed derivation is not cached
    assert!(resolve::<Duplicated>().is_err());
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUND TRIP OF EVERY KIND
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_every_kind_round_trips() {
    let shifts = vec![
        Shift {
            day: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            starts: NaiveDate::from_ymd_opt(2025, 6, 2)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            staff: "Ann".to_string(),
            hours: 7.5,
            paid: true,
            breaks: Some(2),
        },
        Shift {
            day: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            starts: NaiveDate::from_ymd_opt(2025, 6, 3)
                .unwrap()
                .and_hms_opt(22, 0, 0)
                .unwrap(),
            staff: "Bob".to_string(),
            hours: 8.0,
            paid: false,
            breaks: None,
        },
    ];

    let mut session = Session::default();
    session.write(&shifts).unwrap();
    let bytes = session.save_to_buffer().unwrap();

    let input = Session::new([sheetmap::with_input(bytes)]);
    let read: Vec<Shift> = input.read_all().unwrap();
    assert_eq!(read, shifts);
}
