//! Dropdown validation tests: ranges, inline lists, named lists

use pretty_assertions::assert_eq;
use rust_xlsxwriter::DataValidation;
use sheetmap::{
    record, with_template, with_validations, with_validations_yaml, Cell, CellRange,
    ColumnValidation, NamedLists, Session, ValidationSpec, Workbook,
};
use std::io::{Cursor, Read};

record! {
    #[sheet(name = "会员")]
    #[derive(Debug, Clone, PartialEq)]
    struct MemberLevel {
        #[sheet(title = "会员总数")]
        total: i64,
        #[sheet(title = "等级", validation = "Validation!A1:A3")]
        level: String,
    }
}

record! {
    #[sheet(name = "门店")]
    #[derive(Debug, Clone, PartialEq)]
    struct Store {
        #[sheet(title = "名称")]
        name: String,
        #[sheet(title = "类型", validation = "A,B,C")]
        kind: String,
        #[sheet(title = "区域", validation = "areas")]
        area: String,
    }
}

fn levels() -> Vec<MemberLevel> {
    vec![
        MemberLevel {
            total: 10,
            level: "gold".to_string(),
        },
        MemberLevel {
            total: 20,
            level: "silver".to_string(),
        },
    ]
}

fn stores() -> Vec<Store> {
    vec![
        Store {
            name: "Downtown".to_string(),
            kind: "A".to_string(),
            area: "North".to_string(),
        },
        Store {
            name: "Harbor".to_string(),
            kind: "C".to_string(),
            area: "South".to_string(),
        },
        Store {
            name: "Airport".to_string(),
            kind: "B".to_string(),
            area: "North".to_string(),
        },
    ]
}

fn areas() -> NamedLists {
    let mut lists = NamedLists::new();
    lists.insert(
        "areas".to_string(),
        vec!["North".to_string(), "South".to_string()],
    );
    lists
}

fn validation_template() -> Vec<u8> {
    let mut template = Workbook::new();
    let sheet = template.sheet_or_insert("Validation");
    for (row, level) in ["gold", "silver", "bronze"].iter().enumerate() {
        sheet.set_cell(row, 0, Cell::new(*level));
    }
    template.save_to_buffer().unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// RANGE VALIDATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_range_validation_from_template() {
    let mut session = Session::new([with_template(validation_template())]);
    session.write(&levels()).unwrap();

    let sheet = session.workbook().unwrap().sheet("会员").unwrap();
    assert_eq!(
        sheet.validations(),
        &[ColumnValidation {
            column: 1,
            first_row: 1,
            last_row: 2,
            spec: ValidationSpec::Range(CellRange {
                sheet: "Validation".to_string(),
                first_row: 0,
                first_col: 0,
                last_row: 2,
                last_col: 0,
            }),
        }]
    );

    // The range survives encoding
    let bytes = session.save_to_buffer().unwrap();
    let reopened = Workbook::from_bytes(&bytes).unwrap();
    assert_eq!(reopened.sheet_names(), vec!["Validation", "会员"]);
}

#[test]
fn test_range_validation_without_sheet_fails_before_writing() {
    let mut session = Session::default();
    let err = session.write(&levels()).unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("Validation"));
    let workbook = session.workbook().unwrap();
    assert!(!workbook.has_sheet("会员"));
}

#[test]
fn test_empty_write_adds_no_validation() {
    let mut session = Session::new([with_template(validation_template())]);
    session.write::<MemberLevel>(&[]).unwrap();

    let sheet = session.workbook().unwrap().sheet("会员").unwrap();
    assert_eq!(sheet.row_count(), 1);
    assert!(sheet.validations().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// LIST VALIDATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_inline_and_named_lists() {
    let mut session = Session::new([with_validations(areas())]);
    session.write(&stores()).unwrap();

    let sheet = session.workbook().unwrap().sheet("门店").unwrap();
    let validations = sheet.validations();
    assert_eq!(validations.len(), 2);

    assert_eq!(validations[0].column, 1);
    assert_eq!(validations[0].first_row, 1);
    assert_eq!(validations[0].last_row, 3);
    assert_eq!(
        validations[0].spec,
        ValidationSpec::List(vec!["A".to_string(), "B".to_string(), "C".to_string()])
    );

    assert_eq!(validations[1].column, 2);
    assert_eq!(
        validations[1].spec,
        ValidationSpec::List(vec!["North".to_string(), "South".to_string()])
    );
}

#[test]
fn test_named_lists_from_yaml() {
    let yaml = b"areas:\n  - East\n  - West\n".as_slice();
    let mut session = Session::new([with_validations_yaml(yaml)]);
    assert!(session.outcomes()[0].is_applied());

    session.write(&stores()).unwrap();
    let sheet = session.workbook().unwrap().sheet("门店").unwrap();
    assert_eq!(
        sheet.validations()[1].spec,
        ValidationSpec::List(vec!["East".to_string(), "West".to_string()])
    );
}

#[test]
fn test_later_named_lists_win() {
    let mut overrides = NamedLists::new();
    overrides.insert("areas".to_string(), vec!["Inland".to_string()]);

    let mut session = Session::new([with_validations(areas()), with_validations(overrides)]);
    session.write(&stores()).unwrap();

    let sheet = session.workbook().unwrap().sheet("门店").unwrap();
    assert_eq!(
        sheet.validations()[1].spec,
        ValidationSpec::List(vec!["Inland".to_string()])
    );
}

#[test]
fn test_unresolved_named_list_is_validation_error() {
    let mut session = Session::default();
    let err = session.write(&stores()).unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("areas"));
    assert!(!session.workbook().unwrap().has_sheet("门店"));
}

#[test]
fn test_list_validations_survive_round_trip() {
    let mut session = Session::new([with_validations(areas())]);
    session.write(&stores()).unwrap();

    let bytes = session.save_to_buffer().unwrap();
    let input = Session::new([sheetmap::with_input(bytes)]);
    let read: Vec<Store> = input.read_all().unwrap();
    assert_eq!(read, stores());
}

#[test]
fn test_template_rules_are_kept_next_to_new_ones() {
    let mut template = rust_xlsxwriter::Workbook::new();
    let sheet = template.add_worksheet();
    sheet.set_name("门店").unwrap();
    for (col, title) in ["名称", "类型", "区域"].iter().enumerate() {
        sheet.write_string(0, col as u16, *title).unwrap();
    }
    let rule = DataValidation::new().allow_list_strings(&["x", "y"]).unwrap();
    sheet.add_data_validation(1, 3, 20, 3, &rule).unwrap();

    let mut session = Session::new([
        with_template(template.save_to_buffer().unwrap()),
        with_validations(areas()),
    ]);
    session.write(&stores()).unwrap();
    let bytes = session.save_to_buffer().unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    let mut xml = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();

    assert!(xml.contains(r#"<dataValidations count="3">"#));
    assert!(xml.contains(r#"sqref="D2:D21""#));
    assert!(xml.contains("<formula1>\"x,y\"</formula1>"));
    assert!(xml.contains("<formula1>\"A,B,C\"</formula1>"));
    assert!(xml.contains("<formula1>\"North,South\"</formula1>"));
    assert_eq!(xml.matches("<dataValidations").count(), 1);

    let input = Session::new([sheetmap::with_input(bytes)]);
    assert_eq!(input.read_all::<Store>().unwrap(), stores());
}
