//! Raw `.xlsx` package kept alongside a template so saving can patch it
//!
//! Parts the crate does not edit (themes, drawings, printer settings, shared
//! strings, defined names) are written back byte for byte.

use super::xml::{attr, attr_key, attr_local, local_name};
use crate::error::{SheetMapError, SheetMapResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const OFFICE_DOCUMENT: &str = "/officeDocument";
const STYLES: &str = "/styles";
const WORKSHEET: &str = "/worksheet";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

#[derive(Clone, PartialEq)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// Worksheet entry of the workbook manifest
#[derive(Debug, Clone, PartialEq)]
pub(super) struct SheetEntry {
    pub name: String,
    pub path: String,
}

#[derive(Clone, PartialEq)]
pub(crate) struct Package {
    parts: Vec<Part>,
    workbook_part: String,
    styles_part: Option<String>,
    sheets: Vec<SheetEntry>,
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("parts", &self.parts.iter().map(|p| &p.name).collect::<Vec<_>>())
            .field("workbook_part", &self.workbook_part)
            .field("sheets", &self.sheets)
            .finish()
    }
}

impl Package {
    /// Unpack every part of an `.xlsx` archive and index its worksheets
    pub(crate) fn from_bytes(bytes: &[u8]) -> SheetMapResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for idx in 0..archive.len() {
            let mut file = archive.by_index(idx)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            parts.push(Part {
                name: file.name().trim_start_matches('/').to_string(),
                data,
            });
        }

        let mut package = Self {
            parts,
            workbook_part: "xl/workbook.xml".to_string(),
            styles_part: None,
            sheets: Vec::new(),
        };

        let root_rels = package.relationships("")?;
        if let Some(rel) = root_rels.iter().find(|r| r.kind.ends_with(OFFICE_DOCUMENT)) {
            package.workbook_part = rel.target.clone();
        }

        let workbook_rels = package.relationships(&package.workbook_part)?;
        package.styles_part = workbook_rels
            .iter()
            .find(|r| r.kind.ends_with(STYLES))
            .map(|r| r.target.clone());

        let workbook_xml = package.required(&package.workbook_part)?;
        package.sheets = sheets_from_manifest(workbook_xml)?
            .into_iter()
            .filter_map(|(name, rel_id)| {
                workbook_rels
                    .iter()
                    .find(|r| r.id == rel_id && r.kind.ends_with(WORKSHEET))
                    .map(|r| SheetEntry {
                        name,
                        path: r.target.clone(),
                    })
            })
            .collect();

        Ok(package)
    }

    pub(crate) fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|part| part.name == name)
            .map(|part| part.data.as_slice())
    }

    fn required(&self, name: &str) -> SheetMapResult<&[u8]> {
        self.part(name)
            .ok_or_else(|| SheetMapError::Import(format!("Package has no '{}' part", name)))
    }

    /// Replace a part, appending it when new
    pub(crate) fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|part| part.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    pub(crate) fn styles_part(&self) -> Option<&str> {
        self.styles_part.as_deref()
    }

    /// Part path of the named worksheet
    pub(crate) fn sheet_part(&self, name: &str) -> Option<&str> {
        self.sheets
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.path.as_str())
    }

    /// Register a new worksheet part in the manifest, its relationships and
    /// the content types
    pub(crate) fn add_worksheet(&mut self, name: &str, xml: Vec<u8>) -> SheetMapResult<()> {
        check_sheet_name(name)?;
        if self.sheet_part(name).is_some() {
            return Err(SheetMapError::Export(format!(
                "Worksheet '{}' already exists in the template",
                name
            )));
        }

        let dir = part_dir(&self.workbook_part).to_string();
        let mut index = self.sheets.len() + 1;
        let path = loop {
            let candidate = format!("{}worksheets/sheet{}.xml", dir, index);
            if self.part(&candidate).is_none() {
                break candidate;
            }
            index += 1;
        };

        let rels_part = rels_path(&self.workbook_part);
        let rels = self.relationships(&self.workbook_part)?;
        let mut rel_number = rels.len() + 1;
        while rels.iter().any(|r| r.id == format!("rId{}", rel_number)) {
            rel_number += 1;
        }
        let rel_id = format!("rId{}", rel_number);

        // Manifest entry
        let workbook_xml = self.required(&self.workbook_part)?;
        let (next_sheet_id, id_key) = manifest_ids(workbook_xml)?;
        let mut sheet = BytesStart::new("sheet");
        sheet.push_attribute(("name", name));
        sheet.push_attribute(("sheetId", next_sheet_id.to_string().as_str()));
        sheet.push_attribute((id_key.as_str(), rel_id.as_str()));
        let patched = super::xml::append_children(workbook_xml, "sheets", &[Event::Empty(sheet)])?
            .ok_or_else(|| SheetMapError::Export("Workbook part has no <sheets> list".into()))?;
        self.set_part(&self.workbook_part.clone(), patched);

        // Relationship from the workbook part
        let target = path.strip_prefix(&dir).unwrap_or(&path).to_string();
        let mut rel = BytesStart::new("Relationship");
        rel.push_attribute(("Id", rel_id.as_str()));
        rel.push_attribute(("Type", WORKSHEET_REL_TYPE));
        rel.push_attribute(("Target", target.as_str()));
        let rels_xml = self.required(&rels_part)?;
        let patched = super::xml::append_children(rels_xml, "Relationships", &[Event::Empty(rel)])?
            .ok_or_else(|| SheetMapError::Export("Relationships part is malformed".into()))?;
        self.set_part(&rels_part, patched);

        // Content type override
        let mut content_type = BytesStart::new("Override");
        content_type.push_attribute(("PartName", format!("/{}", path).as_str()));
        content_type.push_attribute(("ContentType", WORKSHEET_CONTENT_TYPE));
        let types_xml = self.required("[Content_Types].xml")?;
        let patched = super::xml::append_children(types_xml, "Types", &[Event::Empty(content_type)])?
            .ok_or_else(|| SheetMapError::Export("Content types part is malformed".into()))?;
        self.set_part("[Content_Types].xml", patched);

        self.set_part(&path, xml);
        self.sheets.push(SheetEntry {
            name: name.to_string(),
            path,
        });
        Ok(())
    }

    /// Zip every part back up in its original order
    pub(crate) fn to_bytes(&self) -> SheetMapResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for part in &self.parts {
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.data)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Relationships of `source`, targets resolved to part paths
    fn relationships(&self, source: &str) -> SheetMapResult<Vec<Relationship>> {
        let Some(xml) = self.part(&rels_path(source)) else {
            return Ok(Vec::new());
        };

        let base = part_dir(source);
        let mut reader = Reader::from_reader(xml);
        let mut rels = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(ref start) | Event::Empty(ref start)
                    if local_name(start) == "Relationship" =>
                {
                    if attr(start, "TargetMode")?.as_deref() == Some("External") {
                        continue;
                    }
                    let (Some(id), Some(kind), Some(target)) =
                        (attr(start, "Id")?, attr(start, "Type")?, attr(start, "Target")?)
                    else {
                        continue;
                    };
                    rels.push(Relationship {
                        id,
                        kind,
                        target: resolve_target(base, &target),
                    });
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(rels)
    }
}

struct Relationship {
    id: String,
    kind: String,
    target: String,
}

/// `(name, relationship id)` of every `<sheet>` in the workbook part
fn sheets_from_manifest(xml: &[u8]) -> SheetMapResult<Vec<(String, String)>> {
    let mut reader = Reader::from_reader(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(ref start) | Event::Empty(ref start) if local_name(start) == "sheet" => {
                if let (Some(name), Some(id)) = (attr(start, "name")?, attr_local(start, "id")?) {
                    sheets.push((name, id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

/// Next free `sheetId` and the qualified key used for relationship ids
fn manifest_ids(xml: &[u8]) -> SheetMapResult<(u32, String)> {
    let mut reader = Reader::from_reader(xml);
    let mut max_id = 0;
    let mut id_key = None;
    loop {
        match reader.read_event()? {
            Event::Start(ref start) | Event::Empty(ref start) if local_name(start) == "sheet" => {
                if let Some(id) = attr(start, "sheetId")?.and_then(|v| v.parse::<u32>().ok()) {
                    max_id = max_id.max(id);
                }
                if id_key.is_none() {
                    id_key = attr_key(start, "id")?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok((max_id + 1, id_key.unwrap_or_else(|| "r:id".to_string())))
}

/// `xl/workbook.xml` → `xl/_rels/workbook.xml.rels`, `""` → `_rels/.rels`
fn rels_path(part: &str) -> String {
    let dir = part_dir(part);
    let file = &part[dir.len()..];
    format!("{}_rels/{}.rels", dir, file)
}

/// Directory of a part including the trailing slash, `""` at the root
fn part_dir(part: &str) -> &str {
    match part.rfind('/') {
        Some(idx) => &part[..=idx],
        None => "",
    }
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", base, target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Excel's worksheet naming rules
fn check_sheet_name(name: &str) -> SheetMapResult<()> {
    let length = name.chars().count();
    let reason = if length == 0 || length > 31 {
        Some("must be 1 to 31 characters long")
    } else if name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
        Some("must not contain any of [ ] : * ? / \\")
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("must not start or end with an apostrophe")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SheetMapError::Export(format!(
            "Invalid worksheet name '{}': {}",
            name, reason
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_bytes() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet().set_name("Notes").unwrap();
        workbook.add_worksheet().set_name("R&D").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_paths() {
        assert_eq!(rels_path(""), "_rels/.rels");
        assert_eq!(rels_path("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(resolve_target("xl/", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/", "/xl/styles.xml"), "xl/styles.xml");
        assert_eq!(resolve_target("xl/worksheets/", "../theme/theme1.xml"), "xl/theme/theme1.xml");
    }

    #[test]
    fn test_manifest_is_indexed() {
        let package = Package::from_bytes(&template_bytes()).unwrap();
        assert_eq!(package.workbook_part, "xl/workbook.xml");
        assert_eq!(package.styles_part(), Some("xl/styles.xml"));
        assert_eq!(package.sheet_part("Notes"), Some("xl/worksheets/sheet1.xml"));
        assert_eq!(package.sheet_part("R&D"), Some("xl/worksheets/sheet2.xml"));
        assert!(package.part("xl/theme/theme1.xml").is_some());
    }

    #[test]
    fn test_added_worksheet_is_registered() {
        let mut package = Package::from_bytes(&template_bytes()).unwrap();
        package
            .add_worksheet("Totals", b"<worksheet/>".to_vec())
            .unwrap();

        let reopened = Package::from_bytes(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.sheet_part("Totals"), Some("xl/worksheets/sheet3.xml"));
        assert_eq!(reopened.part("xl/worksheets/sheet3.xml"), Some(&b"<worksheet/>"[..]));

        let types = String::from_utf8_lossy(reopened.part("[Content_Types].xml").unwrap()).into_owned();
        assert!(types.contains(r#"PartName="/xl/worksheets/sheet3.xml""#));
    }

    #[test]
    fn test_invalid_sheet_names() {
        assert!(check_sheet_name("Members").is_ok());
        assert!(check_sheet_name("").is_err());
        assert!(check_sheet_name("a/b").is_err());
        assert!(check_sheet_name("'quoted'").is_err());
        assert!(check_sheet_name(&"x".repeat(32)).is_err());
    }
}
