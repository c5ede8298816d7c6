//! Number formats grafted onto a template's `styles.xml`
//!
//! A cell that needs a number format gets a copy of its existing `cellXfs`
//! entry with only `numFmtId` swapped, so fonts, fills, borders and alignment
//! from the template survive.

use super::xml::{attr, end_local, local_name, with_attr, with_attrs};
use crate::error::{SheetMapError, SheetMapResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

/// Custom number format ids start here, lower ids are built in
const FIRST_CUSTOM_FORMAT: u32 = 164;

fn builtin_format(pattern: &str) -> Option<u32> {
    let id = match pattern {
        "General" => 0,
        "0" => 1,
        "0.00" => 2,
        "#,##0" => 3,
        "#,##0.00" => 4,
        "0%" => 9,
        "0.00%" => 10,
        "0.00E+00" => 11,
        "mm-dd-yy" => 14,
        "d-mmm-yy" => 15,
        "d-mmm" => 16,
        "mmm-yy" => 17,
        "h:mm AM/PM" => 18,
        "h:mm:ss AM/PM" => 19,
        "h:mm" => 20,
        "h:mm:ss" => 21,
        "m/d/yy h:mm" => 22,
        "@" => 49,
        _ => return None,
    };
    Some(id)
}

#[derive(Debug, Clone)]
pub(crate) struct StyleBook {
    xml: Vec<u8>,
    has_format_list: bool,
    formats: Vec<(u32, String)>,
    xfs: Vec<Vec<Event<'static>>>,
    added_formats: Vec<(u32, String)>,
    added_xfs: Vec<Vec<Event<'static>>>,
    derived: HashMap<(Option<u32>, String), u32>,
}

impl StyleBook {
    pub(crate) fn parse(xml: &[u8]) -> SheetMapResult<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut formats = Vec::new();
        let mut xfs = Vec::new();
        let mut in_formats = false;
        let mut has_format_list = false;
        let mut in_cell_xfs = false;
        let mut current: Option<(Vec<Event<'static>>, usize)> = None;

        loop {
            let event = reader.read_event()?;
            if let Some((events, depth)) = current.as_mut() {
                match &event {
                    Event::Start(_) => *depth += 1,
                    Event::End(_) => *depth -= 1,
                    Event::Eof => {
                        return Err(SheetMapError::Import("Truncated cell style list".into()))
                    }
                    _ => {}
                }
                events.push(event.into_owned());
                if *depth == 0 {
                    if let Some((events, _)) = current.take() {
                        xfs.push(events);
                    }
                }
                continue;
            }

            match &event {
                Event::Start(start) => {
                    let name = local_name(start).into_owned();
                    match name.as_str() {
                        "numFmts" => {
                            in_formats = true;
                            has_format_list = true;
                        }
                        "cellXfs" => in_cell_xfs = true,
                        "numFmt" if in_formats => formats.extend(number_format(start)?),
                        "xf" if in_cell_xfs => current = Some((vec![event.clone().into_owned()], 1)),
                        _ => {}
                    }
                }
                Event::Empty(start) => {
                    let name = local_name(start).into_owned();
                    match name.as_str() {
                        "numFmts" => has_format_list = true,
                        "numFmt" if in_formats => formats.extend(number_format(start)?),
                        "xf" if in_cell_xfs => xfs.push(vec![event.clone().into_owned()]),
                        _ => {}
                    }
                }
                Event::End(end) => match end_local(end).as_ref() {
                    "numFmts" => in_formats = false,
                    "cellXfs" => in_cell_xfs = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self {
            xml: xml.to_vec(),
            has_format_list,
            formats,
            xfs,
            added_formats: Vec::new(),
            added_xfs: Vec::new(),
            derived: HashMap::new(),
        })
    }

    /// True once a format or cell style has been added
    pub(crate) fn changed(&self) -> bool {
        !self.added_formats.is_empty() || !self.added_xfs.is_empty()
    }

    /// Index of a cell style that looks like `base` but renders `pattern`
    pub(crate) fn style_for(&mut self, base: Option<u32>, pattern: &str) -> SheetMapResult<u32> {
        let key = (base, pattern.to_string());
        if let Some(&idx) = self.derived.get(&key) {
            return Ok(idx);
        }

        let format_id = self.format_id(pattern);
        let template = base
            .and_then(|idx| self.xf(idx))
            .or_else(|| self.xf(0))
            .cloned()
            .unwrap_or_else(|| {
                let mut xf = BytesStart::new("xf");
                for key in ["numFmtId", "fontId", "fillId", "borderId", "xfId"] {
                    xf.push_attribute((key, "0"));
                }
                vec![Event::Empty(xf)]
            });

        let current_format = template
            .first()
            .and_then(|event| match event {
                Event::Start(start) | Event::Empty(start) => attr(start, "numFmtId").ok().flatten(),
                _ => None,
            })
            .and_then(|id| id.parse::<u32>().ok())
            .unwrap_or(0);
        if current_format == format_id {
            if let Some(base) = base.filter(|&idx| self.xf(idx).is_some()) {
                self.derived.insert(key, base);
                return Ok(base);
            }
        }

        let mut events = template;
        let changes = [
            ("numFmtId", Some(format_id.to_string())),
            ("applyNumberFormat", Some("1".to_string())),
        ];
        let changes: Vec<(&str, Option<&str>)> = changes
            .iter()
            .map(|(key, value)| (*key, value.as_deref()))
            .collect();
        if let Some(first) = events.first_mut() {
            let replaced = match &*first {
                Event::Start(start) => Event::Start(with_attrs(start, &changes)?),
                Event::Empty(start) => Event::Empty(with_attrs(start, &changes)?),
                other => other.clone(),
            };
            *first = replaced;
        }

        let idx = u32::try_from(self.xfs.len() + self.added_xfs.len())
            .map_err(|_| SheetMapError::Export("Too many cell styles".into()))?;
        self.added_xfs.push(events);
        self.derived.insert(key, idx);
        Ok(idx)
    }

    fn xf(&self, idx: u32) -> Option<&Vec<Event<'static>>> {
        let idx = idx as usize;
        self.xfs
            .get(idx)
            .or_else(|| self.added_xfs.get(idx.checked_sub(self.xfs.len())?))
    }

    fn format_id(&mut self, pattern: &str) -> u32 {
        if let Some(id) = builtin_format(pattern) {
            return id;
        }
        if let Some((id, _)) = self
            .formats
            .iter()
            .chain(&self.added_formats)
            .find(|(_, code)| code == pattern)
        {
            return *id;
        }

        let id = self
            .formats
            .iter()
            .chain(&self.added_formats)
            .map(|(id, _)| id + 1)
            .max()
            .unwrap_or(0)
            .max(FIRST_CUSTOM_FORMAT);
        self.added_formats.push((id, pattern.to_string()));
        id
    }

    /// The original stylesheet with the added formats and cell styles spliced in
    pub(crate) fn render(&self) -> SheetMapResult<Vec<u8>> {
        let format_events: Vec<Event<'static>> = self
            .added_formats
            .iter()
            .map(|(id, code)| {
                let mut start = BytesStart::new("numFmt");
                start.push_attribute(("numFmtId", id.to_string().as_str()));
                start.push_attribute(("formatCode", code.as_str()));
                Event::Empty(start)
            })
            .collect();
        let format_count = (self.formats.len() + self.added_formats.len()).to_string();
        let xf_count = (self.xfs.len() + self.added_xfs.len()).to_string();

        let mut reader = Reader::from_reader(self.xml.as_slice());
        let mut writer = Writer::new(Vec::with_capacity(self.xml.len() + 512));
        let mut saw_cell_xfs = false;

        loop {
            let event = reader.read_event()?;
            match event {
                Event::Eof => break,
                Event::Start(ref start) => match local_name(start).as_ref() {
                    "styleSheet" => {
                        writer.write_event(event.borrow())?;
                        if !self.has_format_list && !format_events.is_empty() {
                            let mut list = BytesStart::new("numFmts");
                            list.push_attribute(("count", format_count.as_str()));
                            writer.write_event(Event::Start(list.borrow()))?;
                            for format in &format_events {
                                writer.write_event(format.borrow())?;
                            }
                            writer.write_event(Event::End(list.to_end()))?;
                        }
                    }
                    "numFmts" => {
                        writer.write_event(Event::Start(with_attr(start, "count", &format_count)?))?;
                    }
                    "cellXfs" => {
                        saw_cell_xfs = true;
                        writer.write_event(Event::Start(with_attr(start, "count", &xf_count)?))?;
                    }
                    _ => writer.write_event(event.borrow())?,
                },
                Event::Empty(ref start) if local_name(start) == "numFmts" => {
                    let list = with_attr(start, "count", &format_count)?;
                    writer.write_event(Event::Start(list.borrow()))?;
                    for format in &format_events {
                        writer.write_event(format.borrow())?;
                    }
                    writer.write_event(Event::End(list.to_end()))?;
                }
                Event::End(ref end) => {
                    match end_local(end).as_ref() {
                        "numFmts" => {
                            for format in &format_events {
                                writer.write_event(format.borrow())?;
                            }
                        }
                        "cellXfs" => {
                            for events in &self.added_xfs {
                                for xf in events {
                                    writer.write_event(xf.borrow())?;
                                }
                            }
                        }
                        _ => {}
                    }
                    writer.write_event(event.borrow())?;
                }
                other => writer.write_event(other)?,
            }
        }

        if !saw_cell_xfs && !self.added_xfs.is_empty() {
            return Err(SheetMapError::Export(
                "Template stylesheet has no cell style list".into(),
            ));
        }
        Ok(writer.into_inner())
    }
}

fn number_format(start: &BytesStart<'_>) -> SheetMapResult<Option<(u32, String)>> {
    let id = attr(start, "numFmtId")?.and_then(|id| id.parse::<u32>().ok());
    let code = attr(start, "formatCode")?;
    Ok(id.zip(code))
}
