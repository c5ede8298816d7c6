//! Small quick-xml helpers shared by the package, style and worksheet patchers

use crate::error::SheetMapResult;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

/// Local part of an element name, `x:row` → `row`
pub(super) fn local_name<'a>(start: &'a BytesStart<'_>) -> Cow<'a, str> {
    String::from_utf8_lossy(start_local(start))
}

fn start_local<'a>(start: &'a BytesStart<'_>) -> &'a [u8] {
    let name = start.name().0;
    match name.iter().position(|&b| b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

pub(super) fn end_local<'a>(end: &'a BytesEnd<'_>) -> Cow<'a, str> {
    let name = end.name().0;
    let local = match name.iter().position(|&b| b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };
    String::from_utf8_lossy(local)
}

/// Unescaped value of the attribute whose full key is `key`
pub(super) fn attr(start: &BytesStart<'_>, key: &str) -> SheetMapResult<Option<String>> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if attribute.key.0 == key.as_bytes() {
            return decode_value(&attribute).map(Some);
        }
    }
    Ok(None)
}

/// Unescaped value of the attribute whose local key is `local`, whatever its prefix
pub(super) fn attr_local(start: &BytesStart<'_>, local: &str) -> SheetMapResult<Option<String>> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if attribute.key.local_name().as_ref() == local.as_bytes() {
            return decode_value(&attribute).map(Some);
        }
    }
    Ok(None)
}

/// Full key of the first attribute whose local key is `local`
pub(super) fn attr_key(start: &BytesStart<'_>, local: &str) -> SheetMapResult<Option<String>> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if attribute.key.local_name().as_ref() == local.as_bytes() {
            return Ok(Some(String::from_utf8_lossy(attribute.key.0).into_owned()));
        }
    }
    Ok(None)
}

fn decode_value(attribute: &Attribute<'_>) -> SheetMapResult<String> {
    let raw = String::from_utf8_lossy(&attribute.value);
    let value = quick_xml::escape::unescape(&raw).map_err(quick_xml::Error::from)?;
    Ok(value.into_owned())
}

/// Copy of `start` with `key` set to `value`, replacing the old value in place
/// or appending the attribute when it is absent
pub(super) fn with_attr(
    start: &BytesStart<'_>,
    key: &str,
    value: &str,
) -> SheetMapResult<BytesStart<'static>> {
    with_attrs(start, &[(key, Some(value))])
}

/// Copy of `start` with several attributes changed. `None` removes the attribute.
pub(super) fn with_attrs(
    start: &BytesStart<'_>,
    changes: &[(&str, Option<&str>)],
) -> SheetMapResult<BytesStart<'static>> {
    let name = String::from_utf8_lossy(start.name().0).into_owned();
    let mut copy = BytesStart::new(name);
    let mut applied = vec![false; changes.len()];

    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let change = changes
            .iter()
            .position(|(key, _)| attribute.key.0 == key.as_bytes());
        match change {
            Some(idx) => {
                applied[idx] = true;
                if let (key, Some(value)) = changes[idx] {
                    copy.push_attribute((key, value));
                }
            }
            None => copy.push_attribute(attribute),
        }
    }

    for (idx, (key, value)) in changes.iter().enumerate() {
        if let (false, Some(value)) = (applied[idx], value) {
            copy.push_attribute((*key, *value));
        }
    }

    Ok(copy)
}

/// Append `children` inside the first element named `parent`.
///
/// An empty `<parent/>` is expanded into a start and end tag. Returns `None`
/// when no such element exists.
pub(super) fn append_children(
    xml: &[u8],
    parent: &str,
    children: &[Event<'static>],
) -> SheetMapResult<Option<Vec<u8>>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + children.len() * 64));
    let mut depth = 0usize;
    let mut open_depth = None;
    let mut done = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            Event::Start(ref start) => {
                depth += 1;
                if !done && open_depth.is_none() && local_name(start) == parent {
                    open_depth = Some(depth);
                }
                writer.write_event(event.borrow())?;
            }
            Event::Empty(ref start) if !done && open_depth.is_none() && local_name(start) == parent => {
                writer.write_event(Event::Start(start.borrow()))?;
                for child in children {
                    writer.write_event(child.borrow())?;
                }
                writer.write_event(Event::End(start.to_end()))?;
                done = true;
            }
            Event::End(ref end) => {
                if open_depth == Some(depth) {
                    for child in children {
                        writer.write_event(child.borrow())?;
                    }
                    open_depth = None;
                    done = true;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(event.borrow())?;
            }
            other => writer.write_event(other)?,
        }
    }

    Ok(done.then(|| writer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_start(xml: &str) -> BytesStart<'static> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event().unwrap() {
                Event::Start(start) | Event::Empty(start) => return start.into_owned(),
                Event::Eof => panic!("no element in {xml}"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_attr_lookup_unescapes() {
        let start = first_start(r#"<x:sheet name="R&amp;D" r:id="rId2"/>"#);
        assert_eq!(local_name(&start), "sheet");
        assert_eq!(attr(&start, "name").unwrap().as_deref(), Some("R&D"));
        assert_eq!(attr_local(&start, "id").unwrap().as_deref(), Some("rId2"));
        assert_eq!(attr_key(&start, "id").unwrap().as_deref(), Some("r:id"));
        assert_eq!(attr(&start, "missing").unwrap(), None);
    }

    #[test]
    fn test_with_attrs_replaces_in_place() {
        let start = first_start(r#"<c r="B2" s="3" t="s"/>"#);
        let copy = with_attrs(&start, &[("t", Some("n")), ("s", None), ("x", Some("1"))]).unwrap();
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Empty(copy)).unwrap();
        assert_eq!(
            String::from_utf8(writer.into_inner()).unwrap(),
            r#"<c r="B2" t="n" x="1"/>"#
        );
    }

    #[test]
    fn test_append_children_expands_empty_parent() {
        let child = Event::Empty(BytesStart::new("b"));
        let xml = br#"<root><a/><list/></root>"#;
        let patched = append_children(xml, "list", &[child.clone()]).unwrap().unwrap();
        assert_eq!(
            String::from_utf8(patched).unwrap(),
            "<root><a/><list><b/></list></root>"
        );

        let xml = br#"<root><list><a/></list></root>"#;
        let patched = append_children(xml, "list", &[child.clone()]).unwrap().unwrap();
        assert_eq!(
            String::from_utf8(patched).unwrap(),
            "<root><list><a/><b/></list></root>"
        );

        assert!(append_children(b"<root/>", "list", &[child]).unwrap().is_none());
    }
}
