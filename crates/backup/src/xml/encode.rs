use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use stockpile_core::backup::FileKind;
use stockpile_db::models::area::Area;
use stockpile_db::models::commodity::Commodity;
use stockpile_db::models::location::Location;

use super::{files_element, DocumentFile, InventoryDocument, XmlError, DATE_FORMAT};

type XmlWriter = Writer<Vec<u8>>;

fn write_error(err: impl std::fmt::Display) -> XmlError {
    XmlError::Write(err.to_string())
}

fn start(w: &mut XmlWriter, element: BytesStart<'_>) -> Result<(), XmlError> {
    w.write_event(Event::Start(element)).map_err(write_error)
}

fn end(w: &mut XmlWriter, name: &str) -> Result<(), XmlError> {
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(write_error)
}

fn with_id<'a>(name: &'a str, id: &'a str) -> BytesStart<'a> {
    let mut element = BytesStart::new(name);
    element.push_attribute(("id", id));
    element
}

/// `<name>value</name>`, or `<name/>` for an empty value.
fn text(w: &mut XmlWriter, name: &str, value: &str) -> Result<(), XmlError> {
    if value.is_empty() {
        return w
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(write_error);
    }
    start(w, BytesStart::new(name))?;
    w.write_event(Event::Text(BytesText::new(value)))
        .map_err(write_error)?;
    end(w, name)
}

fn optional(w: &mut XmlWriter, name: &str, value: Option<&str>) -> Result<(), XmlError> {
    match value {
        Some(value) => text(w, name, value),
        None => Ok(()),
    }
}

fn list(w: &mut XmlWriter, wrapper: &str, item: &str, values: &[String]) -> Result<(), XmlError> {
    if values.is_empty() {
        return w
            .write_event(Event::Empty(BytesStart::new(wrapper)))
            .map_err(write_error);
    }
    start(w, BytesStart::new(wrapper))?;
    for value in values {
        text(w, item, value)?;
    }
    end(w, wrapper)
}

fn location(w: &mut XmlWriter, location: &Location) -> Result<(), XmlError> {
    start(w, with_id("location", &location.id))?;
    text(w, "name", &location.name)?;
    text(w, "address", &location.address)?;
    end(w, "location")
}

fn area(w: &mut XmlWriter, area: &Area) -> Result<(), XmlError> {
    start(w, with_id("area", &area.id))?;
    text(w, "name", &area.name)?;
    text(w, "locationId", &area.location_id)?;
    end(w, "area")
}

fn file(w: &mut XmlWriter, doc_file: &DocumentFile) -> Result<(), XmlError> {
    let f = &doc_file.file;
    start(w, with_id("file", &f.id))?;
    text(w, "path", &f.path)?;
    text(w, "originalPath", &f.original_path)?;
    text(w, "extension", &f.extension)?;
    text(w, "mimeType", &f.mime_type)?;
    optional(w, "data", doc_file.data.as_deref())?;
    end(w, "file")
}

fn commodity(w: &mut XmlWriter, c: &Commodity, files: &[DocumentFile]) -> Result<(), XmlError> {
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format(DATE_FORMAT).to_string());

    start(w, with_id("commodity", &c.id))?;
    text(w, "name", &c.name)?;
    text(w, "shortName", &c.short_name)?;
    text(w, "type", &c.commodity_type)?;
    text(w, "areaId", &c.area_id)?;
    text(w, "count", &c.count.to_string())?;
    text(w, "originalPrice", &c.original_price.to_string())?;
    text(w, "originalPriceCurrency", &c.original_price_currency)?;
    text(w, "convertedOriginalPrice", &c.converted_original_price.to_string())?;
    text(w, "currentPrice", &c.current_price.to_string())?;
    optional(w, "serialNumber", c.serial_number.as_deref())?;
    list(w, "extraSerialNumbers", "serialNumber", &c.extra_serial_numbers)?;
    list(w, "partNumbers", "partNumber", &c.part_numbers)?;
    list(w, "tags", "tag", &c.tags)?;
    text(w, "status", &c.status)?;
    optional(w, "purchaseDate", date(c.purchase_date).as_deref())?;
    optional(w, "registeredDate", date(c.registered_date).as_deref())?;
    optional(w, "lastModifiedDate", date(c.last_modified_date).as_deref())?;
    list(w, "urls", "url", &c.urls)?;
    text(w, "comments", &c.comments)?;
    text(w, "draft", if c.draft { "true" } else { "false" })?;

    for kind in FileKind::ALL {
        let wrapper = files_element(*kind);
        let mut of_kind = files
            .iter()
            .filter(|f| f.file.commodity_id == c.id && f.file.kind == *kind)
            .peekable();
        if of_kind.peek().is_none() {
            continue;
        }
        start(w, BytesStart::new(wrapper))?;
        for doc_file in of_kind {
            file(w, doc_file)?;
        }
        end(w, wrapper)?;
    }

    end(w, "commodity")
}

/// Serialize a document. Files are nested under their commodity; a file
/// whose commodity is not part of the document is not written.
pub fn encode_inventory(doc: &InventoryDocument) -> Result<Vec<u8>, XmlError> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;

    let mut root = BytesStart::new("inventory");
    if let Some(date) = &doc.export_date {
        root.push_attribute(("exportDate", date.as_str()));
    }
    if let Some(export_type) = &doc.export_type {
        root.push_attribute(("exportType", export_type.as_str()));
    }
    start(&mut w, root)?;

    start(&mut w, BytesStart::new("locations"))?;
    for l in &doc.locations {
        location(&mut w, l)?;
    }
    end(&mut w, "locations")?;

    start(&mut w, BytesStart::new("areas"))?;
    for a in &doc.areas {
        area(&mut w, a)?;
    }
    end(&mut w, "areas")?;

    start(&mut w, BytesStart::new("commodities"))?;
    for c in &doc.commodities {
        commodity(&mut w, c, &doc.files)?;
    }
    end(&mut w, "commodities")?;

    end(&mut w, "inventory")?;

    let mut bytes = w.into_inner();
    bytes.write_all(b"\n").map_err(write_error)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_declaration_and_root_attributes() {
        let doc = InventoryDocument {
            export_date: Some("2025-03-01T00:00:00Z".to_string()),
            export_type: Some("locations".to_string()),
            locations: vec![Location {
                id: "l1".to_string(),
                name: "Attic & loft".to_string(),
                address: String::new(),
            }],
            ..InventoryDocument::default()
        };
        let xml = String::from_utf8(encode_inventory(&doc).unwrap()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(
            r#"<inventory exportDate="2025-03-01T00:00:00Z" exportType="locations">"#
        ));
        assert!(xml.contains(r#"<location id="l1">"#));
        assert!(xml.contains("<name>Attic &amp; loft</name>"));
        assert!(xml.contains("<address/>"));
        assert!(xml.contains("<areas>"));
    }

    #[test]
    fn commodity_without_files_has_no_file_wrappers() {
        let doc = InventoryDocument {
            commodities: vec![Commodity::new("c1", "Lamp", "a1")],
            ..InventoryDocument::default()
        };
        let xml = String::from_utf8(encode_inventory(&doc).unwrap()).unwrap();
        assert!(xml.contains("<areaId>a1</areaId>"));
        assert!(xml.contains("<count>1</count>"));
        assert!(!xml.contains("<images>"));
        assert!(!xml.contains("<serialNumber>"));
    }
}
