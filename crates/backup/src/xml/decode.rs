use std::str::FromStr;

use chrono::NaiveDate;
use stockpile_core::backup::FileKind;
use stockpile_db::models::area::Area;
use stockpile_db::models::commodity::Commodity;
use stockpile_db::models::file::FileEntity;
use stockpile_db::models::location::Location;

use super::dom::{self, Node};
use super::{files_element, DocumentFile, InventoryDocument, XmlError, DATE_FORMAT};

const ROOT: &str = "inventory";

fn id_of(node: &Node) -> String {
    node.attr("id").unwrap_or_default().to_string()
}

fn text_of(node: &Node, name: &str) -> String {
    node.child_text(name).unwrap_or_default().to_string()
}

/// Parse an optional numeric child, falling back to `default` when absent.
fn number_of<T: FromStr>(node: &Node, name: &str, default: T) -> Result<T, XmlError> {
    match node.child_text(name).map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            XmlError::Invalid(format!(
                "{} {}: invalid <{name}> value {raw:?}",
                node.name,
                id_of(node)
            ))
        }),
    }
}

fn date_of(node: &Node, name: &str) -> Result<Option<NaiveDate>, XmlError> {
    match node.child_text(name).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|_| {
                XmlError::Invalid(format!(
                    "{} {}: invalid <{name}> date {raw:?}, expected YYYY-MM-DD",
                    node.name,
                    id_of(node)
                ))
            }),
    }
}

fn bool_of(node: &Node, name: &str) -> Result<bool, XmlError> {
    match node.child_text(name).map(str::trim) {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(raw) => Err(XmlError::Invalid(format!(
            "{} {}: invalid <{name}> value {raw:?}",
            node.name,
            id_of(node)
        ))),
    }
}

/// Records of `<wrapper><item/>..</wrapper>` directly under the root.
fn section<'a>(root: &'a Node, wrapper: &'a str, item: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
    root.child(wrapper)
        .into_iter()
        .flat_map(move |w| w.children_named(item))
}

fn location(node: &Node) -> Location {
    Location {
        id: id_of(node),
        name: text_of(node, "name"),
        address: text_of(node, "address"),
    }
}

fn area(node: &Node) -> Area {
    Area {
        id: id_of(node),
        name: text_of(node, "name"),
        location_id: text_of(node, "locationId"),
    }
}

fn commodity(node: &Node) -> Result<Commodity, XmlError> {
    let mut c = Commodity::new(id_of(node), text_of(node, "name"), text_of(node, "areaId"));
    c.short_name = text_of(node, "shortName");
    if let Some(t) = node.child_text("type").filter(|t| !t.is_empty()) {
        c.commodity_type = t.to_string();
    }
    c.count = number_of(node, "count", c.count)?;
    c.original_price = number_of(node, "originalPrice", 0.0)?;
    c.original_price_currency = text_of(node, "originalPriceCurrency");
    c.converted_original_price = number_of(node, "convertedOriginalPrice", 0.0)?;
    c.current_price = number_of(node, "currentPrice", 0.0)?;
    c.serial_number = node.child_text("serialNumber").map(str::to_string);
    c.extra_serial_numbers = node.child_list("extraSerialNumbers", "serialNumber");
    c.part_numbers = node.child_list("partNumbers", "partNumber");
    c.tags = node.child_list("tags", "tag");
    if let Some(s) = node.child_text("status").filter(|s| !s.is_empty()) {
        c.status = s.to_string();
    }
    c.purchase_date = date_of(node, "purchaseDate")?;
    c.registered_date = date_of(node, "registeredDate")?;
    c.last_modified_date = date_of(node, "lastModifiedDate")?;
    c.urls = node.child_list("urls", "url");
    c.comments = text_of(node, "comments");
    c.draft = bool_of(node, "draft")?;
    Ok(c)
}

fn file(node: &Node, commodity_id: &str, kind: FileKind) -> DocumentFile {
    DocumentFile {
        file: FileEntity {
            id: id_of(node),
            commodity_id: commodity_id.to_string(),
            kind,
            path: text_of(node, "path"),
            original_path: text_of(node, "originalPath"),
            extension: text_of(node, "extension"),
            mime_type: text_of(node, "mimeType"),
        },
        data: node.child_text("data").map(str::to_string),
    }
}

/// Parse a backup document.
///
/// The input is tokenized completely first; only a well-formed
/// `<inventory>` document is mapped to records. Unknown elements are ignored.
pub fn decode_inventory(bytes: &[u8]) -> Result<InventoryDocument, XmlError> {
    let input = std::str::from_utf8(bytes)
        .map_err(|e| XmlError::Malformed(format!("document is not valid UTF-8: {e}")))?;
    let root = dom::parse(input)?;
    if root.name != ROOT {
        return Err(XmlError::Invalid(format!(
            "root element is <{}>, expected <{ROOT}>",
            root.name
        )));
    }

    let mut doc = InventoryDocument {
        export_date: root.attr("exportDate").map(str::to_string),
        export_type: root.attr("exportType").map(str::to_string),
        locations: section(&root, "locations", "location").map(location).collect(),
        areas: section(&root, "areas", "area").map(area).collect(),
        ..InventoryDocument::default()
    };

    for node in section(&root, "commodities", "commodity") {
        let c = commodity(node)?;
        for kind in FileKind::ALL {
            let files = section(node, files_element(*kind), "file");
            doc.files.extend(files.map(|f| file(f, &c.id, *kind)));
        }
        doc.commodities.push(c);
    }

    Ok(doc)
}
