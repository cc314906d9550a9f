//! Minimal element tree built from the quick-xml event stream.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::XmlError;

#[derive(Debug, Default)]
pub(super) struct Node {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Character data of a leaf. Text mixed in with child elements is dropped.
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Texts of `<wrapper><item>..</item>..</wrapper>`.
    pub fn child_list(&self, wrapper: &str, item: &str) -> Vec<String> {
        self.child(wrapper)
            .map(|w| w.children_named(item).map(|c| c.text.clone()).collect())
            .unwrap_or_default()
    }

    fn open(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| malformed(reader, e))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| malformed(reader, e))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            ..Self::default()
        })
    }

    fn finish(mut self) -> Self {
        if !self.children.is_empty() {
            self.text.clear();
        }
        self
    }
}

fn malformed(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed(format!("{err} at byte {}", reader.buffer_position()))
}

/// Tokenize the whole document and return its root element.
///
/// Fails on syntax errors, mismatched end tags, elements left open at end of
/// input, a second root element, and stray text outside the root.
pub(super) fn parse(input: &str) -> Result<Node, XmlError> {
    let mut reader = Reader::from_str(input);
    reader.check_end_names(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader.read_event().map_err(|e| malformed(&reader, e))?;
        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(malformed(&reader, "multiple root elements"));
                }
                stack.push(Node::open(&start, &reader)?);
            }
            Event::Empty(start) => {
                let node = Node::open(&start, &reader)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None if root.is_none() => root = Some(node),
                    None => return Err(malformed(&reader, "multiple root elements")),
                }
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                let node = match stack.pop() {
                    Some(node) if node.name == name => node.finish(),
                    Some(node) => {
                        return Err(malformed(
                            &reader,
                            format!("expected </{}>, found </{name}>", node.name),
                        ))
                    }
                    None => return Err(malformed(&reader, format!("unexpected </{name}>"))),
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| malformed(&reader, e))?;
                match stack.last_mut() {
                    Some(node) => node.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(malformed(&reader, "text outside the root element")),
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                match stack.last_mut() {
                    Some(node) => node.text.push_str(&text),
                    None => return Err(malformed(&reader, "CDATA outside the root element")),
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(
            &reader,
            format!("unexpected end of document: <{}> is not closed", open.name),
        ));
    }
    root.ok_or_else(|| XmlError::Malformed("document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn builds_tree_with_attributes_and_text() {
        let root = parse(
            r#"<?xml version="1.0"?>
            <!-- backup -->
            <inventory exportType="areas">
              <areas>
                <area id="a&amp;1"><name>Top &lt;shelf&gt;</name><locationId/></area>
              </areas>
            </inventory>"#,
        )
        .unwrap();

        assert_eq!(root.name, "inventory");
        assert_eq!(root.attr("exportType"), Some("areas"));
        assert!(root.text.is_empty());
        let area = root.child("areas").unwrap().children_named("area").next().unwrap();
        assert_eq!(area.attr("id"), Some("a&1"));
        assert_eq!(area.child_text("name"), Some("Top <shelf>"));
        assert_eq!(area.child_text("locationId"), Some(""));
        assert_eq!(area.child_text("missing"), None);
    }

    #[test]
    fn unclosed_element_is_malformed() {
        let err = parse("<inventory><locations><location id=\"1\">").unwrap_err();
        assert_matches!(err, XmlError::Malformed(msg) if msg.contains("not closed"));
    }

    #[test]
    fn mismatched_end_is_malformed() {
        assert_matches!(
            parse("<inventory><locations></areas></inventory>"),
            Err(XmlError::Malformed(_))
        );
    }

    #[test]
    fn second_root_is_malformed() {
        assert_matches!(parse("<a/><b/>"), Err(XmlError::Malformed(_)));
        assert_matches!(parse("<a></a><b></b>"), Err(XmlError::Malformed(_)));
    }

    #[test]
    fn empty_input_has_no_root() {
        assert_matches!(parse("   "), Err(XmlError::Malformed(_)));
    }

    #[test]
    fn cdata_is_kept_verbatim() {
        let root = parse("<a><b><![CDATA[x < y]]></b></a>").unwrap();
        assert_eq!(root.child_text("b"), Some("x < y"));
    }
}
