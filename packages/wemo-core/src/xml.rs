//! Minimal namespace-aware XML tree for UPnP documents.
//!
//! Device descriptions, SCPD documents, SOAP responses and GENA property sets
//! are all small, so they are read into an owned [`XmlElement`] tree and
//! walked by local name.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

/// Errors raised while building an [`XmlElement`] tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum XmlError {
    /// The underlying reader rejected the document.
    #[error("XML syntax error: {0}")]
    Syntax(String),

    /// The document contained no root element.
    #[error("XML document has no root element")]
    Empty,
}

/// One element with its decoded text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name without any prefix.
    pub name: String,
    /// Resolved namespace URI, if the element is in one.
    pub namespace: Option<String>,
    /// Decoded, trimmed text content directly inside this element.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parses `xml` and returns its root element.
    pub fn parse(xml: &str) -> Result<XmlElement, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut stack: Vec<(XmlElement, usize)> = Vec::new();
        let mut scopes: Vec<(String, String)> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let (element, pushed) = open_element(e, &mut scopes);
                    stack.push((element, pushed));
                }
                Ok(Event::Empty(ref e)) => {
                    let (element, pushed) = open_element(e, &mut scopes);
                    scopes.truncate(scopes.len() - pushed);
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::End(_)) => {
                    if let Some((mut element, pushed)) = stack.pop() {
                        element.text = element.text.trim().to_string();
                        scopes.truncate(scopes.len() - pushed);
                        attach(&mut stack, &mut root, element);
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if let Some((element, _)) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(t);
                        element.text.push_str(&html_escape::decode_html_entities(&raw));
                    }
                }
                Ok(Event::CData(ref c)) => {
                    if let Some((element, _)) = stack.last_mut() {
                        element.text.push_str(&String::from_utf8_lossy(c));
                    }
                }
                Ok(Event::GeneralRef(ref r)) => {
                    if let Some((element, _)) = stack.last_mut() {
                        let entity = format!("&{};", String::from_utf8_lossy(r));
                        element.text.push_str(&html_escape::decode_html_entities(&entity));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XmlError::Syntax(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        root.ok_or(XmlError::Empty)
    }

    /// Returns the first direct child with the given local name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns the text of the first direct child with the given local name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Iterates direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first search for the first descendant (or self) with `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Collects every descendant (or self) with `name`, in document order.
    #[must_use]
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        if self.name == name {
            found.push(self);
        }
        for child in &self.children {
            child.collect(name, found);
        }
    }
}

/// Builds an element from a start tag, pushing any `xmlns` declarations it
/// carries. Returns the element and how many scopes were pushed.
fn open_element(e: &BytesStart<'_>, scopes: &mut Vec<(String, String)>) -> (XmlElement, usize) {
    let mut pushed = 0;
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let prefix = if key == "xmlns" {
            String::new()
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            prefix.to_string()
        } else {
            continue;
        };
        let uri = String::from_utf8_lossy(&attr.value).into_owned();
        scopes.push((prefix, uri));
        pushed += 1;
    }

    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname.as_str()),
    };
    let namespace = scopes
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty());

    let element = XmlElement {
        name: local.to_string(),
        namespace,
        ..Default::default()
    };
    (element, pushed)
}

fn attach(stack: &mut [(XmlElement, usize)], root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some((parent, _)) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}
