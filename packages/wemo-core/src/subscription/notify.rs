//! GENA NOTIFY body parsing.

use crate::protocol_constants::GENA_EVENT_NS;
use crate::xml::XmlElement;

/// Extracts `(property, value)` pairs from a NOTIFY property set.
///
/// Only `property` elements in the GENA event namespace count. Some devices
/// append garbage after a blank line; when the full body does not parse, the
/// part before the first blank line is tried. Unparsable bodies yield nothing.
pub fn parse_property_set(body: &str) -> Vec<(String, String)> {
    let document = XmlElement::parse(body).or_else(|e| match body.split_once("\n\n") {
        Some((head, _)) => XmlElement::parse(head),
        None => Err(e),
    });

    let document = match document {
        Ok(document) => document,
        Err(e) => {
            log::debug!("[GENA] Discarding malformed NOTIFY body: {}", e);
            return Vec::new();
        }
    };

    document
        .find_all("property")
        .into_iter()
        .filter(|p| p.namespace.as_deref() == Some(GENA_EVENT_NS))
        .flat_map(|p| p.children.iter())
        .map(|c| (c.name.clone(), c.text.clone()))
        .collect()
}
