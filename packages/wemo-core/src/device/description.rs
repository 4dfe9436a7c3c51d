//! Parsing of device descriptions (`setup.xml`) and service SCPD documents.

use reqwest::Url;

use crate::xml::XmlElement;

/// Attributes and services declared by a device description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    pub friendly_name: String,
    pub model_description: String,
    pub model_name: String,
    pub serial_number: String,
    pub udn: String,
    pub firmware_version: Option<String>,
    pub mac_address: Option<String>,
    pub services: Vec<ServiceEntry>,
}

/// One entry of the description's `serviceList`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEntry {
    pub service_type: String,
    pub control_url: String,
    pub event_sub_url: String,
    pub scpd_url: String,
}

/// Direction of an action argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentDirection {
    In,
    Out,
}

/// One action of an SCPD `actionList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub name: String,
    pub arguments: Vec<(String, ArgumentDirection)>,
}

/// Parses a device description document.
///
/// Returns a human-readable reason when the document is unusable.
pub fn parse_device_description(xml: &str) -> Result<DeviceDescription, String> {
    let root = XmlElement::parse(xml).map_err(|e| e.to_string())?;
    let device = root
        .child("device")
        .or_else(|| root.find("device"))
        .ok_or_else(|| "missing <device> element".to_string())?;

    let text = |name: &str| device.child_text(name).unwrap_or_default().to_string();
    let optional = |name: &str| {
        device
            .child_text(name)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };

    let services = device
        .child("serviceList")
        .map(|list| {
            list.children_named("service")
                .map(|s| ServiceEntry {
                    service_type: s.child_text("serviceType").unwrap_or_default().to_string(),
                    control_url: s.child_text("controlURL").unwrap_or_default().to_string(),
                    event_sub_url: s.child_text("eventSubURL").unwrap_or_default().to_string(),
                    scpd_url: s.child_text("SCPDURL").unwrap_or_default().to_string(),
                })
                .filter(|s| !s.service_type.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(DeviceDescription {
        friendly_name: text("friendlyName"),
        model_description: text("modelDescription"),
        model_name: text("modelName"),
        serial_number: text("serialNumber"),
        udn: text("UDN"),
        firmware_version: optional("firmwareVersion"),
        mac_address: optional("macAddress"),
        services,
    })
}

/// Parses the `actionList` of an SCPD document.
pub fn parse_action_list(xml: &str) -> Result<Vec<ActionEntry>, String> {
    let root = XmlElement::parse(xml).map_err(|e| e.to_string())?;
    let Some(list) = root.find("actionList") else {
        return Ok(Vec::new());
    };

    let actions = list
        .children_named("action")
        .filter_map(|action| {
            let name = action.child_text("name").filter(|n| !n.is_empty())?;
            let arguments = action
                .child("argumentList")
                .map(|args| {
                    args.children_named("argument")
                        .filter_map(|arg| {
                            let name = arg.child_text("name").filter(|n| !n.is_empty())?;
                            let direction = match arg.child_text("direction") {
                                Some(d) if d.eq_ignore_ascii_case("out") => ArgumentDirection::Out,
                                _ => ArgumentDirection::In,
                            };
                            Some((name.to_string(), direction))
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(ActionEntry {
                name: name.to_string(),
                arguments,
            })
        })
        .collect();

    Ok(actions)
}

/// Returns the base URL of a description location (everything up to and
/// including its last `/` after the authority).
pub fn base_url(location: &str) -> String {
    match Url::parse(location) {
        Ok(url) => match url.join("./") {
            Ok(base) => base.to_string(),
            Err(_) => location.to_string(),
        },
        Err(_) => match location.rfind('/') {
            Some(idx) => location[..=idx].to_string(),
            None => format!("{}/", location),
        },
    }
}

/// Resolves a service URL from a description against `base`.
pub fn resolve_url(base: &str, path: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(path)) {
        Ok(url) => url.to_string(),
        Err(_) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
    }
}

/// Short service name: the second-to-last `:` segment of its type
/// (`urn:Belkin:service:basicevent:1` becomes `basicevent`).
pub fn service_name(service_type: &str) -> String {
    let parts: Vec<&str> = service_type.split(':').collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2].to_string()
    } else {
        service_type.to_string()
    }
}
