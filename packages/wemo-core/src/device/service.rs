//! Services, actions and SOAP invocation.
//!
//! A [`Service`] is built from one `serviceList` entry plus its SCPD document.
//! Each declared action becomes an [`Action`] that can build its own SOAP
//! envelope and post it to the service's control URL.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use thiserror::Error;

use super::description::{
    parse_action_list, resolve_url, service_name, ArgumentDirection, ServiceEntry,
};
use super::LoadError;
use crate::protocol_constants::{SOAP_ENCODING_STYLE, SOAP_ENVELOPE_NS};
use crate::transport::{HttpTransport, TransportError};
use crate::xml::XmlElement;

/// Flat name→text mapping returned by an action.
pub type ActionOutput = HashMap<String, String>;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Underlying reason an action invocation failed.
#[derive(Debug, Error)]
pub enum ActionCause {
    /// The request never got a response within the retry budget.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The device answered with a non-success status and no SOAP fault.
    #[error("HTTP error {0}")]
    HttpStatus(u16),

    /// The device answered with a SOAP fault.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// The response body could not be parsed.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The invocation task ended without producing a result.
    #[error("Invocation was cancelled")]
    Cancelled,

    /// The caller stopped waiting.
    #[error("No response within {0:?}")]
    Timeout(Duration),
}

/// A failed action invocation, with enough context to log meaningfully.
#[derive(Debug, Error)]
#[error("{device}: {service}#{action} failed: {cause}")]
pub struct ActionError {
    pub device: String,
    pub service: String,
    pub action: String,
    #[source]
    pub cause: ActionCause,
}

impl ActionError {
    /// Returns true if this failure means the device is unreachable.
    ///
    /// Only transport failures count. A fault or error status proves the
    /// device is alive.
    #[must_use]
    pub fn is_device_loss(&self) -> bool {
        matches!(self.cause, ActionCause::Transport(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Action
// ─────────────────────────────────────────────────────────────────────────────

/// Callable handle for one remote action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub service_type: String,
    pub control_url: String,
    /// Declared arguments in document order. Types are not enforced.
    pub arguments: Vec<(String, ArgumentDirection)>,
}

impl Action {
    /// Value of the `SOAPACTION` header.
    #[must_use]
    pub fn soap_action(&self) -> String {
        format!("\"{}#{}\"", self.service_type, self.name)
    }

    /// Builds the SOAP envelope for this action.
    ///
    /// Argument values are inserted verbatim; callers pass pre-escaped XML
    /// when a value needs it.
    #[must_use]
    pub fn envelope(&self, args: &[(String, String)]) -> String {
        // Single line with no leading whitespace: some UPnP stacks reject
        // anything before the root element.
        let mut body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="{}" s:encodingStyle="{}"><s:Body><u:{} xmlns:u="{}">"#,
            SOAP_ENVELOPE_NS, SOAP_ENCODING_STYLE, self.name, self.service_type
        );
        for (k, v) in args {
            body.push_str(&format!("<{k}>{v}</{k}>"));
        }
        body.push_str(&format!("</u:{}></s:Body></s:Envelope>", self.name));
        body
    }

    /// Posts the envelope and parses the response.
    pub(crate) async fn call(
        &self,
        transport: &HttpTransport,
        args: &[(String, String)],
    ) -> Result<ActionOutput, ActionCause> {
        let body = self.envelope(args);
        let headers = [
            ("Content-Type", "text/xml".to_string()),
            ("SOAPACTION", self.soap_action()),
        ];

        log::debug!("[SOAP] {} -> {}", self.name, self.control_url);
        let response = transport.post(&self.control_url, &headers, body).await?;
        log::debug!("[SOAP] {} completed: {}", self.name, response.status);

        parse_action_response(response.status.as_u16(), &response.body)
    }
}

/// Parses a SOAP response body into a flat mapping.
///
/// SOAP faults are checked before the status because devices send them
/// with HTTP 500.
pub fn parse_action_response(status: u16, body: &str) -> Result<ActionOutput, ActionCause> {
    let envelope = match XmlElement::parse(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(ActionCause::Malformed(e.to_string()))
        }
        Err(_) => return Err(ActionCause::HttpStatus(status)),
    };

    let payload = envelope
        .child("Body")
        .or_else(|| envelope.children.first())
        .and_then(|b| b.children.first());

    if let Some(fault) = payload.filter(|p| p.name == "Fault") {
        let message = fault
            .find("faultstring")
            .map(|f| f.text.clone())
            .unwrap_or_else(|| "Unknown SOAP fault".to_string());
        return Err(ActionCause::Fault(message));
    }

    if !(200..300).contains(&status) {
        return Err(ActionCause::HttpStatus(status));
    }

    let payload = payload.ok_or_else(|| ActionCause::Malformed("empty SOAP body".into()))?;
    Ok(payload
        .children
        .iter()
        .map(|c| (c.name.clone(), c.text.clone()))
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// A loaded service with its actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub service_type: String,
    pub control_url: String,
    pub event_sub_url: String,
    pub scpd_url: String,
    pub actions: BTreeMap<String, Action>,
}

impl Service {
    /// Fetches the SCPD for `entry` and builds the service.
    pub(crate) async fn load(
        entry: &ServiceEntry,
        base_url: &str,
        transport: &HttpTransport,
    ) -> Result<Service, LoadError> {
        let scpd_url = resolve_url(base_url, &entry.scpd_url);
        let response = transport
            .get(&scpd_url)
            .await
            .map_err(|source| LoadError::Fetch {
                url: scpd_url.clone(),
                source,
            })?;
        let entries = parse_action_list(&response.body).map_err(|reason| LoadError::Malformed {
            url: scpd_url.clone(),
            reason,
        })?;

        Ok(Self::from_parts(entry, base_url, scpd_url, entries))
    }

    fn from_parts(
        entry: &ServiceEntry,
        base_url: &str,
        scpd_url: String,
        entries: Vec<super::description::ActionEntry>,
    ) -> Self {
        let control_url = resolve_url(base_url, &entry.control_url);
        let actions = entries
            .into_iter()
            .map(|a| {
                let action = Action {
                    name: a.name.clone(),
                    service_type: entry.service_type.clone(),
                    control_url: control_url.clone(),
                    arguments: a.arguments,
                };
                (a.name, action)
            })
            .collect();

        Self {
            name: service_name(&entry.service_type),
            service_type: entry.service_type.clone(),
            control_url,
            event_sub_url: resolve_url(base_url, &entry.event_sub_url),
            scpd_url,
            actions,
        }
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{GET_BINARY_STATE_ON, SOAP_FAULT};

    fn set_binary_state() -> Action {
        Action {
            name: "SetBinaryState".into(),
            service_type: "urn:Belkin:service:basicevent:1".into(),
            control_url: "http://10.0.0.5:49152/upnp/control/basicevent1".into(),
            arguments: vec![("BinaryState".into(), ArgumentDirection::In)],
        }
    }

    #[test]
    fn envelope_embeds_action_service_and_raw_arguments() {
        let body = set_binary_state().envelope(&[("BinaryState".into(), "1".into())]);
        assert!(body.starts_with("<?xml"));
        assert!(body.contains(
            r#"<u:SetBinaryState xmlns:u="urn:Belkin:service:basicevent:1"><BinaryState>1</BinaryState></u:SetBinaryState>"#
        ));

        let raw = set_binary_state().envelope(&[("Payload".into(), "&lt;x&gt;".into())]);
        assert!(raw.contains("<Payload>&lt;x&gt;</Payload>"));
    }

    #[test]
    fn soap_action_header_is_quoted() {
        assert_eq!(
            set_binary_state().soap_action(),
            "\"urn:Belkin:service:basicevent:1#SetBinaryState\""
        );
    }

    #[test]
    fn response_children_become_flat_map() {
        let output = parse_action_response(200, GET_BINARY_STATE_ON).unwrap();
        assert_eq!(output.get("BinaryState").map(String::as_str), Some("1"));
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn fault_is_detected_before_status() {
        let err = parse_action_response(500, SOAP_FAULT).unwrap_err();
        assert!(matches!(err, ActionCause::Fault(ref m) if m == "UPnPError"));
    }

    #[test]
    fn error_status_without_fault() {
        let err = parse_action_response(404, "not found").unwrap_err();
        assert!(matches!(err, ActionCause::HttpStatus(404)));
    }

    #[test]
    fn unparsable_success_is_malformed() {
        let err = parse_action_response(200, "<s:Envelope>").unwrap_err();
        assert!(matches!(err, ActionCause::Malformed(_)));
    }

    #[test]
    fn service_resolves_urls_and_names() {
        let entry = ServiceEntry {
            service_type: "urn:Belkin:service:basicevent:1".into(),
            control_url: "/upnp/control/basicevent1".into(),
            event_sub_url: "/upnp/event/basicevent1".into(),
            scpd_url: "/eventservice.xml".into(),
        };
        let service = Service::from_parts(
            &entry,
            "http://10.0.0.5:49152/",
            "http://10.0.0.5:49152/eventservice.xml".into(),
            vec![super::super::description::ActionEntry {
                name: "GetBinaryState".into(),
                arguments: vec![],
            }],
        );
        assert_eq!(service.name, "basicevent");
        assert_eq!(
            service.event_sub_url,
            "http://10.0.0.5:49152/upnp/event/basicevent1"
        );
        assert_eq!(
            service.action("GetBinaryState").unwrap().control_url,
            "http://10.0.0.5:49152/upnp/control/basicevent1"
        );
        assert_eq!(service.action_names(), vec!["GetBinaryState"]);
    }
}
