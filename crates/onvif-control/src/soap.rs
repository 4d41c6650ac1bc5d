//! SOAP 1.2 envelopes and response parsing for ONVIF.
//!
//! Requests are authenticated with a WS-Security UsernameToken digest.
//! Responses are read into a small namespace-stripped element tree, which is
//! all the queries in [`crate::client`] need.

use base64::Engine;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sha1::{Digest, Sha1};

use crate::error::{CameraError, Result};

pub const NS_DEVICE: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const NS_MEDIA: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const NS_PTZ: &str = "http://www.onvif.org/ver20/ptz/wsdl";
pub const NS_SCHEMA: &str = "http://www.onvif.org/ver10/schema";

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// `Base64(SHA1(nonce + created + password))`
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// WS-Security header with a fresh nonce and timestamp.
pub fn security_header(username: &str, password: &str) -> String {
    let nonce: [u8; 16] = rand::random();
    let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    security_header_with(username, password, &nonce, &created)
}

fn security_header_with(username: &str, password: &str, nonce: &[u8], created: &str) -> String {
    let digest = password_digest(nonce, created, password);
    let nonce_b64 = base64::engine::general_purpose::STANDARD.encode(nonce);

    format!(
        r#"<s:Header>
    <wsse:Security s:mustUnderstand="true" xmlns:wsse="{WSSE_NS}" xmlns:wsu="{WSU_NS}">
      <wsse:UsernameToken>
        <wsse:Username>{}</wsse:Username>
        <wsse:Password Type="{PASSWORD_DIGEST_TYPE}">{}</wsse:Password>
        <wsse:Nonce EncodingType="{NONCE_ENCODING}">{}</wsse:Nonce>
        <wsu:Created>{}</wsu:Created>
      </wsse:UsernameToken>
    </wsse:Security>
  </s:Header>"#,
        escape(username),
        digest,
        nonce_b64,
        created
    )
}

/// Wraps an operation body in an envelope declaring the ONVIF namespaces.
pub fn envelope(header: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"
            xmlns:tds="{NS_DEVICE}"
            xmlns:trt="{NS_MEDIA}"
            xmlns:tptz="{NS_PTZ}"
            xmlns:tt="{NS_SCHEMA}">
  {header}
  <s:Body>
    {body}
  </s:Body>
</s:Envelope>"#
    )
}

/// Minimal XML text escaping for values interpolated into request bodies.
pub fn escape(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}

/// Element with namespace prefixes stripped from its name and attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        // synthetic root so multiple top-level nodes never get lost
        let mut stack = vec![XmlElement {
            name: "#document".to_string(),
            ..Default::default()
        }];

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    push_child(&mut stack, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| CameraError::protocol("unbalanced closing tag"))?;
                    push_child(&mut stack, element)?;
                }
                Event::Text(text) => {
                    let value = text.unescape()?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() != 1 {
            return Err(CameraError::protocol("unexpected end of document"));
        }
        stack
            .pop()
            .ok_or_else(|| CameraError::protocol("empty document"))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Depth-first search for the first element with the given local name.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// All descendants (and self) with the given local name, in document order.
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

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| CameraError::protocol(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        ..Default::default()
    })
}

fn push_child(stack: &mut [XmlElement], element: XmlElement) -> Result<()> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| CameraError::protocol("unbalanced closing tag"))?;
    parent.children.push(element);
    Ok(())
}

/// Parses a response and turns a SOAP fault into [`CameraError::Fault`].
pub fn parse_response(action: &str, xml: &str) -> Result<XmlElement> {
    let document = XmlElement::parse(xml)?;
    if let Some(fault) = document.find("Fault") {
        return Err(CameraError::Fault {
            action: action.to_string(),
            reason: fault_reason(fault),
        });
    }
    if document.find("Body").is_none() {
        return Err(CameraError::protocol(format!(
            "{} response has no SOAP body",
            action
        )));
    }
    Ok(document)
}

fn fault_reason(fault: &XmlElement) -> String {
    // SOAP 1.2 puts the message under Reason/Text, 1.1 under faultstring
    fault
        .find("Reason")
        .and_then(|r| r.find("Text"))
        .or_else(|| fault.find("faultstring"))
        .map(|t| t.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            fault
                .find("Subcode")
                .and_then(|s| s.child_text("Value"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unspecified SOAP fault".to_string())
}
