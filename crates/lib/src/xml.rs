//! XML codec for `cas:serviceResponse` documents.
//!
//! Two response shapes are understood, each with a success and a failure
//! variant:
//!
//! ```text
//! <cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
//!   <cas:authenticationSuccess>
//!     <cas:user>alice</cas:user>
//!     <cas:attributes><cas:mail>alice@example.com</cas:mail></cas:attributes>
//!     <cas:proxyGrantingTicket>PGTIOU-...</cas:proxyGrantingTicket>
//!     <cas:proxies><cas:proxy>https://a.example.com/cb</cas:proxy></cas:proxies>
//!   </cas:authenticationSuccess>
//! </cas:serviceResponse>
//!
//! <cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
//!   <cas:proxySuccess><cas:proxyTicket>PT-...</cas:proxyTicket></cas:proxySuccess>
//! </cas:serviceResponse>
//! ```
//!
//! Decoding never fails. Malformed documents, failure documents and documents
//! of an unknown shape all decode to an empty result; deciding what that means
//! is left to the caller. Elements are matched by local name, so namespace
//! prefixes and element order do not matter.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::types::Attributes;

/// Namespace of the CAS 2.0 protocol.
pub const CAS_NAMESPACE: &str = "http://www.yale.edu/tp/cas";

const AUTHENTICATION_SUCCESS: &str = "authenticationSuccess";
const AUTHENTICATION_FAILURE: &str = "authenticationFailure";
const PROXY_SUCCESS: &str = "proxySuccess";
const PROXY_FAILURE: &str = "proxyFailure";

/// A failure reported by the authority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityFailure {
    /// The `code` attribute, e.g. `INVALID_TICKET`.
    pub code: String,
    pub message: String,
}

/// What could be extracted from a validation response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationResponse {
    pub user: Option<String>,
    /// The PGT-IOU, if proxy capability was requested and granted.
    pub pgt_iou: Option<String>,
    pub attributes: Attributes,
    pub proxies: Vec<String>,
    pub failure: Option<AuthorityFailure>,
}

/// What could be extracted from a proxy response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyResponse {
    pub proxy_ticket: Option<String>,
    pub failure: Option<AuthorityFailure>,
}

/// A closed element with the local names of its ancestors.
#[derive(Debug)]
struct Element {
    /// Local names from the root down to and including this element.
    path: Vec<String>,
    attributes: Vec<(String, String)>,
    text: String,
}

impl Element {
    fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    fn parent(&self) -> Option<&str> {
        self.path.iter().rev().nth(1).map(String::as_str)
    }

    fn within(&self, ancestor: &str) -> bool {
        self.path[..self.path.len().saturating_sub(1)]
            .iter()
            .any(|n| n == ancestor)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn non_empty_text(&self) -> Option<String> {
        let text = self.text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

struct Open {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attributes_of(start: &BytesStart<'_>) -> Vec<(String, String)> {
    start
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

fn path_with(stack: &[Open], name: String) -> Vec<String> {
    stack
        .iter()
        .map(|open| open.name.clone())
        .chain(std::iter::once(name))
        .collect()
}

/// Flatten a document into its elements, in closing order.
///
/// Returns `None` for anything that is not well-formed XML.
fn elements(bytes: &[u8]) -> Option<Vec<Element>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut closed = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => stack.push(Open {
                name: local_name(&start),
                attributes: attributes_of(&start),
                text: String::new(),
            }),
            Ok(Event::Empty(start)) => closed.push(Element {
                path: path_with(&stack, local_name(&start)),
                attributes: attributes_of(&start),
                text: String::new(),
            }),
            Ok(Event::Text(text)) => {
                let text = text.unescape().ok()?;
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(_)) => {
                let open = stack.pop()?;
                closed.push(Element {
                    path: path_with(&stack, open.name),
                    attributes: open.attributes,
                    text: open.text,
                });
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(position = reader.buffer_position(), "Unparseable CAS response: {e}");
                return None;
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        tracing::debug!("Truncated CAS response: {} unclosed elements", stack.len());
        return None;
    }
    Some(closed)
}

fn failure_from(element: &Element) -> AuthorityFailure {
    AuthorityFailure {
        code: element.attribute("code").unwrap_or_default().to_string(),
        message: element.text.trim().to_string(),
    }
}

/// Decode a `serviceValidate` / `proxyValidate` response.
///
/// A user is only reported for an `authenticationSuccess` document that
/// carries a non-empty `user` element and no `authenticationFailure`.
pub fn decode_authentication_response(bytes: &[u8]) -> AuthenticationResponse {
    let Some(elements) = elements(bytes) else {
        return AuthenticationResponse::default();
    };

    if let Some(failure) = elements.iter().find(|e| e.name() == AUTHENTICATION_FAILURE) {
        return AuthenticationResponse {
            failure: Some(failure_from(failure)),
            ..AuthenticationResponse::default()
        };
    }

    let mut response = AuthenticationResponse::default();
    for element in elements.iter().filter(|e| e.within(AUTHENTICATION_SUCCESS)) {
        match (element.parent(), element.name()) {
            (Some("attributes"), "attribute") => {
                // Legacy form: <cas:attribute name="mail" value="..."/>
                if let (Some(name), Some(value)) =
                    (element.attribute("name"), element.attribute("value"))
                {
                    response.attributes.push(name, value);
                }
            }
            (Some("attributes"), name) => {
                response.attributes.push(name, element.text.trim());
            }
            (Some("proxies"), "proxy") => {
                if let Some(proxy) = element.non_empty_text() {
                    response.proxies.push(proxy);
                }
            }
            (Some(AUTHENTICATION_SUCCESS), "user") => response.user = element.non_empty_text(),
            (Some(AUTHENTICATION_SUCCESS), "proxyGrantingTicket") => {
                response.pgt_iou = element.non_empty_text()
            }
            _ => {}
        }
    }

    if response.user.is_none() {
        return AuthenticationResponse::default();
    }
    response
}

/// Decode a `proxy` response.
pub fn decode_proxy_response(bytes: &[u8]) -> ProxyResponse {
    let Some(elements) = elements(bytes) else {
        return ProxyResponse::default();
    };

    if let Some(failure) = elements.iter().find(|e| e.name() == PROXY_FAILURE) {
        return ProxyResponse {
            proxy_ticket: None,
            failure: Some(failure_from(failure)),
        };
    }

    let proxy_ticket = elements
        .iter()
        .find(|e| e.name() == "proxyTicket" && e.parent() == Some(PROXY_SUCCESS))
        .and_then(Element::non_empty_text);

    ProxyResponse {
        proxy_ticket,
        failure: None,
    }
}

/// Whether `name` can be written as an element name.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn envelope(body: &str) -> String {
    format!(
        "<cas:serviceResponse xmlns:cas=\"{CAS_NAMESPACE}\">\n{body}</cas:serviceResponse>\n"
    )
}

/// Encode a successful validation response.
///
/// Attribute names that are not valid XML names are left out.
pub fn encode_authentication_success(
    user: &str,
    pgt_iou: Option<&str>,
    attributes: Option<&Attributes>,
) -> String {
    let mut body = String::from("  <cas:authenticationSuccess>\n");
    body.push_str(&format!("    <cas:user>{}</cas:user>\n", escape(user)));

    if let Some(attributes) = attributes.filter(|a| !a.is_empty()) {
        body.push_str("    <cas:attributes>\n");
        for (name, values) in attributes.iter() {
            if !is_xml_name(name) {
                tracing::debug!(attribute = name, "Skipping attribute with unencodable name");
                continue;
            }
            for value in values {
                body.push_str(&format!(
                    "      <cas:{name}>{}</cas:{name}>\n",
                    escape(value.as_str())
                ));
            }
        }
        body.push_str("    </cas:attributes>\n");
    }

    if let Some(iou) = pgt_iou {
        body.push_str(&format!(
            "    <cas:proxyGrantingTicket>{}</cas:proxyGrantingTicket>\n",
            escape(iou)
        ));
    }

    body.push_str("  </cas:authenticationSuccess>\n");
    envelope(&body)
}

/// Encode a failed validation response.
pub fn encode_authentication_failure(code: &str, message: &str) -> String {
    envelope(&format!(
        "  <cas:authenticationFailure code=\"{}\">{}</cas:authenticationFailure>\n",
        escape(code),
        escape(message)
    ))
}

/// Encode a successful proxy response.
pub fn encode_proxy_success(proxy_ticket: &str) -> String {
    envelope(&format!(
        "  <cas:proxySuccess>\n    <cas:proxyTicket>{}</cas:proxyTicket>\n  </cas:proxySuccess>\n",
        escape(proxy_ticket)
    ))
}

/// Encode a failed proxy response.
pub fn encode_proxy_failure(code: &str, message: &str) -> String {
    envelope(&format!(
        "  <cas:proxyFailure code=\"{}\">{}</cas:proxyFailure>\n",
        escape(code),
        escape(message)
    ))
}
