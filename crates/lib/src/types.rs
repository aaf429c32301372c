//! Result types handed back to callers.

use serde::Serialize;

use crate::Error;

/// User attributes released by the authority.
///
/// CAS attributes are multi-valued; insertion order is preserved so repeated
/// elements keep the order the authority sent them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Attributes(Vec<(String, Vec<String>)>);

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to the named attribute.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.0.push((name, vec![value])),
        }
    }

    /// First value of the named attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values of the named attribute.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.push(name, value);
        }
        attributes
    }
}

/// Outcome of a service ticket validation.
///
/// Identity and proxy capability are reported independently: `error` says
/// whether the user was authenticated, `proxy_error` whether a requested
/// proxy-granting ticket could be obtained. A result may be authenticated
/// without a PGT, but never carries a PGT without a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub user: Option<String>,
    pub attributes: Attributes,
    /// The resolved proxy-granting ticket. Never the IOU.
    pub proxy_granting_ticket: Option<String>,
    /// Proxies the ticket passed through, most recent first.
    pub proxies: Vec<String>,
    pub error: Option<Error>,
    pub proxy_error: Option<Error>,
}

impl ValidationResult {
    /// A failed validation.
    pub fn failed(error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Whether the authority vouched for a user.
    pub fn is_authenticated(&self) -> bool {
        self.error.is_none() && self.user.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Whether a proxy-granting ticket is available.
    pub fn has_proxy_capability(&self) -> bool {
        self.is_authenticated() && self.proxy_granting_ticket.is_some()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn proxy_granting_ticket(&self) -> Option<&str> {
        self.proxy_granting_ticket.as_deref()
    }
}

/// Outcome of a proxy ticket request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProxyResult {
    pub proxy_ticket: Option<String>,
    pub error: Option<Error>,
}

impl ProxyResult {
    pub fn failed(error: Error) -> Self {
        Self {
            proxy_ticket: None,
            error: Some(error),
        }
    }

    pub fn issued(proxy_ticket: String) -> Self {
        Self {
            proxy_ticket: Some(proxy_ticket),
            error: None,
        }
    }

    pub fn proxy_ticket(&self) -> Option<&str> {
        self.proxy_ticket.as_deref()
    }

    pub fn is_issued(&self) -> bool {
        self.proxy_ticket.is_some()
    }

    /// Convert into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> crate::Result<String> {
        match (self.proxy_ticket, self.error) {
            (Some(ticket), None) => Ok(ticket),
            (_, Some(error)) => Err(error),
            (None, None) => Err(Error::AuthorityRejected("no proxy ticket issued".to_string())),
        }
    }
}
