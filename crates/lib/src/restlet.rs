//! Restlet ticket issuance.
//!
//! Automated callers that cannot follow a browser redirect exchange
//! credentials for a proxy-granting ticket directly at the authority's
//! tickets endpoint, and delete it again when done:
//!
//! ```text
//! POST   /cas/v1/tickets          username=..&password=..&from=<service>
//!        -> 2xx, body <form action="https://cas/cas/v1/tickets/TGT-..." ...>
//!        -> 400 on bad credentials
//! DELETE /cas/v1/tickets/TGT-...  -> 200
//! ```
//!
//! Revocation state lives only at the authority. After [`RestletClient::revoke`]
//! a proxy ticket request with the same PGT fails through the authority's normal
//! invalid-ticket path.

use std::fmt;

use tokio::sync::Mutex;
use url::Url;

use crate::authority::{AuthorityClient, AuthorityResponse, unexpected_status};
use crate::proxy::ProxyTicketAcquirer;
use crate::{Error, Result, ticket_hint};

const ISSUE_ENDPOINT: &str = "tickets";
const REVOKE_ENDPOINT: &str = "tickets/{id}";

/// Credential-to-PGT exchange and revocation.
#[derive(Debug, Clone)]
pub struct RestletClient {
    authority: AuthorityClient,
    tickets_url: Url,
    extra_params: Vec<(String, String)>,
}

impl RestletClient {
    pub fn new(
        authority: AuthorityClient,
        tickets_url: Url,
        extra_params: Vec<(String, String)>,
    ) -> Self {
        Self {
            authority,
            tickets_url,
            extra_params,
        }
    }

    /// Obtain a new proxy-granting ticket for `username`.
    ///
    /// A refusal of the credentials is [`Error::CredentialRejected`]; any other
    /// unusable answer is a transport failure.
    pub async fn issue(
        &self,
        username: &str,
        password: &str,
        requesting_service: &str,
    ) -> Result<String> {
        if username.is_empty() {
            return Err(Error::PreconditionFailed("username"));
        }
        if password.is_empty() {
            return Err(Error::PreconditionFailed("password"));
        }

        let mut form = vec![("username", username), ("password", password)];
        if !requesting_service.is_empty() {
            form.push(("from", requesting_service));
        }
        form.extend(
            self.extra_params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let response = self
            .authority
            .post_form(ISSUE_ENDPOINT, self.tickets_url.clone(), &form)
            .await?;

        match response.status {
            400 | 401 | 403 => {
                tracing::info!(username, status = response.status, "Restlet credentials rejected");
                Err(Error::CredentialRejected {
                    status: response.status,
                })
            }
            _ if response.is_success() => {
                let pgt = parse_issue_response(&response).ok_or_else(|| {
                    Error::AuthorityRejected("no ticket in restlet response".to_string())
                })?;
                tracing::info!(username, pgt = %ticket_hint(&pgt), "Issued proxy-granting ticket");
                Ok(pgt)
            }
            _ => Err(unexpected_status(ISSUE_ENDPOINT, &response)),
        }
    }

    /// Delete a proxy-granting ticket at the authority.
    pub async fn revoke(&self, pgt: &str) -> Result<()> {
        if pgt.is_empty() {
            return Err(Error::PreconditionFailed("proxy-granting ticket"));
        }

        let mut url = self.tickets_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::InvalidConfig(format!("tickets url '{}' cannot carry a path", self.tickets_url))
            })?
            .pop_if_empty()
            .push(pgt);

        let response = self.authority.delete(REVOKE_ENDPOINT, url).await?;
        match response.status {
            404 => Err(Error::AuthorityRejected(
                "proxy-granting ticket not found".to_string(),
            )),
            _ if response.is_success() => {
                tracing::info!(pgt = %ticket_hint(pgt), "Revoked proxy-granting ticket");
                Ok(())
            }
            _ => Err(unexpected_status(REVOKE_ENDPOINT, &response)),
        }
    }
}

/// The last non-empty path segment of a ticket URL.
fn last_segment(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Value of the first `action` attribute in an HTML fragment.
fn form_action(body: &str) -> Option<&str> {
    let start = body.find("action=")? + "action=".len();
    let rest = &body[start..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(&rest[..end])
}

/// Extract the ticket id from an issuance response.
///
/// Tried in order: the form `action` URL in the body, the `Location` header,
/// and a body consisting of nothing but the ticket.
fn parse_issue_response(response: &AuthorityResponse) -> Option<String> {
    let body = response.text();
    if let Some(ticket) = form_action(&body).and_then(last_segment) {
        return Some(ticket);
    }
    if let Some(ticket) = response.location.as_deref().and_then(last_segment) {
        return Some(ticket);
    }
    let bare = body.trim();
    let looks_like_ticket = !bare.is_empty()
        && !bare.contains(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '/'));
    looks_like_ticket.then(|| bare.to_string())
}

/// Credentials used by a [`RestletIntegration`].
#[derive(Clone)]
pub struct RestletCredentials {
    pub username: String,
    pub password: String,
    /// Service on whose behalf the PGT is requested.
    pub service: String,
}

impl fmt::Debug for RestletCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestletCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("service", &self.service)
            .finish()
    }
}

/// A cached restlet PGT for one set of credentials.
///
/// The PGT is issued on first use and reused for every proxy ticket. When the
/// authority refuses a proxy ticket for it (expired or revoked), the cached
/// PGT is dropped and a fresh one is issued once before giving up.
#[derive(Debug)]
pub struct RestletIntegration {
    restlet: RestletClient,
    acquirer: ProxyTicketAcquirer,
    credentials: RestletCredentials,
    pgt: Mutex<Option<String>>,
}

impl RestletIntegration {
    pub fn new(
        restlet: RestletClient,
        acquirer: ProxyTicketAcquirer,
        credentials: RestletCredentials,
    ) -> Self {
        Self {
            restlet,
            acquirer,
            credentials,
            pgt: Mutex::new(None),
        }
    }

    /// The cached PGT, issuing one if there is none.
    ///
    /// Concurrent callers share a single issuance.
    pub async fn proxy_granting_ticket(&self) -> Result<String> {
        let mut cached = self.pgt.lock().await;
        if let Some(pgt) = cached.as_ref() {
            return Ok(pgt.clone());
        }
        let pgt = self
            .restlet
            .issue(
                &self.credentials.username,
                &self.credentials.password,
                &self.credentials.service,
            )
            .await?;
        *cached = Some(pgt.clone());
        Ok(pgt)
    }

    /// A proxy ticket for `target_service`, minted from the cached PGT.
    pub async fn proxy_ticket(&self, target_service: &str) -> Result<String> {
        let pgt = self.proxy_granting_ticket().await?;
        let result = self.acquirer.acquire(&pgt, target_service).await;
        match &result.error {
            Some(Error::AuthorityRejected(_)) => {
                tracing::info!(
                    username = %self.credentials.username,
                    "Cached restlet PGT refused; issuing a new one"
                );
                self.discard(&pgt).await;
                let fresh = self.proxy_granting_ticket().await?;
                self.acquirer
                    .acquire(&fresh, target_service)
                    .await
                    .into_result()
            }
            _ => result.into_result(),
        }
    }

    /// Forget the cached PGT without revoking it.
    pub async fn invalidate(&self) {
        self.pgt.lock().await.take();
    }

    /// Revoke the cached PGT at the authority and forget it.
    pub async fn revoke(&self) -> Result<()> {
        let pgt = self.pgt.lock().await.take();
        match pgt {
            Some(pgt) => self.restlet.revoke(&pgt).await,
            None => Ok(()),
        }
    }

    /// Drop `stale` from the cache unless another caller already replaced it.
    async fn discard(&self, stale: &str) {
        let mut cached = self.pgt.lock().await;
        if cached.as_deref() == Some(stale) {
            cached.take();
        }
    }
}
