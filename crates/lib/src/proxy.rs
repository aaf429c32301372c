//! Proxy ticket acquisition.

use url::Url;

use crate::authority::{AuthorityClient, unexpected_status};
use crate::types::ProxyResult;
use crate::xml::decode_proxy_response;
use crate::{Error, ticket_hint};

const ENDPOINT: &str = "proxy";

/// Mints proxy tickets for target services from a proxy-granting ticket.
///
/// Each call is a single request. A rejected PGT is not retried; callers that
/// can obtain a fresh PGT decide whether to try again.
#[derive(Debug, Clone)]
pub struct ProxyTicketAcquirer {
    authority: AuthorityClient,
    endpoint: Url,
}

impl ProxyTicketAcquirer {
    pub fn new(authority: AuthorityClient, endpoint: Url) -> Self {
        Self {
            authority,
            endpoint,
        }
    }

    /// Request a proxy ticket for `target_service`.
    pub async fn acquire(&self, pgt: &str, target_service: &str) -> ProxyResult {
        if pgt.is_empty() {
            return ProxyResult::failed(Error::PreconditionFailed("proxy-granting ticket"));
        }
        if target_service.is_empty() {
            return ProxyResult::failed(Error::PreconditionFailed("target service"));
        }

        let query = [("pgt", pgt), ("targetService", target_service)];
        let response = match self
            .authority
            .get(ENDPOINT, self.endpoint.clone(), &query)
            .await
        {
            Ok(response) if response.is_success() => response,
            Ok(response) => return ProxyResult::failed(unexpected_status(ENDPOINT, &response)),
            Err(e) => {
                tracing::warn!(target_service, "Proxy ticket request failed: {e}");
                return ProxyResult::failed(e);
            }
        };

        let decoded = decode_proxy_response(&response.body);
        match decoded.proxy_ticket {
            Some(proxy_ticket) => {
                tracing::debug!(
                    target_service,
                    pgt = %ticket_hint(pgt),
                    "Acquired proxy ticket"
                );
                ProxyResult::issued(proxy_ticket)
            }
            None => {
                let failure = decoded.failure.unwrap_or_default();
                tracing::info!(
                    target_service,
                    code = %failure.code,
                    "Authority refused proxy ticket: {}",
                    failure.message
                );
                ProxyResult::failed(Error::AuthorityRejected(if failure.code.is_empty() {
                    "no proxy ticket in response".to_string()
                } else {
                    failure.code
                }))
            }
        }
    }
}
