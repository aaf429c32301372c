//! Service ticket validation.
//!
//! Redeems a service ticket at the authority's `serviceValidate` endpoint for
//! the user it was issued to. When a callback URL is supplied the authority is
//! asked for proxy capability too; it then answers with a PGT-IOU and delivers
//! the real PGT to the callback, which this validator picks up from the
//! [`CorrelationStore`].

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::authority::{AuthorityClient, unexpected_status};
use crate::store::CorrelationStore;
use crate::types::ValidationResult;
use crate::xml::decode_authentication_response;
use crate::{Error, ticket_hint};

const ENDPOINT: &str = "serviceValidate";

/// Validates service tickets against the authority.
#[derive(Debug, Clone)]
pub struct ServiceTicketValidator {
    authority: AuthorityClient,
    endpoint: Url,
    store: Arc<CorrelationStore>,
    wait_budget: Duration,
}

impl ServiceTicketValidator {
    pub fn new(
        authority: AuthorityClient,
        endpoint: Url,
        store: Arc<CorrelationStore>,
        wait_budget: Duration,
    ) -> Self {
        Self {
            authority,
            endpoint,
            store,
            wait_budget,
        }
    }

    /// Validate `service_ticket` for `service_url`.
    ///
    /// Passing `callback_url` requests a proxy-granting ticket. The result is
    /// authenticated whenever the authority vouched for the user; a PGT that
    /// never arrived only sets `proxy_error`.
    ///
    /// Invalid, expired and already-used tickets are indistinguishable here:
    /// all of them come back as [`Error::AuthorityRejected`].
    pub async fn validate(
        &self,
        service_ticket: &str,
        service_url: &str,
        callback_url: Option<&str>,
    ) -> ValidationResult {
        if service_ticket.is_empty() {
            return ValidationResult::failed(Error::PreconditionFailed("service ticket"));
        }
        if service_url.is_empty() {
            return ValidationResult::failed(Error::PreconditionFailed("service url"));
        }
        let callback_url = callback_url.filter(|url| !url.is_empty());

        let mut query = vec![("service", service_url), ("ticket", service_ticket)];
        if let Some(callback_url) = callback_url {
            query.push(("pgtUrl", callback_url));
        }

        tracing::debug!(
            service = service_url,
            ticket = %ticket_hint(service_ticket),
            proxy = callback_url.is_some(),
            "Validating service ticket"
        );
        let response = match self
            .authority
            .get(ENDPOINT, self.endpoint.clone(), &query)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(service = service_url, "Service ticket validation failed: {e}");
                return ValidationResult::failed(e);
            }
        };
        if !response.is_success() {
            let error = unexpected_status(ENDPOINT, &response);
            tracing::warn!(service = service_url, "Service ticket validation failed: {error}");
            return ValidationResult::failed(error);
        }

        let decoded = decode_authentication_response(&response.body);
        let Some(user) = decoded.user else {
            let code = decoded
                .failure
                .map(|f| f.code)
                .filter(|code| !code.is_empty())
                .unwrap_or_else(|| "UNRECOGNIZED_RESPONSE".to_string());
            tracing::info!(
                service = service_url,
                code = %code,
                "Authority rejected service ticket"
            );
            return ValidationResult::failed(Error::AuthorityRejected(
                "service ticket is invalid, expired or already used".to_string(),
            ));
        };

        let mut result = ValidationResult {
            user: Some(user),
            attributes: decoded.attributes,
            proxies: decoded.proxies,
            ..ValidationResult::default()
        };

        match decoded.pgt_iou {
            Some(iou) => match self.store.resolve(&iou, self.wait_budget).await {
                Ok(pgt) => result.proxy_granting_ticket = Some(pgt),
                Err(e) => {
                    tracing::warn!(
                        service = service_url,
                        user = result.user.as_deref().unwrap_or_default(),
                        "User authenticated without proxy capability: {e}"
                    );
                    result.proxy_error = Some(e);
                }
            },
            None if callback_url.is_some() => {
                tracing::warn!(
                    service = service_url,
                    "Proxy capability requested but the authority returned no PGT-IOU"
                );
                result.proxy_error = Some(Error::AuthorityRejected(
                    "no proxy-granting ticket issued".to_string(),
                ));
            }
            None => {}
        }

        tracing::info!(
            service = service_url,
            user = result.user.as_deref().unwrap_or_default(),
            proxy = result.proxy_granting_ticket.is_some(),
            "Service ticket validated"
        );
        result
    }
}
