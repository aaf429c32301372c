//! The client facade.
//!
//! [`CasClient`] owns the configuration, one HTTP client and one correlation
//! store, and builds the protocol components from them. Every component it
//! hands out shares the same store, so a callback received through
//! [`CasClient::callback_router`] is visible to [`CasClient::validate`].

use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;

use crate::authority::AuthorityClient;
use crate::callback::ProxyCallbackReceiver;
use crate::clock::Clock;
use crate::config::CasConfig;
use crate::proxy::ProxyTicketAcquirer;
use crate::restlet::{RestletClient, RestletCredentials, RestletIntegration};
use crate::store::CorrelationStore;
use crate::types::{ProxyResult, ValidationResult};
use crate::validate::ServiceTicketValidator;
use crate::Result;

/// Entry point for the CAS client protocol.
#[derive(Debug, Clone)]
pub struct CasClient {
    config: CasConfig,
    authority: AuthorityClient,
    store: Arc<CorrelationStore>,
}

impl CasClient {
    /// Create a client for `config`.
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: CasConfig) -> Result<Self> {
        let store = Arc::new(CorrelationStore::new(config.correlation.max_entry_age));
        Self::with_store(config, store)
    }

    /// Create a client whose correlation store reads entry ages from `clock`.
    pub fn with_clock(config: CasConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Arc::new(CorrelationStore::with_clock(
            config.correlation.max_entry_age,
            clock,
        ));
        Self::with_store(config, store)
    }

    fn with_store(config: CasConfig, store: Arc<CorrelationStore>) -> Result<Self> {
        let authority = AuthorityClient::new(config.request_timeout)?;
        tracing::debug!(server = %config.server_url, "Created CAS client");
        Ok(Self {
            config,
            authority,
            store,
        })
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    pub fn validator(&self) -> Result<ServiceTicketValidator> {
        Ok(ServiceTicketValidator::new(
            self.authority.clone(),
            self.config.service_validate_url()?,
            Arc::clone(&self.store),
            self.config.correlation.wait_budget,
        ))
    }

    pub fn acquirer(&self) -> Result<ProxyTicketAcquirer> {
        Ok(ProxyTicketAcquirer::new(
            self.authority.clone(),
            self.config.proxy_url()?,
        ))
    }

    pub fn restlet(&self) -> Result<RestletClient> {
        Ok(RestletClient::new(
            self.authority.clone(),
            self.config.tickets_url()?,
            self.config.restlet_params.clone(),
        ))
    }

    /// A PGT cache for one restlet identity.
    pub fn restlet_integration(&self, credentials: RestletCredentials) -> Result<RestletIntegration> {
        Ok(RestletIntegration::new(
            self.restlet()?,
            self.acquirer()?,
            credentials,
        ))
    }

    pub fn callback_receiver(&self) -> ProxyCallbackReceiver {
        ProxyCallbackReceiver::new(Arc::clone(&self.store))
    }

    /// Router serving the proxy callback at the configured path.
    pub fn callback_router(&self) -> Router {
        self.callback_receiver()
            .router(&self.config.paths.proxy_callback)
    }

    /// Start the periodic correlation sweep.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.store
            .spawn_sweeper(self.config.correlation.sweep_interval)
    }

    /// Validate a service ticket, optionally requesting proxy capability.
    pub async fn validate(
        &self,
        service_ticket: &str,
        service_url: &str,
        callback_url: Option<&str>,
    ) -> ValidationResult {
        match self.validator() {
            Ok(validator) => {
                validator
                    .validate(service_ticket, service_url, callback_url)
                    .await
            }
            Err(e) => ValidationResult::failed(e),
        }
    }

    /// Mint a proxy ticket for `target_service`.
    pub async fn proxy_ticket(&self, pgt: &str, target_service: &str) -> ProxyResult {
        match self.acquirer() {
            Ok(acquirer) => acquirer.acquire(pgt, target_service).await,
            Err(e) => ProxyResult::failed(e),
        }
    }

    /// Exchange credentials for a proxy-granting ticket.
    pub async fn issue(
        &self,
        username: &str,
        password: &str,
        requesting_service: &str,
    ) -> Result<String> {
        self.restlet()?
            .issue(username, password, requesting_service)
            .await
    }

    /// Revoke a restlet-issued proxy-granting ticket.
    pub async fn revoke(&self, pgt: &str) -> Result<()> {
        self.restlet()?.revoke(pgt).await
    }
}
