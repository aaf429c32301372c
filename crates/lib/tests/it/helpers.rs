use std::time::Duration;

use cas_client::{CasClient, CasConfig, CorrelationConfig, callback::CallbackServer};

use crate::authority::AuthorityDouble;

/// Service URL the test application is registered under.
pub const SERVICE: &str = "http://app.example.com/cas/validate";

/// Target service for proxy tickets.
pub const BACKEND_SERVICE: &str = "http://backend.example.com/api";

/// A client wired to an authority double, with its callback route served on
/// a loopback port.
pub struct TestClient {
    pub client: CasClient,
    pub callback_url: String,
    server: CallbackServer,
}

impl TestClient {
    pub async fn stop(mut self) {
        self.server.stop().await.unwrap();
    }
}

/// Client configuration pointing at `authority`.
pub fn config_for(authority: &AuthorityDouble, wait_budget: Duration) -> CasConfig {
    CasConfig::new(&authority.url())
        .unwrap()
        .with_request_timeout(Duration::from_secs(5))
        .with_correlation(CorrelationConfig {
            wait_budget,
            ..CorrelationConfig::default()
        })
}

/// Create a client for `authority` and start its callback server.
pub async fn setup(authority: &AuthorityDouble, wait_budget: Duration) -> TestClient {
    let client = CasClient::new(config_for(authority, wait_budget)).unwrap();
    let mut server = CallbackServer::new();
    let addr = server
        .start("127.0.0.1:0", client.callback_router())
        .await
        .unwrap();
    let callback_url = format!("http://{addr}{}", client.config().paths.proxy_callback);
    TestClient {
        client,
        callback_url,
        server,
    }
}
