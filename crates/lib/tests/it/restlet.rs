use std::time::Duration;

use cas_client::{CasClient, Error, ErrorKind, restlet::RestletCredentials};

use crate::authority::{AuthorityDouble, PASSWORD, USERNAME};
use crate::helpers::{BACKEND_SERVICE, SERVICE, config_for, setup};

fn credentials(password: &str) -> RestletCredentials {
    RestletCredentials {
        username: USERNAME.to_string(),
        password: password.to_string(),
        service: SERVICE.to_string(),
    }
}

#[tokio::test]
async fn test_issue_returns_usable_pgt() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;

    let pgt = cas.client.issue(USERNAME, PASSWORD, SERVICE).await.unwrap();
    assert!(pgt.starts_with("TGT-"));

    let proxy = cas.client.proxy_ticket(&pgt, BACKEND_SERVICE).await;
    assert!(proxy.is_issued());

    let form = authority.last_restlet_form();
    assert!(form.contains(&("from".to_string(), SERVICE.to_string())));

    cas.stop().await;
}

#[tokio::test]
async fn test_bad_credentials_are_rejected() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;

    let error = cas
        .client
        .issue(USERNAME, "wrong", SERVICE)
        .await
        .unwrap_err();
    assert_eq!(error, Error::CredentialRejected { status: 400 });
    assert!(error.is_rejection());
    assert!(!error.is_retryable());

    cas.stop().await;
}

#[tokio::test]
async fn test_empty_credentials_skip_the_network() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;

    let error = cas.client.issue("", PASSWORD, SERVICE).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(authority.hits("tickets"), 0);

    cas.stop().await;
}

#[tokio::test]
async fn test_revoked_pgt_cannot_mint_proxy_tickets() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;

    let pgt = cas.client.issue(USERNAME, PASSWORD, SERVICE).await.unwrap();
    assert!(cas.client.proxy_ticket(&pgt, BACKEND_SERVICE).await.is_issued());

    cas.client.revoke(&pgt).await.unwrap();
    let after = cas.client.proxy_ticket(&pgt, BACKEND_SERVICE).await;
    assert!(after.proxy_ticket.is_none());
    assert_eq!(after.error.unwrap().kind(), ErrorKind::AuthorityRejected);

    cas.stop().await;
}

#[tokio::test]
async fn test_revoke_unknown_pgt() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;

    let error = cas.client.revoke("TGT-404-nope").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AuthorityRejected);
    assert_eq!(authority.hits("ticket"), 1);

    cas.stop().await;
}

#[tokio::test]
async fn test_extra_params_are_sent() {
    let authority = AuthorityDouble::start().await;
    let config = config_for(&authority, Duration::from_secs(1)).with_restlet_param("type", "8");
    let client = CasClient::new(config).unwrap();

    client.issue(USERNAME, PASSWORD, SERVICE).await.unwrap();
    let form = authority.last_restlet_form();
    assert!(form.contains(&("type".to_string(), "8".to_string())));
    assert!(form.contains(&("username".to_string(), USERNAME.to_string())));
}

#[tokio::test]
async fn test_issue_server_error_is_transport_failure() {
    let authority = AuthorityDouble::start().await;
    authority.configure(|state| state.forced_status = Some(500));
    let client = CasClient::new(config_for(&authority, Duration::from_secs(1))).unwrap();

    let error = client.issue(USERNAME, PASSWORD, SERVICE).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::TransportFailure);
}

#[tokio::test]
async fn test_integration_reuses_cached_pgt() {
    let authority = AuthorityDouble::start().await;
    let client = CasClient::new(config_for(&authority, Duration::from_secs(1))).unwrap();
    let integration = client.restlet_integration(credentials(PASSWORD)).unwrap();

    let first = integration.proxy_ticket(BACKEND_SERVICE).await.unwrap();
    let second = integration.proxy_ticket(BACKEND_SERVICE).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(authority.hits("tickets"), 1);
    assert_eq!(authority.hits("proxy"), 2);
}

#[tokio::test]
async fn test_integration_reissues_after_revocation() {
    let authority = AuthorityDouble::start().await;
    let client = CasClient::new(config_for(&authority, Duration::from_secs(1))).unwrap();
    let integration = client.restlet_integration(credentials(PASSWORD)).unwrap();

    let pgt = integration.proxy_granting_ticket().await.unwrap();
    // Revoked behind the integration's back.
    client.revoke(&pgt).await.unwrap();

    let proxy_ticket = integration.proxy_ticket(BACKEND_SERVICE).await.unwrap();
    assert!(proxy_ticket.starts_with("PT-"));
    assert_eq!(authority.hits("tickets"), 2);
    assert_ne!(integration.proxy_granting_ticket().await.unwrap(), pgt);
}

#[tokio::test]
async fn test_integration_revoke_clears_cache() {
    let authority = AuthorityDouble::start().await;
    let client = CasClient::new(config_for(&authority, Duration::from_secs(1))).unwrap();
    let integration = client.restlet_integration(credentials(PASSWORD)).unwrap();

    integration.revoke().await.unwrap();
    assert_eq!(authority.hits("ticket"), 0);

    integration.proxy_ticket(BACKEND_SERVICE).await.unwrap();
    integration.revoke().await.unwrap();
    assert_eq!(authority.hits("ticket"), 1);

    integration.proxy_ticket(BACKEND_SERVICE).await.unwrap();
    assert_eq!(authority.hits("tickets"), 2);
}

#[tokio::test]
async fn test_integration_with_bad_credentials() {
    let authority = AuthorityDouble::start().await;
    let client = CasClient::new(config_for(&authority, Duration::from_secs(1))).unwrap();
    let integration = client.restlet_integration(credentials("wrong")).unwrap();

    let error = integration.proxy_ticket(BACKEND_SERVICE).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CredentialRejected);
    assert_eq!(authority.hits("proxy"), 0);
}
