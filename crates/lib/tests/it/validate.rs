use std::time::Duration;

use cas_client::{Attributes, ErrorKind, xml};

use crate::authority::AuthorityDouble;
use crate::helpers::{SERVICE, setup};

const BUDGET: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_missing_ticket_is_precondition_failure() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, BUDGET).await;

    let result = cas.client.validate("", SERVICE, None).await;
    assert!(!result.is_authenticated());
    assert_eq!(result.error.unwrap().kind(), ErrorKind::PreconditionFailed);
    assert_eq!(authority.hits("serviceValidate"), 0);

    cas.stop().await;
}

#[tokio::test]
async fn test_authority_failure_body_decodes_to_no_user() {
    let authority = AuthorityDouble::start().await;

    // What the authority says when the ticket parameter is absent.
    let http = reqwest::Client::new();
    let body = http
        .get(format!("{}/cas/serviceValidate", authority.url()))
        .query(&[("service", SERVICE)])
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let decoded = xml::decode_authentication_response(&body);
    assert!(decoded.user.is_none());
    assert_eq!(decoded.failure.unwrap().code, "INVALID_REQUEST");
}

#[tokio::test]
async fn test_unknown_ticket_is_rejected() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, BUDGET).await;

    let result = cas.client.validate("xxx", SERVICE, None).await;
    assert!(result.user.is_none());
    assert!(result.proxy_granting_ticket.is_none());
    let error = result.error.unwrap();
    assert_eq!(error.kind(), ErrorKind::AuthorityRejected);
    assert!(!error.is_retryable());
    assert_eq!(authority.hits("serviceValidate"), 1);

    cas.stop().await;
}

#[tokio::test]
async fn test_rejections_are_indistinguishable() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, BUDGET).await;

    let unknown = cas.client.validate("xxx", SERVICE, None).await;

    let ticket = authority.login("alice", SERVICE);
    let first = cas.client.validate(&ticket, SERVICE, None).await;
    assert!(first.is_authenticated());
    let reused = cas.client.validate(&ticket, SERVICE, None).await;

    let other = authority.login("alice", "http://elsewhere.example.com/");
    let wrong_service = cas.client.validate(&other, SERVICE, None).await;

    assert_eq!(unknown.error, reused.error);
    assert_eq!(unknown.error, wrong_service.error);

    cas.stop().await;
}

#[tokio::test]
async fn test_round_trip_without_proxy() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, BUDGET).await;

    let ticket = authority.login("alice", SERVICE);
    let result = cas.client.validate(&ticket, SERVICE, None).await;

    assert_eq!(result.user(), Some("alice"));
    assert!(result.proxy_granting_ticket.is_none());
    assert!(result.error.is_none());
    assert!(result.proxy_error.is_none());
    assert!(!result.has_proxy_capability());
    assert!(authority.deliveries().is_empty());

    cas.stop().await;
}

#[tokio::test]
async fn test_round_trip_with_proxy() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, BUDGET).await;

    let ticket = authority.login("alice", SERVICE);
    let result = cas
        .client
        .validate(&ticket, SERVICE, Some(&cas.callback_url))
        .await;

    assert_eq!(result.user(), Some("alice"));
    let deliveries = authority.deliveries();
    assert_eq!(deliveries.len(), 1);
    let delivery = &deliveries[0];
    assert!(!delivery.iou.is_empty());
    assert!(!delivery.pgt.is_empty());
    assert_eq!(delivery.status, 200);
    assert_eq!(result.proxy_granting_ticket(), Some(delivery.pgt.as_str()));
    assert!(result.proxy_error.is_none());

    // Resolution consumed the entry.
    assert!(!cas.client.store().contains(&delivery.iou));

    cas.stop().await;
}

#[tokio::test]
async fn test_attributes_are_returned() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, BUDGET).await;

    let attributes: Attributes = [
        ("email", "alice@example.com"),
        ("memberOf", "staff"),
        ("memberOf", "admins"),
    ]
    .into_iter()
    .collect();
    let ticket = authority.login_with_attributes("alice", SERVICE, attributes);
    let result = cas.client.validate(&ticket, SERVICE, None).await;

    assert_eq!(result.attributes.get("email"), Some("alice@example.com"));
    assert_eq!(result.attributes.get_all("memberOf"), ["staff", "admins"]);

    cas.stop().await;
}

#[tokio::test]
async fn test_server_error_is_transport_failure() {
    let authority = AuthorityDouble::start().await;
    authority.configure(|state| state.forced_status = Some(500));
    let cas = setup(&authority, BUDGET).await;

    let ticket = authority.login("alice", SERVICE);
    let result = cas.client.validate(&ticket, SERVICE, None).await;

    assert!(!result.is_authenticated());
    let error = result.error.unwrap();
    assert_eq!(error.kind(), ErrorKind::TransportFailure);
    assert!(error.is_retryable());

    cas.stop().await;
}

#[tokio::test]
async fn test_garbage_body_is_rejection() {
    let authority = AuthorityDouble::start().await;
    authority.configure(|state| state.forced_body = Some("<html>maintenance</html>".into()));
    let cas = setup(&authority, BUDGET).await;

    let result = cas.client.validate("ST-1", SERVICE, None).await;
    assert!(!result.is_authenticated());
    assert_eq!(result.error.unwrap().kind(), ErrorKind::AuthorityRejected);

    cas.stop().await;
}

#[tokio::test]
async fn test_unreachable_authority_is_transport_failure() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, BUDGET).await;
    drop(authority);
    // Let the aborted server task release its listener.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = cas.client.validate("ST-1", SERVICE, None).await;
    assert_eq!(result.error.unwrap().kind(), ErrorKind::TransportFailure);

    cas.stop().await;
}

#[tokio::test]
async fn test_missing_iou_is_authenticated_without_proxy() {
    let authority = AuthorityDouble::start().await;
    authority.configure(|state| state.omit_iou = true);
    let cas = setup(&authority, BUDGET).await;

    let ticket = authority.login("alice", SERVICE);
    let result = cas
        .client
        .validate(&ticket, SERVICE, Some(&cas.callback_url))
        .await;

    assert!(result.is_authenticated());
    assert!(result.proxy_granting_ticket.is_none());
    assert_eq!(
        result.proxy_error.unwrap().kind(),
        ErrorKind::AuthorityRejected
    );

    cas.stop().await;
}
