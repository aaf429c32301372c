use std::time::Duration;

use cas_client::{CasClient, callback::CallbackServer};

use crate::authority::AuthorityDouble;
use crate::helpers::{config_for, setup};

#[tokio::test]
async fn test_callback_route_stores_delivery() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;
    let http = reqwest::Client::new();

    let response = http
        .get(&cas.callback_url)
        .query(&[("pgtIou", "PGTIOU-1-abc"), ("pgtId", "PGT-1-abc")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        cas.client.store().peek("PGTIOU-1-abc").unwrap().ticket_id,
        "PGT-1-abc"
    );

    let ticket = cas
        .client
        .store()
        .resolve("PGTIOU-1-abc", Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(ticket, "PGT-1-abc");

    cas.stop().await;
}

#[tokio::test]
async fn test_callback_route_accepts_post() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;

    let response = reqwest::Client::new()
        .post(&cas.callback_url)
        .query(&[("pgtIou", "PGTIOU-2"), ("pgtId", "PGT-2")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(cas.client.store().contains("PGTIOU-2"));

    cas.stop().await;
}

#[tokio::test]
async fn test_callback_route_rejects_incomplete_delivery() {
    let authority = AuthorityDouble::start().await;
    let cas = setup(&authority, Duration::from_secs(1)).await;
    let http = reqwest::Client::new();

    // Authorities probe the callback URL without parameters.
    let probe = http.get(&cas.callback_url).send().await.unwrap();
    assert_eq!(probe.status().as_u16(), 400);

    let partial = http
        .get(&cas.callback_url)
        .query(&[("pgtIou", "PGTIOU-3")])
        .send()
        .await
        .unwrap();
    assert_eq!(partial.status().as_u16(), 400);
    assert!(cas.client.store().is_empty());

    cas.stop().await;
}

#[tokio::test]
async fn test_callback_server_restart() {
    let authority = AuthorityDouble::start().await;
    let client = CasClient::new(config_for(&authority, Duration::from_secs(1))).unwrap();

    let mut server = CallbackServer::new();
    server
        .start("127.0.0.1:0", client.callback_router())
        .await
        .unwrap();
    server.stop().await.unwrap();
    assert!(!server.is_running());

    let addr = server
        .start("127.0.0.1:0", client.callback_router())
        .await
        .unwrap();
    let url = format!("http://{addr}/cas/proxyCallback");
    let response = reqwest::Client::new()
        .get(&url)
        .query(&[("pgtIou", "PGTIOU-4"), ("pgtId", "PGT-4")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(client.store().contains("PGTIOU-4"));

    server.stop().await.unwrap();
}
