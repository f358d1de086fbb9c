//! End-to-end client tests against a mock Wazuh manager

use std::time::{Duration, Instant};

use mockito::{Matcher, Server, ServerGuard};
use wazuh_relay::{
    ApiError, ClientOptions, Credentials, Error, Params, TransportConfig, UpstreamClient,
    WazuhTransport,
};

const BASIC_WAZUH: &str = "Basic d2F6dWg6d2F6dWg=";

fn client_for(server: &ServerGuard, options: ClientOptions) -> UpstreamClient {
    let transport = WazuhTransport::new(&TransportConfig::new(server.url())).unwrap();
    UpstreamClient::new(
        std::sync::Arc::new(transport),
        Credentials::new("wazuh", "wazuh"),
        options,
    )
}

fn fast() -> ClientOptions {
    ClientOptions {
        max_requests_per_second: 50,
        ..Default::default()
    }
}

async fn mock_auth(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/security/user/authenticate")
        .match_header("authorization", BASIC_WAZUH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": {"token": "tok"}, "error": 0}"#)
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn repeated_call_is_served_from_cache() {
    let mut server = Server::new_async().await;
    let auth = mock_auth(&mut server, 1).await;
    let os = server
        .mock("GET", "/syscollector/001/os")
        .match_header("authorization", "Bearer tok")
        .match_query(Matcher::UrlEncoded("limit".into(), "500".into()))
        .with_status(200)
        .with_body(r#"{"data": {"affected_items": [{"os": {"name": "Ubuntu"}}]}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, fast());
    let params = Params::new().with("limit", 500);

    let first = client.call("/syscollector/001/os", &params).await.unwrap();
    let second = client.call("/syscollector/001/os", &params).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first["data"]["affected_items"][0]["os"]["name"], "Ubuntu");
    auth.assert_async().await;
    os.assert_async().await;

    let stats = client.stats();
    assert_eq!(stats.api.cache_hits, 1);
    assert_eq!(stats.api.total_requests, 2);
}

#[tokio::test]
async fn null_params_are_left_off_the_query() {
    let mut server = Server::new_async().await;
    let _auth = mock_auth(&mut server, 1).await;
    let agents = server
        .mock("GET", "/agents")
        .match_query(Matcher::Exact("status=active".to_string()))
        .with_status(200)
        .with_body(r#"{"data": {"total_affected_items": 0}}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast());
    let params = Params::new()
        .with("status", "active")
        .with("select", None::<&str>);

    client.call("/agents", &params).await.unwrap();
    agents.assert_async().await;
}

#[tokio::test]
async fn rejected_session_reauthenticates_on_next_call() {
    let mut server = Server::new_async().await;
    let auth = mock_auth(&mut server, 2).await;
    let _expired = server
        .mock("GET", "/agents")
        .with_status(401)
        .with_body(r#"{"title": "Unauthorized", "detail": "Invalid token"}"#)
        .expect(1)
        .create_async()
        .await;
    let _info = server
        .mock("GET", "/manager/info")
        .with_status(200)
        .with_body(r#"{"data": {}}"#)
        .create_async()
        .await;

    let client = client_for(&server, fast());

    let err = client.call("/agents", &Params::new()).await.unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::SessionExpired)));
    assert!(!client.session().is_authenticated());

    client.call("/manager/info", &Params::new()).await.unwrap();
    assert_eq!(client.session().exchange_count(), 2);
    auth.assert_async().await;
}

#[tokio::test]
async fn bad_credentials_never_reach_the_endpoint() {
    let mut server = Server::new_async().await;
    let _auth = server
        .mock("POST", "/security/user/authenticate")
        .with_status(401)
        .create_async()
        .await;
    let agents = server
        .mock("GET", "/agents")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server, fast());

    match client.call("/agents", &Params::new()).await {
        Err(Error::Api(ApiError::Authentication(msg))) => assert!(msg.contains("401")),
        other => panic!("Expected authentication error, got {:?}", other),
    }
    agents.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_surfaced_and_not_cached() {
    let mut server = Server::new_async().await;
    let _auth = mock_auth(&mut server, 1).await;
    let failing = server
        .mock("GET", "/syscollector/002/packages")
        .with_status(500)
        .with_body(r#"{"title": "Wazuh Internal Error", "detail": "Database locked"}"#)
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server, fast());

    for _ in 0..2 {
        let err = client
            .call("/syscollector/002/packages", &Params::new())
            .await
            .unwrap_err();
        match err {
            Error::Api(ApiError::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Wazuh Internal Error: Database locked");
            }
            other => panic!("Expected HTTP error, got {:?}", other),
        }
    }
    failing.assert_async().await;
    assert!(client.cache().is_empty());
    assert_eq!(client.stats().api.failed_requests, 2);
}

#[tokio::test]
async fn too_many_requests_carries_retry_after() {
    let mut server = Server::new_async().await;
    let _auth = mock_auth(&mut server, 1).await;
    let _limited = server
        .mock("GET", "/agents")
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;

    let client = client_for(&server, fast());

    let err = client.call("/agents", &Params::new()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Api(ApiError::RateLimitExceeded(Some(d))) if d == Duration::from_secs(7)
    ));
}

#[tokio::test]
async fn distinct_misses_are_spaced_by_the_rate_limit() {
    let mut server = Server::new_async().await;
    let _auth = mock_auth(&mut server, 1).await;
    let _hardware = server
        .mock("GET", Matcher::Regex(r"^/syscollector/\d+/hardware$".to_string()))
        .with_status(200)
        .with_body(r#"{"data": {}}"#)
        .expect(3)
        .create_async()
        .await;

    // Default pacing: 4 req/s
    let client = client_for(&server, ClientOptions::default());

    let started = Instant::now();
    let none = Params::new();
    let (a, b, c) = tokio::join!(
        client.call("/syscollector/001/hardware", &none),
        client.call("/syscollector/002/hardware", &none),
        client.call("/syscollector/003/hardware", &none),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(500));
}
