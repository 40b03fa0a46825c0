//! Integration tests for reading cluster topology from a broker endpoint.

use std::time::Duration;

use wiremock::matchers::{basic_auth, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gearpush_topology::{
    NodeAddress, RestClientConfig, RestTopologyClient, TopologyError, TopologyRegistry,
};

const CLUSTER: &str = "rhcloud.com:ns:app";

const GEARS: &str = r#"{
    "data": [
        { "components": [ { "name": "jbossas-7", "proxy_host": "node1.example.com", "proxy_port": "35531" } ] },
        { "components": [ { "name": "jbossas-7", "proxy_host": "node2.example.com", "proxy_port": "35546" } ] }
    ]
}"#;

fn client_for(server: &MockServer) -> RestTopologyClient {
    let mut config = RestClientConfig::new(
        format!("{}/broker/rest/", server.uri()),
        "ns",
        "app",
        "user@example.com",
    );
    config.passphrase = Some("secret".to_string());
    config.timeout = Duration::from_secs(5);
    RestTopologyClient::new(config).unwrap()
}

#[tokio::test]
async fn test_reads_gears_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broker/rest/domains/ns/applications/app/gears"))
        .and(header("accept", "application/json"))
        .and(basic_auth("user@example.com", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GEARS))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let nodes = client.read_cluster_topology().await.unwrap();

    assert_eq!(
        nodes,
        vec![
            NodeAddress::new("node1.example.com", 35531),
            NodeAddress::new("node2.example.com", 35546),
        ]
    );
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.read_cluster_topology().await.unwrap_err();

    assert!(matches!(err, TopologyError::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_registry_resolves_once_through_rest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broker/rest/domains/ns/applications/app/gears"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GEARS))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let registry = TopologyRegistry::new();

    let first = registry
        .resolve_and_pick(CLUSTER, "one.war", &client)
        .await
        .unwrap();
    let second = registry
        .resolve_and_pick(CLUSTER, "two.war", &client)
        .await
        .unwrap();
    let third = registry
        .resolve_and_pick(CLUSTER, "one.war", &client)
        .await
        .unwrap();

    assert_eq!(first.host, "node1.example.com");
    assert_eq!(second.host, "node1.example.com");
    assert_eq!(third.host, "node2.example.com");
}

#[tokio::test]
async fn test_malformed_document_leaves_cluster_unresolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let registry = TopologyRegistry::new();

    let err = registry.resolve(CLUSTER, &client).await.unwrap_err();
    assert!(matches!(err, TopologyError::Parse(_)));
    assert!(!registry.is_resolved(CLUSTER).await);
}
