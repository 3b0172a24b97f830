//! Tests for the QUIC transport over loopback

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::domain::{NodeId, OverlayError};

fn bind() -> (OverlayEndpoint, Arc<NodeIdentity>) {
    let identity = Arc::new(NodeIdentity::generate().unwrap());
    let endpoint = OverlayEndpoint::bind(TransportConfig::for_testing(), identity.clone()).unwrap();
    (endpoint, identity)
}

/// Accept connections until the endpoint closes, keeping them alive.
fn serve(endpoint: &OverlayEndpoint) -> tokio::task::JoinHandle<Vec<PeerConnection>> {
    let endpoint = endpoint.clone();
    tokio::spawn(async move {
        let mut accepted = Vec::new();
        while let Some(result) = endpoint.accept().await {
            if let Ok(conn) = result {
                accepted.push(conn);
            }
        }
        accepted
    })
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_identity_id_matches_certificate() {
    let identity = NodeIdentity::generate().unwrap();
    let derived = node_id_from_certificate(identity.certificate().as_ref()).unwrap();
    assert_eq!(derived, identity.node_id());
}

#[test]
fn test_generated_identities_differ() {
    let a = NodeIdentity::generate().unwrap();
    let b = NodeIdentity::generate().unwrap();
    assert_ne!(a.node_id(), b.node_id());
}

#[test]
fn test_identity_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys").join("identity.der");

    let original = NodeIdentity::load_or_generate(&path).unwrap();
    assert!(path.exists());

    let reloaded = NodeIdentity::load(&path).unwrap();
    assert_eq!(reloaded.node_id(), original.node_id());

    let again = NodeIdentity::load_or_generate(&path).unwrap();
    assert_eq!(again.node_id(), original.node_id());
}

#[test]
fn test_garbage_key_and_certificate_rejected() {
    assert!(matches!(
        NodeIdentity::from_pkcs8(vec![0u8; 16]),
        Err(TransportError::Certificate(_))
    ));
    assert!(matches!(
        node_id_from_certificate(b"not a certificate"),
        Err(TransportError::Certificate(_))
    ));
}

#[test]
fn test_missing_key_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        NodeIdentity::load(dir.path().join("absent.der")),
        Err(TransportError::Io(_))
    ));
}

// =============================================================================
// Error mapping
// =============================================================================

#[test]
fn test_identity_mismatch_maps_to_overlay_identity_mismatch() {
    let err = TransportError::IdentityMismatch {
        expected: NodeId::MIN,
        actual: NodeId::MAX,
    };
    assert_eq!(
        OverlayError::from(err),
        OverlayError::IdentityMismatch {
            expected: NodeId::MIN,
            actual: NodeId::MAX,
        }
    );
}

#[test]
fn test_other_transport_errors_map_to_connectivity() {
    let err = TransportError::Timeout {
        address: "10.0.0.1:9090".into(),
        after: Duration::from_secs(1),
    };
    match OverlayError::from(err) {
        OverlayError::Connectivity { peer, .. } => assert_eq!(peer, "10.0.0.1:9090"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        TransportError::Stream("reset".into()).into_overlay("peer"),
        OverlayError::Connectivity { .. }
    ));
}

// =============================================================================
// Dialling
// =============================================================================

#[tokio::test]
async fn test_dial_unauthenticated_reports_remote_identity() {
    let (server, server_identity) = bind();
    let (client, _) = bind();
    let accepted = serve(&server);

    let addr = server.local_addr().unwrap().to_string();
    let conn = client.client().dial_unauthenticated(&addr).await.unwrap();
    assert_eq!(conn.peer_id(), server_identity.node_id());
    assert!(!conn.is_closed());

    server.close();
    client.close();
    let _ = accepted.await;
}

#[tokio::test]
async fn test_server_sees_client_identity() {
    let (server, _) = bind();
    let (client, client_identity) = bind();
    let addr = server.local_addr().unwrap().to_string();

    let dialer = client.client();
    let dial = tokio::spawn(async move { dialer.dial_unauthenticated(&addr).await });

    let accepted = server.accept().await.unwrap().unwrap();
    assert_eq!(accepted.peer_id(), client_identity.node_id());
    assert!(dial.await.unwrap().is_ok());

    server.close();
    client.close();
}

#[tokio::test]
async fn test_dial_node_with_expected_identity() {
    let (server, server_identity) = bind();
    let (client, _) = bind();
    let accepted = serve(&server);

    let addr = server.local_addr().unwrap().to_string();
    let conn = client
        .client()
        .dial_node(&addr, &server_identity.node_id())
        .await
        .unwrap();
    assert_eq!(conn.peer_id(), server_identity.node_id());

    server.close();
    client.close();
    let _ = accepted.await;
}

#[tokio::test]
async fn test_dial_node_identity_mismatch_then_unauthenticated_succeeds() {
    let (server, server_identity) = bind();
    let (client, _) = bind();
    let accepted = serve(&server);
    let addr = server.local_addr().unwrap().to_string();
    let wrong = NodeId::random();

    let result = client.client().dial_node(&addr, &wrong).await;
    match result {
        Err(TransportError::IdentityMismatch { expected, actual }) => {
            assert_eq!(expected, wrong);
            assert_eq!(actual, server_identity.node_id());
        }
        other => panic!("expected identity mismatch, got {:?}", other.map(|c| c.peer_id())),
    }

    let conn = client.client().dial_unauthenticated(&addr).await.unwrap();
    assert_eq!(conn.peer_id(), server_identity.node_id());

    server.close();
    client.close();
    let _ = accepted.await;
}

#[tokio::test]
async fn test_dial_silent_address_times_out() {
    let (client, _) = bind();
    // A bound UDP socket that never answers.
    let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = silent.local_addr().unwrap().to_string();

    let result = client.client().dial_unauthenticated(&addr).await;
    assert!(matches!(result, Err(TransportError::Timeout { .. })));
    client.close();
}

#[tokio::test]
async fn test_dial_invalid_address() {
    let (client, _) = bind();
    let result = client.client().dial_unauthenticated("not an address").await;
    assert!(matches!(result, Err(TransportError::InvalidAddress { .. })));
    client.close();
}

#[tokio::test]
async fn test_advertised_addr_defaults_to_bound() {
    let identity = Arc::new(NodeIdentity::generate().unwrap());
    let plain = OverlayEndpoint::bind(TransportConfig::for_testing(), identity.clone()).unwrap();
    assert_eq!(
        plain.advertised_addr().unwrap(),
        plain.local_addr().unwrap().to_string()
    );

    let configured = OverlayEndpoint::bind(
        TransportConfig::for_testing().with_advertised_addr("203.0.113.7:7777"),
        identity,
    )
    .unwrap();
    assert_eq!(configured.advertised_addr().unwrap(), "203.0.113.7:7777");
    plain.close();
    configured.close();
}
