//! # QUIC Scenarios
//!
//! Several complete nodes on loopback: identity, endpoint, `Nodes.Query`
//! responder, DHT engine and overlay cache.
//!
//! ## Flows Tested
//!
//! 1. **Authenticated dial**: identity mismatch versus unauthenticated dial
//! 2. **Query as insertion**: an unknown requester becomes known
//! 3. **Bootstrap and refresh** across real connections
//! 4. **Stable identity** across a restart from the same key file

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio_util::sync::CancellationToken;

    use overlay_dht::{NodeClient, NodeId, NodeIdentity, OverlayDht, OverlayError, TransportError};

    use crate::fixtures::QuicNode;

    async fn start_all(count: usize, seeds: Vec<String>) -> Vec<QuicNode> {
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(QuicNode::start(seeds.clone()).await.unwrap());
        }
        nodes
    }

    async fn stop_all(nodes: Vec<QuicNode>) {
        for node in nodes {
            node.stop().await;
        }
    }

    // =============================================================================
    // AUTHENTICATED DIAL
    // =============================================================================

    #[tokio::test]
    async fn test_dial_node_rejects_other_identity_unauthenticated_accepts() {
        let target = QuicNode::start(vec![]).await.unwrap();
        let dialer = QuicNode::start(vec![]).await.unwrap();
        let impostor_id = NodeId::random();
        let transport = dialer.endpoint.client();

        match transport.dial_node(&target.address(), &impostor_id).await {
            Err(TransportError::IdentityMismatch { expected, actual }) => {
                assert_eq!(expected, impostor_id);
                assert_eq!(actual, target.node().id);
            }
            other => panic!("expected identity mismatch, got {:?}", other.map(|c| c.peer_id())),
        }

        let conn = transport.dial_unauthenticated(&target.address()).await.unwrap();
        assert_eq!(conn.peer_id(), target.node().id);

        // The same mismatch surfaces through the engine's client as an
        // overlay error and never touches the routing table.
        let wrong = overlay_dht::Node::new(impostor_id, target.address(), target.node().last_seen);
        let result = dialer.client.query(&wrong, &NodeId::random(), 4).await;
        assert!(matches!(result, Err(OverlayError::IdentityMismatch { .. })));
        assert!(!dialer.knows(&impostor_id));

        dialer.stop().await;
        target.stop().await;
    }

    // =============================================================================
    // QUERY AS INSERTION
    // =============================================================================

    #[tokio::test]
    async fn test_query_from_unknown_requester_makes_it_findable() {
        let responder = QuicNode::start(vec![]).await.unwrap();
        let requester = QuicNode::start(vec![]).await.unwrap();
        let requester_id = requester.node().id;
        assert!(responder.dht.find_node(&requester_id, 1).unwrap().is_empty());

        requester
            .client
            .query(&responder.node(), &NodeId::random(), 8)
            .await
            .unwrap();

        let found = responder.dht.find_node(&requester_id, 1).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, requester_id);
        assert_eq!(found[0].address, requester.address());

        requester.stop().await;
        responder.stop().await;
    }

    // =============================================================================
    // BOOTSTRAP AND REFRESH
    // =============================================================================

    #[tokio::test]
    async fn test_bootstrap_over_quic_persists_every_member() {
        let seed = QuicNode::start(vec![]).await.unwrap();
        let members = start_all(4, vec![seed.address()]).await;
        let cancel = CancellationToken::new();
        for member in &members {
            let report = member.cache.bootstrap(&cancel).await.unwrap();
            assert_eq!(report.seeds_reached, 1);
        }

        let newcomer = QuicNode::start(vec![seed.address()]).await.unwrap();
        let report = newcomer.cache.bootstrap(&cancel).await.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.persisted, 5);
        assert_eq!(newcomer.store.len(), 5);

        let persisted: HashSet<NodeId> = newcomer.cache.walk().unwrap().iter().map(|n| n.id).collect();
        let expected: HashSet<NodeId> = std::iter::once(seed.node().id)
            .chain(members.iter().map(|m| m.node().id))
            .collect();
        assert_eq!(persisted, expected);
        assert!(seed.knows(&newcomer.node().id));

        newcomer.stop().await;
        stop_all(members).await;
        seed.stop().await;
    }

    #[tokio::test]
    async fn test_refresh_over_quic_counts_stopped_peer() {
        let seed = QuicNode::start(vec![]).await.unwrap();
        let mut members = start_all(3, vec![seed.address()]).await;
        let cancel = CancellationToken::new();
        for member in &members {
            member.cache.bootstrap(&cancel).await.unwrap();
        }

        let gone = members.pop().unwrap();
        let gone_id = gone.node().id;
        gone.stop().await;

        let report = seed.cache.refresh(&cancel).await.unwrap();
        assert_eq!(report.pinged(), 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.refreshed, 2);
        assert!(seed.cache.get(&gone_id).unwrap().is_none());
        for member in &members {
            assert!(seed.cache.get(&member.node().id).unwrap().is_some());
        }

        stop_all(members).await;
        seed.stop().await;
    }

    // =============================================================================
    // STABLE IDENTITY
    // =============================================================================

    #[tokio::test]
    async fn test_restart_from_key_file_keeps_node_id() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("identity.der");

        let first = QuicNode::start_with(NodeIdentity::load_or_generate(&key_path).unwrap(), vec![])
            .await
            .unwrap();
        let id = first.node().id;
        first.stop().await;

        let restarted = QuicNode::start_with(NodeIdentity::load(&key_path).unwrap(), vec![])
            .await
            .unwrap();
        assert_eq!(restarted.node().id, id);

        let dialer = QuicNode::start(vec![]).await.unwrap();
        let conn = dialer
            .endpoint
            .client()
            .dial_node(&restarted.address(), &id)
            .await
            .unwrap();
        assert_eq!(conn.peer_id(), id);

        dialer.stop().await;
        restarted.stop().await;
    }
}
