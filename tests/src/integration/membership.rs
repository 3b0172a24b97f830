//! # Membership Scenarios
//!
//! The DHT engine, routing table and overlay cache working together on a
//! synthetic fully connected network.
//!
//! ## Flows Tested
//!
//! 1. **Routing invariants**: distance metric, bucket capacity, eviction policy
//! 2. **Lookup**: convergence to the true closest set, partial failures
//! 3. **Cache**: bootstrap persistence, record round trip, refresh after eviction
//! 4. **Background refresh**: the periodic task keeps records current

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use rand::Rng;
    use tokio_util::sync::CancellationToken;

    use overlay_dht::test_utils::{
        synthetic_address, synthetic_id, ControllableTimeSource, SyntheticNetwork,
    };
    use overlay_dht::{
        bucket_index, xor_distance, DhtService, Distance, InMemoryKeyValueStore, KademliaConfig,
        KeyValueStore, Node, NodeId, Observation, OverlayCache, OverlayConfig, OverlayDht,
        RefreshTask, RoutingTable, Timestamp, NODE_ID_LEN,
    };

    use crate::fixtures::{local_node, synthetic_cache, synthetic_dht, SyntheticDht, FIXTURE_TIME};

    // =============================================================================
    // ROUTING INVARIANTS
    // =============================================================================

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        for _ in 0..50 {
            let a = NodeId::random();
            let b = NodeId::random();
            assert_eq!(xor_distance(&a, &b), xor_distance(&b, &a));
            assert_eq!(xor_distance(&a, &a), Distance::ZERO);
        }
    }

    #[test]
    fn test_distance_grows_as_shared_prefix_shrinks() {
        let origin = NodeId::random();
        let mut previous = Distance::ZERO;
        for prefix in (0..NODE_ID_LEN * 8).rev().step_by(7) {
            let other = origin.random_with_prefix_len(prefix);
            let distance = xor_distance(&origin, &other);
            assert_eq!(distance.leading_zeros(), prefix);
            assert!(distance > previous, "prefix {} not farther", prefix);
            previous = distance;
        }
    }

    #[test]
    fn test_bucket_capacity_holds_under_random_operations() {
        let local = NodeId::random();
        let config = KademliaConfig::for_testing();
        let k = config.k;
        let table = RoutingTable::new(local, config);
        let mut rng = rand::thread_rng();
        let mut known: Vec<NodeId> = Vec::new();

        for step in 0..2_000u64 {
            let now = Timestamp::new(FIXTURE_TIME + step);
            match rng.gen_range(0..10) {
                0..=5 => {
                    // Crowd the shallow buckets so they overflow often.
                    let id = local.random_with_prefix_len(rng.gen_range(0..4));
                    let _ = table.observe(Node::new(id, "10.0.0.1:7000", now), now);
                    known.push(id);
                }
                6..=7 if !known.is_empty() => {
                    let id = known[rng.gen_range(0..known.len())];
                    let _ = table.record_failure(&id, now);
                }
                8 if !known.is_empty() => {
                    let id = known[rng.gen_range(0..known.len())];
                    let _ = table.remove(&id);
                }
                _ => {
                    if let Some(id) = known.last() {
                        let _ = table.record_success(id, now);
                    }
                }
            }
            for bucket in 0..NODE_ID_LEN * 8 {
                assert!(table.bucket_len(bucket) <= k, "bucket {} over capacity", bucket);
            }
        }
        assert!(table.len() <= k * 4);
    }

    #[tokio::test]
    async fn test_full_bucket_keeps_live_members() {
        let local = local_node("eviction-policy");
        let network = Arc::new(SyntheticNetwork::new());
        let dht = synthetic_dht(local.clone(), network.clone(), KademliaConfig::for_testing());
        let cancel = CancellationToken::new();

        // No shared prefix bit: every candidate lands in the same bucket.
        let candidates: Vec<Node> = (0..8)
            .map(|i| {
                Node::new(
                    local.id.random_with_prefix_len(0),
                    synthetic_address(i),
                    Timestamp::new(FIXTURE_TIME),
                )
            })
            .collect();
        for node in &candidates {
            network.add_member(node.clone());
        }
        let bucket = bucket_index(&local.id, &candidates[0].id).unwrap();

        for node in &candidates {
            dht.observe(node.clone(), &cancel).await.unwrap();
        }

        let members: HashSet<NodeId> = dht
            .routing_table()
            .bucket_nodes(bucket)
            .iter()
            .map(|n| n.id)
            .collect();
        let originals: HashSet<NodeId> = candidates[..3].iter().map(|n| n.id).collect();
        assert_eq!(members, originals);
    }

    #[tokio::test]
    async fn test_full_bucket_replaces_dead_member() {
        let local = local_node("eviction-replace");
        let network = Arc::new(SyntheticNetwork::new());
        let dht = synthetic_dht(local.clone(), network.clone(), KademliaConfig::for_testing());
        let cancel = CancellationToken::new();

        let candidates: Vec<Node> = (0..4)
            .map(|i| {
                Node::new(
                    local.id.random_with_prefix_len(0),
                    synthetic_address(i),
                    Timestamp::new(FIXTURE_TIME),
                )
            })
            .collect();
        for node in &candidates {
            network.add_member(node.clone());
        }
        for node in &candidates[..3] {
            dht.observe(node.clone(), &cancel).await.unwrap();
        }

        // The least recently seen member is the first inserted.
        network.set_unreachable(candidates[0].id, true);
        dht.observe(candidates[3].clone(), &cancel).await.unwrap();

        assert!(!dht.routing_table().contains(&candidates[0].id));
        assert!(dht.routing_table().contains(&candidates[3].id));
    }

    #[test]
    fn test_observing_into_free_bucket_inserts() {
        let local = NodeId::random();
        let table = RoutingTable::new(local, KademliaConfig::default());
        let now = Timestamp::new(FIXTURE_TIME);
        let node = Node::new(local.random_with_prefix_len(5), "10.0.0.5:7000", now);
        assert_eq!(table.observe(node.clone(), now).unwrap(), Observation::Inserted);
        assert_eq!(table.observe(node, now).unwrap(), Observation::Updated);
    }

    // =============================================================================
    // LOOKUP
    // =============================================================================

    async fn seeded_engine(members: usize, seeds: usize) -> (Arc<SyntheticNetwork>, Arc<SyntheticDht>) {
        let network = Arc::new(SyntheticNetwork::with_members(members));
        let dht = synthetic_dht(local_node("lookup"), network.clone(), KademliaConfig::default());
        let cancel = CancellationToken::new();
        for index in (0..members).step_by((members / seeds).max(1)).take(seeds) {
            let member = network.member(&synthetic_id(index)).unwrap();
            dht.observe(member, &cancel).await.unwrap();
        }
        (network, dht)
    }

    #[tokio::test]
    async fn test_lookup_converges_to_true_closest() {
        let (network, dht) = seeded_engine(300, 6).await;
        let k = dht.config().k;

        for _ in 0..5 {
            let target = NodeId::random();
            let outcome = dht.lookup(target, &CancellationToken::new()).await.unwrap();
            let found: Vec<NodeId> = outcome.closest.iter().map(|n| n.id).collect();
            let expected: Vec<NodeId> = network
                .true_closest(&target, k)
                .iter()
                .map(|n| n.id)
                .collect();
            assert_eq!(found, expected);
        }
    }

    #[tokio::test]
    async fn test_lookup_on_small_network_returns_everyone_in_order() {
        let (network, dht) = seeded_engine(7, 2).await;
        let target = NodeId::random();
        let outcome = dht.lookup(target, &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.closest.len(), 7);
        let found: Vec<NodeId> = outcome.closest.iter().map(|n| n.id).collect();
        let expected: Vec<NodeId> = network
            .true_closest(&target, 7)
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(found, expected);
        for pair in outcome.closest.windows(2) {
            assert!(xor_distance(&pair[0].id, &target) < xor_distance(&pair[1].id, &target));
        }
    }

    #[tokio::test]
    async fn test_lookup_tolerates_partial_failure() {
        let (network, dht) = seeded_engine(120, 12).await;
        let unreachable: HashSet<NodeId> = (0..120)
            .filter(|i| i % 3 == 1)
            .map(synthetic_id)
            .collect();
        for id in &unreachable {
            network.set_unreachable(*id, true);
        }

        let outcome = dht
            .lookup(NodeId::random(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!outcome.closest.is_empty());
        assert!(outcome.contacted.iter().all(|n| !unreachable.contains(&n.id)));
    }

    // =============================================================================
    // OVERLAY CACHE
    // =============================================================================

    #[tokio::test]
    async fn test_bootstrap_from_one_seed_persists_all_fifty() {
        let network = Arc::new(SyntheticNetwork::with_members(50));
        let dht = synthetic_dht(local_node("scenario-a"), network.clone(), KademliaConfig::default());
        let (cache, store) = synthetic_cache(dht, vec![synthetic_address(0)]);

        let report = cache.bootstrap(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.seeds_reached, 1);
        assert_eq!(report.persisted, 50);
        assert_eq!(store.len(), 50);

        let persisted: HashSet<NodeId> = cache.walk().unwrap().iter().map(|n| n.id).collect();
        let members: HashSet<NodeId> = network.members().iter().map(|n| n.id).collect();
        assert_eq!(persisted, members);
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let dht = synthetic_dht(
            local_node("scenario-b"),
            Arc::new(SyntheticNetwork::new()),
            KademliaConfig::default(),
        );
        let (cache, _store) = synthetic_cache(dht, vec![]);
        let node_a = Node::new(NodeId::random(), "10.0.0.1:9090", Timestamp::new(FIXTURE_TIME));

        cache.put(&node_a.id, &node_a).unwrap();
        assert_eq!(cache.get(&node_a.id).unwrap(), Some(node_a));
        assert_eq!(cache.get(&NodeId::random()).unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_skips_evicted_node() {
        let network = Arc::new(SyntheticNetwork::with_members(20));
        let clock = Arc::new(ControllableTimeSource::new(FIXTURE_TIME));
        let dht = Arc::new(DhtService::new(
            local_node("scenario-c"),
            KademliaConfig::default(),
            network.clone(),
            clock.clone(),
        ));
        let store = Arc::new(InMemoryKeyValueStore::new());
        let config = OverlayConfig {
            seeds: vec![synthetic_address(0)],
            ..OverlayConfig::default()
        };
        let cache = OverlayCache::new(dht.clone(), store.clone(), config);
        let cancel = CancellationToken::new();

        cache.bootstrap(&cancel).await.unwrap();
        let victim = network.member(&synthetic_id(7)).unwrap();
        let before = cache.get(&victim.id).unwrap().unwrap();

        network.set_unreachable(victim.id, true);
        for _ in 0..4 {
            assert!(dht.ping(&victim, &cancel).await.is_err());
        }
        assert!(!dht.routing_table().contains(&victim.id));

        clock.advance(600);
        let report = cache.refresh(&cancel).await.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.refreshed, 19);

        assert_eq!(cache.get(&victim.id).unwrap(), Some(before));
        let survivor = cache.get(&synthetic_id(8)).unwrap().unwrap();
        assert_eq!(survivor.last_seen, Timestamp::new(FIXTURE_TIME + 600));
    }

    // =============================================================================
    // BACKGROUND REFRESH
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_refresh_task_updates_records_each_interval() {
        let network = Arc::new(SyntheticNetwork::with_members(10));
        let clock = Arc::new(ControllableTimeSource::new(FIXTURE_TIME));
        let dht = Arc::new(DhtService::new(
            local_node("refresh-task"),
            KademliaConfig::default(),
            network.clone(),
            clock.clone(),
        ));
        let store = Arc::new(InMemoryKeyValueStore::new());
        let config = OverlayConfig {
            seeds: vec![synthetic_address(0)],
            ..OverlayConfig::default()
        };
        let interval = config.refresh_interval();
        let cache = Arc::new(OverlayCache::new(dht.clone(), store.clone(), config));
        let cancel = CancellationToken::new();
        cache.bootstrap(&cancel).await.unwrap();

        let task = RefreshTask::spawn(cache.clone(), interval, cancel.child_token());
        clock.advance(60);
        tokio::time::sleep(interval + Duration::from_secs(1)).await;

        let record = cache.get(&synthetic_id(3)).unwrap().unwrap();
        assert_eq!(record.last_seen, Timestamp::new(FIXTURE_TIME + 60));
        assert!(store.get(synthetic_id(3).as_bytes()).unwrap().is_some());

        task.shutdown().await;
    }
}
