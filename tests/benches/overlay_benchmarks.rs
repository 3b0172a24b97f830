//! # Overlay Benchmarks
//!
//! - XOR distance and bucket index on random ids
//! - `find_closest` on a populated routing table
//! - Full iterative lookup over a synthetic network
//! - Record encode/decode through the overlay cache

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio_util::sync::CancellationToken;

use overlay_dht::test_utils::{synthetic_id, SyntheticNetwork};
use overlay_dht::{
    bucket_index, xor_distance, KademliaConfig, Node, NodeId, OverlayDht, RoutingTable, Timestamp,
};
use overlay_tests::fixtures::{local_node, synthetic_cache, synthetic_dht, FIXTURE_TIME};

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");
    let a = NodeId::random();
    let b = NodeId::random();

    group.bench_function("xor_distance", |bench| {
        bench.iter(|| xor_distance(black_box(&a), black_box(&b)))
    });
    group.bench_function("bucket_index", |bench| {
        bench.iter(|| bucket_index(black_box(&a), black_box(&b)))
    });
    group.finish();
}

fn bench_find_closest(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing_table");
    let local = NodeId::random();
    let now = Timestamp::new(FIXTURE_TIME);

    for count in [100usize, 1_000, 5_000] {
        let table = RoutingTable::new(local, KademliaConfig::default());
        for _ in 0..count {
            let _ = table.observe(Node::new(NodeId::random(), "10.0.0.1:7000", now), now);
        }
        group.throughput(Throughput::Elements(table.len() as u64));
        group.bench_with_input(BenchmarkId::new("find_closest_20", count), &table, |bench, table| {
            bench.iter(|| table.find_closest(black_box(&NodeId::random()), 20))
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => panic!("cannot start runtime: {}", err),
    };
    let mut group = c.benchmark_group("lookup");
    group.sample_size(20);

    for members in [100usize, 1_000] {
        let network = Arc::new(SyntheticNetwork::with_members(members));
        let dht = synthetic_dht(local_node("bench"), network.clone(), KademliaConfig::default());
        runtime.block_on(async {
            let cancel = CancellationToken::new();
            for index in (0..members).step_by(members / 10) {
                if let Some(member) = network.member(&synthetic_id(index)) {
                    let _ = dht.observe(member, &cancel).await;
                }
            }
        });

        group.bench_with_input(BenchmarkId::new("iterative", members), &dht, |bench, dht| {
            bench.iter(|| {
                runtime.block_on(async {
                    dht.lookup(NodeId::random(), &CancellationToken::new()).await
                })
            })
        });
    }
    group.finish();
}

fn bench_cache_records(c: &mut Criterion) {
    let dht = synthetic_dht(
        local_node("bench-cache"),
        Arc::new(SyntheticNetwork::new()),
        KademliaConfig::default(),
    );
    let (cache, _store) = synthetic_cache(dht, vec![]);
    let node = Node::new(NodeId::random(), "10.0.0.1:9090", Timestamp::new(FIXTURE_TIME));

    c.bench_function("cache_put_get", |bench| {
        bench.iter(|| {
            let _ = cache.put(&node.id, black_box(&node));
            cache.get(black_box(&node.id))
        })
    });
}

criterion_group!(
    benches,
    bench_distance,
    bench_find_closest,
    bench_lookup,
    bench_cache_records
);
criterion_main!(benches);
