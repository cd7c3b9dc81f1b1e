// Criterion benchmarks for the riak-cluster load balancer
//
// Run benchmarks with:
//   cargo bench -p riak-cluster

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use riak_cluster::{DeactivationPolicy, LoadBalancer, Node, NodeConfig};

fn nodes(count: u16) -> Vec<Arc<Node>> {
    (0..count)
        .map(|i| {
            Arc::new(Node::new(
                &NodeConfig::new("10.0.0.1", 8000 + i),
                None,
                DeactivationPolicy::default(),
            ))
        })
        .collect()
}

fn bench_select_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_node");

    for node_count in [2u16, 5, 10, 20] {
        let lb = LoadBalancer::new(nodes(node_count));
        group.bench_with_input(BenchmarkId::from_parameter(node_count), &lb, |b, lb| {
            b.iter(|| black_box(lb.select_node()));
        });
    }

    group.finish();
}

fn bench_deactivate_reactivate(c: &mut Criterion) {
    let mut group = c.benchmark_group("deactivate_reactivate");

    for node_count in [5u16, 20] {
        let lb = LoadBalancer::new(nodes(node_count));
        let addr = format!("10.0.0.1:{}", 8000 + node_count / 2);
        group.bench_with_input(BenchmarkId::from_parameter(node_count), &addr, |b, addr| {
            b.iter(|| {
                lb.remove_node(black_box(addr));
                lb.add_node(black_box(addr));
            });
        });
    }

    group.finish();
}

fn bench_concurrent_selection(c: &mut Criterion) {
    let lb = Arc::new(LoadBalancer::new(nodes(10)));

    c.bench_function("select_node_4_threads_x_1000", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let lb = lb.clone();
                    std::thread::spawn(move || {
                        for _ in 0..1000 {
                            black_box(lb.select_node());
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_select_node,
    bench_deactivate_reactivate,
    bench_concurrent_selection
);
criterion_main!(benches);
