// Criterion benchmarks for the riak-common frame codec
//
// Run benchmarks with:
//   cargo bench -p riak-common

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use riak_common::transport::codec;
use riak_common::{GetServerInfoResp, ListKeysResp, PingResp};

fn list_keys_page(count: usize) -> ListKeysResp {
    ListKeysResp {
        keys: (0..count).map(|i| format!("key_{}", i)).collect(),
        done: false,
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("empty_payload", |b| {
        b.iter(|| codec::encode(black_box(&PingResp)));
    });

    let info = GetServerInfoResp {
        node: Some("riak@127.0.0.1".into()),
        server_version: Some("3.0.16".into()),
    };
    group.bench_function("server_info", |b| {
        b.iter(|| codec::encode(black_box(&info)));
    });

    for count in [10, 100, 1000] {
        let page = list_keys_page(count);
        group.bench_with_input(BenchmarkId::new("list_keys", count), &page, |b, page| {
            b.iter(|| codec::encode(black_box(page)));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let empty = codec::encode(&PingResp).unwrap();
    group.bench_function("empty_payload", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let mut reader = black_box(empty.as_slice());
                codec::decode::<PingResp, _>(&mut reader).await
            })
        });
    });

    for count in [10, 100, 1000] {
        let frame = codec::encode(&list_keys_page(count)).unwrap();
        group.bench_with_input(BenchmarkId::new("list_keys", count), &frame, |b, frame| {
            b.iter(|| {
                runtime.block_on(async {
                    let mut reader = black_box(frame.as_slice());
                    codec::decode::<ListKeysResp, _>(&mut reader).await
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
