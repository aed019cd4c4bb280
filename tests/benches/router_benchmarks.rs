//! # Exchange Router Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | register + respond | full request/response round trip, no timers |
//! | register + respond (timed) | same, with a timer armed and cancelled |
//! | discard | late signal for an already resolved correlation |
//! | store | raw put/remove on the in-memory correlation store |

use std::sync::Arc;
use std::time::Duration;

use async_bridge::{
    BridgeApi, BridgeConfig, CorrelationId, CorrelationStore, ExchangeRouter,
    InMemoryCorrelationStore, PendingCorrelation,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_bus::{DeliveryError, DeliverySink};
use shared_types::{Exchange, Pattern, Role};

/// Sink that accepts and drops everything.
struct NullSink;

#[async_trait::async_trait]
impl DeliverySink for NullSink {
    async fn send(&self, _exchange: Exchange) -> Result<(), DeliveryError> {
        Ok(())
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("benchmark runtime")
}

fn response(corr: &str) -> Exchange {
    Exchange::new(Role::Responder, Pattern::OneWay)
        .with_property("corr", corr)
        .with_payload("pong")
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("router-round-trip");

    for (name, timeout) in [("untimed", Duration::ZERO), ("timed", Duration::from_secs(30))] {
        let router = ExchangeRouter::new(
            BridgeConfig::default().with_timeout(timeout),
            Arc::new(NullSink),
        )
        .expect("router");

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("register_respond", name), |b| {
            b.to_async(&rt).iter(|| {
                let router = router.clone();
                async move {
                    let initiator = Exchange::initiator(Pattern::RequestResponse);
                    let corr = initiator.id().to_string();
                    router.accept_initiator(initiator).await.expect("accepted");
                    black_box(router.accept_bridge_response(response(&corr)).await)
                }
            })
        });
    }

    group.finish();
}

fn bench_discard(c: &mut Criterion) {
    let rt = runtime();
    let router = ExchangeRouter::new(BridgeConfig::default(), Arc::new(NullSink)).expect("router");

    c.bench_function("router-discard-late-response", |b| {
        b.to_async(&rt).iter(|| {
            let router = router.clone();
            async move { black_box(router.accept_bridge_response(response("gone")).await) }
        })
    });
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-store");

    for preloaded in [0usize, 10_000, 100_000] {
        let store = InMemoryCorrelationStore::new();
        for i in 0..preloaded {
            let id = CorrelationId::new(format!("pre-{i}")).expect("id");
            let entry = PendingCorrelation::new(id.clone(), Exchange::initiator(Pattern::OneWay));
            store.put(id, entry).expect("put");
        }

        group.bench_with_input(
            BenchmarkId::new("put_remove", preloaded),
            &preloaded,
            |b, _| {
                b.iter(|| {
                    let id = CorrelationId::new("hot").expect("id");
                    let entry =
                        PendingCorrelation::new(id.clone(), Exchange::initiator(Pattern::OneWay));
                    store.put(id.clone(), entry).expect("put");
                    black_box(store.remove(&id).expect("remove"))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_round_trip, bench_discard, bench_store);
criterion_main!(benches);
