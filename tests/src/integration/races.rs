//! # Competing Signals
//!
//! Timeout, response, leg terminal and shutdown all try to end the same
//! correlation. Whichever removes the entry first owns the initiator; every
//! other signal is discarded. These tests hammer that from several threads
//! and from generated signal sequences.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_bridge::{
        BridgeApi, BridgeConfig, BridgeMode, BridgeOutcome, CorrelationId, ExchangeRouter,
    };
    use bytes::Bytes;
    use proptest::prelude::*;
    use shared_bus::RecordingSink;
    use shared_types::{ErrorCause, Exchange, ExchangeStatus, Pattern, Role};
    use tokio::sync::Barrier;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn request(id: &str) -> Exchange {
        Exchange::initiator(Pattern::RequestResponse)
            .with_id(id)
            .with_payload("ping")
    }

    fn response(corr: &str) -> Exchange {
        Exchange::new(Role::Responder, Pattern::OneWay)
            .with_property("corr", corr)
            .with_payload("pong")
    }

    fn leg(corr: &str) -> Exchange {
        Exchange::new(Role::Responder, Pattern::OneWay).with_property("corr", corr)
    }

    fn setup(config: BridgeConfig) -> (ExchangeRouter, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let router = ExchangeRouter::new(config, sink.clone()).unwrap();
        (router, sink)
    }

    fn returned(sink: &RecordingSink, id: &str) -> Vec<Exchange> {
        sink.sent_with_id(&id.into())
            .into_iter()
            .filter(|e| e.role() == Role::Initiator)
            .collect()
    }

    // =============================================================================
    // THREADED RACES
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timeout_vs_response_has_one_winner() {
        for round in 0..200 {
            let (router, sink) = setup(BridgeConfig::default());
            let id = format!("R{round}");
            router.accept_initiator(request(&id)).await.unwrap();

            let start = Arc::new(Barrier::new(2));
            let timer = {
                let router = router.clone();
                let start = start.clone();
                let correlation_id = CorrelationId::new(id.clone()).unwrap();
                tokio::spawn(async move {
                    start.wait().await;
                    router.on_timeout(&correlation_id).await
                })
            };
            let answer = {
                let router = router.clone();
                let start = start.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    start.wait().await;
                    router.accept_bridge_response(response(&id)).await
                })
            };

            let (timer, answer) = tokio::join!(timer, answer);
            let outcomes = [timer.unwrap().unwrap(), answer.unwrap().unwrap()];
            assert_eq!(outcomes.iter().filter(|o| o.is_resolved()).count(), 1);
            assert_eq!(outcomes.iter().filter(|o| o.is_discarded()).count(), 1);

            let forwarded = returned(&sink, &id);
            assert_eq!(forwarded.len(), 1, "round {round}");
            match &outcomes[0] {
                BridgeOutcome::Resolved { status, .. } => {
                    assert_eq!(*status, ExchangeStatus::Error);
                    assert_eq!(
                        forwarded[0].error(),
                        Some(&ErrorCause::Timeout { timeout_ms: 0 })
                    );
                }
                _ => assert_eq!(forwarded[0].status(), ExchangeStatus::Done),
            }
            assert_eq!(router.pending_count(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_signal_at_once() {
        for round in 0..100 {
            let (router, sink) = setup(BridgeConfig::default().with_mode(BridgeMode::Robust));
            let id = format!("S{round}");
            router.accept_initiator(request(&id)).await.unwrap();

            let start = Arc::new(Barrier::new(4));
            let mut tasks = Vec::new();
            for signal in 0..4 {
                let router = router.clone();
                let start = start.clone();
                let id = id.clone();
                tasks.push(tokio::spawn(async move {
                    start.wait().await;
                    match signal {
                        0 => router.accept_bridge_response(response(&id)).await,
                        1 => {
                            let mut faulted = leg(&id);
                            faulted.set_fault(Bytes::from_static(b"<fault/>")).unwrap();
                            router.accept_bridge_terminal(faulted).await
                        }
                        2 => {
                            let mut failed = leg(&id);
                            failed
                                .fail(ErrorCause::Remote {
                                    message: "refused".to_string(),
                                })
                                .unwrap();
                            router.accept_bridge_terminal(failed).await
                        }
                        _ => {
                            let correlation_id = CorrelationId::new(id).unwrap();
                            router.on_timeout(&correlation_id).await
                        }
                    }
                }));
            }

            let mut resolved = 0;
            for task in tasks {
                if task.await.unwrap().unwrap().is_resolved() {
                    resolved += 1;
                }
            }
            assert_eq!(resolved, 1, "round {round}");
            assert_eq!(returned(&sink, &id).len(), 1);
            assert_eq!(router.stats().discarded, 3);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_of_one_id() {
        let (router, _sink) = setup(BridgeConfig::default());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                router.accept_initiator(request("SAME")).await
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(router.pending_count(), 1);
        assert_eq!(router.stats().duplicates, 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_vs_responses() {
        let (router, sink) = setup(BridgeConfig::default());
        for i in 0..50 {
            router.accept_initiator(request(&format!("D{i}"))).await.unwrap();
        }

        let responder = {
            let router = router.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    router
                        .accept_bridge_response(response(&format!("D{i}")))
                        .await
                        .unwrap();
                }
            })
        };
        let drained = router.shutdown().await;
        responder.await.unwrap();

        let stats = router.stats();
        assert_eq!(stats.drained as usize, drained);
        assert_eq!(stats.resolved + stats.drained, 50);
        assert_eq!(router.pending_count(), 0);
        for i in 0..50 {
            assert_eq!(returned(&sink, &format!("D{i}")).len(), 1);
        }
    }

    // =============================================================================
    // GENERATED SIGNAL SEQUENCES
    // =============================================================================

    #[derive(Debug, Clone, Copy)]
    enum Signal {
        Response,
        LegDone,
        LegFault,
        LegError,
        Timeout,
    }

    fn signal() -> impl Strategy<Value = Signal> {
        prop_oneof![
            Just(Signal::Response),
            Just(Signal::LegDone),
            Just(Signal::LegFault),
            Just(Signal::LegError),
            Just(Signal::Timeout),
        ]
    }

    /// Status the initiator comes back with when `signal` ends the bridge.
    fn expected_status(signal: Signal, robust: bool) -> Option<ExchangeStatus> {
        match signal {
            Signal::Response => Some(ExchangeStatus::Done),
            Signal::LegDone => None,
            Signal::LegFault if robust => Some(ExchangeStatus::Active),
            Signal::LegFault | Signal::LegError | Signal::Timeout => Some(ExchangeStatus::Error),
        }
    }

    async fn deliver(router: &ExchangeRouter, signal: Signal) -> BridgeOutcome {
        let outcome = match signal {
            Signal::Response => router.accept_bridge_response(response("P1")).await,
            Signal::LegDone => {
                let mut done = leg("P1");
                done.complete().unwrap();
                router.accept_bridge_terminal(done).await
            }
            Signal::LegFault => {
                let mut faulted = leg("P1");
                faulted.set_fault(Bytes::from_static(b"<fault/>")).unwrap();
                router.accept_bridge_terminal(faulted).await
            }
            Signal::LegError => {
                let mut failed = leg("P1");
                failed.fail(ErrorCause::UnexpectedFault).unwrap();
                router.accept_bridge_terminal(failed).await
            }
            Signal::Timeout => {
                let correlation_id = CorrelationId::new("P1").unwrap();
                router.on_timeout(&correlation_id).await
            }
        };
        outcome.unwrap()
    }

    proptest! {
        #[test]
        fn test_at_most_one_initiator_returned(
            signals in prop::collection::vec(signal(), 0..10),
            robust in any::<bool>(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            let mode = if robust { BridgeMode::Robust } else { BridgeMode::OneWay };
            let (router, sink) = setup(BridgeConfig::default().with_mode(mode));

            let outcomes: Vec<BridgeOutcome> = runtime.block_on(async {
                router.accept_initiator(request("P1")).await.unwrap();
                let mut outcomes = Vec::new();
                for signal in &signals {
                    outcomes.push(deliver(&router, *signal).await);
                }
                outcomes
            });

            let forwarded = returned(&sink, "P1");
            let winner = signals
                .iter()
                .position(|s| expected_status(*s, robust).is_some());

            match winner {
                Some(index) => {
                    prop_assert_eq!(forwarded.len(), 1);
                    prop_assert_eq!(
                        Some(forwarded[0].status()),
                        expected_status(signals[index], robust)
                    );
                    prop_assert!(outcomes[index].is_resolved());
                    prop_assert!(outcomes[index + 1..].iter().all(BridgeOutcome::is_discarded));
                    prop_assert_eq!(router.pending_count(), 0);
                }
                None => {
                    prop_assert!(forwarded.is_empty());
                    prop_assert_eq!(router.pending_count(), 1);
                    let all_acknowledged = outcomes
                        .iter()
                        .all(|o| matches!(o, BridgeOutcome::RequestAcknowledged { .. }));
                    prop_assert!(all_acknowledged);
                }
            }
        }
    }
}
