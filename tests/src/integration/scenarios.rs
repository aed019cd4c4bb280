//! # Bridge Scenarios over the Exchange Bus
//!
//! The router delivers into an [`InMemoryExchangeBus`]. A test plays the
//! transport: it takes request legs off the bus and feeds DONE, FAULT,
//! ERROR and responses back through [`BridgeApi`].
//!
//! ## Flows Tested:
//!
//! 1. **Request/response**: leg acknowledged, response resolves the initiator
//! 2. **Timeout**: no response, initiator fails with the timeout cause
//! 3. **Duplicates**: a repeated response is discarded without a delivery
//! 4. **Faults and errors** on the leg, per bridge mode

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_bridge::{
        BridgeApi, BridgeConfig, BridgeMode, BridgeOutcome, CorrelationId, ExchangeRouter,
        StoreError, TimeoutStart,
    };
    use bytes::Bytes;
    use shared_bus::{ExchangeFilter, InMemoryExchangeBus, Subscription};
    use shared_types::{ErrorCause, Exchange, ExchangeStatus, Pattern, Role};
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Wiring {
        router: ExchangeRouter,
        /// Request legs, as a transport would see them
        legs: Subscription,
        /// Initiators coming back to the consumer
        initiators: Subscription,
    }

    fn wire(config: BridgeConfig) -> Wiring {
        let bus = Arc::new(InMemoryExchangeBus::new());
        let legs = bus.subscribe(
            ExchangeFilter::service("partner").with_statuses(vec![ExchangeStatus::Active]),
        );
        let initiators = bus.subscribe(ExchangeFilter::roles(vec![Role::Initiator]));
        let router = ExchangeRouter::new(config.with_target_service("partner"), bus).unwrap();
        Wiring {
            router,
            legs,
            initiators,
        }
    }

    fn request(id: &str) -> Exchange {
        Exchange::initiator(Pattern::RequestResponse)
            .with_id(id)
            .with_payload("ping")
    }

    fn response(corr: &str, payload: &'static str) -> Exchange {
        Exchange::new(Role::Responder, Pattern::OneWay)
            .with_property("corr", corr)
            .with_payload(payload)
    }

    async fn next(subscription: &mut Subscription) -> Exchange {
        timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("nothing delivered")
            .expect("bus closed")
    }

    fn cid(s: &str) -> CorrelationId {
        CorrelationId::new(s).unwrap()
    }

    // =============================================================================
    // REQUEST / RESPONSE
    // =============================================================================

    #[tokio::test]
    async fn test_request_leg_then_response() {
        let mut w = wire(BridgeConfig::default());

        w.router.accept_initiator(request("E1")).await.unwrap();

        let mut leg = next(&mut w.legs).await;
        assert_eq!(leg.property_str("corr"), Some("E1"));
        assert_eq!(leg.payload(), Some(&Bytes::from_static(b"ping")));
        assert_eq!(leg.pattern(), Pattern::OneWay);

        leg.complete().unwrap();
        let ack = w.router.accept_bridge_terminal(leg).await.unwrap();
        assert_eq!(ack, BridgeOutcome::RequestAcknowledged { correlation_id: cid("E1") });
        assert!(w.initiators.try_recv().unwrap().is_none());

        w.router
            .accept_bridge_response(response("E1", "pong"))
            .await
            .unwrap();

        let initiator = next(&mut w.initiators).await;
        assert_eq!(initiator.id().as_str(), "E1");
        assert_eq!(initiator.status(), ExchangeStatus::Done);
        assert_eq!(initiator.payload(), Some(&Bytes::from_static(b"pong")));
        assert_eq!(w.router.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_response_overtakes_leg_done() {
        let mut w = wire(BridgeConfig::default());
        w.router.accept_initiator(request("E1")).await.unwrap();
        let mut leg = next(&mut w.legs).await;

        w.router
            .accept_bridge_response(response("E1", "early"))
            .await
            .unwrap();
        let initiator = next(&mut w.initiators).await;
        assert_eq!(initiator.payload(), Some(&Bytes::from_static(b"early")));

        leg.complete().unwrap();
        let late = w.router.accept_bridge_terminal(leg).await.unwrap();
        assert!(late.is_discarded());
        assert!(w.initiators.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_many_initiators_interleaved() {
        let mut w = wire(BridgeConfig::default());
        for i in 0..20 {
            w.router
                .accept_initiator(request(&format!("E{i}")))
                .await
                .unwrap();
        }
        assert_eq!(w.router.pending_count(), 20);

        // Answer in reverse order
        for i in (0..20).rev() {
            w.router
                .accept_bridge_response(response(&format!("E{i}"), "ok"))
                .await
                .unwrap();
        }

        let mut returned = Vec::new();
        for _ in 0..20 {
            returned.push(next(&mut w.initiators).await.id().to_string());
        }
        assert_eq!(returned.first().map(String::as_str), Some("E19"));
        assert_eq!(returned.last().map(String::as_str), Some("E0"));
        assert_eq!(w.router.pending_count(), 0);
        assert_eq!(w.router.stats().resolved, 20);
    }

    // =============================================================================
    // TIMEOUTS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_initiator_times_out() {
        let mut w = wire(BridgeConfig::default().with_timeout(Duration::from_millis(100)));
        w.router.accept_initiator(request("E2")).await.unwrap();

        let initiator = next(&mut w.initiators).await;
        assert_eq!(initiator.id().as_str(), "E2");
        assert_eq!(initiator.status(), ExchangeStatus::Error);
        assert_eq!(
            initiator.error(),
            Some(&ErrorCause::Timeout { timeout_ms: 100 })
        );
        assert!(matches!(
            w.router.store().get(&cid("E2")),
            Err(StoreError::NotFound { .. })
        ));

        // The response shows up after all
        let late = w
            .router
            .accept_bridge_response(response("E2", "late"))
            .await
            .unwrap();
        assert!(late.is_discarded());
        assert!(w.initiators.try_recv().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_measured_from_leg_done() {
        let config = BridgeConfig::default()
            .with_timeout(Duration::from_millis(100))
            .with_timeout_start(TimeoutStart::OnRequestSent);
        let mut w = wire(config);
        w.router.accept_initiator(request("E3")).await.unwrap();
        let mut leg = next(&mut w.legs).await;

        // Nothing is armed until the leg is acknowledged
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(w.initiators.try_recv().unwrap().is_none());

        leg.complete().unwrap();
        w.router.accept_bridge_terminal(leg).await.unwrap();

        let initiator = next(&mut w.initiators).await;
        assert_eq!(initiator.status(), ExchangeStatus::Error);
        assert_eq!(w.router.stats().timed_out, 1);
    }

    // =============================================================================
    // DUPLICATES
    // =============================================================================

    #[tokio::test]
    async fn test_second_response_is_discarded() {
        let mut w = wire(BridgeConfig::default());
        w.router.accept_initiator(request("E3")).await.unwrap();

        w.router
            .accept_bridge_response(response("E3", "first"))
            .await
            .unwrap();
        let second = w
            .router
            .accept_bridge_response(response("E3", "second"))
            .await
            .unwrap();
        assert!(second.is_discarded());

        let initiator = next(&mut w.initiators).await;
        assert_eq!(initiator.payload(), Some(&Bytes::from_static(b"first")));
        assert!(w.initiators.try_recv().unwrap().is_none());
        assert_eq!(w.router.stats().discarded, 1);
    }

    #[tokio::test]
    async fn test_correlation_id_reusable_after_resolution() {
        let mut w = wire(BridgeConfig::default());
        w.router.accept_initiator(request("E4")).await.unwrap();
        assert!(w.router.accept_initiator(request("E4")).await.is_err());

        w.router
            .accept_bridge_response(response("E4", "one"))
            .await
            .unwrap();
        next(&mut w.initiators).await;

        assert!(w.router.accept_initiator(request("E4")).await.is_ok());
        assert_eq!(w.router.stats().duplicates, 1);
    }

    // =============================================================================
    // FAULTS AND ERRORS
    // =============================================================================

    #[tokio::test]
    async fn test_robust_fault_reaches_consumer() {
        let mut w = wire(BridgeConfig::default().with_mode(BridgeMode::Robust));
        w.router.accept_initiator(request("E5")).await.unwrap();

        let mut leg = next(&mut w.legs).await;
        assert_eq!(leg.pattern(), Pattern::RobustOneWay);
        leg.set_fault(Bytes::from_static(b"<fault/>")).unwrap();
        w.router.accept_bridge_terminal(leg).await.unwrap();

        let initiator = next(&mut w.initiators).await;
        assert!(initiator.is_fault());
        assert_eq!(initiator.fault(), Some(&Bytes::from_static(b"<fault/>")));
        assert_eq!(w.router.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_one_way_fault_fails_initiator() {
        let mut w = wire(BridgeConfig::default());
        w.router.accept_initiator(request("E6")).await.unwrap();

        let mut leg = next(&mut w.legs).await;
        leg.set_fault(Bytes::from_static(b"<fault/>")).unwrap();
        w.router.accept_bridge_terminal(leg).await.unwrap();

        let initiator = next(&mut w.initiators).await;
        assert_eq!(initiator.status(), ExchangeStatus::Error);
        assert_eq!(initiator.error(), Some(&ErrorCause::UnexpectedFault));
    }

    #[tokio::test]
    async fn test_leg_error_propagates_cause() {
        let mut w = wire(BridgeConfig::default());
        w.router.accept_initiator(request("E7")).await.unwrap();

        let mut leg = next(&mut w.legs).await;
        let cause = ErrorCause::Remote {
            message: "connection refused".to_string(),
        };
        leg.fail(cause.clone()).unwrap();
        w.router.accept_bridge_terminal(leg).await.unwrap();

        let initiator = next(&mut w.initiators).await;
        assert_eq!(initiator.status(), ExchangeStatus::Error);
        assert_eq!(initiator.error(), Some(&cause));
    }

    #[tokio::test]
    async fn test_no_transport_rolls_back() {
        let bus = Arc::new(InMemoryExchangeBus::new());
        let router = ExchangeRouter::new(BridgeConfig::default(), bus).unwrap();

        let result = router.accept_initiator(request("E8")).await;
        assert!(result.is_err());
        assert_eq!(router.pending_count(), 0);
        assert_eq!(router.stats().delivery_failures, 1);
    }
}
