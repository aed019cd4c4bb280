//! # Loopback Target
//!
//! Stands in for a real transport endpoint. Picks request legs off the bus,
//! acknowledges them through the router, and answers with a response after a
//! configurable latency. Faults, errors and lost responses are injected at
//! configured rates.

use crate::config::{LegReply, LoopbackConfig};
use async_bridge::{BridgeApi, ExchangeRouter};
use bytes::Bytes;
use shared_bus::{ExchangeFilter, Subscription};
use shared_types::{ErrorCause, Exchange, ExchangeStatus, Pattern, Role};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Answers request legs addressed to the bridge's target service.
pub struct LoopbackTarget {
    router: ExchangeRouter,
    config: LoopbackConfig,
}

impl LoopbackTarget {
    pub fn new(router: ExchangeRouter, config: LoopbackConfig) -> Self {
        Self { router, config }
    }

    /// Filter selecting the legs this target answers.
    pub fn filter(router: &ExchangeRouter) -> ExchangeFilter {
        ExchangeFilter {
            services: router.config().target_service.iter().cloned().collect(),
            roles: vec![Role::Responder],
            statuses: vec![ExchangeStatus::Active],
        }
    }

    /// Serve legs from `legs` until `shutdown` flips or the bus closes.
    pub fn spawn(
        self,
        mut legs: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Loopback target started");
            loop {
                tokio::select! {
                    leg = legs.recv() => match leg {
                        Some(leg) => self.answer(leg),
                        None => break,
                    },
                    _ = shutdown.changed() => {
                        info!("Loopback target shutdown signal received");
                        break;
                    }
                }
            }
        })
    }

    fn answer(&self, leg: Exchange) {
        let reply = self.config.choose(&mut rand::thread_rng());
        let router = self.router.clone();
        let latency = self.config.latency;

        tokio::spawn(async move {
            let property = router.config().correlation_property.clone();
            let Some(correlation) = leg.property_str(&property).map(str::to_string) else {
                warn!(exchange_id = %leg.id(), "Leg without correlation property ignored");
                return;
            };

            let mut ack = leg;
            let transition = match reply {
                LegReply::Respond | LegReply::Drop => ack.complete(),
                LegReply::Fault => ack.set_fault(Bytes::from_static(b"loopback fault")),
                LegReply::Error => ack.fail(ErrorCause::Remote {
                    message: "loopback error".to_string(),
                }),
            };
            if let Err(error) = transition {
                warn!(error = %error, "Leg could not be answered");
                return;
            }

            if let Err(error) = router.accept_bridge_terminal(ack).await {
                warn!(correlation_id = %correlation, error = %error, "Leg acknowledgement failed");
                return;
            }
            if reply != LegReply::Respond {
                debug!(correlation_id = %correlation, reply = ?reply, "Leg answered without response");
                return;
            }

            tokio::time::sleep(latency).await;
            let response = Exchange::new(Role::Responder, Pattern::OneWay)
                .with_property(property, correlation.clone())
                .with_payload(format!("reply to {correlation}"));
            if let Err(error) = router.accept_bridge_response(response).await {
                warn!(correlation_id = %correlation, error = %error, "Response delivery failed");
            }
        });
    }
}
