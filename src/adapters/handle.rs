//! AdapterHandle - reconnect loop around an [`AdapterLogic`]
//!
//! A bridge that drops its connection is restarted with exponential
//! backoff. The handle watches the bus and the cancellation token, and
//! publishes `AdapterStopped` once it gives up.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::traits::{AdapterContext, AdapterLogic};
use crate::bus::{BusEvent, SharedBus};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// First wait after a failure
    pub initial_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
    /// A connection that lived at least this long resets the backoff
    pub stable_run_threshold: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            stable_run_threshold: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            ..Default::default()
        }
    }

    /// Wait after `delay`, doubled and capped
    pub fn next_delay(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max_delay)
    }
}

pub struct AdapterHandle<T: AdapterLogic> {
    logic: Arc<T>,
    bus: SharedBus,
    shutdown: CancellationToken,
}

impl<T: AdapterLogic> AdapterHandle<T> {
    pub fn new(logic: T, bus: SharedBus, shutdown: CancellationToken) -> Self {
        Self {
            logic: Arc::new(logic),
            bus,
            shutdown,
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.logic.prefix()
    }

    /// Keep the bridge connected until shutdown or a clean exit
    pub async fn run_with_retry(self, config: RetryConfig) -> Result<()> {
        let prefix = self.logic.prefix();
        let mut delay = config.initial_delay;

        loop {
            if self.shutdown.is_cancelled() {
                info!("{}: shutdown before attempt", prefix);
                break;
            }

            info!("{}: connecting (retry delay: {:?})", prefix, delay);
            let start = Instant::now();

            match self.run_once().await {
                Ok(()) => {
                    info!("{}: clean exit", prefix);
                    break;
                }
                Err(e) => {
                    let lived = start.elapsed();
                    if lived >= config.stable_run_threshold {
                        info!("{}: connection lived {:?}, resetting backoff", prefix, lived);
                        delay = config.initial_delay;
                    }

                    warn!("{}: {} (reconnecting in {:?})", prefix, e, delay);

                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            info!("{}: shutdown during backoff", prefix);
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {
                            delay = config.next_delay(delay);
                        }
                    }
                }
            }
        }

        self.bus.publish(BusEvent::AdapterStopped {
            adapter: prefix.to_string(),
        });
        info!("{}: stopped", prefix);
        Ok(())
    }

    /// One connection attempt. `Ok` on shutdown or clean exit.
    async fn run_once(&self) -> Result<()> {
        let prefix = self.logic.prefix();

        if let Err(e) = self.logic.init().await {
            error!("{}: init failed: {}", prefix, e);
            return Err(e);
        }

        let mut rx = self.bus.subscribe();
        let ctx = AdapterContext {
            bus: self.bus.clone(),
            shutdown: self.shutdown.clone(),
        };

        tokio::select! {
            result = self.logic.run(ctx) => result,
            _ = async {
                while let Ok(event) = rx.recv().await {
                    if matches!(event, BusEvent::ShuttingDown { .. }) {
                        break;
                    }
                }
            } => {
                info!("{}: stopping on ShuttingDown", prefix);
                Ok(())
            }
            _ = self.shutdown.cancelled() => {
                info!("{}: cancelled", prefix);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::bus::create_bus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Drops the connection after each scripted lifetime, then exits cleanly
    struct FlakyBridge {
        lifetimes: Vec<Duration>,
        attempts: Arc<Mutex<Vec<Instant>>>,
        count: AtomicUsize,
    }

    impl FlakyBridge {
        fn new(lifetimes: Vec<Duration>) -> Self {
            Self {
                lifetimes,
                attempts: Arc::new(Mutex::new(Vec::new())),
                count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AdapterLogic for FlakyBridge {
        fn prefix(&self) -> &'static str {
            "flaky"
        }

        async fn run(&self, _ctx: AdapterContext) -> Result<()> {
            self.attempts.lock().unwrap().push(Instant::now());
            let n = self.count.fetch_add(1, Ordering::SeqCst);
            match self.lifetimes.get(n) {
                Some(lifetime) => {
                    tokio::time::sleep(*lifetime).await;
                    Err(anyhow::anyhow!("connection dropped"))
                }
                None => Ok(()),
            }
        }
    }

    fn quick() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            stable_run_threshold: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let config = RetryConfig::default();
        let mut delay = config.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(delay.as_secs());
            delay = config.next_delay(delay);
        }
        assert_eq!(seen, vec![5, 10, 20, 40, 60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_with_backoff_and_acks() {
        let bus = create_bus();
        let mut bus_rx = bus.subscribe();
        let bridge = FlakyBridge::new(vec![Duration::ZERO, Duration::ZERO]);
        let attempts = Arc::clone(&bridge.attempts);

        let handle = AdapterHandle::new(bridge, bus, CancellationToken::new());
        handle.run_with_retry(quick()).await.unwrap();

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[1] - attempts[0], Duration::from_secs(1));
        assert_eq!(attempts[2] - attempts[1], Duration::from_secs(2));
        assert_eq!(
            bus_rx.try_recv().unwrap(),
            BusEvent::AdapterStopped {
                adapter: "flaky".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_connection_resets_backoff() {
        let bridge = FlakyBridge::new(vec![
            Duration::ZERO,
            Duration::from_secs(40),
            Duration::ZERO,
        ]);
        let attempts = Arc::clone(&bridge.attempts);

        let handle = AdapterHandle::new(bridge, create_bus(), CancellationToken::new());
        handle.run_with_retry(quick()).await.unwrap();

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 4);
        // 40s connection, then the initial 1s instead of the doubled 2s
        assert_eq!(attempts[2] - attempts[1], Duration::from_secs(41));
        assert_eq!(attempts[3] - attempts[2], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff() {
        let shutdown = CancellationToken::new();
        let bridge = FlakyBridge::new(vec![Duration::ZERO; 100]);
        let attempts = Arc::clone(&bridge.attempts);
        let handle = AdapterHandle::new(bridge, create_bus(), shutdown.clone());
        let config = RetryConfig::new(Duration::from_secs(10), Duration::from_secs(60));

        let task = tokio::spawn(handle.run_with_retry(config));
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();

        task.await.unwrap().unwrap();
        assert_eq!(attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let bridge = FlakyBridge::new(vec![]);
        let attempts = Arc::clone(&bridge.attempts);

        let handle = AdapterHandle::new(bridge, create_bus(), shutdown);
        handle.run_with_retry(RetryConfig::default()).await.unwrap();
        assert!(attempts.lock().unwrap().is_empty());
    }
}
