//! PageCoordinator - lifecycle of the page controllers and the RFID bridge
//!
//! Every long-running task is registered by name with its enabled flag.
//! Enabled tasks are spawned under a child of the global shutdown token;
//! shutdown announces itself on the bus, waits for each task to ACK
//! (`PageStopped` / `AdapterStopped`) and then cancels the stragglers.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, PageKind, SharedBus};
use crate::config::Config;

/// Name of the RFID bridge task
pub const RFID_TASK: &str = "rfid";

struct RegisteredTask {
    enabled: bool,
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

pub struct PageCoordinator {
    tasks: RwLock<HashMap<String, RegisteredTask>>,
    bus: SharedBus,
    /// Parent of all task tokens
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
}

impl PageCoordinator {
    pub fn new(bus: SharedBus) -> Self {
        Self::with_shutdown_timeout(bus, Duration::from_secs(5))
    }

    pub fn with_shutdown_timeout(bus: SharedBus, timeout: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            bus,
            shutdown: CancellationToken::new(),
            shutdown_timeout: timeout,
        }
    }

    /// Register the four pages and the RFID bridge with their configured enabled flags
    pub async fn register_from_config(&self, config: &Config) {
        for page in PageKind::ALL {
            let enabled = match page {
                PageKind::Narrowcast => config.pages.narrowcast,
                PageKind::Tv => config.pages.tv,
                PageKind::Room => config.pages.room,
                PageKind::Pos => config.pages.pos,
            };
            self.register(page.as_str(), enabled).await;
            info!("Page {} {}", page, if enabled { "enabled" } else { "disabled" });
        }
        // The bridge only feeds the kiosk
        let rfid = config.rfid.enabled && config.pages.pos;
        self.register(RFID_TASK, rfid).await;
    }

    pub async fn register(&self, name: &str, enabled: bool) {
        let mut tasks = self.tasks.write().await;
        tasks.insert(
            name.to_string(),
            RegisteredTask {
                enabled,
                handle: None,
                cancel: self.shutdown.child_token(),
            },
        );
        debug!("Registered task: {} (enabled: {})", name, enabled);
    }

    /// Spawn a registered, enabled task. `spawn_fn` receives the task's cancellation token.
    pub async fn start<F, Fut>(&self, name: &str, spawn_fn: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.write().await;

        let task = tasks
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("Task {} not registered", name))?;

        if !task.enabled {
            debug!("Task {} is disabled, not starting", name);
            return Ok(());
        }
        if task.handle.is_some() {
            debug!("Task {} already running", name);
            return Ok(());
        }

        task.handle = Some(tokio::spawn(spawn_fn(task.cancel.clone())));
        info!("Started task: {}", name);
        Ok(())
    }

    /// Graceful shutdown of every running task
    pub async fn shutdown(&self) {
        info!("Coordinator initiating shutdown");

        let running: Vec<String> = {
            let tasks = self.tasks.read().await;
            tasks
                .iter()
                .filter(|(_, t)| t.handle.is_some())
                .map(|(name, _)| name.clone())
                .collect()
        };

        if running.is_empty() {
            info!("No tasks running, shutdown complete");
            self.shutdown.cancel();
            return;
        }

        info!("Shutting down {} task(s): {:?}", running.len(), running);

        self.bus.publish(BusEvent::ShuttingDown {
            reason: Some("Coordinator shutdown".to_string()),
        });

        let acks = self.wait_for_acks(&running).await;
        if acks < running.len() {
            warn!(
                "Only received {}/{} shutdown ACKs, forcing remaining",
                acks,
                running.len()
            );
        }

        self.shutdown.cancel();

        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut tasks = self.tasks.write().await;
            tasks
                .iter_mut()
                .filter_map(|(name, t)| t.handle.take().map(|h| (name.clone(), h)))
                .collect()
        };

        for (name, handle) in handles {
            match tokio::time::timeout(Duration::from_secs(1), handle).await {
                Ok(Ok(())) => debug!("Task {} joined", name),
                Ok(Err(e)) => warn!("Task {} panicked: {}", name, e),
                Err(_) => warn!("Task {} did not join, abandoning", name),
            }
        }

        info!("Coordinator shutdown complete");
    }

    async fn wait_for_acks(&self, expected: &[String]) -> usize {
        let mut rx = self.bus.subscribe();
        let mut received: Vec<String> = Vec::new();
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;

        while received.len() < expected.len() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            let name = match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(BusEvent::PageStopped { page })) => page.as_str().to_string(),
                Ok(Ok(BusEvent::AdapterStopped { adapter })) => adapter,
                Ok(Ok(_)) => continue,
                // Channel closed or deadline passed
                Ok(Err(_)) | Err(_) => break,
            };

            if expected.contains(&name) && !received.contains(&name) {
                debug!("Received ACK from task: {}", name);
                received.push(name);
            }
        }

        received.len()
    }

    pub async fn task_status(&self) -> Vec<TaskStatus> {
        let tasks = self.tasks.read().await;
        let mut status: Vec<TaskStatus> = tasks
            .iter()
            .map(|(name, t)| TaskStatus {
                name: name.clone(),
                enabled: t.enabled,
                running: t.handle.is_some(),
            })
            .collect();
        status.sort_by(|a, b| a.name.cmp(&b.name));
        status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub enabled: bool,
    pub running: bool,
}
