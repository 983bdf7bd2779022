use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::bus::SharedBus;

/// Handed to a bridge for one connection attempt
pub struct AdapterContext {
    pub bus: SharedBus,
    pub shutdown: CancellationToken,
}

/// A connection to some outside service that runs until it drops.
///
/// Implementors only hold the connection; reconnecting, shutdown and the
/// `AdapterStopped` ACK are handled by [`AdapterHandle`](super::AdapterHandle).
#[async_trait]
pub trait AdapterLogic: Send + Sync + 'static {
    /// Task name, used in logs and in the `AdapterStopped` ACK
    fn prefix(&self) -> &'static str;

    /// Runs before each connection attempt
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// `Ok` means a clean stop, `Err` asks for a reconnect
    async fn run(&self, ctx: AdapterContext) -> Result<()>;
}
