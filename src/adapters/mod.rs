//! Connections to outside services that need a reconnect loop (the RFID reader)

mod handle;
pub mod rfid;
mod traits;

pub use handle::{AdapterHandle, RetryConfig};
pub use rfid::RfidBridge;
pub use traits::{AdapterContext, AdapterLogic};
