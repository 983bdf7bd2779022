//! Mock servers for integration testing
//!
//! These mock servers stand in for the association website and the RFID
//! reader software, so the clients can be exercised without either.

pub mod rfid;
pub mod website;

pub use rfid::MockRfidReader;
pub use website::MockWebsite;
