//! Page controllers.
//!
//! One task per enabled page. A controller owns its page state, drives it
//! from interval timers, runs backend calls through [`spawn_fetch`](crate::fetch::spawn_fetch)
//! and writes the result into the [`DisplayStore`](crate::display::DisplayStore).
//! It stops on cancellation or on a bus `ShuttingDown`, and ACKs with
//! `PageStopped`.

pub mod narrowcast;
pub mod pos;
pub mod room;
pub mod tv;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};

use crate::bus::{BusEvent, SharedBus};
use crate::config::Config;
use crate::display::SharedDisplay;
use crate::preload::ImagePreloader;
use crate::rpc::{SharedApi, SharedRoomServices};

pub const SECOND: Duration = Duration::from_secs(1);
pub const MINUTE: Duration = Duration::from_secs(60);

/// Everything a page controller needs from the outside
#[derive(Clone)]
pub struct PageContext {
    pub api: SharedApi,
    pub room: SharedRoomServices,
    pub display: SharedDisplay,
    pub bus: SharedBus,
    pub config: Arc<Config>,
    pub preloader: Arc<dyn ImagePreloader>,
}

/// Timer whose first tick fires immediately
pub fn every(period: Duration) -> Interval {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Timer whose first tick fires after `delay`
pub fn every_after(delay: Duration, period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + delay, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Whether a bus receive result means the page should stop
pub(crate) fn is_shutdown(event: &Result<BusEvent, broadcast::error::RecvError>) -> bool {
    matches!(
        event,
        Ok(BusEvent::ShuttingDown { .. }) | Err(broadcast::error::RecvError::Closed)
    )
}
