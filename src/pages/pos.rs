//! Point-of-sale kiosk page: drives the [`PosKiosk`] from card scans, the
//! login poll and the once-a-second session clock.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{every, is_shutdown, PageContext, MINUTE, SECOND};
use crate::bus::{BusEvent, PageKind};
use crate::fetch::spawn_fetch;
use crate::pos::kiosk::LOGIN_CHECK_INTERVAL;
use crate::pos::SharedKiosk;
use crate::rpc::{Activity, RpcError};

const PAGE: PageKind = PageKind::Pos;
const ACTIVITY_COUNT: u32 = 6;
const PICTURE_COUNT: u32 = 10;

enum Msg {
    Activities(Result<Vec<Activity>, RpcError>),
    Pictures(Result<Vec<Activity>, RpcError>),
}

pub struct PosPage {
    ctx: PageContext,
    kiosk: SharedKiosk,
    cancel: CancellationToken,
}

impl PosPage {
    pub fn new(ctx: PageContext, kiosk: SharedKiosk, cancel: CancellationToken) -> Self {
        Self { ctx, kiosk, cancel }
    }

    pub async fn run(self) {
        let (tx, mut rx) = mpsc::channel(8);
        let mut bus_rx = self.ctx.bus.subscribe();
        let cancel = self.cancel.clone();

        let mut second = every(SECOND);
        let mut login_check = every(LOGIN_CHECK_INTERVAL);
        let mut refresh = every(60 * MINUTE);

        info!("POS page started");
        self.ctx.bus.publish(BusEvent::PageStarted { page: PAGE });
        self.kiosk.render().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = bus_rx.recv() => {
                    if is_shutdown(&event) {
                        break;
                    }
                    if let Ok(event) = event {
                        self.on_event(event).await;
                    }
                }
                _ = second.tick() => self.kiosk.tick(Instant::now()).await,
                _ = login_check.tick() => self.kiosk.check_login(Instant::now()).await,
                _ = refresh.tick() => self.refresh(&tx),
                Some(msg) = rx.recv() => self.apply(msg).await,
            }
        }

        info!("POS page stopped");
        self.ctx.bus.publish(BusEvent::PageStopped { page: PAGE });
    }

    async fn on_event(&self, event: BusEvent) {
        match event {
            BusEvent::CardScanned { identifier } => {
                self.kiosk.card_scanned(&identifier, Instant::now()).await;
            }
            BusEvent::CardRejected { reason } => debug!(reason = %reason, "Card rejected"),
            _ => {}
        }
    }

    fn refresh(&self, tx: &mpsc::Sender<Msg>) {
        let api = Arc::clone(&self.ctx.api);
        spawn_fetch(&self.cancel, tx, async move {
            Msg::Activities(api.get_upcoming_activities(ACTIVITY_COUNT, None).await)
        });

        let api = Arc::clone(&self.ctx.api);
        spawn_fetch(&self.cancel, tx, async move {
            Msg::Pictures(api.get_latest_activities_with_pictures(PICTURE_COUNT).await)
        });
    }

    async fn apply(&self, msg: Msg) {
        match msg {
            Msg::Activities(Ok(activities)) => self.kiosk.apply_activities(&activities).await,
            Msg::Activities(Err(e)) => warn!("Could not load activities: {}", e),
            Msg::Pictures(Ok(pictures)) => self.kiosk.apply_pictures(&pictures).await,
            Msg::Pictures(Err(e)) => warn!("Could not load pictures: {}", e),
        }
        self.kiosk.render().await;
    }
}
