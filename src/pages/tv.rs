//! Plain TV dashboard: clock and the next few activities.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{every, is_shutdown, PageContext, MINUTE, SECOND};
use crate::bus::{BusEvent, PageKind};
use crate::display::view::{ActivityRow, ClockView};
use crate::fetch::spawn_fetch;
use crate::rpc::{Activity, Banner, RpcError};

const PAGE: PageKind = PageKind::Tv;
const ACTIVITY_COUNT: u32 = 4;

enum Msg {
    Banners(Result<Vec<Banner>, RpcError>),
    Activities(Result<Vec<Activity>, RpcError>),
}

pub struct TvPage {
    ctx: PageContext,
    cancel: CancellationToken,
}

impl TvPage {
    pub fn new(ctx: PageContext, cancel: CancellationToken) -> Self {
        Self { ctx, cancel }
    }

    pub async fn run(self) {
        let (tx, mut rx) = mpsc::channel(8);
        let mut bus_rx = self.ctx.bus.subscribe();
        let cancel = self.cancel.clone();

        let mut clock = every(SECOND);
        let mut banners = every(5 * MINUTE);
        let mut activities = every(5 * MINUTE);

        info!("TV page started");
        self.ctx.bus.publish(BusEvent::PageStarted { page: PAGE });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = bus_rx.recv() => {
                    if is_shutdown(&event) {
                        break;
                    }
                }
                _ = clock.tick() => self.update_clock(&Local::now()).await,
                _ = banners.tick() => {
                    let api = Arc::clone(&self.ctx.api);
                    spawn_fetch(&self.cancel, &tx, async move { Msg::Banners(api.get_banners().await) });
                }
                _ = activities.tick() => {
                    let api = Arc::clone(&self.ctx.api);
                    spawn_fetch(&self.cancel, &tx, async move {
                        Msg::Activities(api.get_upcoming_activities(ACTIVITY_COUNT, None).await)
                    });
                }
                Some(msg) = rx.recv() => self.apply(msg, &Local).await,
            }
        }

        info!("TV page stopped");
        self.ctx.bus.publish(BusEvent::PageStopped { page: PAGE });
    }

    async fn update_clock<Tz: TimeZone>(&self, now: &DateTime<Tz>)
    where
        Tz::Offset: Display,
    {
        self.ctx
            .display
            .update(PAGE, "clock", &ClockView::at(now))
            .await;
    }

    async fn apply<Tz: TimeZone>(&self, msg: Msg, tz: &Tz)
    where
        Tz::Offset: Display,
    {
        match msg {
            // The dashboard has no banner area; the list is only logged
            Msg::Banners(Ok(banners)) => debug!(?banners, "Banners"),
            Msg::Banners(Err(e)) => warn!("Could not load banners: {}", e),
            Msg::Activities(Ok(activities)) if activities.is_empty() => {
                debug!("No upcoming activities, keeping the current table");
            }
            Msg::Activities(Ok(activities)) => {
                let rows: Vec<ActivityRow> = activities
                    .iter()
                    .map(|a| ActivityRow::from_activity(a, tz))
                    .collect();
                self.ctx.display.update(PAGE, "activities", &rows).await;
            }
            Msg::Activities(Err(e)) => warn!("Could not load activities: {}", e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::bus::create_bus;
    use crate::config::Config;
    use crate::display::DisplayStore;
    use crate::testing::{activity, FakeApi, FakePreloader, FakeRoom};
    use chrono::FixedOffset;
    use serde_json::json;

    fn page() -> TvPage {
        let bus = create_bus();
        let ctx = PageContext {
            api: Arc::new(FakeApi::default()),
            room: Arc::new(FakeRoom::default()),
            display: Arc::new(DisplayStore::new(Arc::clone(&bus))),
            bus,
            config: Arc::new(Config::default()),
            preloader: Arc::new(FakePreloader),
        };
        TvPage::new(ctx, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_empty_activities_keep_previous_table() {
        let page = page();
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();

        page.apply(Msg::Activities(Ok(vec![activity(1, "Borrel", &[])])), &tz)
            .await;
        page.apply(Msg::Activities(Ok(vec![])), &tz).await;
        page.apply(Msg::Activities(Err(RpcError::Remote("down".into()))), &tz)
            .await;

        let rows = page.ctx.display.region(PAGE, "activities").await.unwrap();
        assert_eq!(
            rows,
            json!([{"when": "Fri 16 Oct, 16:00", "title": "Borrel"}])
        );
    }

    #[tokio::test]
    async fn test_clock_region() {
        let page = page();
        let now = DateTime::parse_from_rfc3339("2026-10-16T09:05:00+02:00").unwrap();
        page.update_clock(&now).await;

        let clock = page.ctx.display.region(PAGE, "clock").await.unwrap();
        assert_eq!(clock["date"], json!("Friday 16 October 2026"));
        assert_eq!(clock["time"], json!("09:05:00"));
    }
}
