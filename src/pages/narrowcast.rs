//! Hallway TV: photo/promotion scheduler, sponsor banners, upcoming
//! activities and news.

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{every, every_after, is_shutdown, PageContext, MINUTE, SECOND};
use crate::bus::{BusEvent, PageKind};
use crate::collection::{RemoteCollection, RotationCursor};
use crate::display::view::{ActivityRow, ClockView, NewsRow};
use crate::fetch::spawn_fetch;
use crate::preload::PreloadError;
use crate::rpc::{Activity, Banner, NewsItem, RpcError};
use crate::scheduler::Scheduler;
use crate::widgets::{frame_slot, PhotoFrame, PhotoWidget, PromotionWidget};

const PAGE: PageKind = PageKind::Narrowcast;
const ACTIVITY_COUNT: u32 = 4;
const NEWS_COUNT: u32 = 2;
const BANNER_DELAY: Duration = Duration::from_secs(10);
const BANNER_PERIOD: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BannerView {
    pub image_url: String,
    pub portrait: bool,
}

enum Msg {
    Banners(Result<Vec<Banner>, RpcError>),
    Activities(Result<Vec<Activity>, RpcError>),
    News(Result<Vec<NewsItem>, RpcError>),
    BannerLoaded(Result<BannerView, PreloadError>),
}

pub struct NarrowcastPage {
    ctx: PageContext,
    cancel: CancellationToken,
    scheduler: Scheduler,
    frame: watch::Receiver<Option<PhotoFrame>>,
    banners: RemoteCollection<Banner>,
    banner_cursor: RotationCursor<Banner>,
}

impl NarrowcastPage {
    pub fn new(ctx: PageContext, cancel: CancellationToken) -> Self {
        let slot = frame_slot();
        let frame = slot.subscribe();

        let mut scheduler = Scheduler::new(ctx.config.scheduler.defaults_before_widget);
        scheduler.set_default(Box::new(PhotoWidget::new(
            Arc::clone(&ctx.api),
            Arc::clone(&ctx.preloader),
            Arc::clone(&slot),
            cancel.clone(),
        )));
        scheduler.schedule(Box::new(PromotionWidget::new(
            Arc::clone(&ctx.api),
            Arc::clone(&ctx.preloader),
            slot,
            cancel.clone(),
        )));

        Self {
            ctx,
            cancel,
            scheduler,
            frame,
            banners: RemoteCollection::new(),
            banner_cursor: RotationCursor::new(),
        }
    }

    pub async fn run(mut self) {
        let (tx, mut rx) = mpsc::channel(16);
        let mut bus_rx = self.ctx.bus.subscribe();
        let cancel = self.cancel.clone();

        let mut second = every(SECOND);
        let mut lists = every(5 * MINUTE);
        let mut banner_rotation = every_after(BANNER_DELAY, BANNER_PERIOD);

        info!("Narrowcast page started");
        self.ctx.bus.publish(BusEvent::PageStarted { page: PAGE });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = bus_rx.recv() => {
                    if is_shutdown(&event) {
                        break;
                    }
                }
                _ = second.tick() => self.on_second(&Local::now()).await,
                _ = lists.tick() => self.refresh_lists(&tx),
                _ = banner_rotation.tick() => self.rotate_banner(&tx),
                Some(msg) = rx.recv() => self.apply(msg).await,
            }
        }

        info!("Narrowcast page stopped");
        self.ctx.bus.publish(BusEvent::PageStopped { page: PAGE });
    }

    async fn on_second<Tz: TimeZone>(&mut self, now: &DateTime<Tz>)
    where
        Tz::Offset: Display,
    {
        self.scheduler.tick();

        let widget = self.scheduler.active_name().map(str::to_string);
        let display = &self.ctx.display;
        display.update(PAGE, "clock", &ClockView::at(now)).await;
        display.update(PAGE, "widget", &widget).await;
        let frame = self.frame.borrow_and_update().clone();
        display.update(PAGE, "photo", &frame).await;
    }

    fn refresh_lists(&self, tx: &mpsc::Sender<Msg>) {
        let api = Arc::clone(&self.ctx.api);
        spawn_fetch(&self.cancel, tx, async move { Msg::Banners(api.get_banners().await) });

        let api = Arc::clone(&self.ctx.api);
        spawn_fetch(&self.cancel, tx, async move {
            Msg::Activities(api.get_upcoming_activities(ACTIVITY_COUNT, None).await)
        });

        let api = Arc::clone(&self.ctx.api);
        spawn_fetch(&self.cancel, tx, async move {
            Msg::News(api.get_news(NEWS_COUNT, true).await)
        });
    }

    fn rotate_banner(&mut self, tx: &mpsc::Sender<Msg>) {
        let Some(banner) = self.banner_cursor.advance(&self.banners) else {
            return;
        };
        let image_url = banner.image.clone();
        let preloader = Arc::clone(&self.ctx.preloader);
        spawn_fetch(&self.cancel, tx, async move {
            let result = preloader.preload(&image_url).await.map(|info| BannerView {
                image_url,
                portrait: info.is_portrait(),
            });
            Msg::BannerLoaded(result)
        });
    }

    async fn apply(&mut self, msg: Msg) {
        let display = &self.ctx.display;
        match msg {
            Msg::Banners(Ok(banners)) => {
                debug!(count = banners.len(), "Banners loaded");
                self.banners.replace(banners);
            }
            Msg::Banners(Err(e)) => warn!("Could not load banners: {}", e),
            Msg::Activities(Ok(activities)) => {
                let rows: Vec<ActivityRow> = activities
                    .iter()
                    .map(|a| ActivityRow::from_activity(a, &Local))
                    .collect();
                display.update(PAGE, "activities", &rows).await;
            }
            Msg::Activities(Err(e)) => warn!("Could not load activities: {}", e),
            Msg::News(Ok(news)) => {
                let rows: Vec<NewsRow> = news.iter().map(|n| NewsRow::from_news(n, &Local)).collect();
                display.update(PAGE, "news", &rows).await;
            }
            Msg::News(Err(e)) => warn!("Could not load news: {}", e),
            Msg::BannerLoaded(Ok(view)) => {
                display.update(PAGE, "banner", &view).await;
            }
            Msg::BannerLoaded(Err(e)) => warn!("Could not preload banner: {}", e),
        }
    }
}
