use chrono::{Local, Months, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{FramePresenter, FrameSlot, Widget, DEFAULT_DURATION};
use crate::collection::{RemoteCollection, RotationCursor};
use crate::display::format::day_month_year;
use crate::fetch::FetchTask;
use crate::preload::ImagePreloader;
use crate::rpc::{Activity, ImageSet, RpcError, SharedApi};

const LATEST_COUNT: u32 = 10;
const HISTORIC_COUNT: u32 = 3;

struct PhotoFetch {
    latest: Result<Vec<Activity>, RpcError>,
    historic: Result<Vec<Activity>, RpcError>,
}

/// Default narrowcast widget: rotates through pictures of recent
/// activities, with a few older ones mixed in.
pub struct PhotoWidget {
    api: SharedApi,
    cancel: CancellationToken,
    presenter: FramePresenter,
    activities: RemoteCollection<Activity>,
    cursor: RotationCursor<Activity>,
    fetch: Option<FetchTask<PhotoFetch>>,
    ticks: u32,
    rng: StdRng,
}

impl PhotoWidget {
    pub fn new(
        api: SharedApi,
        preloader: Arc<dyn ImagePreloader>,
        slot: FrameSlot,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_rng(api, preloader, slot, cancel, StdRng::from_entropy())
    }

    pub fn with_rng(
        api: SharedApi,
        preloader: Arc<dyn ImagePreloader>,
        slot: FrameSlot,
        cancel: CancellationToken,
        rng: StdRng,
    ) -> Self {
        Self {
            api,
            presenter: FramePresenter::new("photo", preloader, slot, cancel.clone()),
            cancel,
            activities: RemoteCollection::new(),
            cursor: RotationCursor::new(),
            fetch: None,
            ticks: 0,
            rng,
        }
    }

    pub fn activities(&self) -> &RemoteCollection<Activity> {
        &self.activities
    }

    pub fn is_photo_showing(&self) -> bool {
        self.presenter.is_showing()
    }

    fn apply_fetch(&mut self) {
        let Some(result) = self.fetch.as_mut().and_then(|t| t.poll_ready()) else {
            return;
        };
        self.fetch = None;

        let mut latest = match result.latest {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Could not load photos: {}", e);
                return;
            }
        };

        match result.historic {
            Ok(historic) => mix_in_historic(&mut latest, historic),
            Err(e) => warn!("Could not load historic photos: {}", e),
        }

        debug!(count = latest.len(), "Photo activities loaded");
        self.activities.replace(latest);
    }

    fn change_photo(&mut self) {
        if self.presenter.is_loading() {
            return;
        }

        let Some(activity) = self.cursor.advance(&self.activities) else {
            self.presenter.clear();
            return;
        };

        if activity.images.is_empty() {
            debug!(activity = activity.id, "Activity has no pictures");
            return;
        }
        let image = &activity.images[self.rng.gen_range(0..activity.images.len())];
        let Some(url) = photo_url(image) else {
            debug!(activity = activity.id, "Picture has no usable rendition");
            return;
        };

        let (url, title) = (url.to_string(), activity.title.clone());
        self.presenter.show(url, title, true);
    }
}

impl Widget for PhotoWidget {
    fn name(&self) -> &str {
        "photo"
    }

    fn on_focus(&mut self) {
        self.apply_fetch();
    }

    fn pre_focus(&mut self) {
        if self.fetch.as_ref().is_some_and(|t| t.is_pending()) {
            return;
        }
        let api = Arc::clone(&self.api);
        self.fetch = Some(FetchTask::spawn(&self.cancel, async move {
            let latest = api.get_latest_activities_with_pictures(LATEST_COUNT).await;
            let (start, end) = historic_window();
            let historic = api
                .get_historic_activities_with_pictures(&start, &end, HISTORIC_COUNT)
                .await;
            PhotoFetch { latest, historic }
        }));
    }

    fn tick(&mut self) {
        self.apply_fetch();
        self.presenter.poll();

        if self.ticks == 0 || !self.presenter.is_showing() {
            self.change_photo();
        }

        self.ticks = (self.ticks + 1) % self.duration();
    }

    fn duration(&self) -> u32 {
        DEFAULT_DURATION
    }
}

/// `large`, or `original` when there is no large rendition
fn photo_url(image: &ImageSet) -> Option<&str> {
    image.large.as_deref().or(image.original.as_deref())
}

/// Between two years and three months ago, as ISO-8601 UTC timestamps
fn historic_window() -> (String, String) {
    let now = Utc::now();
    let start = now.checked_sub_months(Months::new(24)).unwrap_or(now);
    let end = now.checked_sub_months(Months::new(3)).unwrap_or(now);
    (
        start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Spread historic activities over the latest list. The gap is re-measured
/// after every insert and positions past the end append.
fn mix_in_historic(latest: &mut Vec<Activity>, historic: Vec<Activity>) {
    for (j, mut activity) in historic.into_iter().enumerate() {
        let begin = activity.begin_date.with_timezone(&Local);
        activity.title = format!("[Old] {} - {}", activity.title, day_month_year(&begin));

        let distance = (latest.len() as f64 / HISTORIC_COUNT as f64).round() as usize;
        let position = ((j + 1) * distance).min(latest.len());
        latest.insert(position, activity);
    }
}
