use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{FramePresenter, FrameSlot, Widget};
use crate::collection::RemoteCollection;
use crate::fetch::FetchTask;
use crate::preload::ImagePreloader;
use crate::rpc::{RpcError, SharedApi, TelevisionPromotion};

/// Seconds on screen when there is at least one promotion
const PROMOTION_DURATION: u32 = 5;

type PromotionFetch = Result<Vec<TelevisionPromotion>, RpcError>;

/// Rotation widget showing the TV promotions, caption hidden.
/// Reports a zero duration while there is nothing to promote.
pub struct PromotionWidget {
    api: SharedApi,
    cancel: CancellationToken,
    presenter: FramePresenter,
    promotions: RemoteCollection<TelevisionPromotion>,
    /// Position of the last promotion shown; each change steps past it first
    index: usize,
    fetch: Option<FetchTask<PromotionFetch>>,
    ticks: u32,
    duration: u32,
}

impl PromotionWidget {
    pub fn new(
        api: SharedApi,
        preloader: Arc<dyn ImagePreloader>,
        slot: FrameSlot,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            presenter: FramePresenter::new("promotion", preloader, slot, cancel.clone()),
            cancel,
            promotions: RemoteCollection::new(),
            index: 0,
            fetch: None,
            ticks: 0,
            duration: 0,
        }
    }

    pub fn promotions(&self) -> &RemoteCollection<TelevisionPromotion> {
        &self.promotions
    }

    fn apply_fetch(&mut self) {
        let Some(result) = self.fetch.as_mut().and_then(|t| t.poll_ready()) else {
            return;
        };
        self.fetch = None;

        match result {
            Ok(promotions) => {
                debug!(count = promotions.len(), "Television promotions loaded");
                self.duration = if promotions.is_empty() {
                    0
                } else {
                    PROMOTION_DURATION
                };
                self.promotions.replace(promotions);
            }
            Err(e) => {
                warn!("Could not load television promotions: {}", e);
                self.duration = 0;
            }
        }
    }

    fn change_photo(&mut self) {
        if self.presenter.is_loading() {
            return;
        }
        if self.promotions.is_empty() {
            self.presenter.clear();
            return;
        }
        self.index = (self.index + 1) % self.promotions.len();
        if let Some(promotion) = self.promotions.get(self.index) {
            let url = promotion.image.clone();
            let caption = promotion.title.clone().unwrap_or_default();
            self.presenter.show(url, caption, false);
        }
    }
}

impl Widget for PromotionWidget {
    fn name(&self) -> &str {
        "promotion"
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
            api.get_television_promotions().await
        }));
    }

    fn tick(&mut self) {
        self.apply_fetch();
        self.presenter.poll();

        if self.ticks == 0 || !self.presenter.is_showing() {
            self.change_photo();
        }

        self.ticks = match self.duration {
            0 => 0,
            d => (self.ticks + 1) % d,
        };
    }

    fn duration(&self) -> u32 {
        self.duration
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::widgets::frame_slot;
    use crate::testing::{settle, FakeApi, FakePreloader};

    fn promotion(image: &str) -> TelevisionPromotion {
        TelevisionPromotion {
            title: Some("Symposium".into()),
            image: image.into(),
            activity: None,
        }
    }

    fn widget(api: Arc<FakeApi>, slot: FrameSlot) -> PromotionWidget {
        PromotionWidget::new(api, Arc::new(FakePreloader), slot, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_duration_follows_fetch_result() {
        let api = Arc::new(FakeApi::default());
        *api.promotions.lock().unwrap() = Some(Ok(vec![promotion("http://img/p.jpg")]));
        let mut widget = widget(Arc::clone(&api), frame_slot());
        assert_eq!(widget.duration(), 0);

        widget.pre_focus();
        settle().await;
        widget.on_focus();
        assert_eq!(widget.duration(), PROMOTION_DURATION);

        *api.promotions.lock().unwrap() = Some(Ok(vec![]));
        widget.pre_focus();
        settle().await;
        widget.on_focus();
        assert_eq!(widget.duration(), 0);

        *api.promotions.lock().unwrap() = Some(Ok(vec![promotion("http://img/p.jpg")]));
        widget.pre_focus();
        settle().await;
        widget.on_focus();
        *api.promotions.lock().unwrap() = Some(Err("down".into()));
        widget.pre_focus();
        settle().await;
        widget.on_focus();
        assert_eq!(widget.duration(), 0);
        // A failed fetch keeps the last list
        assert_eq!(widget.promotions().len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_starts_after_first_promotion() {
        let api = Arc::new(FakeApi::default());
        *api.promotions.lock().unwrap() = Some(Ok(vec![
            promotion("http://img/first.jpg"),
            promotion("http://img/second.jpg"),
        ]));
        let slot = frame_slot();
        let rx = slot.subscribe();
        let mut widget = widget(api, slot);

        widget.pre_focus();
        settle().await;
        widget.on_focus();
        widget.tick();
        settle().await;
        widget.tick();

        let frame = rx.borrow().clone().unwrap();
        assert_eq!(frame.image_url, "http://img/second.jpg");
        assert!(!frame.caption_visible);

        for _ in 0..PROMOTION_DURATION {
            widget.tick();
            settle().await;
        }
        widget.tick();
        let frame = rx.borrow().clone().unwrap();
        assert_eq!(frame.image_url, "http://img/first.jpg");
    }

    #[tokio::test]
    async fn test_single_promotion_is_shown() {
        let api = Arc::new(FakeApi::default());
        *api.promotions.lock().unwrap() = Some(Ok(vec![promotion("http://img/only.jpg")]));
        let slot = frame_slot();
        let rx = slot.subscribe();
        let mut widget = widget(api, slot);

        widget.pre_focus();
        settle().await;
        widget.on_focus();
        widget.tick();
        settle().await;
        widget.tick();

        assert_eq!(rx.borrow().clone().unwrap().image_url, "http://img/only.jpg");
    }
}
