//! Widgets shown in the narrowcast photo area.
//!
//! A widget is driven once per second by the [`Scheduler`](crate::scheduler::Scheduler).
//! It fetches its own data in the background and publishes the picture it
//! wants on screen into a shared [`FrameSlot`].

mod photo;
mod promotion;

pub use photo::PhotoWidget;
pub use promotion::PromotionWidget;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::fetch::FetchTask;
use crate::preload::{ImagePreloader, PreloadError};

/// Seconds a widget stays on screen unless it says otherwise
pub const DEFAULT_DURATION: u32 = 20;

pub trait Widget: Send {
    fn name(&self) -> &str;

    /// Put on screen
    fn on_focus(&mut self) {}

    /// Taken off screen
    fn on_lose_focus(&mut self) {}

    /// Called one slot before the widget gets the screen; start fetching here
    fn pre_focus(&mut self) {}

    /// Called every second while the widget is driven
    fn tick(&mut self);

    /// Seconds on screen. Zero means there is nothing to show.
    fn duration(&self) -> u32 {
        DEFAULT_DURATION
    }
}

/// The picture currently in the photo area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoFrame {
    pub image_url: String,
    pub caption: String,
    pub caption_visible: bool,
    pub portrait: bool,
}

pub type FrameSlot = Arc<watch::Sender<Option<PhotoFrame>>>;

pub fn frame_slot() -> FrameSlot {
    let (tx, _) = watch::channel(None);
    Arc::new(tx)
}

type PendingFrame = Result<PhotoFrame, PreloadError>;

/// Preloads a picture and swaps it into the frame slot once it is ready.
/// At most one preload is in flight.
pub(crate) struct FramePresenter {
    owner: &'static str,
    preloader: Arc<dyn ImagePreloader>,
    slot: FrameSlot,
    cancel: CancellationToken,
    pending: Option<FetchTask<PendingFrame>>,
    showing: bool,
}

impl FramePresenter {
    pub(crate) fn new(
        owner: &'static str,
        preloader: Arc<dyn ImagePreloader>,
        slot: FrameSlot,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            owner,
            preloader,
            slot,
            cancel,
            pending: None,
            showing: false,
        }
    }

    /// Swap in a finished preload
    pub(crate) fn poll(&mut self) {
        let Some(task) = self.pending.as_mut() else {
            return;
        };
        match task.poll_ready() {
            Some(Ok(frame)) => {
                debug!(widget = self.owner, url = %frame.image_url, "Showing picture");
                self.slot.send_replace(Some(frame));
                self.showing = true;
                self.pending = None;
            }
            Some(Err(e)) => {
                warn!(widget = self.owner, "Could not preload picture: {}", e);
                self.pending = None;
            }
            None if !task.is_pending() => self.pending = None,
            None => {}
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| t.is_pending())
    }

    pub(crate) fn is_showing(&self) -> bool {
        self.showing
    }

    pub(crate) fn clear(&mut self) {
        self.showing = false;
    }

    pub(crate) fn show(&mut self, image_url: String, caption: String, caption_visible: bool) {
        if self.is_loading() {
            return;
        }
        let preloader = Arc::clone(&self.preloader);
        self.pending = Some(FetchTask::spawn(&self.cancel, async move {
            let info = preloader.preload(&image_url).await?;
            Ok(PhotoFrame {
                image_url,
                caption,
                caption_visible,
                portrait: info.is_portrait(),
            })
        }));
    }
}
