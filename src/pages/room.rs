//! Association room dashboard: clock, next activity with the four o'clock
//! countdown, activity pictures, room duty, PC status and Spotify players.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{every, is_shutdown, PageContext, MINUTE, SECOND};
use crate::bus::{BusEvent, PageKind};
use crate::config::{RoomConfig, Strings};
use crate::display::format::{day_month_year, hour_minute, relative_time, room_image_url};
use crate::display::view::ClockView;
use crate::fetch::spawn_fetch;
use crate::preload::PreloadError;
use crate::rpc::{Activity, NowPlayingResponse, RoomDuty, RoomError, RpcError};

const PAGE: PageKind = PageKind::Room;
const PICTURE_COUNT: u32 = 20;
const NOW_PLAYING_PERIOD: Duration = Duration::from_secs(2);
/// Expected playback progress between two now-playing polls
const PROGRESS_PER_POLL_MS: f64 = 5000.0;

/// Text next to the clock
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountdownView {
    pub title: String,
    pub countdown: String,
    pub location: String,
    pub jingle: bool,
}

/// Picture in the media area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaView {
    pub image_url: String,
    pub title: String,
    pub index_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomDutyEntry {
    pub time: String,
    pub names: String,
    pub placeholder: bool,
}

/// One Spotify player tile
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NowPlayingView {
    pub identifier: String,
    pub title: String,
    pub artist: String,
    pub device: String,
    pub album_art: Option<String>,
    pub setup_link: Option<String>,
    pub playing: bool,
    /// Progress bar width in percent, `None` until the first playing answer
    pub progress: Option<f64>,
    pub transition: bool,
}

impl NowPlayingView {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Default::default()
        }
    }

    fn show_message(&mut self, message: &str) {
        self.title = message.to_string();
        self.artist.clear();
        self.device.clear();
        self.album_art = None;
        self.playing = false;
    }

    /// Moves the progress bar one poll ahead of the reported position, so the
    /// CSS transition lands where the next poll will be. A position behind
    /// the previous bar means a new track: jump back without animating.
    fn advance_progress(&mut self, progress_ms: u64, duration_ms: u64) {
        if duration_ms == 0 {
            self.progress = Some(0.0);
            return;
        }
        let progress = progress_ms as f64 / duration_ms as f64 * 100.0;
        let per_poll = PROGRESS_PER_POLL_MS / duration_ms as f64 * 100.0;

        match self.progress {
            None => self.progress = Some(0.0),
            Some(previous) if progress < previous - per_poll - 0.1 => {
                self.transition = false;
                self.progress = Some(0.0);
            }
            Some(_) => {
                self.transition = true;
                self.progress = Some((progress + per_poll).min(100.0));
            }
        }
    }
}

/// Side effects the countdown asks the page to carry out
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    Pause(String),
    Play(String),
    JingleStarted,
    JingleFinished,
}

#[derive(Debug, Default)]
struct Jingle {
    played_on: Option<NaiveDate>,
    started_at: Option<DateTime<Utc>>,
    spotify_was_playing: bool,
    did_pause: bool,
}

/// Everything on the room screen, without any I/O
pub struct RoomState {
    room: RoomConfig,
    strings: Strings,
    media_url: String,
    event: Option<Activity>,
    activities_loaded: bool,
    pictures: Vec<Activity>,
    picture_index: Option<usize>,
    pcs: BTreeMap<String, String>,
    players: BTreeMap<String, NowPlayingView>,
    excluded: HashSet<String>,
    room_device: Option<String>,
    jingle: Jingle,
    rng: StdRng,
}

impl RoomState {
    pub fn new(room: RoomConfig, strings: Strings, media_url: String) -> Self {
        Self::with_rng(room, strings, media_url, StdRng::from_entropy())
    }

    pub fn with_rng(room: RoomConfig, strings: Strings, media_url: String, rng: StdRng) -> Self {
        Self {
            room,
            strings,
            media_url,
            event: None,
            activities_loaded: false,
            pictures: Vec::new(),
            picture_index: None,
            pcs: BTreeMap::new(),
            players: BTreeMap::new(),
            excluded: HashSet::new(),
            room_device: None,
            jingle: Jingle::default(),
            rng,
        }
    }

    /// An empty answer keeps the event we already have
    pub fn apply_next_event(&mut self, activities: Vec<Activity>) {
        self.activities_loaded = true;
        if let Some(event) = activities.into_iter().next() {
            self.event = Some(event);
        }
    }

    /// The position carries over; the next step wraps on the new length
    pub fn apply_pictures(&mut self, pictures: Vec<Activity>) {
        self.pictures = pictures;
    }

    pub fn apply_pc_status(&mut self, status: HashMap<String, String>) {
        self.pcs.extend(status);
    }

    pub fn pcs(&self) -> &BTreeMap<String, String> {
        &self.pcs
    }

    /// Identifiers still worth polling
    pub fn active_identifiers(&self) -> Vec<String> {
        self.room
            .spotify_identifiers
            .iter()
            .filter(|id| !self.excluded.contains(*id))
            .cloned()
            .collect()
    }

    /// Player tiles in configured order
    pub fn players(&self) -> Vec<NowPlayingView> {
        self.room
            .spotify_identifiers
            .iter()
            .filter_map(|id| self.players.get(id).cloned())
            .collect()
    }

    pub fn countdown<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> (CountdownView, Vec<RoomAction>)
    where
        Tz::Offset: Display,
    {
        let mut actions = Vec::new();
        let now_utc = now.with_timezone(&Utc);
        self.finish_jingle(now_utc, &mut actions);

        if let Some(four) = four_o_clock(now) {
            let four_utc = four.with_timezone(&Utc);
            let in_window = now_utc > four_utc - chrono::Duration::minutes(5)
                && now_utc < four_utc + chrono::Duration::minutes(1);

            if in_window {
                let today = now.date_naive();
                let jingle_due = now_utc >= four_utc - chrono::Duration::seconds(15)
                    && now_utc < four_utc
                    && self.jingle.started_at.is_none()
                    && self.jingle.played_on != Some(today);
                if jingle_due {
                    self.start_jingle(now_utc, today, &mut actions);
                }

                let view = CountdownView {
                    title: self.strings.four_o_clock.clone(),
                    countdown: relative_time(&four, now),
                    location: String::new(),
                    jingle: self.jingle.started_at.is_some(),
                };
                return (view, actions);
            }
        }

        let jingle = self.jingle.started_at.is_some();
        let view = match &self.event {
            Some(event) => {
                let begin = event.begin_date.with_timezone(&Utc);
                let countdown = if begin > now_utc {
                    format!(
                        "{}{}",
                        self.strings.next_activity_future,
                        relative_time(&event.begin_date, now)
                    )
                } else if begin.timestamp() / 60 == now_utc.timestamp() / 60 {
                    self.strings.next_activity_today.clone()
                } else {
                    format!(
                        "{}{}",
                        self.strings.next_activity_past,
                        relative_time(&event.begin_date, now)
                    )
                };
                CountdownView {
                    title: event.title.clone(),
                    countdown,
                    location: event.location.clone(),
                    jingle,
                }
            }
            None => CountdownView {
                title: if self.activities_loaded {
                    self.strings.no_activities.clone()
                } else {
                    self.strings.loading_activities.clone()
                },
                jingle,
                ..Default::default()
            },
        };
        (view, actions)
    }

    fn start_jingle(&mut self, now: DateTime<Utc>, today: NaiveDate, actions: &mut Vec<RoomAction>) {
        let was_playing = self
            .players
            .get(&self.room.room_player)
            .is_some_and(|p| p.playing);
        let on_pause_device = self
            .room_device
            .as_deref()
            .is_some_and(|d| d.to_lowercase() == self.room.pause_device.to_lowercase());

        info!(was_playing, on_pause_device, "Four o'clock jingle");
        self.jingle = Jingle {
            played_on: Some(today),
            started_at: Some(now),
            spotify_was_playing: was_playing,
            did_pause: was_playing && on_pause_device,
        };
        if self.jingle.did_pause {
            actions.push(RoomAction::Pause(self.room.room_player.clone()));
        }
        actions.push(RoomAction::JingleStarted);
    }

    fn finish_jingle(&mut self, now: DateTime<Utc>, actions: &mut Vec<RoomAction>) {
        let Some(started) = self.jingle.started_at else {
            return;
        };
        let done = (now - started)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= Duration::from_secs(self.room.jingle_secs));
        if !done {
            return;
        }

        info!(
            was_playing = self.jingle.spotify_was_playing,
            resume = self.jingle.did_pause,
            "Jingle finished"
        );
        if self.jingle.did_pause {
            actions.push(RoomAction::Play(self.room.room_player.clone()));
        }
        self.jingle.started_at = None;
        self.jingle.spotify_was_playing = false;
        self.jingle.did_pause = false;
        actions.push(RoomAction::JingleFinished);
    }

    /// Next activity in the picture list with one of its pictures
    pub fn next_picture<Tz: TimeZone>(&mut self, tz: &Tz) -> Option<MediaView>
    where
        Tz::Offset: Display,
    {
        let count = self.pictures.len();
        if count == 0 {
            return None;
        }
        let index = self.picture_index.map_or(0, |i| (i + 1) % count);
        self.picture_index = Some(index);

        let activity = &self.pictures[index];
        if activity.images.is_empty() {
            debug!(activity = activity.id, "Activity has no pictures");
            return None;
        }
        let k = self.rng.gen_range(0..activity.images.len());
        let image_url = room_image_url(&activity.images[k], &self.media_url)?;

        Some(MediaView {
            image_url,
            title: format!(
                "[{}] {}",
                day_month_year(&activity.begin_date.with_timezone(tz)),
                activity.title
            ),
            index_text: format!("{}/{}", k + 1, activity.images.len()),
        })
    }

    pub fn apply_now_playing(
        &mut self,
        identifier: &str,
        result: Result<NowPlayingResponse, RoomError>,
    ) {
        let is_room_player = identifier == self.room.room_player;
        let view = self
            .players
            .entry(identifier.to_string())
            .or_insert_with(|| NowPlayingView::new(identifier));

        match result {
            Err(RoomError::NotAssociated(_)) => {
                info!(identifier, "Spotify account not associated, no longer polling");
                self.excluded.insert(identifier.to_string());
                view.show_message(&self.strings.not_associated);
                view.setup_link = Some(format!("?setup_spotify={}", identifier));
            }
            Err(e) => {
                debug!(identifier, "Now playing failed: {}", e);
                view.show_message(&self.strings.spotify_error);
                if is_room_player {
                    self.room_device = None;
                }
            }
            Ok(response) if response.error => {
                view.show_message(&self.strings.spotify_error);
                if is_room_player {
                    self.room_device = None;
                }
            }
            Ok(NowPlayingResponse {
                is_playing: true,
                item: Some(track),
                device,
                progress_ms,
                ..
            }) => {
                let artists: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
                let device = device.map(|d| d.name).unwrap_or_default();

                view.title = track.name;
                view.artist = if artists.is_empty() {
                    self.strings.unknown_artist.clone()
                } else {
                    artists.join(", ")
                };
                view.album_art = track.album.images.first().map(|i| i.url.clone());
                view.device = device.clone();
                view.playing = true;
                view.advance_progress(progress_ms.unwrap_or(0), track.duration_ms);
                if is_room_player {
                    self.room_device = Some(device);
                }
            }
            Ok(_) => {
                view.show_message(&self.strings.not_playing);
                if is_room_player {
                    self.room_device = None;
                }
            }
        }
    }
}

/// 16:00 today in the zone of `now`
fn four_o_clock<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let naive = now.date_naive().and_hms_opt(16, 0, 0)?;
    now.timezone().from_local_datetime(&naive).single()
}

pub fn room_duty_entries<Tz: TimeZone>(
    duties: &[RoomDuty],
    tz: &Tz,
    strings: &Strings,
) -> Vec<RoomDutyEntry>
where
    Tz::Offset: Display,
{
    if duties.is_empty() {
        return vec![RoomDutyEntry {
            time: strings.no_room_duty_today.clone(),
            names: String::new(),
            placeholder: true,
        }];
    }

    duties
        .iter()
        .map(|duty| {
            let time = format!(
                "{} / {}",
                hour_minute(&duty.begin_date.with_timezone(tz)),
                hour_minute(&duty.end_date.with_timezone(tz))
            );
            if duty.participants.is_empty() {
                RoomDutyEntry {
                    time,
                    names: strings.no_room_duty_scheduled.clone(),
                    placeholder: true,
                }
            } else {
                let names: Vec<&str> = duty
                    .participants
                    .iter()
                    .map(|p| p.first_name.as_str())
                    .collect();
                RoomDutyEntry {
                    time,
                    names: names.join(", "),
                    placeholder: false,
                }
            }
        })
        .collect()
}

enum Msg {
    NextEvent(Result<Vec<Activity>, RpcError>),
    Pictures(Result<Vec<Activity>, RpcError>),
    RoomDuty(Result<Vec<RoomDuty>, RpcError>),
    PcStatus(Result<HashMap<String, String>, RoomError>),
    NowPlaying(String, Result<NowPlayingResponse, RoomError>),
    PictureLoaded(Result<MediaView, PreloadError>),
    Control(&'static str, Result<(), RoomError>),
}

pub struct RoomPage {
    ctx: PageContext,
    cancel: CancellationToken,
    state: RoomState,
    polling: HashSet<String>,
}

impl RoomPage {
    pub fn new(ctx: PageContext, cancel: CancellationToken) -> Self {
        let state = RoomState::new(
            ctx.config.room.clone(),
            ctx.config.strings.clone(),
            ctx.config.backend.media_url.clone(),
        );
        Self {
            ctx,
            cancel,
            state,
            polling: HashSet::new(),
        }
    }

    pub async fn run(mut self) {
        let (tx, mut rx) = mpsc::channel(32);
        let mut bus_rx = self.ctx.bus.subscribe();
        let cancel = self.cancel.clone();

        let mut second = every(SECOND);
        let mut picture = every(10 * SECOND);
        let mut next_event = every(5 * MINUTE);
        let mut pictures = every(10 * MINUTE);
        let mut room_duty = every(60 * MINUTE);
        let mut pc_status = every(20 * SECOND);
        let mut now_playing = every(NOW_PLAYING_PERIOD);

        info!("Room page started");
        self.ctx.bus.publish(BusEvent::PageStarted { page: PAGE });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = bus_rx.recv() => {
                    if is_shutdown(&event) {
                        break;
                    }
                }
                _ = second.tick() => self.on_second(&Local::now(), &tx).await,
                _ = picture.tick() => self.next_picture(&tx),
                _ = next_event.tick() => {
                    let api = Arc::clone(&self.ctx.api);
                    spawn_fetch(&self.cancel, &tx, async move {
                        Msg::NextEvent(api.get_upcoming_activities(1, None).await)
                    });
                }
                _ = pictures.tick() => {
                    let api = Arc::clone(&self.ctx.api);
                    spawn_fetch(&self.cancel, &tx, async move {
                        Msg::Pictures(api.get_latest_activities_with_pictures(PICTURE_COUNT).await)
                    });
                }
                _ = room_duty.tick() => {
                    let api = Arc::clone(&self.ctx.api);
                    spawn_fetch(&self.cancel, &tx, async move {
                        Msg::RoomDuty(api.get_room_duty_today().await)
                    });
                }
                _ = pc_status.tick() => {
                    let room = Arc::clone(&self.ctx.room);
                    spawn_fetch(&self.cancel, &tx, async move { Msg::PcStatus(room.pc_status().await) });
                }
                _ = now_playing.tick() => self.poll_now_playing(&tx),
                Some(msg) = rx.recv() => self.apply(msg, &Local).await,
            }
        }

        info!("Room page stopped");
        self.ctx.bus.publish(BusEvent::PageStopped { page: PAGE });
    }

    async fn on_second<Tz: TimeZone>(&mut self, now: &DateTime<Tz>, tx: &mpsc::Sender<Msg>)
    where
        Tz::Offset: Display,
    {
        let (countdown, actions) = self.state.countdown(now);
        let display = &self.ctx.display;
        display.update(PAGE, "clock", &ClockView::at(now)).await;
        display.update(PAGE, "countdown", &countdown).await;

        for action in actions {
            self.execute(action, tx);
        }
    }

    fn execute(&self, action: RoomAction, tx: &mpsc::Sender<Msg>) {
        let room = Arc::clone(&self.ctx.room);
        match action {
            RoomAction::Pause(identifier) => spawn_fetch(&self.cancel, tx, async move {
                Msg::Control("pause", room.pause(&identifier).await)
            }),
            RoomAction::Play(identifier) => spawn_fetch(&self.cancel, tx, async move {
                Msg::Control("play", room.play(&identifier).await)
            }),
            RoomAction::JingleStarted => self.ctx.bus.publish(BusEvent::JingleStarted),
            RoomAction::JingleFinished => self.ctx.bus.publish(BusEvent::JingleFinished),
        }
    }

    fn next_picture(&mut self, tx: &mpsc::Sender<Msg>) {
        let Some(view) = self.state.next_picture(&Local) else {
            return;
        };
        let preloader = Arc::clone(&self.ctx.preloader);
        spawn_fetch(&self.cancel, tx, async move {
            let result = preloader.preload(&view.image_url).await.map(|_| view);
            Msg::PictureLoaded(result)
        });
    }

    fn poll_now_playing(&mut self, tx: &mpsc::Sender<Msg>) {
        for identifier in self.state.active_identifiers() {
            // Still waiting on the previous answer
            if !self.polling.insert(identifier.clone()) {
                continue;
            }
            let room = Arc::clone(&self.ctx.room);
            spawn_fetch(&self.cancel, tx, async move {
                let result = room.now_playing(&identifier).await;
                Msg::NowPlaying(identifier, result)
            });
        }
    }

    async fn apply<Tz: TimeZone>(&mut self, msg: Msg, tz: &Tz)
    where
        Tz::Offset: Display,
    {
        let display = &self.ctx.display;
        match msg {
            Msg::NextEvent(Ok(activities)) => self.state.apply_next_event(activities),
            Msg::NextEvent(Err(e)) => warn!("Could not load next activity: {}", e),
            Msg::Pictures(Ok(pictures)) => {
                debug!(count = pictures.len(), "Room pictures loaded");
                self.state.apply_pictures(pictures);
            }
            Msg::Pictures(Err(e)) => warn!("Could not load pictures: {}", e),
            Msg::RoomDuty(Ok(duties)) => {
                let entries = room_duty_entries(&duties, tz, &self.ctx.config.strings);
                display.update(PAGE, "room_duty", &entries).await;
            }
            Msg::RoomDuty(Err(e)) => warn!("Could not load room duty: {}", e),
            Msg::PcStatus(Ok(status)) => {
                self.state.apply_pc_status(status);
                display.update(PAGE, "pcs", self.state.pcs()).await;
            }
            Msg::PcStatus(Err(e)) => warn!("Could not load PC status: {}", e),
            Msg::NowPlaying(identifier, result) => {
                self.polling.remove(&identifier);
                self.state.apply_now_playing(&identifier, result);
                display
                    .update(PAGE, "now_playing", &self.state.players())
                    .await;
            }
            Msg::PictureLoaded(Ok(view)) => {
                display.update(PAGE, "media", &view).await;
            }
            Msg::PictureLoaded(Err(e)) => warn!("Could not preload picture: {}", e),
            Msg::Control(action, Ok(())) => debug!(action, "Spotify control sent"),
            Msg::Control(action, Err(e)) => warn!(action, "Spotify control failed: {}", e),
        }
    }
}
