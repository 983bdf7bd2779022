//! Test doubles shared by the unit tests

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::preload::{ImageInfo, ImagePreloader, PreloadError};
use crate::rpc::{
    Activity, Banner, ImageSet, NarrowcastApi, NewsItem, RoomDuty, RpcError,
    TelevisionPromotion,
};
use crate::members::DogroupData;
use crate::pos::client::tags_field;
use crate::pos::{CheckoutOutcome, LoginOutcome, LogoutReason, PosBackend, PosError};
use crate::rpc::{NowPlayingResponse, RoomError, RoomServices};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Landscape for every URL except those containing "portrait"
pub struct FakePreloader;

#[async_trait]
impl ImagePreloader for FakePreloader {
    async fn preload(&self, url: &str) -> Result<ImageInfo, PreloadError> {
        if url.contains("portrait") {
            Ok(ImageInfo {
                width: 2,
                height: 3,
            })
        } else {
            Ok(ImageInfo {
                width: 3,
                height: 2,
            })
        }
    }
}

pub fn date(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

pub fn activity(id: i64, title: &str, images: &[&str]) -> Activity {
    Activity {
        id,
        title: title.to_string(),
        location: "Hal B".to_string(),
        begin_date: date("2026-10-16T16:00:00+02:00"),
        end_date: date("2026-10-16T19:00:00+02:00"),
        url: None,
        is_dutch: None,
        thumbnail: None,
        images: images
            .iter()
            .map(|u| ImageSet {
                large: Some(u.to_string()),
                ..Default::default()
            })
            .collect(),
    }
}

/// Scripted JSON-RPC backend recording every call
#[derive(Default)]
pub struct FakeApi {
    pub latest: Mutex<Option<Result<Vec<Activity>, String>>>,
    pub historic: Mutex<Option<Result<Vec<Activity>, String>>>,
    pub upcoming: Mutex<Option<Result<Vec<Activity>, String>>>,
    pub promotions: Mutex<Option<Result<Vec<TelevisionPromotion>, String>>>,
    pub banners: Mutex<Vec<Banner>>,
    pub news: Mutex<Vec<NewsItem>>,
    pub room_duty: Mutex<Vec<RoomDuty>>,
    pub calls: Mutex<Vec<String>>,
}

fn scripted<T: Clone>(
    slot: &Mutex<Option<Result<Vec<T>, String>>>,
) -> Result<Vec<T>, RpcError> {
    match slot.lock().unwrap().clone() {
        Some(Ok(items)) => Ok(items),
        Some(Err(message)) => Err(RpcError::Remote(message)),
        None => Ok(Vec::new()),
    }
}

impl FakeApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl NarrowcastApi for FakeApi {
    async fn get_banners(&self) -> Result<Vec<Banner>, RpcError> {
        self.record("getBanners".into());
        Ok(self.banners.lock().unwrap().clone())
    }

    async fn get_upcoming_activities(
        &self,
        count: u32,
        _include_dutch: Option<bool>,
    ) -> Result<Vec<Activity>, RpcError> {
        self.record(format!("getUpcomingActivities({})", count));
        scripted(&self.upcoming)
    }

    async fn get_news(
        &self,
        count: u32,
        published_only: bool,
    ) -> Result<Vec<NewsItem>, RpcError> {
        self.record(format!("getNews({}, {})", count, published_only));
        Ok(self.news.lock().unwrap().clone())
    }

    async fn get_latest_activities_with_pictures(
        &self,
        count: u32,
    ) -> Result<Vec<Activity>, RpcError> {
        self.record(format!("getLatestActivitiesWithPictures({})", count));
        scripted(&self.latest)
    }

    async fn get_historic_activities_with_pictures(
        &self,
        _start: &str,
        _end: &str,
        count: u32,
    ) -> Result<Vec<Activity>, RpcError> {
        self.record(format!("getHistoricActivitiesWithPictures({})", count));
        scripted(&self.historic)
    }

    async fn get_television_promotions(&self) -> Result<Vec<TelevisionPromotion>, RpcError> {
        self.record("getTelevisionPromotions".into());
        scripted(&self.promotions)
    }

    async fn get_room_duty_today(&self) -> Result<Vec<RoomDuty>, RpcError> {
        self.record("getRoomDutyToday".into());
        Ok(self.room_duty.lock().unwrap().clone())
    }

    async fn get_activity_stream(
        &self,
        _start: &str,
        _end: &str,
        _include_unpublished: bool,
    ) -> Result<Vec<Activity>, RpcError> {
        self.record("getActivityStream".into());
        Ok(Vec::new())
    }
}

/// Give spawned fetches and preloads a chance to finish
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Scripted answer of the now-playing endpoint
#[derive(Clone)]
pub enum NowPlayingScript {
    Answer(NowPlayingResponse),
    NotAssociated,
    Failure,
}

/// Scripted room endpoints recording every call
#[derive(Default)]
pub struct FakeRoom {
    pub pcs: Mutex<HashMap<String, String>>,
    pub now_playing: Mutex<HashMap<String, NowPlayingScript>>,
    pub dogroups: Mutex<Option<DogroupData>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRoom {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RoomServices for FakeRoom {
    async fn pc_status(&self) -> Result<HashMap<String, String>, RoomError> {
        self.record("pc_status".into());
        Ok(self.pcs.lock().unwrap().clone())
    }

    async fn now_playing(&self, identifier: &str) -> Result<NowPlayingResponse, RoomError> {
        self.record(format!("spotify({})", identifier));
        let script = self.now_playing.lock().unwrap().get(identifier).cloned();
        match script {
            Some(NowPlayingScript::Answer(response)) => Ok(response),
            Some(NowPlayingScript::NotAssociated) => {
                Err(RoomError::NotAssociated(identifier.to_string()))
            }
            Some(NowPlayingScript::Failure) | None => Err(RoomError::Status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            )),
        }
    }

    async fn pause(&self, identifier: &str) -> Result<(), RoomError> {
        self.record(format!("pause({})", identifier));
        Ok(())
    }

    async fn play(&self, identifier: &str) -> Result<(), RoomError> {
        self.record(format!("play({})", identifier));
        Ok(())
    }

    async fn dogroup_data(&self) -> Result<DogroupData, RoomError> {
        self.record("dogroups".into());
        Ok(self.dogroups.lock().unwrap().clone().unwrap_or_default())
    }
}

/// Scripted POS form endpoints recording every call
#[derive(Default)]
pub struct FakePos {
    pub login: Mutex<Option<LoginOutcome>>,
    pub free_cookie: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
    /// When set, status checks and checkouts wait for a notification
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl FakePos {
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    /// Wait until a call starting with `prefix` was recorded
    pub async fn called(&self, prefix: &str) {
        while !self.calls().iter().any(|c| c.starts_with(prefix)) {
            tokio::task::yield_now().await;
        }
    }

    pub fn script_login(&self, outcome: LoginOutcome) {
        *self.login.lock().unwrap() = Some(outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PosBackend for FakePos {
    async fn submit_rfid_login(&self, tags: &[String]) -> Result<(), PosError> {
        self.record(format!("login({})", tags_field(tags)));
        Ok(())
    }

    async fn login_status(&self) -> Result<LoginOutcome, PosError> {
        self.record("status".into());
        self.pass_gate().await;
        Ok(self
            .login
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(LoginOutcome::Pending))
    }

    async fn submit_checkout(&self, cart: &str) -> Result<CheckoutOutcome, PosError> {
        self.record(format!("checkout({})", cart));
        self.pass_gate().await;
        Ok(CheckoutOutcome {
            free_cookie: *self.free_cookie.lock().unwrap(),
        })
    }

    async fn logout(&self, reason: &LogoutReason) -> Result<(), PosError> {
        self.record(format!("logout({})", reason.as_str()));
        Ok(())
    }
}
