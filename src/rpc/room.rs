//! Plain REST endpoints next to the room page: PC status, Spotify
//! now-playing and playback control, and the do-group tree data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::error::RoomError;
use crate::members::DogroupData;

/// Answer of `spotify/?id=<identifier>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub device: Option<SpotifyDevice>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<SpotifyTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyDevice {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub name: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    #[serde(default)]
    pub album: SpotifyAlbum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

#[async_trait]
pub trait RoomServices: Send + Sync {
    /// Host name to power state of the room PCs
    async fn pc_status(&self) -> Result<HashMap<String, String>, RoomError>;

    async fn now_playing(&self, identifier: &str) -> Result<NowPlayingResponse, RoomError>;

    async fn pause(&self, identifier: &str) -> Result<(), RoomError>;

    async fn play(&self, identifier: &str) -> Result<(), RoomError>;

    async fn dogroup_data(&self) -> Result<DogroupData, RoomError>;
}

pub struct RoomClient {
    client: reqwest::Client,
    site_url: String,
    page_url: String,
}

impl RoomClient {
    /// `page_path` is the room page below `site_url`; its endpoints are resolved relative to it
    pub fn new(site_url: &str, page_path: &str, timeout: Duration) -> Result<Self, RoomError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let site_url = site_url.trim_end_matches('/').to_string();
        let page_url = format!(
            "{}/{}/",
            site_url,
            page_path.trim_matches('/')
        );
        Ok(Self {
            client,
            site_url,
            page_url,
        })
    }

    fn page_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.page_url, path)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, RoomError> {
        debug!(url = %url, "Room request");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RoomError::Status(response.status()));
        }
        Ok(response)
    }

    async fn control(&self, action: &str, identifier: &str) -> Result<(), RoomError> {
        let url = self.page_endpoint(&format!(
            "{}/?id={}",
            action,
            urlencoding::encode(identifier)
        ));
        self.get(&url).await?;
        Ok(())
    }
}

#[async_trait]
impl RoomServices for RoomClient {
    async fn pc_status(&self) -> Result<HashMap<String, String>, RoomError> {
        let response = self.get(&self.page_endpoint("pc_status")).await?;
        Ok(response.json().await?)
    }

    async fn now_playing(&self, identifier: &str) -> Result<NowPlayingResponse, RoomError> {
        let url = self.page_endpoint(&format!(
            "spotify/?id={}",
            urlencoding::encode(identifier)
        ));
        debug!(url = %url, "Now playing request");
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RoomError::NotAssociated(identifier.to_string()));
        }
        if !response.status().is_success() {
            return Err(RoomError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn pause(&self, identifier: &str) -> Result<(), RoomError> {
        self.control("pause_spotify", identifier).await
    }

    async fn play(&self, identifier: &str) -> Result<(), RoomError> {
        self.control("play_spotify", identifier).await
    }

    async fn dogroup_data(&self) -> Result<DogroupData, RoomError> {
        let url = format!("{}/members/dogroups/data", self.site_url);
        let response = self.get(&url).await?;
        Ok(response.json().await?)
    }
}
