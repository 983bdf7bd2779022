//! Clients for the association website backend.
//!
//! The JSON-RPC endpoint serves activities, banners, news, promotions and
//! room duty; the room page additionally talks to a handful of plain REST
//! endpoints (see [`room`]).

mod client;
mod error;
pub mod models;
pub mod room;

pub use client::JsonRpcClient;
pub use error::{RoomError, RpcError};
pub use models::{
    Activity, Banner, ImageSet, NewsItem, Participant, RoomDuty, TelevisionPromotion,
};
pub use room::{NowPlayingResponse, RoomClient, RoomServices};

use async_trait::async_trait;
use std::sync::Arc;

/// The JSON-RPC methods the screens use
#[async_trait]
pub trait NarrowcastApi: Send + Sync {
    async fn get_banners(&self) -> Result<Vec<Banner>, RpcError>;

    /// `include_dutch` is only sent when given
    async fn get_upcoming_activities(
        &self,
        count: u32,
        include_dutch: Option<bool>,
    ) -> Result<Vec<Activity>, RpcError>;

    async fn get_news(&self, count: u32, published_only: bool) -> Result<Vec<NewsItem>, RpcError>;

    async fn get_latest_activities_with_pictures(
        &self,
        count: u32,
    ) -> Result<Vec<Activity>, RpcError>;

    /// `start` and `end` are ISO-8601 timestamps
    async fn get_historic_activities_with_pictures(
        &self,
        start: &str,
        end: &str,
        count: u32,
    ) -> Result<Vec<Activity>, RpcError>;

    async fn get_television_promotions(&self) -> Result<Vec<TelevisionPromotion>, RpcError>;

    async fn get_room_duty_today(&self) -> Result<Vec<RoomDuty>, RpcError>;

    async fn get_activity_stream(
        &self,
        start: &str,
        end: &str,
        include_unpublished: bool,
    ) -> Result<Vec<Activity>, RpcError>;
}

pub type SharedApi = Arc<dyn NarrowcastApi>;
pub type SharedRoomServices = Arc<dyn RoomServices>;
