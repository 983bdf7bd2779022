//! JSON-RPC 2.0 client for the website API endpoint

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::error::RpcError;
use super::models::{Activity, Banner, NewsItem, RoomDuty, TelevisionPromotion};
use super::NarrowcastApi;

pub struct JsonRpcClient {
    client: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// `base_url` is the website root, `api_path` the RPC endpoint below it
    pub fn new(base_url: &str, api_path: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_path))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, api_path: &str) -> Self {
        let endpoint = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            api_path.trim_start_matches('/')
        );
        Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call `method` with positional `params` and decode its `result`
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method = %method, id, params = %body["params"], "RPC request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RpcError::Status(response.status()));
        }

        let bytes = response.bytes().await?;
        let mut data: Value = serde_json::from_slice(&bytes)?;

        if let Some(error) = data.get("error") {
            if !error.is_null() {
                let message = error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(RpcError::Remote(message));
            }
        }

        let result = match data.get_mut("result") {
            Some(result) => result.take(),
            None => return Err(RpcError::MissingResult),
        };

        debug!(method = %method, id, "RPC response");

        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl NarrowcastApi for JsonRpcClient {
    async fn get_banners(&self) -> Result<Vec<Banner>, RpcError> {
        self.call("getBanners", json!([])).await
    }

    async fn get_upcoming_activities(
        &self,
        count: u32,
        include_dutch: Option<bool>,
    ) -> Result<Vec<Activity>, RpcError> {
        let params = match include_dutch {
            Some(flag) => json!([count, flag]),
            None => json!([count]),
        };
        self.call("getUpcomingActivities", params).await
    }

    async fn get_news(&self, count: u32, published_only: bool) -> Result<Vec<NewsItem>, RpcError> {
        self.call("getNews", json!([count, published_only])).await
    }

    async fn get_latest_activities_with_pictures(
        &self,
        count: u32,
    ) -> Result<Vec<Activity>, RpcError> {
        self.call("getLatestActivitiesWithPictures", json!([count]))
            .await
    }

    async fn get_historic_activities_with_pictures(
        &self,
        start: &str,
        end: &str,
        count: u32,
    ) -> Result<Vec<Activity>, RpcError> {
        self.call(
            "getHistoricActivitiesWithPictures",
            json!([start, end, count]),
        )
        .await
    }

    async fn get_television_promotions(&self) -> Result<Vec<TelevisionPromotion>, RpcError> {
        self.call("getTelevisionPromotions", json!([])).await
    }

    async fn get_room_duty_today(&self) -> Result<Vec<RoomDuty>, RpcError> {
        self.call("getRoomDutyToday", json!([])).await
    }

    async fn get_activity_stream(
        &self,
        start: &str,
        end: &str,
        include_unpublished: bool,
    ) -> Result<Vec<Activity>, RpcError> {
        self.call("getActivityStream", json!([start, end, include_unpublished]))
            .await
    }
}
