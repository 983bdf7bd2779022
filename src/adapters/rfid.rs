//! RFID reader bridge.
//!
//! The card reader software on the kiosk serves every scan as a JSON text
//! frame `{"atqa": "00:04", "sak": "08", "uid": "..."}` over a local
//! WebSocket. Scans are turned into the website's card identifiers and put
//! on the bus.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::traits::{AdapterContext, AdapterLogic};
use crate::bus::{BusEvent, SharedBus};
use crate::config::RfidConfig;

#[derive(Debug, Error, PartialEq)]
pub enum RfidError {
    #[error("invalid rfid message: {0}")]
    InvalidMessage(String),

    #[error("atqa/sak combination unknown: {atqa}/{sak}")]
    UnknownCard { atqa: String, sak: String },
}

/// One card as reported by the reader
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RfidScan {
    pub atqa: String,
    pub sak: String,
    pub uid: String,
}

/// Card type prefix followed by the UID, e.g. `"02,04a2b3c4"`
pub fn to_identifier(scan: &RfidScan) -> Result<String, RfidError> {
    let prefix = match (scan.atqa.as_str(), scan.sak.as_str()) {
        // MIFARE Classic 1k
        ("00:04", "08") => "02",
        // MIFARE Classic 4k
        ("00:02", "18") => "03",
        // MIFARE DESFire
        ("03:44", "20") => "04",
        // MIFARE Ultralight
        ("00:44", "00") => "05",
        _ => {
            return Err(RfidError::UnknownCard {
                atqa: scan.atqa.clone(),
                sak: scan.sak.clone(),
            })
        }
    };
    Ok(format!("{},{}", prefix, scan.uid))
}

pub fn parse_message(text: &str) -> Result<RfidScan, RfidError> {
    serde_json::from_str(text).map_err(|e| RfidError::InvalidMessage(e.to_string()))
}

/// Publish the outcome of one text frame
fn publish_scan(bus: &SharedBus, text: &str) {
    match parse_message(text).and_then(|scan| to_identifier(&scan)) {
        Ok(identifier) => {
            info!(identifier = %identifier, "Card scanned");
            bus.publish(BusEvent::CardScanned { identifier });
        }
        Err(e) => {
            warn!("Rejected scan: {}", e);
            bus.publish(BusEvent::CardRejected {
                reason: e.to_string(),
            });
        }
    }
}

pub struct RfidBridge {
    url: String,
    subprotocol: Option<String>,
}

impl RfidBridge {
    pub fn new(config: &RfidConfig) -> Self {
        Self {
            url: config.url.clone(),
            subprotocol: config.subprotocol.clone(),
        }
    }

    fn request(&self) -> Result<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        // Some reader builds refuse connections without their protocol
        if let Some(protocol) = &self.subprotocol {
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_str(protocol)?);
        }
        Ok(request)
    }
}

#[async_trait]
impl AdapterLogic for RfidBridge {
    fn prefix(&self) -> &'static str {
        crate::coordinator::RFID_TASK
    }

    async fn run(&self, ctx: AdapterContext) -> Result<()> {
        let (mut stream, _) = tokio_tungstenite::connect_async(self.request()?).await?;
        info!(url = %self.url, "Connected to RFID reader");

        loop {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => return Ok(()),
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => publish_scan(&ctx.bus, &text),
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(anyhow!("RFID reader closed the connection"));
                    }
                    Some(Ok(other)) => debug!("Ignoring RFID frame: {:?}", other),
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
    }
}
