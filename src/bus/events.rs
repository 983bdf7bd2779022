//! Event types carried on the display bus.
//!
//! Controllers publish region updates here after they change a page's view
//! model; the SSE endpoint forwards them to the browser shells, which then
//! re-fetch the affected page.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// PageKind - the page types this service drives
// =============================================================================

/// The page types driven by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Hallway TV with the photo/promotion scheduler, banners and news
    Narrowcast,
    /// Simple TV dashboard: clock and upcoming activities
    Tv,
    /// Room dashboard: countdown, pictures, room duty, PCs, now playing
    Room,
    /// Point-of-sale kiosk
    Pos,
}

impl PageKind {
    pub const ALL: [PageKind; 4] = [
        PageKind::Narrowcast,
        PageKind::Tv,
        PageKind::Room,
        PageKind::Pos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Narrowcast => "narrowcast",
            PageKind::Tv => "tv",
            PageKind::Room => "room",
            PageKind::Pos => "pos",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "narrowcast" => Ok(PageKind::Narrowcast),
            "tv" => Ok(PageKind::Tv),
            "room" => Ok(PageKind::Room),
            "pos" => Ok(PageKind::Pos),
            other => Err(format!("unknown page: {}", other)),
        }
    }
}

// =============================================================================
// BusEvent
// =============================================================================

/// Event types that can be published on the bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    // Display events
    /// A region of a page's view model changed. `sha` is the short content
    /// hash of the new region value.
    RegionUpdated {
        page: PageKind,
        region: String,
        sha: String,
    },

    // RFID events
    CardScanned { identifier: String },
    CardRejected { reason: String },

    // Room events
    JingleStarted,
    JingleFinished,

    // POS events
    LoginSubmitted { identifier: String },
    CheckoutSubmitted { lines: usize },
    SessionExpired { reason: String },

    // Lifecycle events
    PageStarted { page: PageKind },
    PageStopped { page: PageKind },
    AdapterStopped { adapter: String },
    ShuttingDown { reason: Option<String> },
}

impl BusEvent {
    /// Short event name, used in logs and as the SSE event type
    pub fn event_type(&self) -> &'static str {
        match self {
            BusEvent::RegionUpdated { .. } => "RegionUpdated",
            BusEvent::CardScanned { .. } => "CardScanned",
            BusEvent::CardRejected { .. } => "CardRejected",
            BusEvent::JingleStarted => "JingleStarted",
            BusEvent::JingleFinished => "JingleFinished",
            BusEvent::LoginSubmitted { .. } => "LoginSubmitted",
            BusEvent::CheckoutSubmitted { .. } => "CheckoutSubmitted",
            BusEvent::SessionExpired { .. } => "SessionExpired",
            BusEvent::PageStarted { .. } => "PageStarted",
            BusEvent::PageStopped { .. } => "PageStopped",
            BusEvent::AdapterStopped { .. } => "AdapterStopped",
            BusEvent::ShuttingDown { .. } => "ShuttingDown",
        }
    }

    /// The page this event concerns, if any
    pub fn page(&self) -> Option<PageKind> {
        match self {
            BusEvent::RegionUpdated { page, .. }
            | BusEvent::PageStarted { page }
            | BusEvent::PageStopped { page } => Some(*page),
            BusEvent::JingleStarted | BusEvent::JingleFinished => Some(PageKind::Room),
            BusEvent::LoginSubmitted { .. }
            | BusEvent::CheckoutSubmitted { .. }
            | BusEvent::SessionExpired { .. } => Some(PageKind::Pos),
            _ => None,
        }
    }

    pub fn is_lifecycle_event(&self) -> bool {
        matches!(
            self,
            BusEvent::PageStarted { .. }
                | BusEvent::PageStopped { .. }
                | BusEvent::AdapterStopped { .. }
                | BusEvent::ShuttingDown { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_page_kind_round_trips_through_str() {
        for kind in PageKind::ALL {
            assert_eq!(kind.as_str().parse::<PageKind>().unwrap(), kind);
        }
        assert!("kitchen".parse::<PageKind>().is_err());
    }

    #[test]
    fn test_region_updated_serialization() {
        let event = BusEvent::RegionUpdated {
            page: PageKind::Room,
            region: "countdown".to_string(),
            sha: "deadbeef".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RegionUpdated");
        assert_eq!(json["payload"]["page"], "room");
        assert_eq!(json["payload"]["region"], "countdown");
    }

    #[test]
    fn test_event_page_routing() {
        assert_eq!(BusEvent::JingleStarted.page(), Some(PageKind::Room));
        assert_eq!(
            BusEvent::CheckoutSubmitted { lines: 2 }.page(),
            Some(PageKind::Pos)
        );
        assert_eq!(
            BusEvent::CardScanned {
                identifier: "02,abc".into()
            }
            .page(),
            None
        );
        assert!(BusEvent::ShuttingDown { reason: None }.is_lifecycle_event());
        assert!(!BusEvent::JingleFinished.is_lifecycle_event());
    }
}
