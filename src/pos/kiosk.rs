//! Kiosk session flow.
//!
//! ```text
//! Home --card--> Login --status ok--> Shop --checkout--> Success
//!   ^              |                    |                   |
//!   +--------------+---- timeout / cancel / error ---------+
//! ```
//!
//! Every way back to Home logs the website session out. The home screen
//! rotates upcoming activities and pictures of past ones.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::calculator::{Calculator, CalculatorKey};
use super::cart::{CartView, ShoppingCart};
use super::client::{LoginOutcome, LogoutReason, PosBackend, PosError};
use crate::bus::{BusEvent, PageKind, SharedBus};
use crate::collection::IndexCursor;
use crate::display::format::room_image_url;
use crate::display::view::ActivityRow;
use crate::display::SharedDisplay;
use crate::rpc::Activity;

const PAGE: PageKind = PageKind::Pos;

pub const ACTIVITY_INTERVAL: Duration = Duration::from_secs(20);
pub const PICTURE_INTERVAL: Duration = Duration::from_secs(10);
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub const LOGIN_CHECK_INTERVAL: Duration = Duration::from_secs(2);
pub const SHOP_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub const SUCCESS_TIMEOUT: Duration = Duration::from_secs(5);
pub const SUCCESS_FREE_WIN_TIMEOUT: Duration = Duration::from_secs(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum KioskScreen {
    Home,
    Login,
    Shop,
    Success { free_cookie: bool },
}

impl KioskScreen {
    pub fn name(&self) -> &'static str {
        match self {
            KioskScreen::Home => "home",
            KioskScreen::Login => "login",
            KioskScreen::Shop => "shop",
            KioskScreen::Success { .. } => "success",
        }
    }
}

#[derive(Debug, Error)]
pub enum KioskError {
    #[error("not possible on the {0} screen")]
    WrongScreen(&'static str),

    #[error("the shopping cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Backend(#[from] PosError),
}

/// A product as the shop page hands it over
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CartItem {
    pub product: i64,
    pub name: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
    /// Cents
    pub price: i64,
    #[serde(default)]
    pub image_url: String,
}

fn default_amount() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosPicture {
    pub image_url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeView {
    pub activity: Option<ActivityRow>,
    pub activity_index: usize,
    pub activity_count: usize,
    pub picture: Option<PosPicture>,
}

struct KioskSession {
    screen: KioskScreen,
    /// Bumped on every screen change; stale backend answers compare against it
    generation: u64,
    deadline: Option<Instant>,
    cart: ShoppingCart,
    calculators: HashMap<i64, Calculator>,
    activities: Vec<ActivityRow>,
    activity_cursor: IndexCursor,
    activity_changed: Instant,
    pictures: Vec<PosPicture>,
    picture_cursor: IndexCursor,
    picture_changed: Instant,
}

impl KioskSession {
    fn new(now: Instant) -> Self {
        Self {
            screen: KioskScreen::Home,
            generation: 0,
            deadline: None,
            cart: ShoppingCart::new(),
            calculators: HashMap::new(),
            activities: Vec::new(),
            activity_cursor: IndexCursor::default(),
            activity_changed: now,
            pictures: Vec::new(),
            picture_cursor: IndexCursor::default(),
            picture_changed: now,
        }
    }

    fn enter(&mut self, screen: KioskScreen, deadline: Option<Instant>) {
        debug!(from = self.screen.name(), to = screen.name(), "Kiosk screen");
        self.screen = screen;
        self.generation += 1;
        self.deadline = deadline;
    }

    fn require(&self, screen: KioskScreen) -> Result<(), KioskError> {
        if self.screen == screen {
            Ok(())
        } else {
            Err(KioskError::WrongScreen(self.screen.name()))
        }
    }

    fn home_view(&self) -> HomeView {
        HomeView {
            activity: self.activities.get(self.activity_cursor.index()).cloned(),
            activity_index: self.activity_cursor.index(),
            activity_count: self.activities.len(),
            picture: self.pictures.get(self.picture_cursor.index()).cloned(),
        }
    }
}

pub struct PosKiosk {
    session: RwLock<KioskSession>,
    backend: Arc<dyn PosBackend>,
    display: SharedDisplay,
    bus: SharedBus,
    media_url: String,
}

pub type SharedKiosk = Arc<PosKiosk>;

impl PosKiosk {
    pub fn new(
        backend: Arc<dyn PosBackend>,
        display: SharedDisplay,
        bus: SharedBus,
        media_url: String,
    ) -> Self {
        Self {
            session: RwLock::new(KioskSession::new(Instant::now())),
            backend,
            display,
            bus,
            media_url,
        }
    }

    pub async fn screen(&self) -> KioskScreen {
        self.session.read().await.screen
    }

    pub async fn cart(&self) -> CartView {
        self.session.read().await.cart.view()
    }

    /// Write every region of the kiosk to the display store
    pub async fn render(&self) {
        let (screen, cart, home) = {
            let session = self.session.read().await;
            (session.screen, session.cart.view(), session.home_view())
        };
        self.display.update(PAGE, "screen", &screen).await;
        self.display.update(PAGE, "cart", &cart).await;
        self.display.update(PAGE, "home", &home).await;
    }

    /// A card on the home screen starts a login
    pub async fn card_scanned(&self, identifier: &str, now: Instant) {
        let generation = {
            let mut session = self.session.write().await;
            if session.screen != KioskScreen::Home {
                debug!(screen = session.screen.name(), "Ignoring card outside the home screen");
                return;
            }
            session.enter(KioskScreen::Login, Some(now + LOGIN_TIMEOUT));
            session.generation
        };

        match self.backend.submit_rfid_login(&[identifier.to_string()]).await {
            Ok(()) => {
                info!(identifier, "RFID login submitted");
                self.bus.publish(BusEvent::LoginSubmitted {
                    identifier: identifier.to_string(),
                });
            }
            Err(e) => {
                warn!("RFID login failed: {}", e);
                let mut session = self.session.write().await;
                if session.generation == generation {
                    session.enter(KioskScreen::Home, None);
                }
            }
        }
        self.render().await;
    }

    /// Poll the website while a login is pending
    pub async fn check_login(&self, now: Instant) {
        let generation = {
            let session = self.session.read().await;
            if session.screen != KioskScreen::Login {
                return;
            }
            session.generation
        };

        let status = self.backend.login_status().await;
        if self.session.read().await.generation != generation {
            debug!("Login ended while its status was being checked");
            return;
        }

        match status {
            Ok(LoginOutcome::Pending) => {}
            Ok(LoginOutcome::LoggedIn) => {
                {
                    let mut session = self.session.write().await;
                    if session.generation != generation {
                        return;
                    }
                    session.cart.reset();
                    session.calculators.clear();
                    session.enter(KioskScreen::Shop, Some(now + SHOP_TIMEOUT));
                }
                info!("Kiosk login complete");
                self.render().await;
            }
            Ok(LoginOutcome::Error(message)) => {
                self.end_session(LogoutReason::Error(message)).await;
            }
            Err(PosError::NoStatusUrl) => warn!("Cannot check login status: {}", PosError::NoStatusUrl),
            Err(e) => {
                warn!("Login status check failed: {}", e);
                self.end_session(LogoutReason::Done).await;
            }
        }
    }

    /// Handle expired screens and rotate the home carousels
    pub async fn tick(&self, now: Instant) {
        let (home, expired) = {
            let mut session = self.session.write().await;
            let mut rotated = false;

            if session.activities.len() > 1 && now >= session.activity_changed + ACTIVITY_INTERVAL {
                session.activity_cursor.next();
                session.activity_changed = now;
                rotated = true;
            }
            if !session.pictures.is_empty() && now >= session.picture_changed + PICTURE_INTERVAL {
                session.picture_cursor.next();
                session.picture_changed = now;
                rotated = true;
            }

            let home = rotated.then(|| session.home_view());
            (home, session.deadline_passed(now))
        };

        if let Some(home) = home {
            self.display.update(PAGE, "home", &home).await;
        }
        if let Some(reason) = expired {
            self.end_session(reason).await;
        }
    }

    pub async fn cancel(&self) -> Result<(), KioskError> {
        let screen = self.screen().await;
        if screen == KioskScreen::Home {
            return Err(KioskError::WrongScreen(screen.name()));
        }
        self.end_session(LogoutReason::Cancelled).await;
        Ok(())
    }

    async fn end_session(&self, reason: LogoutReason) {
        info!(reason = reason.as_str(), "Ending kiosk session");
        if let Err(e) = self.backend.logout(&reason).await {
            warn!("Logout failed: {}", e);
        }
        {
            let mut session = self.session.write().await;
            session.cart.reset();
            session.calculators.clear();
            session.enter(KioskScreen::Home, None);
        }
        self.bus.publish(BusEvent::SessionExpired {
            reason: reason.as_str().to_string(),
        });
        self.render().await;
    }

    async fn with_cart<F>(&self, change: F) -> Result<CartView, KioskError>
    where
        F: FnOnce(&mut KioskSession),
    {
        let view = {
            let mut session = self.session.write().await;
            session.require(KioskScreen::Shop)?;
            change(&mut session);
            session.cart.view()
        };
        self.display.update(PAGE, "cart", &view).await;
        Ok(view)
    }

    pub async fn add_to_cart(&self, item: &CartItem) -> Result<CartView, KioskError> {
        self.with_cart(|s| {
            s.cart
                .add(item.product, &item.name, item.amount, item.price, &item.image_url)
        })
        .await
    }

    pub async fn remove_from_cart(&self, product: i64) -> Result<CartView, KioskError> {
        self.with_cart(|s| {
            s.cart.remove(product);
        })
        .await
    }

    pub async fn reset_cart(&self) -> Result<CartView, KioskError> {
        self.with_cart(|s| s.cart.reset()).await
    }

    /// Keypad press for `item`; `add` puts the typed amount in the cart
    pub async fn calculator(&self, item: &CartItem, key: CalculatorKey) -> Result<CartView, KioskError> {
        self.with_cart(|s| {
            let calculator = s.calculators.entry(item.product).or_default();
            if let Some(amount) = calculator.press(key) {
                s.cart
                    .add(item.product, &item.name, amount, item.price, &item.image_url);
            }
        })
        .await
    }

    pub async fn checkout(&self, now: Instant) -> Result<KioskScreen, KioskError> {
        let (payload, lines, generation) = {
            let session = self.session.read().await;
            session.require(KioskScreen::Shop)?;
            if session.cart.is_empty() {
                return Err(KioskError::EmptyCart);
            }
            (
                session.cart.checkout_payload(),
                session.cart.len(),
                session.generation,
            )
        };

        let outcome = self.backend.submit_checkout(&payload).await?;
        info!(lines, free_cookie = outcome.free_cookie, "Checkout submitted");
        self.bus.publish(BusEvent::CheckoutSubmitted { lines });

        let screen = KioskScreen::Success {
            free_cookie: outcome.free_cookie,
        };
        let timeout = if outcome.free_cookie {
            SUCCESS_FREE_WIN_TIMEOUT
        } else {
            SUCCESS_TIMEOUT
        };
        {
            let mut session = self.session.write().await;
            if session.generation != generation {
                warn!("Kiosk session ended during checkout");
                return Ok(session.screen);
            }
            session.cart.reset();
            session.enter(screen, Some(now + timeout));
        }
        self.render().await;
        Ok(screen)
    }

    /// One of `item`, bought straight away
    pub async fn insta_buy(&self, item: &CartItem, now: Instant) -> Result<KioskScreen, KioskError> {
        self.with_cart(|s| {
            s.cart.reset();
            s.cart.add(item.product, &item.name, 1, item.price, &item.image_url);
        })
        .await?;
        self.checkout(now).await
    }

    pub async fn next_activity(&self, now: Instant) -> HomeView {
        self.move_activity(now, |c| {
            c.next();
        })
        .await
    }

    pub async fn previous_activity(&self, now: Instant) -> HomeView {
        self.move_activity(now, |c| {
            c.previous();
        })
        .await
    }

    pub async fn select_activity(&self, index: usize, now: Instant) -> HomeView {
        self.move_activity(now, |c| {
            c.select(index);
        })
        .await
    }

    /// Manual moves restart the rotation timer
    async fn move_activity<F>(&self, now: Instant, step: F) -> HomeView
    where
        F: FnOnce(&mut IndexCursor),
    {
        let home = {
            let mut session = self.session.write().await;
            step(&mut session.activity_cursor);
            session.activity_changed = now;
            session.home_view()
        };
        self.display.update(PAGE, "home", &home).await;
        home
    }

    pub async fn apply_activities(&self, activities: &[Activity]) {
        let rows: Vec<ActivityRow> = activities
            .iter()
            .map(|a| ActivityRow::from_activity(a, &chrono::Local))
            .collect();
        let mut session = self.session.write().await;
        session.activity_cursor.set_len(rows.len());
        session.activities = rows;
    }

    /// One picture per activity, the first usable one
    pub async fn apply_pictures(&self, activities: &[Activity]) {
        let pictures: Vec<PosPicture> = activities
            .iter()
            .filter_map(|a| {
                let image_url = a
                    .images
                    .iter()
                    .find_map(|i| room_image_url(i, &self.media_url))?;
                Some(PosPicture {
                    image_url,
                    title: a.title.clone(),
                })
            })
            .collect();
        let mut session = self.session.write().await;
        session.picture_cursor.set_len(pictures.len());
        session.pictures = pictures;
    }
}

impl KioskSession {
    fn deadline_passed(&self, now: Instant) -> Option<LogoutReason> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        match self.screen {
            KioskScreen::Home => None,
            KioskScreen::Login | KioskScreen::Shop => Some(LogoutReason::Timeout),
            KioskScreen::Success { .. } => Some(LogoutReason::Done),
        }
    }
}
