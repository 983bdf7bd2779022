//! Point-of-sale kiosk: shopping cart, amount keypad, the website's POS
//! form endpoints and the session flow tying them together.

pub mod calculator;
pub mod cart;
pub mod client;
pub mod kiosk;

pub use calculator::{Calculator, CalculatorKey};
pub use cart::{CartEntryView, CartLine, CartView, ShoppingCart};
pub use client::{
    CheckoutOutcome, LoginOutcome, LoginStatus, LogoutReason, PosBackend, PosClient, PosError,
};
pub use kiosk::{CartItem, HomeView, KioskError, KioskScreen, PosKiosk, SharedKiosk};
