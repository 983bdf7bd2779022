//! Amelie Narrowcast
//!
//! Headless display service for the student association's screens. It polls
//! the association website's JSON-RPC API and room endpoints, keeps a view
//! model per page and serves it over HTTP and Server-Sent Events.
//!
//! This library provides:
//! - The narrowcasting widget scheduler with photo and promotion widgets
//! - TV and room dashboards (countdown, pictures, room duty, PCs, now playing)
//! - The point-of-sale kiosk with shopping cart and RFID login
//! - A WebSocket bridge for the RFID reader
//! - Layout of the do-group family tree

pub mod adapters;
pub mod api;
pub mod bus;
pub mod collection;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod fetch;
pub mod members;
pub mod pages;
pub mod pos;
pub mod preload;
pub mod rpc;
pub mod scheduler;
pub mod ui;
pub mod widgets;

#[cfg(test)]
mod testing;
