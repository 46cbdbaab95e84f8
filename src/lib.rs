//! # Notifier Library
//!
//! Event fan-out from the message bus, in-app notification storage and the
//! Telegram channel activation handshake, plus the RPC surface over them.

pub mod auth;
pub mod bot;
pub mod bus;
pub mod clients;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handlers;
pub mod locale;
pub mod models;
pub mod notifications;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;
