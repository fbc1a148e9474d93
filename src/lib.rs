//! Pulse-oximetry measurement firmware library.
//!
//! Exposes the pure-logic modules for integration testing and for the
//! host simulator. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod classify;
pub mod config;
pub mod error;
pub mod fsm;
pub mod http;
pub mod scheduler;
pub mod session;
pub mod stage;

pub mod adapters;
pub mod drivers;
pub mod sensors;
