//! Escapebot control-core library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. Hardware reaches the core only through the port traits in
//! [`app::ports`] and the narrow atomic handles in [`signal`], [`sampling`]
//! and [`app::commands`], so the whole crate builds and tests on the host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod direction;
pub mod fsm;
pub mod motor;
pub mod sampling;
pub mod signal;
pub mod threat;
