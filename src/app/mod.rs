//! Application layer: ports, commands, and the foreground control
//! service that wires the FSM to its adapters.

pub mod commands;
pub mod ports;
pub mod service;
