//! Insect photobooth controller library.
//!
//! Exposes the serial protocol stack, the cycle FSM and the adapters so
//! the binary and the integration tests drive the same code.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod serial;

pub mod adapters;
pub mod drivers;
