//! Application core: cycle logic, zero direct I/O.
//!
//! The orchestration rules for the photobooth live here and in
//! [`crate::fsm`].  All interaction with the rig happens through the
//! **port traits** in [`ports`], keeping this layer testable without
//! real peripherals.

pub mod events;
pub mod ports;
pub mod service;
