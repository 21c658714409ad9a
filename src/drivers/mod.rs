//! Protocol drivers for the three serial peripherals.
//!
//! Each driver owns one [`CommandChannel`](crate::serial::CommandChannel)
//! and speaks that device's vocabulary; none of them knows about the
//! cycle or about the other devices.

pub mod actuator;
pub mod dispenser;
pub mod maestro;

pub use actuator::{ActuatorBoard, ActuatorCommand};
pub use dispenser::{DispenseOutcome, Dispenser};
pub use maestro::Maestro;
