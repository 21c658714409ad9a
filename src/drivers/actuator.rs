//! Actuator / lighting controller driver.
//!
//! One microcontroller switches the booth lights, steps the vane
//! stepper and runs the transfer pump.  Every command is a single ASCII
//! letter plus newline, acknowledged by echoing the same two bytes:
//!
//! | Command     | Sent   | Echo   |
//! |-------------|--------|--------|
//! | lights on   | `A\n`  | `A\n`  |
//! | lights off  | `a\n`  | `a\n`  |
//! | vane step   | `S\n`  | `S\n`  |
//! | stepper off | `s\n`  | `s\n`  |
//! | pump on     | `P\n`  | `P\n`  |
//! | pump off    | `p\n`  | `p\n`  |
//!
//! The vane step carries no direction.  The cam mechanism toggles, so
//! the same `S` both advances the vane and brings it back.

use embedded_hal::delay::DelayNs;

use crate::error::ProtocolError;
use crate::serial::{CommandChannel, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    LightsOn,
    LightsOff,
    VaneStep,
    StepperOff,
    PumpOn,
    PumpOff,
}

impl ActuatorCommand {
    pub const fn letter(self) -> u8 {
        match self {
            Self::LightsOn => b'A',
            Self::LightsOff => b'a',
            Self::VaneStep => b'S',
            Self::StepperOff => b's',
            Self::PumpOn => b'P',
            Self::PumpOff => b'p',
        }
    }

    /// The bytes sent, which are also the expected echo.
    pub const fn frame(self) -> [u8; 2] {
        [self.letter(), b'\n']
    }
}

pub struct ActuatorBoard<T, D> {
    link: CommandChannel<T, D>,
    settle_ms: u32,
}

impl<T: Transport, D: DelayNs> ActuatorBoard<T, D> {
    pub fn new(link: CommandChannel<T, D>, settle_ms: u32) -> Self {
        Self { link, settle_ms }
    }

    pub fn command(&mut self, cmd: ActuatorCommand) -> Result<(), ProtocolError> {
        let frame = cmd.frame();
        self.link.send_and_expect(&frame, &frame, self.settle_ms)
    }

    pub fn set_lights(&mut self, on: bool) -> Result<(), ProtocolError> {
        self.command(if on {
            ActuatorCommand::LightsOn
        } else {
            ActuatorCommand::LightsOff
        })
    }

    pub fn step_vane(&mut self) -> Result<(), ProtocolError> {
        self.command(ActuatorCommand::VaneStep)
    }

    pub fn stepper_off(&mut self) -> Result<(), ProtocolError> {
        self.command(ActuatorCommand::StepperOff)
    }

    pub fn set_pump(&mut self, on: bool) -> Result<(), ProtocolError> {
        self.command(if on {
            ActuatorCommand::PumpOn
        } else {
            ActuatorCommand::PumpOff
        })
    }

    pub fn link(&self) -> &CommandChannel<T, D> {
        &self.link
    }
}
