//! Servo controller driver (Pololu Maestro compact protocol).
//!
//! Wire format, targets in quarter-microseconds:
//! ```text
//!  GetPosition  ──▶ 0x90 ch              ◀── lo hi   position = lo + 256·hi
//!  SetTarget    ──▶ 0x84 ch t&0x7F (t>>7)&0x7F       (no reply)
//! ```
//!
//! The controller's serial mode must be "USB Dual Port".  This layer only
//! encodes; keeping targets inside the servo's travel is the caller's job
//! (see [`crate::config::Calibration`]).

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::error::ProtocolError;
use crate::serial::{CommandChannel, Transport};

pub const CMD_GET_POSITION: u8 = 0x90;
pub const CMD_SET_TARGET: u8 = 0x84;

/// Encode a SetTarget request.  Only the low 14 bits of `target` travel.
pub const fn encode_set_target(channel: u8, target: u16) -> [u8; 4] {
    [
        CMD_SET_TARGET,
        channel,
        (target & 0x7F) as u8,
        ((target >> 7) & 0x7F) as u8,
    ]
}

pub const fn encode_get_position(channel: u8) -> [u8; 2] {
    [CMD_GET_POSITION, channel]
}

/// Decode the two-byte little-endian position reply.
pub const fn decode_position(reply: [u8; 2]) -> u16 {
    reply[0] as u16 + 256 * reply[1] as u16
}

pub struct Maestro<T, D> {
    link: CommandChannel<T, D>,
    query_settle_ms: u32,
}

impl<T: Transport, D: DelayNs> Maestro<T, D> {
    pub fn new(link: CommandChannel<T, D>, query_settle_ms: u32) -> Self {
        Self {
            link,
            query_settle_ms,
        }
    }

    /// Current pulse width of `channel` in quarter-microseconds.
    pub fn get_position(&mut self, channel: u8) -> Result<u16, ProtocolError> {
        self.link.send_raw(&encode_get_position(channel))?;
        self.link.settle_ms(self.query_settle_ms);
        let budget = self.link.timing().reply_budget_polls;
        let reply = self.link.read_exact::<2>(budget)?;
        let position = decode_position(reply);
        debug!("servo ch{} at {} ({} us)", channel, position, position / 4);
        Ok(position)
    }

    pub fn set_target(&mut self, channel: u8, target: u16) -> Result<(), ProtocolError> {
        self.link.send_raw(&encode_set_target(channel, target))?;
        debug!("servo ch{} -> {} ({} us)", channel, target, target / 4);
        Ok(())
    }

    pub fn link(&self) -> &CommandChannel<T, D> {
        &self.link
    }
}
