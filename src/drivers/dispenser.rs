//! Pneumatic specimen dispenser driver.
//!
//! ```text
//!  host                         dispenser
//!   │── "I" ───────────────────────▶│  mechanism resets (~1.5 s)
//!   │◀──────────────────── "ok\n" ──│
//!   │── "F" ───────────────────────▶│
//!   │◀──────────────────── "ok\n" ──│  immediate ack
//!   │              ...  up to ~20 s │
//!   │◀───────────── "f\n"|"t\n"|"n\n"  status of the physical event
//! ```
//!
//! The status line is a separate read with its own, much larger poll
//! budget.  When that budget runs out the outcome is
//! [`DispenseOutcome::Timeout`], the same as the dispenser reporting `t`.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::error::ProtocolError;
use crate::serial::{CommandChannel, Transport};

const INIT: &[u8] = b"I";
const DISPENSE: &[u8] = b"F";
const VERSION: &[u8] = b"V";
const ACK: &[u8] = b"ok\n";

/// Result of one dispense attempt, from the dispenser's status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispenseOutcome {
    /// `f`: a specimen left the dispenser and was detected.
    Dispensed,
    /// `t`: the dispenser gave up, or no status arrived within budget.
    Timeout,
    /// `n`: something was released but the sensor saw nothing.
    NoDetect,
    /// Any other line, with the trailing newline stripped.
    Unexpected(String),
}

impl DispenseOutcome {
    /// Classify one status line.  Total over all inputs.
    pub fn parse(line: &[u8]) -> Self {
        let body = line.strip_suffix(b"\n").unwrap_or(line);
        match body {
            b"f" => Self::Dispensed,
            b"t" => Self::Timeout,
            b"n" => Self::NoDetect,
            other => Self::Unexpected(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

pub struct Dispenser<T, D> {
    link: CommandChannel<T, D>,
    ack_settle_ms: u32,
    init_settle_ms: u32,
    status_budget: u32,
}

impl<T: Transport, D: DelayNs> Dispenser<T, D> {
    pub fn new(
        link: CommandChannel<T, D>,
        ack_settle_ms: u32,
        init_settle_ms: u32,
        status_budget: u32,
    ) -> Self {
        Self {
            link,
            ack_settle_ms,
            init_settle_ms,
            status_budget,
        }
    }

    /// Reset the mechanism.  Callers decide whether an
    /// [`ProtocolError::UnexpectedReply`] is worth a retry.
    pub fn initialize(&mut self) -> Result<(), ProtocolError> {
        self.link.send_and_expect(INIT, ACK, self.init_settle_ms)?;
        info!("dispenser initialised");
        Ok(())
    }

    /// Send `F` and require the immediate `ok`.
    pub fn request_dispense(&mut self) -> Result<(), ProtocolError> {
        self.link.send_and_expect(DISPENSE, ACK, self.ack_settle_ms)
    }

    /// Wait for the delayed status line.
    pub fn await_status(&mut self) -> Result<DispenseOutcome, ProtocolError> {
        let reply = self.link.read_line(self.status_budget)?;
        if reply.timed_out() {
            warn!(
                "dispenser status not received within {} polls (partial {:?})",
                self.status_budget,
                reply.text()
            );
            return Ok(DispenseOutcome::Timeout);
        }
        let outcome = DispenseOutcome::parse(&reply.bytes);
        debug!("dispense status {:?}", outcome);
        Ok(outcome)
    }

    /// One complete dispense: request, acknowledgement, status.
    pub fn dispense(&mut self) -> Result<DispenseOutcome, ProtocolError> {
        self.request_dispense()?;
        self.await_status()
    }

    /// Firmware version line, trimmed.
    pub fn version(&mut self) -> Result<String, ProtocolError> {
        self.link.discard_input()?;
        self.link.send_raw(VERSION)?;
        self.link.settle_ms(self.ack_settle_ms);
        let budget = self.link.timing().reply_budget_polls;
        let reply = self.link.read_line(budget)?;
        if reply.timed_out() {
            return Err(ProtocolError::TimedOut {
                budget,
                partial: reply.text(),
            });
        }
        Ok(reply.text().trim().to_owned())
    }

    pub fn link(&self) -> &CommandChannel<T, D> {
        &self.link
    }
}
