//! Framed command channel.
//!
//! Wire conventions shared by the three peripherals:
//! ```text
//!  text:    ──▶ "S\n"                ◀── "S\n"           (echo ack)
//!           ──▶ "F"                  ◀── "ok\n" … "f\n"  (ack, later status)
//!  binary:  ──▶ 90 ch                ◀── lo hi           (fixed length)
//!           ──▶ 84 ch lo7 hi7                            (no reply)
//! ```
//!
//! Reads are a busy-poll: one non-blocking single-byte read per
//! iteration, with one poll-interval sleep and one budget decrement per
//! *empty* read.  The budget is a count of polls, not a deadline, so the
//! bound holds whatever the poll interval is.

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::config::Timing;
use crate::error::{Device, ProtocolError};

use super::transport::Transport;

/// Hard capacity of a reply buffer.
pub const REPLY_CAPACITY: usize = 128;

/// Default maximum reply length for text commands.
pub const DEFAULT_MAX_LEN: usize = 100;

/// Terminator of every text reply.
pub const LINE_DELIMITER: u8 = b'\n';

/// How a [`CommandChannel::read_until`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The delimiter was received (and is the last byte).
    Delimited,
    /// `max_len` bytes arrived without a delimiter.
    Full,
    /// The poll budget ran out; bytes hold whatever arrived.
    TimedOut,
}

/// Bytes collected by one read, bounded by [`REPLY_CAPACITY`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub bytes: heapless::Vec<u8, REPLY_CAPACITY>,
    pub outcome: ReadOutcome,
    /// Empty polls spent (each one slept one interval).
    pub polls_used: u32,
}

impl Reply {
    /// Lossy text view for diagnostics and literal comparison.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn timed_out(&self) -> bool {
        self.outcome == ReadOutcome::TimedOut
    }
}

/// Poll and settle parameters for one channel, taken from [`Timing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub poll_interval_us: u32,
    pub reply_budget_polls: u32,
    pub flush_settle_ms: u32,
}

impl From<&Timing> for LinkTiming {
    fn from(t: &Timing) -> Self {
        Self {
            poll_interval_us: t.poll_interval_us,
            reply_budget_polls: t.reply_budget_polls,
            flush_settle_ms: t.flush_settle_ms,
        }
    }
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self::from(&Timing::default())
    }
}

/// A transport plus the delay source used for polling and settling.
pub struct CommandChannel<T, D> {
    device: Device,
    port: T,
    delay: D,
    timing: LinkTiming,
}

impl<T: Transport, D: DelayNs> CommandChannel<T, D> {
    pub fn new(device: Device, port: T, delay: D, timing: LinkTiming) -> Self {
        Self {
            device,
            port,
            delay,
            timing,
        }
    }

    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    /// Borrow the underlying transport (test harnesses inspect it).
    pub fn transport(&self) -> &T {
        &self.port
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Sleep for a physical settle delay.
    pub fn settle_ms(&mut self, ms: u32) {
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    // ── Reads ─────────────────────────────────────────────────

    /// Collect bytes until `delimiter`, `max_len` bytes, or `budget`
    /// empty polls.
    ///
    /// Never returns more than `min(max_len, REPLY_CAPACITY)` bytes and
    /// never sleeps more than `budget` poll intervals.  A transport read
    /// error is returned immediately as [`ProtocolError::Io`].
    pub fn read_until(
        &mut self,
        delimiter: u8,
        max_len: usize,
        budget: u32,
    ) -> Result<Reply, ProtocolError> {
        let max_len = max_len.min(REPLY_CAPACITY);
        let mut bytes = heapless::Vec::new();
        let mut remaining = budget;
        let mut byte = [0u8; 1];

        let outcome = if max_len == 0 {
            ReadOutcome::Full
        } else {
            loop {
                if self.port.read(&mut byte)? == 0 {
                    if remaining == 0 {
                        break ReadOutcome::TimedOut;
                    }
                    self.delay.delay_us(self.timing.poll_interval_us);
                    remaining -= 1;
                    if remaining == 0 {
                        break ReadOutcome::TimedOut;
                    }
                    continue;
                }

                // len < max_len <= capacity, so this never fills up.
                if bytes.push(byte[0]).is_err() {
                    break ReadOutcome::Full;
                }
                if byte[0] == delimiter {
                    break ReadOutcome::Delimited;
                }
                if bytes.len() >= max_len {
                    break ReadOutcome::Full;
                }
            }
        };

        let reply = Reply {
            bytes,
            outcome,
            polls_used: budget - remaining,
        };
        debug!(
            "{} <- {:02X?} ({:?}, {} polls)",
            self.device, reply.bytes, reply.outcome, reply.polls_used
        );
        Ok(reply)
    }

    /// One newline-terminated line with the given poll budget.
    pub fn read_line(&mut self, budget: u32) -> Result<Reply, ProtocolError> {
        self.read_until(LINE_DELIMITER, DEFAULT_MAX_LEN, budget)
    }

    /// Exactly `N` bytes of a binary reply.  Anything less within the
    /// budget is [`ProtocolError::ShortRead`].
    pub fn read_exact<const N: usize>(&mut self, budget: u32) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        let mut got = 0;
        let mut remaining = budget;

        while got < N {
            let n = self.port.read(&mut out[got..])?;
            if n == 0 {
                if remaining == 0 {
                    debug!("{} <- {:02X?} (short)", self.device, &out[..got]);
                    return Err(ProtocolError::ShortRead { got, expected: N });
                }
                self.delay.delay_us(self.timing.poll_interval_us);
                remaining -= 1;
                continue;
            }
            got += n;
        }

        debug!("{} <- {:02X?}", self.device, out);
        Ok(out)
    }

    // ── Writes ────────────────────────────────────────────────

    /// Write `data` in one call.  A short write is fatal.
    pub fn send_raw(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let written = self.port.write(data)?;
        if written != data.len() {
            return Err(ProtocolError::ShortWrite {
                written,
                expected: data.len(),
            });
        }
        self.port.flush()?;
        debug!("{} -> {:02X?}", self.device, data);
        Ok(())
    }

    /// Drop stale input so the next read sees only the next reply.
    pub fn discard_input(&mut self) -> Result<(), ProtocolError> {
        self.port.discard_buffers()?;
        Ok(())
    }

    // ── Exchanges ─────────────────────────────────────────────

    /// Flush, send `message`, wait `settle_ms`, then require the next
    /// line to equal `expected` byte for byte (delimiter included).
    ///
    /// A mismatch flushes input again and returns the recoverable
    /// [`ProtocolError::UnexpectedReply`].  A reply that never completes
    /// within the reply budget is [`ProtocolError::TimedOut`].
    pub fn send_and_expect(
        &mut self,
        message: &[u8],
        expected: &[u8],
        settle_ms: u32,
    ) -> Result<(), ProtocolError> {
        self.discard_input()?;
        self.settle_ms(self.timing.flush_settle_ms);

        self.send_raw(message)?;
        self.settle_ms(settle_ms);

        let reply = self.read_line(self.timing.reply_budget_polls)?;
        if reply.timed_out() {
            return Err(ProtocolError::TimedOut {
                budget: self.timing.reply_budget_polls,
                partial: reply.text(),
            });
        }

        if reply.bytes.as_slice() == expected {
            return Ok(());
        }

        self.discard_input()?;
        Err(ProtocolError::UnexpectedReply(reply.text()))
    }
}
