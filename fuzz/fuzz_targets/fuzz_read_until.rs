//! Fuzz target: `CommandChannel::read_until`
//!
//! The first two bytes pick the length bound and poll budget; the rest
//! is the peer's byte stream, where `0xFF` stands for an empty poll.
//! The reader must never panic, never overrun its bounds, and never
//! sleep more than its budget.
//!
//! cargo fuzz run fuzz_read_until

#![no_main]

use std::io;

use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;
use photobooth::error::Device;
use photobooth::serial::framing::LinkTiming;
use photobooth::serial::{CommandChannel, REPLY_CAPACITY, Transport};

struct Stream<'a>(&'a [u8]);

impl Transport for Stream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.split_first() {
            Some((&b, rest)) => {
                self.0 = rest;
                if b == 0xFF {
                    return Ok(0);
                }
                buf[0] = b;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Polls(u32);

impl DelayNs for Polls {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_us(&mut self, _us: u32) {
        self.0 += 1;
    }
}

fuzz_target!(|data: &[u8]| {
    let [max_len, budget, stream @ ..] = data else {
        return;
    };
    let max_len = usize::from(*max_len);
    let budget = u32::from(*budget);

    let mut link = CommandChannel::new(
        Device::Dispenser,
        Stream(stream),
        Polls::default(),
        LinkTiming::default(),
    );
    let reply = link
        .read_until(b'\n', max_len, budget)
        .expect("in-memory reads never fail");

    assert!(reply.bytes.len() <= max_len.min(REPLY_CAPACITY));
    assert!(reply.polls_used <= budget);
    assert_eq!(link.delay().0, reply.polls_used);
});
