//! Fuzz target: `DispenseOutcome::parse`
//!
//! Any status line must classify without panicking.  An unknown line
//! keeps its text minus exactly one trailing newline.
//!
//! cargo fuzz run fuzz_dispense_status

#![no_main]

use libfuzzer_sys::fuzz_target;
use photobooth::drivers::DispenseOutcome;

fuzz_target!(|data: &[u8]| {
    let body = data.strip_suffix(b"\n").unwrap_or(data);
    match DispenseOutcome::parse(data) {
        DispenseOutcome::Unexpected(text) => {
            assert_eq!(text, String::from_utf8_lossy(body));
        }
        known => {
            assert_eq!(body.len(), 1);
            let mut line = body.to_vec();
            line.push(b'\n');
            assert_eq!(DispenseOutcome::parse(&line), known);
        }
    }
});
