//! Serial plumbing shared by every peripheral.
//!
//! ```text
//!  drivers (maestro / actuator / dispenser)
//!        │
//!        ▼
//!  framing::CommandChannel   read_until · send_and_expect · read_exact
//!        │
//!        ▼
//!  transport::Transport      non-blocking byte read / write / discard
//!        │
//!        ▼
//!  port::SerialChannel       raw 9600 8N1 character device
//! ```

pub mod framing;
pub mod port;
pub mod transport;

pub use framing::{CommandChannel, ReadOutcome, Reply, REPLY_CAPACITY};
pub use port::SerialChannel;
pub use transport::Transport;
