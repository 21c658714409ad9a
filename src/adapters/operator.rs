//! Operator adapters: where the per-cycle start signal comes from.
//!
//! [`ConsoleOperator`] prompts on a writer and reads one line: `q`
//! quits, anything else (including an empty line) proceeds.  End of
//! input quits too, so a closed terminal never leaves the rig cycling.
//! [`AutoOperator`] always proceeds; the cycle limit stops it.
//!
//! Given the orchestrator's stop flag, the console prompt also answers
//! quit once an interrupt has been raised, whatever the line said.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::app::ports::{OperatorPort, StartSignal};

/// Interactive prompt over any line-oriented reader/writer pair.
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
    stop: Option<Arc<AtomicBool>>,
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            stop: None,
        }
    }

    /// Quit instead of proceeding once `stop` is raised.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|s| s.load(Ordering::SeqCst))
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> OperatorPort for ConsoleOperator<R, W> {
    fn await_start(&mut self, prompt: &str) -> StartSignal {
        if self.stop_requested() {
            return StartSignal::Quit;
        }
        if let Err(e) = writeln!(self.output, "{prompt}").and_then(|()| self.output.flush()) {
            warn!("operator prompt not shown: {}", e);
        }

        let mut line = String::new();
        let read = self.input.read_line(&mut line);
        if self.stop_requested() {
            return StartSignal::Quit;
        }
        match read {
            Ok(0) => StartSignal::Quit,
            Ok(_) if line.trim_start().starts_with('q') => StartSignal::Quit,
            Ok(_) => StartSignal::Proceed,
            Err(e) => {
                warn!("operator input failed: {}", e);
                StartSignal::Quit
            }
        }
    }
}

/// Unattended operation: every prompt is answered with proceed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoOperator;

impl OperatorPort for AutoOperator {
    fn await_start(&mut self, _prompt: &str) -> StartSignal {
        StartSignal::Proceed
    }
}
