//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern, one row per cycle state:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                     │
//! │  ┌───────────────┬───────────┬──────────┬──────────────────────┐ │
//! │  │ StateId       │ on_enter  │ on_exit  │ on_update            │ │
//! │  ├───────────────┼───────────┼──────────┼──────────────────────┤ │
//! │  │ Idle          │ -         │ -        │ fn(ctx)->Result<Opt> │ │
//! │  │ AwaitingStart │ -         │ -        │ fn(ctx)->Result<Opt> │ │
//! │  │ ...           │           │          │                      │ │
//! │  │ Cleanup       │ fn(ctx)   │ -        │ fn(ctx)->Result<Opt> │ │
//! │  │ Terminated    │ fn(ctx)   │ -        │ fn(ctx)->Result<Opt> │ │
//! │  └───────────────┴───────────┴──────────┴──────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! `Ok(Some(next))` runs `on_exit` for the current state, then
//! `on_enter` for the next.  An `Err` from any handler is recorded as the
//! run's fault and the engine forces a transition to `Cleanup`, so every
//! exit path passes through the rig's safe resting configuration.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{error, info};

use crate::app::events::CycleEvent;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all cycle states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    AwaitingStart = 1,
    GateClosing = 2,
    VaneAdvancing = 3,
    Capturing = 4,
    VaneReturning = 5,
    GateOpening = 6,
    PumpRunning = 7,
    Cleanup = 8,
    Terminated = 9,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 10;

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Cleanup` in release (safe fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::AwaitingStart,
            2 => Self::GateClosing,
            3 => Self::VaneAdvancing,
            4 => Self::Capturing,
            5 => Self::VaneReturning,
            6 => Self::GateOpening,
            7 => Self::PumpRunning,
            8 => Self::Cleanup,
            9 => Self::Terminated,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Cleanup
            }
        }
    }

    /// States from which a failure does not re-enter `Cleanup`.
    pub fn is_shutdown(self) -> bool {
        matches!(self, Self::Cleanup | Self::Terminated)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter`.  Runs once per transition into the state.
pub type StateEnterFn = fn(&mut FsmContext<'_>) -> Result<()>;

/// Signature for `on_exit`.  Infallible.
pub type StateExitFn = fn(&mut FsmContext<'_>);

/// Signature for the per-tick update handler.
/// Returns `Ok(Some(next))` to trigger a transition, `Ok(None)` to stay.
pub type StateUpdateFn = fn(&mut FsmContext<'_>) -> Result<Option<StateId>>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateEnterFn>,
    pub on_exit: Option<StateExitFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and per-state entry counters.  The mutable
/// [`FsmContext`] is threaded through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// How many times each state has been entered.
    entries: [u32; StateId::COUNT],
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table out of order"
        );
        Self {
            table,
            current: initial as usize,
            entries: [0; StateId::COUNT],
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext<'_>) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        self.entries[self.current] += 1;
        ctx.emit(CycleEvent::Started(self.current_state()));
        if let Some(enter) = self.table[self.current].on_enter {
            if let Err(e) = enter(ctx) {
                self.fail(e, ctx);
            }
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. `Ok(Some(next))`: `on_exit(current)` → update pointer → `on_enter(next)`.
    /// 3. `Err(e)`: record the fault and force `Cleanup`.
    pub fn tick(&mut self, ctx: &mut FsmContext<'_>) {
        if self.is_terminated() {
            return;
        }

        match (self.table[self.current].on_update)(ctx) {
            Ok(Some(next_id)) => self.transition(next_id, ctx),
            Ok(None) => {}
            Err(e) => self.fail(e, ctx),
        }
    }

    /// Force an immediate transition regardless of what `on_update`
    /// would return.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext<'_>) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn is_terminated(&self) -> bool {
        self.current_state() == StateId::Terminated
    }

    /// How many times `state` has been entered (the initial state counts).
    pub fn entries(&self, state: StateId) -> u32 {
        self.entries[state as usize]
    }

    pub fn entry_counts(&self) -> [u32; StateId::COUNT] {
        self.entries
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext<'_>) {
        let prev = self.current_state();
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        // Update pointer and timing
        self.current = next_idx;
        self.entries[next_idx] += 1;
        ctx.emit(CycleEvent::StateChanged {
            from: prev,
            to: next_id,
        });

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            if let Err(e) = enter(ctx) {
                self.fail(e, ctx);
            }
        }
    }

    fn fail(&mut self, err: Error, ctx: &mut FsmContext<'_>) {
        let state = self.current_state();
        error!("{} failed: {}", self.table[self.current].name, err);
        ctx.record_fault(err);
        if !state.is_shutdown() {
            self.transition(StateId::Cleanup, ctx);
        }
    }
}
