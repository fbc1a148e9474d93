//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌────────────────┬──────────┬──────────┬──────────────────┐   │
//! │  │ StateId        │ on_enter │ on_exit  │ on_update        │   │
//! │  ├────────────────┼──────────┼──────────┼──────────────────┤   │
//! │  │ Idle           │ fn(ctx)  │ -        │ fn(ctx)->Option  │   │
//! │  │ AwaitingFinger │ fn(ctx)  │ -        │ fn(ctx)->Option  │   │
//! │  │ ...            │          │          │                  │   │
//! │  │ Cancelled *    │ fn(ctx)  │ -        │ fn(ctx)->Option  │   │
//! │  │ SensorFault    │ fn(ctx)  │ -        │ fn(ctx)->Option  │   │
//! │  └────────────────┴──────────┴──────────┴──────────────────┘   │
//! │                                          * transient           │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  A transient state has its `on_update` run on the
//! same tick it is entered, so it never survives into the next tick.
//!
//! Handlers that wait do so through [`crate::scheduler`], which keeps
//! the control surface serviced, so a single `on_update` may span many
//! scheduler ticks.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

use crate::app::events::AppEvent;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all measurement states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    AwaitingFinger = 1,
    Greeting = 2,
    Countdown = 3,
    Sampling = 4,
    Averaging = 5,
    ResultHold = 6,
    Cancelled = 7,
    SensorFault = 8,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 9;

    pub const ALL: [StateId; Self::COUNT] = [
        Self::Idle,
        Self::AwaitingFinger,
        Self::Greeting,
        Self::Countdown,
        Self::Sampling,
        Self::Averaging,
        Self::ResultHold,
        Self::Cancelled,
        Self::SensorFault,
    ];

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(&id) => id,
            None => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AwaitingFinger => "AwaitingFinger",
            Self::Greeting => "Greeting",
            Self::Countdown => "Countdown",
            Self::Sampling => "Sampling",
            Self::Averaging => "Averaging",
            Self::ResultHold => "ResultHold",
            Self::Cancelled => "Cancelled",
            Self::SensorFault => "SensorFault",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext<'_, '_>);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext<'_, '_>) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
    /// Run `on_update` immediately on entry instead of waiting a tick.
    pub transient: bool,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]).  The
/// [`FsmContext`] is rebuilt by the caller for every call, borrowing the
/// session and the adapters for that call only.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(table.iter().enumerate().all(|(i, d)| d.id as usize == i));
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext<'_, '_>) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.session.set_state(self.current_state());
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    /// 3. While the new state is transient, repeat from 1.
    pub fn tick(&mut self, ctx: &mut FsmContext<'_, '_>) {
        // Bounded: a chain of transient states cannot be longer than the table.
        for _ in 0..StateId::COUNT {
            let Some(next_id) = (self.table[self.current].on_update)(ctx) else {
                return;
            };
            self.transition(next_id, ctx);

            if !self.table[self.current].transient {
                return;
            }
        }
    }

    /// Force an immediate transition regardless of what `on_update` would
    /// return (boot-time sensor fault).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext<'_, '_>) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext<'_, '_>) {
        let prev_id = self.current_state();
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.session.set_state(next_id);
        ctx.emit(AppEvent::StateChanged {
            from: prev_id,
            to: next_id,
        });

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
