//! Cooperative scheduler: explicit suspension points.
//!
//! There is one thread and no preemption.  Anything that has to wait
//! (greeting dwell, countdown, the next sensor sample, the result hold)
//! does so through [`suspend_until`], which keeps the control surface
//! alive while the caller is parked:
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        │ 1. service_pending()   ◀── one HTTP request  │
//!        │ 2. cancel_requested()? ──▶ Cancelled         │
//!        │ 3. poll()  Ready(v)    ──▶ Done(v)           │
//!        │ 4. elapsed >= max?     ──▶ TimedOut          │
//!        │ 5. yield_for(tick_ms)  ◀── watchdog, netif   │
//!        └──────────────────────┬───────────────────────┘
//!                               └── loop
//! ```
//!
//! The loop never spends more than one tick between two visits to step 1.

use core::convert::Infallible;

use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Cooperation contract
// ═══════════════════════════════════════════════════════════════

/// What a waiter needs from its surroundings.  The FSM context implements
/// this; tests implement it with fake time.
pub trait Cooperate {
    /// Service at most one pending control request.  Returns whether one
    /// was served.
    fn service_pending(&mut self) -> bool;

    /// Whether the session has an outstanding cancellation.
    fn cancel_requested(&self) -> bool;

    /// Monotonic milliseconds.
    fn now_ms(&self) -> u64;

    /// Give the rest of the system `ms` milliseconds.
    fn yield_for(&mut self, ms: u32);

    /// Scheduler whose tick and statistics this waiter uses.
    fn scheduler(&mut self) -> &mut CooperativeScheduler;
}

/// Result of one poll inside a suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    Pending,
    Ready(T),
}

/// How a suspension ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspended<T> {
    Done(T),
    Cancelled,
    TimedOut,
}

/// A dwell was cut short by a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Passes through the suspension loop.
    pub iterations: u64,
    /// Control requests served from inside a suspension.
    pub services: u64,
}

pub struct CooperativeScheduler {
    tick_ms: u32,
    stats: SchedulerStats,
}

impl CooperativeScheduler {
    pub fn new(tick_ms: u32) -> Self {
        Self {
            tick_ms: tick_ms.max(1),
            stats: SchedulerStats::default(),
        }
    }

    pub fn tick_ms(&self) -> u32 {
        self.tick_ms
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

/// Park the caller until `poll` is ready, the session is cancelled, or
/// `max_ms` elapses (`None` waits indefinitely).
pub fn suspend_until<C, T, F>(coop: &mut C, max_ms: Option<u32>, mut poll: F) -> Suspended<T>
where
    C: Cooperate + ?Sized,
    F: FnMut(&mut C) -> Step<T>,
{
    let started = coop.now_ms();
    let tick = coop.scheduler().tick_ms();

    loop {
        coop.scheduler().stats.iterations += 1;

        if coop.service_pending() {
            coop.scheduler().stats.services += 1;
        }

        if coop.cancel_requested() {
            debug!("suspension cancelled after {} ms", coop.now_ms() - started);
            return Suspended::Cancelled;
        }

        if let Step::Ready(value) = poll(coop) {
            return Suspended::Done(value);
        }

        if let Some(max) = max_ms {
            if coop.now_ms().saturating_sub(started) >= u64::from(max) {
                return Suspended::TimedOut;
            }
        }

        coop.yield_for(tick);
    }
}

/// Cooperative fixed-duration wait.
pub fn dwell<C: Cooperate + ?Sized>(coop: &mut C, ms: u32) -> Result<(), Interrupted> {
    match suspend_until(coop, Some(ms), |_| Step::<Infallible>::Pending) {
        Suspended::TimedOut => Ok(()),
        Suspended::Cancelled => Err(Interrupted),
        Suspended::Done(never) => match never {},
    }
}
