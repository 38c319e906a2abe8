//! Reusable phase barrier.
//!
//! N participants call [`PhaseBarrier::arrive_and_wait`]; all of them block until
//! the N-th arrives, then all are released and the barrier is ready for the next
//! phase. Waiters wait on a monotonically increasing phase number rather than a
//! boolean flag, so a participant that races ahead into the next phase can never
//! be confused with, or release, waiters of the previous one.

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    phase: u64,
}

/// Rendezvous point for a fixed number of threads.
///
/// # Examples
///
/// ```
/// use prometheus_concurrency::core::PhaseBarrier;
/// use std::sync::Arc;
/// use std::thread;
///
/// let barrier = Arc::new(PhaseBarrier::new(3));
/// let handles: Vec<_> = (0..3)
///     .map(|_| {
///         let barrier = Arc::clone(&barrier);
///         thread::spawn(move || {
///             barrier.arrive_and_wait();
///             barrier.arrive_and_wait().phase()
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     assert_eq!(handle.join().unwrap(), 1);
/// }
/// assert_eq!(barrier.phase(), 2);
/// ```
#[derive(Debug)]
pub struct PhaseBarrier {
    participants: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

/// Returned by [`PhaseBarrier::arrive_and_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    phase: u64,
    is_leader: bool,
}

impl BarrierWaitResult {
    /// The phase the caller arrived in.
    #[must_use]
    pub const fn phase(&self) -> u64 {
        self.phase
    }

    /// True for exactly one participant per phase: the one whose arrival
    /// completed it.
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        self.is_leader
    }
}

impl PhaseBarrier {
    /// Create a barrier for `participants` threads.
    ///
    /// # Panics
    ///
    /// Panics if `participants` is zero.
    #[must_use]
    pub fn new(participants: usize) -> Self {
        assert!(participants > 0, "PhaseBarrier needs at least one participant");
        Self {
            participants,
            state: Mutex::new(BarrierState {
                arrived: 0,
                phase: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// Arrive at the barrier and block until every participant of the current
    /// phase has arrived.
    pub fn arrive_and_wait(&self) -> BarrierWaitResult {
        let mut state = self.state.lock();
        let phase = state.phase;
        state.arrived += 1;
        assert!(
            state.arrived <= self.participants,
            "phase {phase} saw {} arrivals for {} participants",
            state.arrived,
            self.participants
        );

        if state.arrived == self.participants {
            state.arrived = 0;
            state.phase = state.phase.wrapping_add(1);
            drop(state);
            self.released.notify_all();
            return BarrierWaitResult {
                phase,
                is_leader: true,
            };
        }

        while state.phase == phase {
            self.released.wait(&mut state);
        }
        BarrierWaitResult {
            phase,
            is_leader: false,
        }
    }

    /// Number of completed phases.
    #[must_use]
    pub fn phase(&self) -> u64 {
        self.state.lock().phase
    }

    /// Number of threads that must arrive to complete a phase.
    #[must_use]
    pub const fn participants(&self) -> usize {
        self.participants
    }

    /// Threads currently waiting in the open phase.
    #[must_use]
    pub fn arrived(&self) -> usize {
        self.state.lock().arrived
    }
}
