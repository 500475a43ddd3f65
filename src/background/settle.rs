//! Bounded polling for grid convergence after a reset.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::grid::BackgroundGrid;

/// Poll interval used when the caller does not pick one.
pub const DEFAULT_SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest sleep between polls.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How a settle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Occupied cell count stopped changing.
    Settled,
    /// The timeout elapsed first.
    TimedOut,
    /// Zero or negative timeout; returned without polling.
    NotWaited,
}

/// Block until the grid's occupied cell count stabilizes or `timeout`
/// elapses.
///
/// The grid counts as settled once it has processed a frame, has at least
/// one occupied cell, and reports the same occupied count on two consecutive
/// polls. A zero timeout returns immediately without taking the lock.
pub fn wait_for_settle(
    grid: &RwLock<BackgroundGrid>,
    timeout: Duration,
    poll_interval: Duration,
) -> SettleOutcome {
    if timeout.is_zero() {
        return SettleOutcome::NotWaited;
    }

    // None: the timeout is past the clock's range, so only settling ends the wait
    let deadline = Instant::now().checked_add(timeout);
    let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
    let mut previous: Option<usize> = None;

    loop {
        let status = grid.read().status();
        if status.frames_processed > 0 && status.occupied_cell_count > 0 {
            if previous == Some(status.occupied_cell_count) {
                debug!(occupied = status.occupied_cell_count, "background grid settled");
                return SettleOutcome::Settled;
            }
            previous = Some(status.occupied_cell_count);
        } else {
            previous = None;
        }

        let sleep = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    debug!(?timeout, "background grid settle timed out");
                    return SettleOutcome::TimedOut;
                }
                poll_interval.min(deadline - now)
            }
            None => poll_interval,
        };
        thread::sleep(sleep);
    }
}

/// Millisecond variant of [`wait_for_settle`]; zero or negative returns
/// [`SettleOutcome::NotWaited`] immediately.
pub fn wait_for_settle_ms(
    grid: &RwLock<BackgroundGrid>,
    timeout_ms: i64,
    poll_interval: Duration,
) -> SettleOutcome {
    if timeout_ms <= 0 {
        return SettleOutcome::NotWaited;
    }
    wait_for_settle(grid, Duration::from_millis(timeout_ms as u64), poll_interval)
}
