//! Engine - the locked public API and the daily expiry worker.
//!
//! A single mutex guards the whole book; every public operation holds it
//! for its full duration and returns trades by value after release. A
//! background worker sleeps until the next 16:00 local cutoff (plus a
//! 100 ms slack) and cancels every GoodForDay order, competing for the
//! same lock as the callers. Shutdown is an atomic flag plus a condvar
//! signal, joined on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, Local, LocalResult, NaiveTime, TimeZone};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::command::{LevelInfo, ModifyOrder, Order, OrderId, Trade};
use crate::instructions::Instruction;
use crate::order_book::OrderBook;

/// Daily cutoff for GoodForDay orders, local time.
const CUTOFF_HOUR: u32 = 16;
/// Grace added past the cutoff before the sweep runs.
const CUTOFF_SLACK: Duration = Duration::from_millis(100);

struct Shared {
    book: Mutex<OrderBook>,
    expiry_cv: Condvar,
    shutdown: AtomicBool,
}

/// Thread-safe order book engine.
///
/// Cloneless by design: one engine owns the book and its expiry worker.
/// The driver thread calls the mutating and query methods; the worker
/// only ever takes the same lock.
pub struct Engine {
    shared: Arc<Shared>,
    expiry_worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Create an engine and start its expiry worker.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an engine pre-sized for `orders` resting orders.
    pub fn with_capacity(orders: usize) -> Self {
        let shared = Arc::new(Shared {
            book: Mutex::new(OrderBook::with_capacity(orders)),
            expiry_cv: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let expiry_worker = thread::spawn(move || expiry_loop(worker_shared));

        Self {
            shared,
            expiry_worker: Some(expiry_worker),
        }
    }

    /// Gate, rest, and match an incoming order. See
    /// [`OrderBook::add_order`] for the policy semantics.
    pub fn add_order(&self, order: Order) -> Vec<Trade> {
        self.shared.book.lock().add_order(order)
    }

    /// Cancel a live order; unknown ids are a no-op.
    pub fn cancel_order(&self, order_id: OrderId) {
        self.shared.book.lock().cancel_order(order_id);
    }

    /// Replace a live order under one lock acquisition; unknown ids are a
    /// no-op.
    pub fn modify_order(&self, modify: ModifyOrder) -> Vec<Trade> {
        self.shared.book.lock().modify_order(modify)
    }

    /// Number of live orders.
    pub fn size(&self) -> usize {
        self.shared.book.lock().size()
    }

    /// Per-side `(bids, asks)` level snapshots, best-first.
    pub fn level_infos(&self) -> (Vec<LevelInfo>, Vec<LevelInfo>) {
        self.shared.book.lock().level_infos()
    }

    /// Apply one parsed instruction. This is the driver's entry point.
    pub fn apply(&self, instruction: Instruction) -> Vec<Trade> {
        match instruction {
            Instruction::Add(order) => self.add_order(order),
            Instruction::Modify(modify) => self.modify_order(modify),
            Instruction::Cancel(order_id) => {
                self.cancel_order(order_id);
                Vec::new()
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.expiry_cv.notify_all();
        if let Some(worker) = self.expiry_worker.take() {
            let _ = worker.join();
        }
    }
}

/// The expiry worker: sleep until the next cutoff or shutdown, then sweep.
fn expiry_loop(shared: Arc<Shared>) {
    loop {
        let now = Local::now();
        let cutoff = next_cutoff(now);
        let until = (cutoff - now).to_std().unwrap_or(Duration::ZERO) + CUTOFF_SLACK;
        let deadline = Instant::now() + until;
        debug!(cutoff = %cutoff, "expiry worker sleeping until daily cutoff");

        {
            let mut book = shared.book.lock();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                // Spurious wakeups loop back into the wait; only the
                // deadline moves us on.
                if shared.expiry_cv.wait_until(&mut book, deadline).timed_out() {
                    break;
                }
            }
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
        }

        // Cutoff reached. Collect the day orders under the lock, then
        // cancel the batch under its own acquisition so driver operations
        // can interleave.
        let expired = shared.book.lock().good_for_day_ids();
        if expired.is_empty() {
            continue;
        }
        debug!(
            count = expired.len(),
            "cancelling GoodForDay orders at daily cutoff"
        );
        shared.book.lock().cancel_orders(&expired);
    }
}

/// The next 16:00 local instant strictly ahead of `now`.
fn next_cutoff(now: DateTime<Local>) -> DateTime<Local> {
    let cutoff_time = NaiveTime::from_hms_opt(CUTOFF_HOUR, 0, 0).expect("valid literal time");

    let mut date = now.date_naive();
    if now.time() >= cutoff_time {
        // Already past today's cutoff, aim for tomorrow's
        date = date + Days::new(1);
    }

    match Local.from_local_datetime(&date.and_time(cutoff_time)) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // 16:00 fell into a DST gap; try again a day later
        LocalResult::None => now + chrono::Duration::days(1),
    }
}
