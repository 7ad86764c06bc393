// SPDX-License-Identifier: MIT

//! `message_connections` counter (spec.md §4.1): incremented on accept,
//! decremented when the worker exits; the main loop waits for it to
//! drain on shutdown.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
pub struct ConnectionCounter {
    count: Mutex<u32>,
    cond: Condvar,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        *self.count.lock() += 1;
    }

    pub fn decrement(&self) {
        let mut guard = self.count.lock();
        *guard -= 1;
        if *guard == 0 {
            self.cond.notify_all();
        }
    }

    pub fn current(&self) -> u32 {
        *self.count.lock()
    }

    /// Block until the count reaches zero or `timeout` elapses.
    pub fn wait_drain(&self, timeout: Duration) -> bool {
        let mut guard = self.count.lock();
        if *guard == 0 {
            return true;
        }
        let result = self.cond.wait_for(&mut guard, timeout);
        *guard == 0 || !result.timed_out()
    }
}
