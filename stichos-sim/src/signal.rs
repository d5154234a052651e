//! Wake signal for the consumer thread
//!
//! Counting semaphore standing in for the firmware's commit signal: the
//! producer posts one count per committed line without blocking, the
//! consumer sleeps until at least one count is available. Counts are
//! never lost, so a commit that lands while the consumer is busy still
//! wakes it on the next wait.

use std::sync::{Condvar, Mutex};

pub struct WakeSignal {
    count: Mutex<usize>,
    wakeup: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
            wakeup: Condvar::new(),
        }
    }

    /// Post one wake count; never blocks
    pub fn signal(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.wakeup.notify_one();
    }

    /// Sleep until a count is available, then consume it
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.wakeup.wait(count).unwrap();
        }
        *count -= 1;
    }
}
