//! Wake-up signals between tasks
//!
//! A `Signal` carries no data: producers bump a generation counter, and
//! each waiter wakes once for any number of bumps since it last looked.
//! Waiters always rescan the store after waking, so coalesced
//! notifications lose nothing.

use tokio::sync::watch;

#[derive(Debug)]
pub struct Signal {
    tx: watch::Sender<u64>,
}

impl Signal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// A waiter that sees only notifications issued after this call.
    pub fn subscribe(&self) -> Waiter {
        Waiter {
            rx: self.tx.subscribe(),
        }
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Waiter {
    rx: watch::Receiver<u64>,
}

impl Waiter {
    /// Wait for a notification newer than the last one observed.
    ///
    /// Returns `false` once the signal has been dropped.
    pub async fn wait(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Signals raised by the watchers
#[derive(Debug, Default)]
pub struct Signals {
    /// A peg-in was observed on the main ledger
    pub imports: Signal,
    /// An export was recorded from the side ledger
    pub exports: Signal,
}
