//! Process-wide cooldown countdown.
//!
//! A single countdown of whole seconds. While it is above zero new queries
//! are rejected. Starting a new countdown replaces the running one; there is
//! never more than one ticker task.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_secs(1);

/// Handle to the shared countdown. Clones share the same countdown.
#[derive(Clone)]
pub struct Cooldown {
    inner: Arc<Inner>,
}

struct Inner {
    remaining: watch::Sender<u32>,
    ticker: Mutex<Ticker>,
}

#[derive(Default)]
struct Ticker {
    /// Bumped on every `start`/`clear`; a ticker from an older generation
    /// stops without touching the counter.
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new()
    }
}

impl Cooldown {
    pub fn new() -> Self {
        let (remaining, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                remaining,
                ticker: Mutex::new(Ticker::default()),
            }),
        }
    }

    /// Start (or restart) the countdown at `seconds`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, seconds: u32) {
        let mut ticker = self.inner.lock_ticker();
        ticker.generation += 1;
        if let Some(handle) = ticker.handle.take() {
            handle.abort();
        }
        self.inner.remaining.send_replace(seconds);
        tracing::debug!(seconds, "Cooldown started");

        if seconds > 0 {
            let generation = ticker.generation;
            let weak = Arc::downgrade(&self.inner);
            ticker.handle = Some(tokio::spawn(run_ticker(weak, generation)));
        }
    }

    /// Stop the countdown and reset it to zero.
    pub fn clear(&self) {
        let mut ticker = self.inner.lock_ticker();
        ticker.generation += 1;
        if let Some(handle) = ticker.handle.take() {
            handle.abort();
        }
        self.inner.remaining.send_replace(0);
    }

    /// Seconds remaining.
    pub fn remaining(&self) -> u32 {
        *self.inner.remaining.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.remaining() > 0
    }

    /// Whether a ticker task is currently counting down.
    pub fn is_ticking(&self) -> bool {
        self.inner
            .lock_ticker()
            .handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Observe the countdown, e.g. to render a live banner.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.inner.remaining.subscribe()
    }
}

impl std::fmt::Debug for Cooldown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cooldown")
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl Inner {
    fn lock_ticker(&self) -> std::sync::MutexGuard<'_, Ticker> {
        // The guarded data stays consistent even if a holder panicked.
        self.ticker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_ticker().handle.take() {
            handle.abort();
        }
    }
}

async fn run_ticker(inner: Weak<Inner>, generation: u64) {
    loop {
        tokio::time::sleep(TICK).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let ticker = inner.lock_ticker();
        if ticker.generation != generation {
            return;
        }
        let mut finished = false;
        inner.remaining.send_modify(|r| {
            *r = r.saturating_sub(1);
            finished = *r == 0;
        });
        drop(ticker);

        if finished {
            tracing::debug!("Cooldown finished");
            return;
        }
    }
}
