//! Shared cache reaper
//!
//! A single detached background thread, started lazily by the first cache
//! that needs it. Caches register a weak handle over a channel; handles
//! whose cache was dropped are forgotten on the next sweep.

use std::sync::{OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, trace, warn};

/// Something the reaper can purge expired entries from
pub(crate) trait Sweep: Send + Sync {
    /// Remove entries that expired before `now`, returning how many
    fn sweep(&self, now: Instant) -> usize;
}

type Registration = Weak<dyn Sweep>;

/// Lower bound on the sweep interval so the reaper never spins
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

static REAPER: OnceLock<Option<Sender<Registration>>> = OnceLock::new();

/// Whether the shared reaper thread has been started in this process
pub fn reaper_started() -> bool {
    matches!(REAPER.get(), Some(Some(_)))
}

/// Hand a cache to the reaper, starting the thread on first use
///
/// `interval` only takes effect for the call that starts the thread.
pub(crate) fn register(cache: Registration, interval: Duration) {
    let sender = REAPER.get_or_init(|| start(interval));

    match sender {
        Some(sender) => {
            if sender.send(cache).is_err() {
                warn!("Cache reaper has stopped; expired entries are only dropped on lookup");
            }
        }
        None => warn!("Cache reaper unavailable; expired entries are only dropped on lookup"),
    }
}

fn start(interval: Duration) -> Option<Sender<Registration>> {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    let (sender, receiver) = channel::unbounded();

    // The JoinHandle is dropped: the thread is detached and never joined.
    match thread::Builder::new()
        .name("spool-cache-reaper".to_string())
        .spawn(move || run(receiver, interval))
    {
        Ok(_) => {
            debug!(?interval, "Started cache reaper");
            Some(sender)
        }
        Err(e) => {
            error!(error = %e, "Failed to start cache reaper");
            None
        }
    }
}

fn run(registrations: Receiver<Registration>, interval: Duration) {
    let mut caches: Vec<Registration> = Vec::new();
    let mut last_sweep = Instant::now();

    loop {
        let wait = interval.saturating_sub(last_sweep.elapsed());
        match registrations.recv_timeout(wait) {
            Ok(cache) => caches.push(cache),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        if last_sweep.elapsed() < interval {
            continue;
        }

        let now = Instant::now();
        let mut purged = 0;
        caches.retain(|weak| match weak.upgrade() {
            Some(cache) => {
                purged += cache.sweep(now);
                true
            }
            None => false,
        });
        last_sweep = now;

        if purged > 0 {
            trace!(purged, caches = caches.len(), "Reaper swept expired cache entries");
        }
    }
}
