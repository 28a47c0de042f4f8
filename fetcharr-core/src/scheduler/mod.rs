//! The two always-on background loops that feed items into the `Item
//! Workflow`: one recurring poll per enabled request source, and a fixed
//! 10-minute sweep over incomplete items. Grounded on the teacher's
//! `FolderMonitor` background-task pattern (`tokio::spawn` + `interval` +
//! an in-flight guard so a slow tick never overlaps itself) from
//! `ferrex-core::scanner`, generalized from one task to N independent
//! per-source tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use fetcharr_contracts::capability::EmitterKind;

use crate::capability::RequestSource;
use crate::store::ItemStore;
use crate::workflow::ItemWorkflow;

/// Wraps an interval tick so a tick that arrives while the previous one is
/// still running is dropped rather than queued — matches the teacher's
/// `FolderMonitor` "skip if already scanning" guard.
struct InFlightGuard {
    running: AtomicBool,
}

impl InFlightGuard {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// Returns `true` if this call claimed the guard (the caller should
    /// proceed and later call `release`); `false` if another tick is still
    /// in flight.
    fn try_acquire(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// One `tokio::time::interval`-driven task per enabled request source. Each
/// source's poll is independently guarded, so a slow `Overseerr` poll never
/// delays `PlexWatchlist`'s schedule.
pub struct ContentPoller {
    workflow: Arc<ItemWorkflow>,
}

impl ContentPoller {
    pub fn new(workflow: Arc<ItemWorkflow>) -> Self {
        Self { workflow }
    }

    /// Spawns one background task per `(source, interval)` pair and
    /// returns immediately; the tasks run until the process exits.
    pub fn spawn_all(&self, sources: Vec<(Arc<dyn RequestSource>, Duration)>) {
        for (source, period) in sources {
            let workflow = self.workflow.clone();
            tokio::spawn(async move {
                Self::run_source(source, period, workflow).await;
            });
        }
    }

    async fn run_source(
        source: Arc<dyn RequestSource>,
        period: Duration,
        workflow: Arc<ItemWorkflow>,
    ) {
        let guard = Arc::new(InFlightGuard::new());
        let mut ticker = interval(period);
        // The first tick fires immediately; skip it so a freshly started
        // server doesn't poll every source in the same instant it binds
        // its listener.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !guard.try_acquire() {
                tracing::debug!(
                    source = %source.name(),
                    "previous poll still running, skipping this tick"
                );
                continue;
            }

            let source = source.clone();
            let workflow = workflow.clone();
            let guard = guard.clone();
            tokio::spawn(async move {
                let name = source.name();
                match source.poll().await {
                    Ok(items) => {
                        tracing::info!(source = %name, count = items.len(), "poll returned items");
                        for item in items {
                            if let Err(err) = workflow.submit(name, item).await {
                                tracing::error!(source = %name, error = %err, "workflow submit failed");
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(source = %name, error = %err, "poll failed");
                    }
                }
                guard.release();
            });
        }
    }
}

/// Fixed 10-minute (configurable) sweep over every item whose derived
/// state isn't `Completed`, paging through `ItemStore::list_incomplete` in
/// batches of `page_size` and resubmitting each via the workflow with
/// `started_by = RetryLibrary`.
pub struct RetrySweeper {
    store: Arc<dyn ItemStore>,
    workflow: Arc<ItemWorkflow>,
    interval: Duration,
    page_size: u32,
}

impl RetrySweeper {
    pub fn new(
        store: Arc<dyn ItemStore>,
        workflow: Arc<ItemWorkflow>,
        interval: Duration,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            workflow,
            interval,
            page_size,
        }
    }

    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            self.run().await;
        });
    }

    async fn run(&self) {
        let guard = InFlightGuard::new();
        let mut ticker = interval(self.interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !guard.try_acquire() {
                tracing::debug!("previous retry sweep still running, skipping this tick");
                continue;
            }
            self.sweep_once().await;
            guard.release();
        }
    }

    async fn sweep_once(&self) {
        let mut offset = 0u32;
        let mut total = 0u32;
        loop {
            let page = match self.store.list_incomplete(self.page_size, offset).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::error!(error = %err, "retry sweep page load failed");
                    return;
                }
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len() as u32;
            for item in page {
                if let Err(err) = self
                    .workflow
                    .submit(EmitterKind::RetryLibrary, item)
                    .await
                {
                    tracing::error!(error = %err, "retry sweep workflow submit failed");
                }
            }
            total += page_len;
            if page_len < self.page_size {
                break;
            }
            offset += self.page_size;
        }
        tracing::info!(total, "retry sweep pass complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejects_reentry_until_released() {
        let guard = InFlightGuard::new();
        assert!(guard.try_acquire());
        assert!(!guard.try_acquire());
        guard.release();
        assert!(guard.try_acquire());
    }
}
