//! Fixed-delay driver for the reconciler.

use crate::reconciler::{CycleReport, Reconciler};
use std::time::Duration;
use tokio::sync::watch;

/// Runs reconciliation cycles until asked to stop.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run cycles forever, sleeping `interval` after each one finishes.
    ///
    /// Stops when `shutdown` becomes `true` or its sender is dropped. The
    /// signal is checked before each cycle and while sleeping, never in the
    /// middle of a cycle. Returns the number of cycles that ran.
    pub async fn run(&self, reconciler: &mut Reconciler, shutdown: watch::Receiver<bool>) -> u64 {
        self.run_with(reconciler, shutdown, |report| report.log()).await
    }

    /// Like [`Scheduler::run`], handing every report to `on_report`.
    pub async fn run_with<F>(
        &self,
        reconciler: &mut Reconciler,
        mut shutdown: watch::Receiver<bool>,
        mut on_report: F,
    ) -> u64
    where
        F: FnMut(&CycleReport),
    {
        tracing::info!(
            "Scheduler started (interval: {}s, {} record(s))",
            self.interval.as_secs(),
            reconciler.specs().len()
        );

        let mut cycles = 0;

        'run: loop {
            if *shutdown.borrow() {
                break;
            }

            let report = reconciler.run_cycle().await;
            cycles += 1;
            on_report(&report);

            let sleep = tokio::time::sleep(self.interval);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            tracing::debug!("Shutdown sender dropped");
                            break 'run;
                        }
                        // Only a stop request cuts the delay short.
                        if *shutdown.borrow() {
                            break 'run;
                        }
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped after {} cycle(s)", cycles);
        cycles
    }
}
