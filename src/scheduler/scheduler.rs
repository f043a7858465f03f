use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use compio::runtime::spawn;
use compio::time::sleep_until;
use futures::future::{Either, select};
use futures_channel::oneshot;
use snafu::{ResultExt, Snafu};
use tracing::{debug, error, info, warn};

use crate::mirror::{MirrorEngine, PassSummary};
use crate::validation::{SyncInterval, SyncPair};

/// Passes never overlap, so a single worker is enough
const PASS_WORKER_THREADS: NonZeroUsize = NonZeroUsize::MIN;

/// Longest timer handed to the runtime at once; longer periods wait in steps
const MAX_TIMER_STEP: Duration = Duration::from_secs(24 * 60 * 60);

type PassJob = Arc<dyn Fn() -> PassSummary + Send + Sync>;

/// Runs mirror passes on a fixed period until stopped.
///
/// The first pass fires one full period after start. Passes execute on a
/// dedicated worker thread, so the timer keeps running while a pass is in
/// progress: a tick that comes due during a pass is dropped, never queued.
pub struct Scheduler;

impl Scheduler {
    pub fn start(
        interval: SyncInterval,
        engine: MirrorEngine,
        pair: SyncPair,
    ) -> Result<SchedulerHandle, SchedulerError> {
        info!(
            "Mirroring {} into {} every {:?}",
            pair.source().display(),
            pair.backup().display(),
            interval.period()
        );
        Self::start_job(interval, move || engine.sync(pair.source(), pair.backup()))
    }

    /// Must be called from within a compio runtime.
    pub fn start_job<F>(interval: SyncInterval, job: F) -> Result<SchedulerHandle, SchedulerError>
    where
        F: Fn() -> PassSummary + Send + Sync + 'static,
    {
        let dispatcher = DispatcherBuilder::new()
            .worker_threads(PASS_WORKER_THREADS)
            .build()
            .context(DispatcherSnafu)?;

        let (stop_sender, stop_receiver) = oneshot::channel();
        let (report_sender, report_receiver) = oneshot::channel();
        let ticker = Ticker {
            period: interval.period(),
            job: Arc::new(job),
            dispatcher,
        };

        spawn(async move {
            let report = ticker.run(stop_receiver).await;
            if report_sender.send(report).is_err() {
                debug!("Scheduler handle dropped before the report was delivered");
            }
        })
        .detach();

        Ok(SchedulerHandle {
            stop_sender,
            report_receiver,
        })
    }
}

/// Owned by whoever started the scheduler. Dropping it stops the ticks too,
/// but only [`SchedulerHandle::stop`] waits for the running pass.
pub struct SchedulerHandle {
    stop_sender: oneshot::Sender<()>,
    report_receiver: oneshot::Receiver<SchedulerReport>,
}

impl SchedulerHandle {
    /// Prevents further ticks and waits for a pass already in progress to
    /// finish on its own.
    pub async fn stop(self) -> Result<SchedulerReport, SchedulerError> {
        if self.stop_sender.send(()).is_err() {
            debug!("Scheduler loop was already gone when stop was requested");
        }
        self.report_receiver.await.context(LoopTerminatedSnafu)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub passes_started: usize,
    pub passes_completed: usize,
    pub ticks_skipped: usize,
}

struct Ticker {
    period: Duration,
    job: PassJob,
    dispatcher: Dispatcher,
}

impl Ticker {
    async fn run(self, mut stop_receiver: oneshot::Receiver<()>) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        let mut in_flight: Option<oneshot::Receiver<PassSummary>> = None;
        let mut deadline = Instant::now().checked_add(self.period);

        loop {
            let Some(due) = deadline else {
                warn!("Interval {:?} lies beyond the clock's range, no pass will run", self.period);
                let _ = (&mut stop_receiver).await;
                debug!("Stop requested, no further ticks");
                break;
            };
            if wait_until(due, &mut stop_receiver).await.is_break() {
                debug!("Stop requested, no further ticks");
                break;
            }
            deadline = next_deadline(due, self.period);

            if let Some(receiver) = in_flight.as_mut() {
                match receiver.try_recv() {
                    Ok(None) => {
                        report.ticks_skipped += 1;
                        warn!("Previous mirror pass is still running, skipping this tick");
                        continue;
                    }
                    Ok(Some(_)) => report.passes_completed += 1,
                    Err(_) => error!("Mirror pass ended without a result"),
                }
                in_flight = None;
            }

            match self.dispatch() {
                Ok(receiver) => {
                    report.passes_started += 1;
                    in_flight = Some(receiver);
                }
                Err(err) => error!("Could not start mirror pass: {err}"),
            }
        }

        if let Some(receiver) = in_flight {
            info!("Waiting for the running mirror pass to finish");
            match receiver.await {
                Ok(_) => report.passes_completed += 1,
                Err(_) => error!("Mirror pass ended without a result"),
            }
        }

        if let Err(err) = self.dispatcher.join().await {
            warn!("Mirror worker did not shut down cleanly: {err}");
        }

        info!(
            "Scheduler stopped after {} passes ({} ticks skipped)",
            report.passes_started, report.ticks_skipped
        );
        report
    }

    fn dispatch(&self) -> Result<oneshot::Receiver<PassSummary>, SchedulerError> {
        let job = self.job.clone();
        self.dispatcher
            .dispatch(move || async move { job() })
            .map_err(|e| SchedulerError::PassDispatchError {
                error: e.to_string(),
            })
    }
}

/// Sleeps until `due` unless a stop request arrives first.
async fn wait_until(due: Instant, stop_receiver: &mut oneshot::Receiver<()>) -> ControlFlow<()> {
    loop {
        let wake = due.min(Instant::now() + MAX_TIMER_STEP);
        if let Either::Right(_) = select(pin!(sleep_until(wake)), &mut *stop_receiver).await {
            return ControlFlow::Break(());
        }
        if Instant::now() >= due {
            return ControlFlow::Continue(());
        }
    }
}

/// Fixed-rate schedule. Deadlines already in the past (e.g. after the machine
/// slept) are dropped instead of firing in a burst. `None` once the schedule
/// runs past what `Instant` can represent.
fn next_deadline(previous: Instant, period: Duration) -> Option<Instant> {
    let now = Instant::now();
    let mut next = previous.checked_add(period)?;
    while next <= now {
        debug!("Missed a tick deadline, realigning");
        next = next.checked_add(period)?;
    }
    Some(next)
}

#[derive(Debug, Snafu)]
pub enum SchedulerError {
    #[snafu(display("Failed to create the mirror worker"))]
    DispatcherError { source: std::io::Error },
    #[snafu(display("Failed to dispatch mirror pass: {}", error))]
    PassDispatchError { error: String },
    #[snafu(display("Scheduler loop terminated without reporting"))]
    LoopTerminated {
        source: futures_channel::oneshot::Canceled,
    },
}
