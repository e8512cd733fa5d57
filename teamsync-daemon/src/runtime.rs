use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use teamsync_sync::{RunSummary, SyncError};

use crate::error::DaemonError;
use crate::schedule::Schedule;

/// One sync run. Called on a blocking worker thread.
pub type Job = Arc<dyn Fn() -> Result<RunSummary, SyncError> + Send + Sync>;

/// Result of offering a trigger to the [`RunGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Dispatched,
    SkippedBusy,
}

/// Admits at most one run at a time.
#[derive(Debug, Default)]
pub struct RunGate {
    busy: AtomicBool,
}

impl RunGate {
    pub fn try_dispatch(&self) -> Dispatch {
        match self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Dispatch::Dispatched,
            Err(_) => Dispatch::SkippedBusy,
        }
    }

    pub fn finish(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct Trigger {
    fired_at: DateTime<Utc>,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(schedule: Schedule, job: Job) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DaemonError::Runtime)?;
    runtime.block_on(run(schedule, job))
}

/// Run until ctrl-c.
pub async fn run(schedule: Schedule, job: Job) -> Result<(), DaemonError> {
    let (signal_tx, mut signal_rx) = mpsc::channel::<Result<(), std::io::Error>>(1);
    let signal_handle = tokio::spawn(async move {
        let _ = signal_tx.send(tokio::signal::ctrl_c().await).await;
    });

    let result = run_until(schedule, job, async move {
        match signal_rx.recv().await {
            Some(Ok(())) => tracing::info!("received ctrl-c, shutting down daemon"),
            Some(Err(err)) => tracing::error!(error = %err, "ctrl-c handler failed, shutting down daemon"),
            None => {}
        }
    })
    .await;

    signal_handle.abort();
    result
}

/// Run until `stop` resolves. The in-flight run, if any, completes first.
pub async fn run_until<F>(schedule: Schedule, job: Job, stop: F) -> Result<(), DaemonError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let gate = Arc::new(RunGate::default());
    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(1);
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let gate = gate.clone();
        tokio::spawn(async move {
            let result = ticker_task(schedule, trigger_tx, gate, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let gate = gate.clone();
        tokio::spawn(async move {
            let result = processor_task(job, trigger_rx, gate, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                () = stop => {
                    let _ = shutdown.send(());
                }
            }
            Ok::<(), DaemonError>(())
        })
    };

    let (ticker_result, processor_result, signal_result) =
        tokio::join!(ticker_handle, processor_handle, signal_handle);

    handle_join("ticker", ticker_result)?;
    handle_join("processor", processor_result)?;
    handle_join("shutdown", signal_result)?;
    Ok(())
}

async fn ticker_task(
    schedule: Schedule,
    trigger_tx: mpsc::Sender<Trigger>,
    gate: Arc<RunGate>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        let Some(delay) = schedule.delay_until_next(Utc::now()) else {
            tracing::warn!("schedule has no further occurrences; stopping");
            break;
        };
        tracing::debug!(delay_secs = delay.as_secs(), "next run scheduled");

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            () = tokio::time::sleep(delay) => {
                if gate.try_dispatch() == Dispatch::SkippedBusy {
                    tracing::warn!("previous run still in progress; skipping this trigger");
                    continue;
                }
                let trigger = Trigger { fired_at: Utc::now() };
                if trigger_tx.send(trigger).await.is_err() {
                    gate.finish();
                    break;
                }
            }
        }

        // Cron occurrences are second-granular; step past the one just fired.
        if matches!(schedule, Schedule::Cron(_)) {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
    Ok(())
}

async fn processor_task(
    job: Job,
    mut trigger_rx: mpsc::Receiver<Trigger>,
    gate: Arc<RunGate>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_trigger = trigger_rx.recv() => {
                let Some(trigger) = maybe_trigger else { break };
                let started = Instant::now();
                tracing::info!(fired_at = %trigger.fired_at, "scheduled run starting");

                let job = job.clone();
                let result = tokio::task::spawn_blocking(move || job().map_err(|e| e.to_string())).await;
                gate.finish();

                match result {
                    Ok(Ok(summary)) => tracing::info!(
                        synced = summary.synced(),
                        skipped = summary.skipped(),
                        changes = summary.changes.len(),
                        duration_ms = started.elapsed().as_millis(),
                        "scheduled run completed"
                    ),
                    Ok(Err(err)) => tracing::error!(error = %err, "scheduled run failed"),
                    Err(err) => {
                        return Err(DaemonError::Join {
                            task: "sync run",
                            reason: err.to_string(),
                        })
                    }
                }
            }
        }
    }
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            reason: err.to_string(),
        }),
    }
}
