//! Single task that owns the pipeline.
//!
//! Ingestion ticks, retry ticks, manual refresh requests and the shutdown
//! signal are multiplexed in one `select!` loop, so the ledger and the
//! pending list never see concurrent access.

use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::error::{AppError, Result};
use crate::models::{RefreshReport, ScheduleConfig};

use super::pipeline::Pipeline;

const COMMAND_BUFFER: usize = 16;

enum Command {
    Refresh(oneshot::Sender<Result<RefreshReport>>),
}

/// Cloneable handle for asking the scheduler to do work out of band.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Fetch and swap the cache now, without delivering.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Refresh(reply))
            .await
            .map_err(|_| AppError::SchedulerClosed)?;
        response.await.map_err(|_| AppError::SchedulerClosed)?
    }
}

pub struct Scheduler {
    pipeline: Pipeline,
    schedule: ScheduleConfig,
    skip_warmup: bool,
    commands: mpsc::Receiver<Command>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, schedule: ScheduleConfig) -> (Self, SchedulerHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let scheduler = Self {
            pipeline,
            schedule,
            skip_warmup: false,
            commands,
        };
        (scheduler, SchedulerHandle { tx })
    }

    /// Run the first cycle immediately instead of after the warm-up delay.
    pub fn skip_warmup(mut self, skip: bool) -> Self {
        self.skip_warmup = skip;
        self
    }

    /// Drive the pipeline until `shutdown` resolves, then persist the ledger
    /// and hand the pipeline back.
    pub async fn run<F>(self, shutdown: F) -> Pipeline
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            mut pipeline,
            schedule,
            skip_warmup,
            mut commands,
        } = self;

        let start = Instant::now();
        let first_cycle = if skip_warmup {
            start
        } else {
            start + schedule.warmup()
        };

        let mut ingest = interval_at(first_cycle, schedule.ingest_interval());
        ingest.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retry = interval_at(
            start + schedule.retry_interval(),
            schedule.retry_interval(),
        );
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if !skip_warmup {
            log::info!(
                "First ingestion cycle in {}s",
                schedule.warmup().as_secs()
            );
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    log::info!("Shutdown requested");
                    break;
                }
                _ = ingest.tick() => run_cycle(&mut pipeline).await,
                _ = retry.tick() => {
                    let report = pipeline.retry_sweep().await;
                    if report.attempted > 0 {
                        log::info!(
                            "Retry sweep: {} delivered, {} requeued, {} abandoned",
                            report.delivered,
                            report.requeued,
                            report.abandoned
                        );
                    }
                }
                Some(command) = commands.recv() => match command {
                    Command::Refresh(reply) => {
                        let result = pipeline.refresh().await;
                        if let Err(e) = &result {
                            log::error!("Manual refresh failed: {}", e);
                        }
                        let _ = reply.send(result);
                    }
                },
            }
        }

        match pipeline.persist().await {
            Ok(()) => log::info!("Ledger saved ({} fingerprints)", pipeline.ledger().len()),
            Err(e) => log::error!("Failed to persist ledger on shutdown: {}", e),
        }

        pipeline
    }
}

async fn run_cycle(pipeline: &mut Pipeline) {
    match pipeline.run_cycle().await {
        Ok(report) => log::info!(
            "Cycle complete: {} fetched, {} new, {} delivered, {} queued",
            report.fetched,
            report.new,
            report.delivery.delivered,
            report.delivery.queued
        ),
        Err(e) if e.is_transient() => log::warn!("Ingestion cycle skipped: {}", e),
        Err(e) => log::error!("Ingestion cycle failed: {}", e),
    }
}
