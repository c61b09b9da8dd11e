//! The slot-by-slot download loop

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::{DownloadConfig, DownloadError};
use crate::fetcher::{Fetcher, HttpTransport, ReqwestTransport};
use crate::metrics::{self, SlotMetrics};
use crate::proxy::ProxyPool;
use crate::resume::ProgressStore;
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};
use crate::target::DownloadTarget;
use crate::{TimeSlot, SLOT_DISPLAY_FORMAT};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Preparing directories and resolving the start slot
    Initializing,
    /// Processing slots
    Running,
    /// Every slot up to the end date was processed
    Completed,
    /// Stopped early by a shutdown request
    Interrupted,
}

/// Outcome of [`DownloadOrchestrator::run`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Final state, `Completed` or `Interrupted`
    pub state: RunState,
    /// First slot examined
    pub start_slot: TimeSlot,
    /// Slots whose fetch ran to completion
    pub attempted: u64,
    /// Slots with a valid file on disk afterwards
    pub downloaded: u64,
    /// Slots abandoned after retries
    pub failed: u64,
    /// Last slot written to the progress marker during this run
    pub last_completed: Option<TimeSlot>,
}

impl RunSummary {
    fn new(start_slot: TimeSlot) -> Self {
        Self {
            state: RunState::Running,
            start_slot,
            attempted: 0,
            downloaded: 0,
            failed: 0,
            last_completed: None,
        }
    }
}

/// Walks the slot schedule, downloading and checkpointing each slot in order
pub struct DownloadOrchestrator {
    config: DownloadConfig,
    fetcher: Fetcher,
    progress: ProgressStore,
    shutdown: SharedShutdown,
    state: RunState,
}

impl DownloadOrchestrator {
    /// Create an orchestrator using the `reqwest` transport.
    ///
    /// In proxy mode the proxy list is read here.
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        config.validate()?;
        let pool = load_pool(&config);
        let endpoints = pool.as_ref().map(ProxyPool::endpoints).unwrap_or(&[]);
        let transport = ReqwestTransport::with_proxies(endpoints)?;
        Ok(Self::assemble(config, Arc::new(transport), pool))
    }

    /// Create an orchestrator on a custom transport.
    pub fn with_transport(
        config: DownloadConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, DownloadError> {
        config.validate()?;
        let pool = load_pool(&config);
        Ok(Self::assemble(config, transport, pool))
    }

    fn assemble(
        config: DownloadConfig,
        transport: Arc<dyn HttpTransport>,
        pool: Option<ProxyPool>,
    ) -> Self {
        let shutdown = ShutdownCoordinator::shared();

        let mut fetcher = Fetcher::new(transport)
            .with_validator(config.validator())
            .with_timeout(config.timeout)
            .with_proxy_timeout(config.proxy_timeout)
            .with_courtesy_delay(config.courtesy_delay)
            .with_progress(config.show_progress)
            .with_shutdown(shutdown.clone());
        if let Some(pool) = pool {
            fetcher = fetcher.with_proxy_pool(pool);
        }

        Self {
            progress: ProgressStore::new(config.progress_file.clone()),
            config,
            fetcher,
            shutdown,
            state: RunState::Initializing,
        }
    }

    /// Share a shutdown coordinator with the caller (e.g. a Ctrl+C handler).
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.fetcher = self.fetcher.with_shutdown(shutdown.clone());
        self.shutdown = shutdown;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The fetcher, for inspecting proxy rotation
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Slot the next run would start from: the saved marker, or the start
    /// date at the start hour.
    pub fn resolve_start(&self) -> TimeSlot {
        match self.progress.load() {
            Some(slot) => slot,
            None => self.config.schedule.first_slot(self.config.start_date),
        }
    }

    /// Process every slot from the resolved start through the end date.
    ///
    /// Per-slot failures are logged and skipped. Only setup failures are
    /// returned as errors; a shutdown request ends the run with
    /// [`RunState::Interrupted`].
    pub async fn run(&mut self) -> Result<RunSummary, DownloadError> {
        self.state = RunState::Initializing;
        info!("Starting download");

        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .map_err(|e| {
                DownloadError::Io(format!(
                    "Failed to create download directory {}: {e}",
                    self.config.download_dir.display()
                ))
            })?;

        let start = self.resolve_start();
        info!(
            start = %start.format(SLOT_DISPLAY_FORMAT),
            end_date = %self.config.end_date,
            use_proxy = self.config.use_proxy,
            "Continuing download from start slot"
        );

        self.state = RunState::Running;
        let mut summary = RunSummary::new(start);
        let slots = self.config.schedule.slots(start, self.config.end_date);

        for slot in slots {
            if self.shutdown.is_shutdown_requested() {
                return Ok(self.finish(summary, RunState::Interrupted));
            }

            let target =
                DownloadTarget::for_slot(slot, &self.config.base_url, &self.config.download_dir);
            if !self.process(&target, &mut summary).await {
                return Ok(self.finish(summary, RunState::Interrupted));
            }

            if self.shutdown.sleep_or_shutdown(self.config.throttle_delay).await {
                return Ok(self.finish(summary, RunState::Interrupted));
            }
        }

        Ok(self.finish(summary, RunState::Completed))
    }

    /// Fetch one target and record the outcome. Returns `false` when
    /// interrupted mid-transfer.
    async fn process(&mut self, target: &DownloadTarget, summary: &mut RunSummary) -> bool {
        let slot = target.slot;
        let timer = SlotMetrics::start(slot);
        let shutdown = self.shutdown.clone();

        let outcome = tokio::select! {
            biased;
            ok = self.fetcher.fetch(&target.url, &target.save_path) => Some(ok),
            _ = shutdown.wait_for_shutdown() => None,
        };

        let Some(ok) = outcome else {
            self.fetcher.discard_partial(&target.save_path).await;
            return false;
        };

        summary.attempted += 1;
        timer.finish(ok);

        if ok {
            summary.downloaded += 1;
            summary.last_completed = Some(slot);
            self.save_progress(slot);
        } else {
            summary.failed += 1;
            warn!(
                slot = %slot.format(SLOT_DISPLAY_FORMAT),
                url = %target.url,
                "Error downloading file, moving on"
            );
        }
        true
    }

    fn save_progress(&self, slot: TimeSlot) {
        match self.progress.save(slot) {
            Ok(()) => {
                metrics::record_last_completed(slot);
                info!(slot = %slot.format(SLOT_DISPLAY_FORMAT), "Progress saved");
            }
            Err(e) => warn!(
                path = %self.progress.path().display(),
                error = %e,
                "Failed to save progress"
            ),
        }
    }

    fn finish(&mut self, mut summary: RunSummary, state: RunState) -> RunSummary {
        self.state = state;
        summary.state = state;
        match state {
            RunState::Interrupted => info!(
                attempted = summary.attempted,
                downloaded = summary.downloaded,
                "Download interrupted by user"
            ),
            _ => info!(
                attempted = summary.attempted,
                downloaded = summary.downloaded,
                failed = summary.failed,
                "Download finished"
            ),
        }
        summary
    }
}

fn load_pool(config: &DownloadConfig) -> Option<ProxyPool> {
    config.use_proxy.then(|| ProxyPool::load(&config.proxy_file))
}
