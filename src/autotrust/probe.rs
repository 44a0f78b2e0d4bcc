use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Semaphore, broadcast};
use tracing::{debug, error, info, trace};

use crate::autotrust::statetable::StateTableReport;
use crate::autotrust::store::TrustAnchorStore;
use crate::dns::{DNSResourceClass, Name, RrSet};

/// Longest the driver sleeps before looking at the schedule again
const MAX_IDLE: Duration = Duration::from_secs(60);

/// Result of one probe of a trust point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The query produced no DNSKEY set
    NoResponse,
    /// The DNSKEY set did not verify against the trusted keys
    Bogus,
    /// Verified, the state table ran
    Secure(StateTableReport),
}

impl ProbeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::NoResponse => "no_response",
            ProbeOutcome::Bogus => "bogus",
            ProbeOutcome::Secure(_) => "secure",
        }
    }
}

/// Fetches the DNSKEY set of a zone, with covering signatures
#[async_trait]
pub trait DnskeyQuerier: Send + Sync {
    /// `None` on timeout or any other failure to get an answer
    async fn query_dnskey(&self, zone: &Name, class: DNSResourceClass) -> Option<RrSet>;
}

/// Runs due probes with bounded concurrency until shut down
pub struct ProbeDriver {
    store: Arc<TrustAnchorStore>,
    querier: Arc<dyn DnskeyQuerier>,
    permits: Arc<Semaphore>,
    shutdown: broadcast::Sender<()>,
}

impl ProbeDriver {
    pub fn new(store: Arc<TrustAnchorStore>, querier: Arc<dyn DnskeyQuerier>) -> Self {
        let workers = store.config().probe_workers.max(1);
        let (shutdown, _) = broadcast::channel(1);
        Self {
            store,
            querier,
            permits: Arc::new(Semaphore::new(workers)),
            shutdown,
        }
    }

    /// Sender that stops `run` when a value is sent
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Probe every trust point due at `now` and wait for them to finish.
    /// Returns the number of probes run.
    pub async fn run_once(&self, now: u64) -> usize {
        let mut tasks = Vec::new();

        for point in self.store.due(now) {
            let Some(guard) = point.try_begin_probe() else {
                continue;
            };
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let store = Arc::clone(&self.store);
            let querier = Arc::clone(&self.querier);
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let point = Arc::clone(guard.point());
                trace!("Probing DNSKEY set of {}", point.name());
                let answer = querier.query_dnskey(point.name(), point.class()).await;

                let result = tokio::task::spawn_blocking(move || {
                    let result = store.process_probe(&point, answer, now);
                    drop(guard);
                    result
                })
                .await;

                match result {
                    Ok(Ok(outcome)) => debug!("Probe finished: {}", outcome.label()),
                    Ok(Err(e)) => error!("Probe failed: {}", e),
                    Err(e) => error!("Probe task panicked: {}", e),
                }
            }));
        }

        let probed = tasks.len();
        futures::future::join_all(tasks).await;
        probed
    }

    /// Probe trust points as they become due, until the shutdown handle fires
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();
        info!("Starting trust anchor probe driver with {} trust points", self.store.len());

        loop {
            let probed = self.run_once(unix_now()).await;
            if probed > 0 {
                debug!("Ran {} trust anchor probes", probed);
            }

            let idle = self
                .store
                .next_probe_at()
                .map(|at| Duration::from_secs(at.saturating_sub(unix_now())))
                .unwrap_or(MAX_IDLE)
                .clamp(Duration::from_secs(1), MAX_IDLE);

            tokio::select! {
                _ = tokio::time::sleep(idle) => {}
                _ = shutdown.recv() => {
                    info!("Trust anchor probe driver shutting down");
                    break;
                }
            }
        }
    }
}

/// Current time in seconds since the epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
