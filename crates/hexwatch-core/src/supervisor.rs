//! Resilience supervisor: the single writer of world snapshots.
//!
//! The supervisor runs one state machine on a background task:
//!
//! ```text
//! Idle -> Bootstrapping -> Streaming -> Backoff -> Bootstrapping -> ...
//!                 \              \           \
//!                  `--------------`-----------`--> Stopped
//! ```
//!
//! Every pass through `Bootstrapping` is a new session: a fresh
//! connection, a fresh room list and layout, a fresh initial snapshot.
//! Retryable failures move to `Backoff`; non-retryable ones, an exhausted
//! retry ceiling, or a shutdown request move to `Stopped`.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt as _;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::aggregator::{self, ApplyError};
use crate::backoff::BackoffPolicy;
use crate::client::StreamClient;
use crate::error::{FatalError, SourceError};
use crate::manager::WorldState;
use crate::source::{ConnectionRole, SourceConnector};

/// Where the supervisor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SupervisorPhase {
    /// Created, not yet running.
    #[default]
    Idle,
    /// Connecting and fetching rooms and layout.
    Bootstrapping {
        /// Consecutive failures before this attempt.
        attempt: u32,
    },
    /// Consuming the entity subscription.
    Streaming {
        /// Session number, from 1.
        session: u64,
    },
    /// Waiting before the next bootstrap.
    Backoff {
        /// Consecutive failures so far.
        attempt: u32,
        /// How long this wait lasts.
        #[serde(rename = "delayMs", serialize_with = "as_millis")]
        delay: Duration,
    },
    /// Finished; the supervisor task has exited or is exiting.
    Stopped,
}

fn as_millis<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
}

/// Running totals kept by the supervisor.
#[derive(Debug, Default)]
pub struct SyncCounters {
    sessions_started: AtomicU64,
    snapshots_published: AtomicU64,
    stale_updates: AtomicU64,
    callback_failures: AtomicU64,
    retryable_failures: AtomicU64,
}

/// A point-in-time copy of [`SyncCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    /// Sessions begun (connect attempts included).
    pub sessions_started: u64,
    /// Snapshots published from updates.
    pub snapshots_published: u64,
    /// Updates dropped for a non-increasing `worldTime`.
    pub stale_updates: u64,
    /// Subscriber callbacks that failed or panicked.
    pub callback_failures: u64,
    /// Failures that led to a backoff.
    pub retryable_failures: u64,
}

impl SyncCounters {
    /// Read every counter.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            stale_updates: self.stale_updates.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            retryable_failures: self.retryable_failures.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }
}

/// Drives bootstrap, subscription and aggregation for one manager.
pub(crate) struct Supervisor<C: SourceConnector> {
    connector: Arc<C>,
    policy: BackoffPolicy,
    request_timeout: Duration,
    world: WorldState,
    phase: watch::Sender<SupervisorPhase>,
    rng: StdRng,
    session: u64,
}

impl<C: SourceConnector> Supervisor<C> {
    pub(crate) fn new(
        connector: Arc<C>,
        policy: BackoffPolicy,
        request_timeout: Duration,
        world: WorldState,
        phase: watch::Sender<SupervisorPhase>,
    ) -> Self {
        Self {
            connector,
            policy,
            request_timeout,
            world,
            phase,
            rng: StdRng::from_os_rng(),
            session: 0,
        }
    }

    /// Run until shutdown (`Ok`) or a fatal condition (`Err`).
    ///
    /// `shutdown` flipping to `true`, or its sender being dropped, stops
    /// the loop at the next suspension point.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), FatalError> {
        info!(
            base_ms = u64::try_from(self.policy.base.as_millis()).unwrap_or(u64::MAX),
            max_ms = u64::try_from(self.policy.max.as_millis()).unwrap_or(u64::MAX),
            max_retries = ?self.policy.max_retries,
            "Supervisor starting"
        );

        let mut failures: u32 = 0;
        let outcome = loop {
            // --- Bootstrap and stream ---
            self.set_phase(SupervisorPhase::Bootstrapping { attempt: failures });
            let failure = tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => None,
                failure = self.run_session(&mut failures) => Some(failure),
            };
            let Some(failure) = failure else {
                info!("Shutdown requested");
                break Ok(());
            };

            // --- Classify ---
            if !failure.is_retryable() {
                error!(session = self.session, error = %failure, "Non-retryable source failure");
                break Err(FatalError::NonRetryable { source: failure });
            }
            failures = failures.saturating_add(1);
            SyncCounters::add(&self.world.counters_ref().retryable_failures, 1);
            if matches!(failure, SourceError::Protocol(_)) {
                error!(session = self.session, failures, error = %failure, "Source protocol error");
            } else {
                warn!(session = self.session, failures, error = %failure, "Session failed");
            }
            if !self.policy.allows_retry(failures) {
                error!(failures, "Retry ceiling reached");
                break Err(FatalError::RetriesExhausted {
                    attempts: failures,
                    last: failure,
                });
            }

            // --- Backoff ---
            let delay = self.policy.delay(failures.saturating_sub(1), &mut self.rng);
            self.set_phase(SupervisorPhase::Backoff {
                attempt: failures,
                delay,
            });
            let interrupted = tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => true,
                () = tokio::time::sleep(delay) => false,
            };
            if interrupted {
                info!("Shutdown requested during backoff");
                break Ok(());
            }
        };

        self.set_phase(SupervisorPhase::Stopped);
        info!(sessions = self.session, "Supervisor stopped");
        outcome
    }

    /// One bootstrap-then-subscribe session. Always ends in a failure;
    /// a closed subscription is [`SourceError::StreamEnded`].
    async fn run_session(&mut self, failures: &mut u32) -> SourceError {
        match self.stream(failures).await {
            Ok(never) => match never {},
            Err(failure) => failure,
        }
    }

    async fn stream(&mut self, failures: &mut u32) -> Result<Infallible, SourceError> {
        self.session = self.session.saturating_add(1);
        let session = self.session;
        SyncCounters::add(&self.world.counters_ref().sessions_started, 1);

        let source = tokio::time::timeout(
            self.request_timeout,
            self.connector.connect(ConnectionRole::Stream),
        )
        .await
        .map_err(|elapsed| SourceError::Unavailable(format!("connect timed out ({elapsed})")))??;
        let client = StreamClient::new(source, self.request_timeout);

        let bootstrap = client.bootstrap().await?;
        let mut current =
            Arc::new(aggregator::initial(bootstrap.rooms, bootstrap.layout).with_session(session));
        self.world.store_ref().publish(Arc::clone(&current));
        info!(
            session,
            rooms = current.rooms().len(),
            placed = current.room_layout().len(),
            "Bootstrapped"
        );

        let mut updates = client.subscribe().await?;
        self.set_phase(SupervisorPhase::Streaming { session });

        while let Some(item) = updates.next().await {
            let update = item?;
            match aggregator::apply(&current, update) {
                Ok(next) => {
                    current = Arc::new(next);
                    self.world.store_ref().publish(Arc::clone(&current));
                    SyncCounters::add(&self.world.counters_ref().snapshots_published, 1);
                    *failures = 0;

                    let report = self.world.registry().notify(&current);
                    if report.failed > 0 {
                        SyncCounters::add(
                            &self.world.counters_ref().callback_failures,
                            report.failed,
                        );
                    }
                    debug!(
                        session,
                        world_time = current.world_time,
                        delivered = report.delivered,
                        failed = report.failed,
                        "Snapshot published"
                    );
                }
                Err(ApplyError::Stale {
                    world_time,
                    current: at,
                }) => {
                    SyncCounters::add(&self.world.counters_ref().stale_updates, 1);
                    debug!(session, world_time, current = at, "Dropped stale update");
                }
                Err(ApplyError::UnknownRoom(room)) => {
                    return Err(SourceError::Protocol(format!(
                        "update references undeclared room {room}"
                    )));
                }
            }
        }

        Err(SourceError::StreamEnded)
    }

    fn set_phase(&self, phase: SupervisorPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!(?phase, "Supervisor phase changed");
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        debug!("Shutdown handle dropped");
    }
}
