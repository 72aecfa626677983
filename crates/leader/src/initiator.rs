// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexFlow.
//
// PlexFlow is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexFlow is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexFlow. If not, see <https://www.gnu.org/licenses/>.

//! Lock-driven leader initiator.

use crate::{
    Candidate, LeaderContext, LeaderError, LeaderEvent, LeaderEventPublisher, LeaderResult,
};
use plexflow_common::LeaderConfig;
use plexflow_locks::DistributedLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Runner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Background task that keeps contending for a lock on behalf of a candidate.
///
/// ## Purpose
/// While the lock is held the candidate is leader: the initiator renews the
/// lock every heartbeat and listens for voluntary yield requests. When the
/// lock is lost, a step fails, the candidate yields, or the initiator stops,
/// leadership is revoked.
///
/// ## Guarantees
/// - Granted and revoked callbacks strictly alternate, starting with granted
/// - Lock and candidate failures never escape: they revoke leadership and the
///   loop retries after `busy_wait_millis`
/// - Publisher failures are logged only
/// - `start` and `stop` are idempotent
///
/// ## Example
/// ```rust,ignore
/// let registry = MemoryLockRegistry::with_lease(Duration::from_secs(10))?;
/// let candidate = Arc::new(DefaultCandidate::default());
/// let lock = registry.obtain(candidate.role(), candidate.id())?;
/// let initiator = LeaderInitiator::new(lock, candidate, LeaderConfig::default())?;
/// initiator.start().await?;
/// // ...
/// initiator.stop().await;
/// ```
pub struct LeaderInitiator {
    lock: Arc<dyn DistributedLock>,
    candidate: Arc<dyn Candidate>,
    publisher: Option<Arc<dyn LeaderEventPublisher>>,
    config: LeaderConfig,
    context: LeaderContext,
    running: Arc<AtomicBool>,
    runner: Mutex<Option<Runner>>,
}

impl LeaderInitiator {
    /// Create a stopped initiator.
    ///
    /// ## Errors
    /// - [`LeaderError::InvalidConfiguration`]: zero heartbeat or empty role
    pub fn new(
        lock: Arc<dyn DistributedLock>,
        candidate: Arc<dyn Candidate>,
        config: LeaderConfig,
    ) -> LeaderResult<Self> {
        config
            .validate()
            .map_err(|e| LeaderError::InvalidConfiguration(e.to_string()))?;
        if candidate.role().is_empty() {
            return Err(LeaderError::InvalidConfiguration(
                "candidate role must not be empty".to_string(),
            ));
        }

        let context = LeaderContext::new(candidate.role(), candidate.id());
        Ok(Self {
            lock,
            candidate,
            publisher: None,
            config,
            context,
            running: Arc::new(AtomicBool::new(false)),
            runner: Mutex::new(None),
        })
    }

    /// Publish granted/revoked events to `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn LeaderEventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Leadership context of the candidate; the same object before, during
    /// and after a run.
    pub fn context(&self) -> LeaderContext {
        self.context.clone()
    }

    /// Whether the background task is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start contending for leadership. No-op if already running.
    ///
    /// ## Errors
    /// - [`LeaderError::InvalidConfiguration`]: the heartbeat is not shorter
    ///   than the lock lease, so a leader could lose the lock between renewals
    pub async fn start(&self) -> LeaderResult<()> {
        let mut runner = self.runner.lock().await;
        if runner.is_some() {
            return Ok(());
        }

        if let Some(lease) = self.lock.lease_duration() {
            if self.config.heart_beat() >= lease {
                return Err(LeaderError::InvalidConfiguration(format!(
                    "heart_beat_millis ({}) must be less than the lock lease ({} ms)",
                    self.config.heart_beat_millis,
                    lease.as_millis()
                )));
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let election = Arc::new(Election {
            lock: self.lock.clone(),
            candidate: self.candidate.clone(),
            publisher: self.publisher.clone(),
            config: self.config.clone(),
            context: self.context.clone(),
            shutdown: shutdown_rx,
        });
        let handle = tokio::spawn(election.run());

        *runner = Some(Runner { shutdown, handle });
        self.running.store(true, Ordering::SeqCst);
        info!(
            role = %self.candidate.role(),
            candidate = %self.candidate.id(),
            heart_beat_ms = self.config.heart_beat_millis,
            "Leader initiator started"
        );
        Ok(())
    }

    /// Stop contending, revoking leadership if held. No-op if not running.
    ///
    /// Returns once the background task has exited.
    pub async fn stop(&self) {
        let mut runner = self.runner.lock().await;
        let Some(Runner { shutdown, handle }) = runner.take() else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            warn!(role = %self.candidate.role(), error = %e, "Leader election task failed");
        }
        self.running.store(false, Ordering::SeqCst);
        info!(
            role = %self.candidate.role(),
            candidate = %self.candidate.id(),
            "Leader initiator stopped"
        );
    }
}

impl Drop for LeaderInitiator {
    fn drop(&mut self) {
        if let Some(runner) = self.runner.get_mut().take() {
            let _ = runner.shutdown.send(true);
        }
    }
}

struct Election {
    lock: Arc<dyn DistributedLock>,
    candidate: Arc<dyn Candidate>,
    publisher: Option<Arc<dyn LeaderEventPublisher>>,
    config: LeaderConfig,
    context: LeaderContext,
    shutdown: watch::Receiver<bool>,
}

impl Election {
    async fn run(self: Arc<Self>) {
        self.contend().await;

        self.revoke().await;
        // a step interrupted between acquisition and grant leaves the lock held
        if let Ok(true) = self.lock.is_locked_by_current_holder().await {
            if let Err(e) = self.lock.unlock().await {
                warn!(role = %self.candidate.role(), error = %e, "Failed to release lock on stop");
            }
        }
    }

    async fn contend(&self) {
        while !self.is_stopping() {
            if let Err(e) = self.step().await {
                warn!(
                    role = %self.candidate.role(),
                    candidate = %self.candidate.id(),
                    error = %e,
                    "Leader election step failed"
                );
                self.revoke().await;
                self.pause(self.config.busy_wait()).await;
            }
        }
    }

    async fn step(&self) -> LeaderResult<()> {
        if self.lock.is_locked_by_current_holder().await? {
            self.lock.renew().await?;
            if !self.context.is_leader() {
                self.grant().await?;
            }
            let yielded = tokio::select! {
                yielded = self.context.wait_for_yield(self.config.heart_beat()) => yielded,
                _ = self.stopped() => false,
            };
            if yielded {
                info!(
                    role = %self.candidate.role(),
                    candidate = %self.candidate.id(),
                    "Yielding leadership"
                );
                self.revoke().await;
                self.pause(self.config.busy_wait()).await;
            }
            return Ok(());
        }

        let acquired = tokio::select! {
            acquired = self.lock.try_lock(self.config.heart_beat()) => acquired?,
            _ = self.stopped() => return Ok(()),
        };
        let leader = self.context.is_leader();
        if acquired && !leader {
            self.grant().await?;
        } else if !acquired && leader {
            info!(
                role = %self.candidate.role(),
                candidate = %self.candidate.id(),
                "Lock lost"
            );
            self.revoke().await;
        }
        Ok(())
    }

    fn is_stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn stopped(&self) {
        let mut shutdown = self.shutdown.clone();
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration` unless stopped first.
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stopped() => {}
        }
    }

    async fn grant(&self) -> LeaderResult<()> {
        self.context.set_leader(true);
        metrics::counter!(
            "plexflow_leader_granted_total",
            "role" => self.candidate.role().to_string()
        )
        .increment(1);
        info!(context = %self.context, "Leadership granted");

        self.candidate.on_granted(&self.context).await?;
        self.publish(LeaderEvent::Granted {
            role: self.candidate.role().to_string(),
            candidate_id: self.candidate.id().to_string(),
            context: self.context.clone(),
        });
        Ok(())
    }

    async fn revoke(&self) {
        if !self.context.set_leader(false) {
            return;
        }
        self.context.clear_yield();

        if let Err(e) = self.lock.unlock().await {
            warn!(role = %self.candidate.role(), error = %e, "Failed to unlock on revoke");
        }
        metrics::counter!(
            "plexflow_leader_revoked_total",
            "role" => self.candidate.role().to_string()
        )
        .increment(1);
        info!(context = %self.context, "Leadership revoked");

        if let Err(e) = self.candidate.on_revoked(&self.context).await {
            warn!(role = %self.candidate.role(), error = %e, "Candidate revoke callback failed");
        }
        self.publish(LeaderEvent::Revoked {
            role: self.candidate.role().to_string(),
            candidate_id: self.candidate.id().to_string(),
            context: self.context.clone(),
        });
    }

    fn publish(&self, event: LeaderEvent) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        debug!(?event, "Publishing leader event");
        if let Err(e) = publisher.publish(event) {
            warn!(role = %self.candidate.role(), error = %e, "Failed to publish leader event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefaultCandidate;
    use plexflow_locks::{LockRegistry, MemoryLockRegistry};

    fn config(heart_beat_millis: u64) -> LeaderConfig {
        LeaderConfig {
            heart_beat_millis,
            busy_wait_millis: 10,
        }
    }

    #[tokio::test]
    async fn test_zero_heartbeat_rejected() {
        let registry = MemoryLockRegistry::new();
        let lock = registry.obtain("leader", "node-1").unwrap();
        let result = LeaderInitiator::new(lock, Arc::new(DefaultCandidate::default()), config(0));
        assert!(matches!(result, Err(LeaderError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_heartbeat_must_be_shorter_than_lease() {
        let registry = MemoryLockRegistry::with_lease(Duration::from_millis(100)).unwrap();
        let lock = registry.obtain("leader", "node-1").unwrap();
        let initiator =
            LeaderInitiator::new(lock, Arc::new(DefaultCandidate::default()), config(100)).unwrap();

        let result = initiator.start().await;
        assert!(matches!(result, Err(LeaderError::InvalidConfiguration(_))));
        assert!(!initiator.is_running());
    }

    #[tokio::test]
    async fn test_context_available_before_start() {
        let registry = MemoryLockRegistry::new();
        let candidate = Arc::new(DefaultCandidate::with_id("scheduler", "node-1"));
        let lock = registry.obtain("scheduler", "node-1").unwrap();
        let initiator = LeaderInitiator::new(lock, candidate, config(50)).unwrap();

        let context = initiator.context();
        assert!(!context.is_leader());
        assert_eq!(context.role(), "scheduler");
        assert_eq!(context.id(), "node-1");
        context.yield_leadership();
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let registry = MemoryLockRegistry::new();
        let lock = registry.obtain("leader", "node-1").unwrap();
        let initiator =
            LeaderInitiator::new(lock, Arc::new(DefaultCandidate::default()), config(50)).unwrap();

        initiator.stop().await;
        initiator.start().await.unwrap();
        initiator.start().await.unwrap();
        assert!(initiator.is_running());

        initiator.stop().await;
        initiator.stop().await;
        assert!(!initiator.is_running());
        assert!(!initiator.context().is_leader());
        assert_eq!(registry.holder("leader").await, None);
    }
}
