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

//! In-memory lock registry implementation.

use crate::{DistributedLock, LockError, LockRegistry, LockResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

const NO_TOKEN: u64 = 0;

#[derive(Debug)]
struct LockState {
    holder_id: String,
    fencing_token: u64,
    expires_at: Option<Instant>,
}

impl LockState {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

#[derive(Debug)]
struct Registry {
    locks: RwLock<HashMap<String, LockState>>,
    released: Notify,
    next_token: AtomicU64,
    lease: Option<Duration>,
}

/// In-memory fenced lock registry.
///
/// ## Purpose
/// Provides a process-local implementation of [`LockRegistry`] for tests
/// and single-process deployments. Clones share the same lock table.
///
/// ## Limitations
/// - Not persistent (locks lost on restart)
/// - Not distributed (single process only)
/// - Expired locks are reclaimed lazily on the next acquisition attempt
#[derive(Debug, Clone)]
pub struct MemoryLockRegistry {
    inner: Arc<Registry>,
}

impl MemoryLockRegistry {
    /// Registry whose locks never expire.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Registry whose locks expire `lease` after acquisition or last renewal.
    ///
    /// ## Returns
    /// - `Err(LockError::ConfigError)`: zero lease
    pub fn with_lease(lease: Duration) -> LockResult<Self> {
        if lease.is_zero() {
            return Err(LockError::ConfigError(
                "lock lease must be greater than zero".to_string(),
            ));
        }
        Ok(Self::build(Some(lease)))
    }

    fn build(lease: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Registry {
                locks: RwLock::new(HashMap::new()),
                released: Notify::new(),
                next_token: AtomicU64::new(NO_TOKEN + 1),
                lease,
            }),
        }
    }

    /// Concrete lock handle for `key` owned by `holder_id`.
    pub fn lock(&self, key: &str, holder_id: &str) -> LockResult<MemoryLock> {
        if key.is_empty() {
            return Err(LockError::InvalidKey("lock key must not be empty".to_string()));
        }
        if holder_id.is_empty() {
            return Err(LockError::InvalidHolderId(format!(
                "holder for lock {} must not be empty",
                key
            )));
        }
        Ok(MemoryLock {
            key: key.to_string(),
            holder_id: holder_id.to_string(),
            registry: self.inner.clone(),
            fencing_token: AtomicU64::new(NO_TOKEN),
        })
    }

    /// Current live holder of `key`.
    pub async fn holder(&self, key: &str) -> Option<String> {
        let locks = self.inner.locks.read().await;
        let now = Instant::now();
        locks
            .get(key)
            .filter(|state| state.is_live(now))
            .map(|state| state.holder_id.clone())
    }
}

impl Default for MemoryLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LockRegistry for MemoryLockRegistry {
    fn obtain(&self, key: &str, holder_id: &str) -> LockResult<Arc<dyn DistributedLock>> {
        Ok(Arc::new(self.lock(key, holder_id)?))
    }
}

/// Handle on one key of a [`MemoryLockRegistry`] for one holder.
#[derive(Debug)]
pub struct MemoryLock {
    key: String,
    holder_id: String,
    registry: Arc<Registry>,
    fencing_token: AtomicU64,
}

impl MemoryLock {
    /// Lock key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Holder this handle acquires for.
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Fencing token of the latest acquisition through this handle.
    pub fn fencing_token(&self) -> Option<u64> {
        match self.fencing_token.load(Ordering::SeqCst) {
            NO_TOKEN => None,
            token => Some(token),
        }
    }

    fn owns(&self, state: &LockState, now: Instant) -> bool {
        state.is_live(now)
            && state.holder_id == self.holder_id
            && state.fencing_token == self.fencing_token.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn try_lock(&self, timeout: Duration) -> LockResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let released = self.registry.released.notified();
            let held_until = {
                let mut locks = self.registry.locks.write().await;
                let now = Instant::now();
                let expires_at = self.registry.lease.map(|lease| now + lease);
                let current = locks
                    .get(&self.key)
                    .filter(|state| state.is_live(now))
                    .map(|state| (state.holder_id == self.holder_id, state.fencing_token, state.expires_at));
                match current {
                    Some((false, _, held_until)) => held_until,
                    Some((true, token, _)) => {
                        if let Some(state) = locks.get_mut(&self.key) {
                            state.expires_at = expires_at;
                        }
                        self.fencing_token.store(token, Ordering::SeqCst);
                        trace!(lock = %self.key, holder = %self.holder_id, "Lock re-entered");
                        return Ok(true);
                    }
                    None => {
                        let token = self.registry.next_token.fetch_add(1, Ordering::SeqCst);
                        locks.insert(
                            self.key.clone(),
                            LockState {
                                holder_id: self.holder_id.clone(),
                                fencing_token: token,
                                expires_at,
                            },
                        );
                        self.fencing_token.store(token, Ordering::SeqCst);
                        debug!(
                            lock = %self.key,
                            holder = %self.holder_id,
                            fencing_token = token,
                            "Lock acquired"
                        );
                        return Ok(true);
                    }
                }
            };

            if Instant::now() >= deadline {
                return Ok(false);
            }
            let wake_at = held_until.map_or(deadline, |expires_at| expires_at.min(deadline));
            let _ = timeout_at(wake_at, released).await;
        }
    }

    async fn is_locked_by_current_holder(&self) -> LockResult<bool> {
        let locks = self.registry.locks.read().await;
        let now = Instant::now();
        Ok(locks
            .get(&self.key)
            .map(|state| self.owns(state, now))
            .unwrap_or(false))
    }

    async fn unlock(&self) -> LockResult<()> {
        let mut locks = self.registry.locks.write().await;
        let now = Instant::now();
        let owned = locks
            .get(&self.key)
            .map(|state| self.owns(state, now))
            .unwrap_or(false);
        if !owned {
            return Err(LockError::NotHeld(format!(
                "{} is not held by {}",
                self.key, self.holder_id
            )));
        }

        locks.remove(&self.key);
        drop(locks);
        self.fencing_token.store(NO_TOKEN, Ordering::SeqCst);
        self.registry.released.notify_waiters();
        debug!(lock = %self.key, holder = %self.holder_id, "Lock released");
        Ok(())
    }

    async fn renew(&self) -> LockResult<()> {
        let mut locks = self.registry.locks.write().await;
        let now = Instant::now();
        match locks.get_mut(&self.key) {
            Some(state) if self.owns(state, now) => {
                state.expires_at = self.registry.lease.map(|lease| now + lease);
                Ok(())
            }
            _ if self.fencing_token().is_some() => Err(LockError::LockExpired(format!(
                "{} lease lost by {}",
                self.key, self.holder_id
            ))),
            _ => Err(LockError::NotHeld(format!(
                "{} is not held by {}",
                self.key, self.holder_id
            ))),
        }
    }

    fn lease_duration(&self) -> Option<Duration> {
        self.registry.lease
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_lock_free_lock() {
        let registry = MemoryLockRegistry::new();
        let lock = registry.lock("leader", "node-1").unwrap();

        assert!(lock.try_lock(Duration::ZERO).await.unwrap());
        assert!(lock.is_locked_by_current_holder().await.unwrap());
        assert_eq!(registry.holder("leader").await, Some("node-1".to_string()));
    }

    #[tokio::test]
    async fn test_try_lock_held_by_other_times_out() {
        let registry = MemoryLockRegistry::new();
        let first = registry.lock("leader", "node-1").unwrap();
        let second = registry.lock("leader", "node-2").unwrap();

        assert!(first.try_lock(Duration::ZERO).await.unwrap());
        assert!(!second.try_lock(Duration::from_millis(20)).await.unwrap());
        assert!(!second.is_locked_by_current_holder().await.unwrap());
    }

    #[tokio::test]
    async fn test_reentrant_acquisition_keeps_token() {
        let registry = MemoryLockRegistry::new();
        let lock = registry.lock("leader", "node-1").unwrap();

        assert!(lock.try_lock(Duration::ZERO).await.unwrap());
        let token = lock.fencing_token();
        assert!(lock.try_lock(Duration::ZERO).await.unwrap());
        assert_eq!(lock.fencing_token(), token);
    }

    #[tokio::test]
    async fn test_fencing_tokens_increase() {
        let registry = MemoryLockRegistry::new();
        let first = registry.lock("leader", "node-1").unwrap();
        let second = registry.lock("leader", "node-2").unwrap();

        first.try_lock(Duration::ZERO).await.unwrap();
        let first_token = first.fencing_token().unwrap();
        first.unlock().await.unwrap();
        assert_eq!(first.fencing_token(), None);

        second.try_lock(Duration::ZERO).await.unwrap();
        assert!(second.fencing_token().unwrap() > first_token);
    }

    #[tokio::test]
    async fn test_unlock_wakes_waiter() {
        let registry = MemoryLockRegistry::new();
        let first = registry.lock("leader", "node-1").unwrap();
        let second = Arc::new(registry.lock("leader", "node-2").unwrap());
        first.try_lock(Duration::ZERO).await.unwrap();

        let waiter = {
            let second = second.clone();
            tokio::spawn(async move {
                let started = std::time::Instant::now();
                let acquired = second.try_lock(Duration::from_secs(10)).await.unwrap();
                (acquired, started.elapsed())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        first.unlock().await.unwrap();

        let (acquired, waited) = waiter.await.unwrap();
        assert!(acquired);
        assert!(waited < Duration::from_secs(5));
        assert_eq!(registry.holder("leader").await, Some("node-2".to_string()));
    }

    #[tokio::test]
    async fn test_unlock_by_non_holder_fails() {
        let registry = MemoryLockRegistry::new();
        let first = registry.lock("leader", "node-1").unwrap();
        let second = registry.lock("leader", "node-2").unwrap();
        first.try_lock(Duration::ZERO).await.unwrap();

        assert!(matches!(second.unlock().await, Err(LockError::NotHeld(_))));
        assert!(first.is_locked_by_current_holder().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry_fences_stale_holder() {
        let registry = MemoryLockRegistry::with_lease(Duration::from_secs(1)).unwrap();
        let first = registry.lock("leader", "node-1").unwrap();
        let second = registry.lock("leader", "node-2").unwrap();
        first.try_lock(Duration::ZERO).await.unwrap();
        assert_eq!(first.lease_duration(), Some(Duration::from_secs(1)));

        // waiting past the lease lets the contender in
        assert!(second.try_lock(Duration::from_secs(5)).await.unwrap());
        assert!(!first.is_locked_by_current_holder().await.unwrap());
        assert!(matches!(first.renew().await, Err(LockError::LockExpired(_))));
        assert!(matches!(first.unlock().await, Err(LockError::NotHeld(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_extends_lease() {
        let registry = MemoryLockRegistry::with_lease(Duration::from_secs(1)).unwrap();
        let lock = registry.lock("leader", "node-1").unwrap();
        lock.try_lock(Duration::ZERO).await.unwrap();

        tokio::time::advance(Duration::from_millis(800)).await;
        lock.renew().await.unwrap();
        tokio::time::advance(Duration::from_millis(800)).await;
        assert!(lock.is_locked_by_current_holder().await.unwrap());
    }

    #[test]
    fn test_invalid_identifiers() {
        let registry = MemoryLockRegistry::new();
        assert!(matches!(registry.obtain("", "node-1"), Err(LockError::InvalidKey(_))));
        assert!(matches!(
            registry.obtain("leader", ""),
            Err(LockError::InvalidHolderId(_))
        ));
        assert!(matches!(
            MemoryLockRegistry::with_lease(Duration::ZERO),
            Err(LockError::ConfigError(_))
        ));
    }
}
