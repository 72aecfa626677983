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

//! Backlog implementation.

use crate::{BacklogEntry, BacklogError, BacklogItem, BacklogResult, EntryStatus};
use plexflow_common::BacklogConfig;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};
use ulid::Ulid;

type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Opaque identifier of a claim.
///
/// Commit and rollback must present the token of the outstanding claim, so a
/// late acknowledgment for a claim that was already rolled back (for example
/// by lease expiry) cannot commit entries claimed by someone else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimToken(String);

impl ClaimToken {
    fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Token as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entries reserved for in-flight processing.
#[derive(Debug, Clone)]
pub struct Claim<T> {
    token: ClaimToken,
    items: Vec<T>,
}

impl<T> Claim<T> {
    /// Token to commit or roll back this claim.
    pub fn token(&self) -> &ClaimToken {
        &self.token
    }

    /// Claimed items in backlog order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consume the claim, returning token and items.
    pub fn into_parts(self) -> (ClaimToken, Vec<T>) {
        (self.token, self.items)
    }
}

/// Counts produced by a snapshot merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Entries seen for the first time
    pub added: usize,
    /// Known entries whose freshness changed
    pub updated: usize,
    /// Known entries left untouched
    pub unchanged: usize,
    /// Entries dropped because upstream no longer lists them
    pub removed: usize,
}

struct OutstandingClaim<K> {
    token: ClaimToken,
    keys: Vec<K>,
    claimed_at: Instant,
}

struct BacklogState<T: BacklogItem> {
    entries: HashMap<T::Key, BacklogEntry<T>>,
    next_sequence: u64,
    outstanding: Option<OutstandingClaim<T::Key>>,
}

impl<T: BacklogItem> BacklogState<T> {
    fn resolve(&mut self, keys: &[T::Key], status: EntryStatus) {
        for key in keys {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.status = status;
            }
        }
    }
}

/// Thread-safe working set for one polling source.
///
/// ## Claim contention
/// `process_snapshot` and `claim` never run while a claim is outstanding.
/// They wait up to `claim_wait_millis` for the claim to be resolved, then
/// fail with the retryable [`BacklogError::ClaimOutstanding`].
///
/// ## Lease recovery
/// When `claim_lease_millis` is non-zero, a claim that is neither committed
/// nor rolled back within the lease is rolled back automatically and its
/// token stops being accepted.
///
/// ## Example
/// ```rust,ignore
/// let backlog = Backlog::new("inbox", BacklogConfig::default())?;
/// backlog.process_snapshot(listing).await?;
/// if let Some(claim) = backlog.claim(1).await? {
///     match transfer(claim.items()).await {
///         Ok(_) => backlog.processed(claim.token()).await?,
///         Err(_) => backlog.processing_failed(claim.token()).await?,
///     }
/// }
/// ```
pub struct Backlog<T: BacklogItem> {
    name: String,
    config: BacklogConfig,
    comparator: Option<Comparator<T>>,
    state: Mutex<BacklogState<T>>,
    released: Notify,
}

impl<T: BacklogItem> Backlog<T> {
    /// Create an empty backlog.
    ///
    /// ## Errors
    /// - [`BacklogError::InvalidConfiguration`]: empty name or inconsistent settings
    pub fn new(name: impl Into<String>, config: BacklogConfig) -> BacklogResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(BacklogError::InvalidConfiguration(
                "backlog name must not be empty".to_string(),
            ));
        }
        config
            .validate()
            .map_err(|e| BacklogError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            name,
            config,
            comparator: None,
            state: Mutex::new(BacklogState {
                entries: HashMap::new(),
                next_sequence: 0,
                outstanding: None,
            }),
            released: Notify::new(),
        })
    }

    /// Order NEW entries with `comparator` instead of discovery order.
    ///
    /// Ties fall back to discovery order.
    pub fn with_comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    /// Backlog name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merge a freshly listed snapshot.
    ///
    /// Unchanged known entries are left as they are, new or changed entries
    /// become NEW, and entries missing from the snapshot are dropped.
    /// Duplicate keys within one snapshot keep their first occurrence.
    ///
    /// ## Errors
    /// - [`BacklogError::ClaimOutstanding`]: a claim is still in flight after the bounded wait
    pub async fn process_snapshot(&self, snapshot: Vec<T>) -> BacklogResult<SnapshotSummary> {
        let mut guard = self.lock_unclaimed().await?;
        let state = &mut *guard;
        let mut summary = SnapshotSummary::default();
        let mut seen = HashSet::with_capacity(snapshot.len());

        for item in snapshot {
            let key = item.key();
            if !seen.insert(key.clone()) {
                continue;
            }

            let fresh_sequence = state.next_sequence;
            let sequence_used = match state.entries.get_mut(&key) {
                Some(entry) if entry.item.freshness() == item.freshness() => {
                    summary.unchanged += 1;
                    false
                }
                Some(entry) => {
                    let rediscovered = entry.status == EntryStatus::Done;
                    if rediscovered {
                        entry.sequence = fresh_sequence;
                    }
                    entry.item = item;
                    entry.status = EntryStatus::New;
                    summary.updated += 1;
                    rediscovered
                }
                None => {
                    state
                        .entries
                        .insert(key, BacklogEntry::new(item, fresh_sequence));
                    summary.added += 1;
                    true
                }
            };
            if sequence_used {
                state.next_sequence += 1;
            }
        }

        let before = state.entries.len();
        state.entries.retain(|key, _| seen.contains(key));
        summary.removed = before - state.entries.len();

        trace!(
            backlog = %self.name,
            added = summary.added,
            updated = summary.updated,
            unchanged = summary.unchanged,
            removed = summary.removed,
            "Snapshot merged"
        );
        Ok(summary)
    }

    /// True if no entry is waiting to be claimed.
    pub async fn is_empty(&self) -> bool {
        let mut state = self.state.lock().await;
        self.expire_lease(&mut state);
        !state
            .entries
            .values()
            .any(|entry| entry.status == EntryStatus::New)
    }

    /// Claim up to `max` NEW entries in backlog order.
    ///
    /// Returns `Ok(None)` when nothing is waiting.
    ///
    /// ## Errors
    /// - [`BacklogError::ClaimOutstanding`]: a claim is still in flight after the bounded wait
    pub async fn claim(&self, max: usize) -> BacklogResult<Option<Claim<T>>> {
        let mut state = self.lock_unclaimed().await?;
        let keys: Vec<T::Key> = self
            .ordered_new(&state)
            .into_iter()
            .take(max.max(1))
            .map(|entry| entry.item.key())
            .collect();

        if keys.is_empty() {
            return Ok(None);
        }

        let mut items = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(entry) = state.entries.get_mut(key) {
                entry.status = EntryStatus::Claimed;
                items.push(entry.item.clone());
            }
        }

        let token = ClaimToken::generate();
        state.outstanding = Some(OutstandingClaim {
            token: token.clone(),
            keys,
            claimed_at: Instant::now(),
        });

        metrics::counter!("plexflow_backlog_claims_total", "backlog" => self.name.clone())
            .increment(1);
        debug!(backlog = %self.name, claim = %token, count = items.len(), "Entries claimed");
        Ok(Some(Claim { token, items }))
    }

    /// Commit the outstanding claim: its entries are done.
    ///
    /// ## Errors
    /// - [`BacklogError::UnknownClaim`]: `token` is not the outstanding claim
    pub async fn processed(&self, token: &ClaimToken) -> BacklogResult<()> {
        self.finish(token, EntryStatus::Done).await?;
        metrics::counter!("plexflow_backlog_commits_total", "backlog" => self.name.clone())
            .increment(1);
        debug!(backlog = %self.name, claim = %token, "Claim committed");
        Ok(())
    }

    /// Roll back the outstanding claim: its entries are NEW again, in their
    /// original order.
    ///
    /// ## Errors
    /// - [`BacklogError::UnknownClaim`]: `token` is not the outstanding claim
    pub async fn processing_failed(&self, token: &ClaimToken) -> BacklogResult<()> {
        self.finish(token, EntryStatus::New).await?;
        metrics::counter!("plexflow_backlog_rollbacks_total", "backlog" => self.name.clone())
            .increment(1);
        debug!(backlog = %self.name, claim = %token, "Claim rolled back");
        Ok(())
    }

    /// Whether a claim is in flight.
    pub async fn has_outstanding_claim(&self) -> bool {
        let mut state = self.state.lock().await;
        self.expire_lease(&mut state);
        state.outstanding.is_some()
    }

    /// Number of entries not yet done (NEW or CLAIMED).
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state
            .entries
            .values()
            .filter(|entry| entry.status != EntryStatus::Done)
            .count()
    }

    /// Number of NEW entries.
    pub async fn new_count(&self) -> usize {
        let mut state = self.state.lock().await;
        self.expire_lease(&mut state);
        state
            .entries
            .values()
            .filter(|entry| entry.status == EntryStatus::New)
            .count()
    }

    /// NEW items in the order they would be claimed.
    pub async fn new_items(&self) -> Vec<T> {
        let mut state = self.state.lock().await;
        self.expire_lease(&mut state);
        self.ordered_new(&state)
            .into_iter()
            .map(|entry| entry.item.clone())
            .collect()
    }

    /// Every tracked entry in discovery order, done ones included.
    pub async fn entries(&self) -> Vec<BacklogEntry<T>> {
        let state = self.state.lock().await;
        let mut entries: Vec<BacklogEntry<T>> = state.entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }

    async fn finish(&self, token: &ClaimToken, status: EntryStatus) -> BacklogResult<()> {
        let mut state = self.state.lock().await;
        self.expire_lease(&mut state);

        let matches = state
            .outstanding
            .as_ref()
            .map(|claim| &claim.token == token)
            .unwrap_or(false);
        if !matches {
            return Err(BacklogError::UnknownClaim(token.to_string()));
        }

        if let Some(claim) = state.outstanding.take() {
            state.resolve(&claim.keys, status);
        }
        drop(state);
        self.released.notify_waiters();
        Ok(())
    }

    /// Lock the state once no claim is outstanding, waiting at most `claim_wait`.
    async fn lock_unclaimed(&self) -> BacklogResult<MutexGuard<'_, BacklogState<T>>> {
        let deadline = Instant::now() + self.config.claim_wait();
        loop {
            let released = self.released.notified();
            let lease_deadline = {
                let mut state = self.state.lock().await;
                self.expire_lease(&mut state);
                match state.outstanding.as_ref().map(|claim| claim.claimed_at) {
                    None => return Ok(state),
                    Some(claimed_at) => self.config.claim_lease().map(|lease| claimed_at + lease),
                }
            };

            let wake_at = match lease_deadline {
                Some(lease_deadline) if lease_deadline < deadline => lease_deadline,
                _ => deadline,
            };
            if timeout_at(wake_at, released).await.is_err() && wake_at == deadline {
                return Err(BacklogError::ClaimOutstanding(self.name.clone()));
            }
        }
    }

    fn expire_lease(&self, state: &mut BacklogState<T>) {
        let Some(lease) = self.config.claim_lease() else {
            return;
        };
        let expired = state
            .outstanding
            .as_ref()
            .map(|claim| claim.claimed_at.elapsed() >= lease)
            .unwrap_or(false);
        if !expired {
            return;
        }

        if let Some(claim) = state.outstanding.take() {
            state.resolve(&claim.keys, EntryStatus::New);
            warn!(
                backlog = %self.name,
                claim = %claim.token,
                count = claim.keys.len(),
                lease_ms = lease.as_millis() as u64,
                "Claim lease expired, entries rolled back"
            );
            metrics::counter!("plexflow_backlog_lease_expired_total", "backlog" => self.name.clone())
                .increment(1);
            self.released.notify_waiters();
        }
    }

    fn ordered_new<'a>(&self, state: &'a BacklogState<T>) -> Vec<&'a BacklogEntry<T>> {
        let mut pending: Vec<&BacklogEntry<T>> = state
            .entries
            .values()
            .filter(|entry| entry.status == EntryStatus::New)
            .collect();
        match &self.comparator {
            Some(comparator) => pending.sort_by(|a, b| {
                comparator(&a.item, &b.item).then_with(|| a.sequence.cmp(&b.sequence))
            }),
            None => pending.sort_by_key(|entry| entry.sequence),
        }
        pending
    }
}

impl<T: BacklogItem> fmt::Debug for Backlog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backlog")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
