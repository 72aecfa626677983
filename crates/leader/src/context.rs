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

//! Leadership context handed to candidates.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug)]
struct ContextState {
    role: String,
    id: String,
    bound: bool,
    leader: AtomicBool,
    yield_signal: Semaphore,
}

/// View of one candidate's leadership.
///
/// Cheap to clone; every clone observes the same state. `is_leader` never
/// blocks. A context not bound to an initiator (see [`LeaderContext::null`])
/// is never leader and ignores yield requests.
#[derive(Debug, Clone)]
pub struct LeaderContext {
    inner: Arc<ContextState>,
}

impl LeaderContext {
    pub(crate) fn new(role: impl Into<String>, id: impl Into<String>) -> Self {
        Self::build(role.into(), id.into(), true)
    }

    /// Context that is not attached to any election.
    pub fn null() -> Self {
        Self::build(String::new(), String::new(), false)
    }

    fn build(role: String, id: String, bound: bool) -> Self {
        Self {
            inner: Arc::new(ContextState {
                role,
                id,
                bound,
                leader: AtomicBool::new(false),
                yield_signal: Semaphore::new(0),
            }),
        }
    }

    /// Whether the candidate currently holds leadership.
    pub fn is_leader(&self) -> bool {
        self.inner.leader.load(Ordering::SeqCst)
    }

    /// Ask the initiator to give up leadership.
    ///
    /// The initiator revokes within one heartbeat and backs off before
    /// contending again. No-op unless currently leader; repeated requests
    /// before the revoke collapse into one.
    pub fn yield_leadership(&self) {
        if !self.inner.bound || !self.is_leader() {
            return;
        }
        if self.inner.yield_signal.available_permits() == 0 {
            debug!(role = %self.inner.role, candidate = %self.inner.id, "Leadership yield requested");
            self.inner.yield_signal.add_permits(1);
        }
    }

    /// Role of the candidate.
    pub fn role(&self) -> &str {
        &self.inner.role
    }

    /// Id of the candidate.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Set the leader flag, returning the previous value.
    pub(crate) fn set_leader(&self, leader: bool) -> bool {
        self.inner.leader.swap(leader, Ordering::SeqCst)
    }

    /// Wait up to `timeout` for a yield request.
    pub(crate) async fn wait_for_yield(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.inner.yield_signal.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            _ => false,
        }
    }

    /// Drop yield requests that were not consumed.
    pub(crate) fn clear_yield(&self) {
        while let Ok(permit) = self.inner.yield_signal.try_acquire() {
            permit.forget();
        }
    }
}

impl fmt::Display for LeaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LeaderContext{{role={}, id={}, is_leader={}}}",
            self.inner.role,
            self.inner.id,
            self.is_leader()
        )
    }
}

/// Contexts are equal when they share state.
impl PartialEq for LeaderContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for LeaderContext {}
