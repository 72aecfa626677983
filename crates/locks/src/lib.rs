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

//! # PlexFlow Distributed Locks
//!
//! ## Purpose
//! Mutual exclusion for cluster-wide singleton ownership. The leader
//! initiator consumes locks only through [`DistributedLock`], so any
//! backend offering a timed `try_lock` and holder checks can be plugged in.
//!
//! ## Design Decisions
//! - **Holder identity**: a lock handle is obtained for a `(key, holder_id)`
//!   pair; "locked by current holder" means the handle's own holder
//! - **Fencing**: every acquisition gets a monotonically increasing token,
//!   so a holder whose lease expired cannot mistake a newer acquisition for
//!   its own
//! - **Leases**: expiring locks report their lease so callers can validate
//!   their heartbeat against it
//!
//! ## Backend Support
//! - **InMemory**: [`MemoryLockRegistry`], process-local, for tests and
//!   single-process deployments
//!
//! ## Example
//! ```rust,no_run
//! use plexflow_locks::{DistributedLock, LockRegistry, MemoryLockRegistry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MemoryLockRegistry::new();
//! let lock = registry.obtain("scheduler:leader", "node-1")?;
//!
//! if lock.try_lock(Duration::from_millis(500)).await? {
//!     assert!(lock.is_locked_by_current_holder().await?);
//!     lock.unlock().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;

pub use error::{LockError, LockResult};
pub use memory::{MemoryLock, MemoryLockRegistry};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A distributed mutual-exclusion primitive bound to one holder.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to acquire the lock, waiting at most `timeout`.
    ///
    /// ## Returns
    /// - `Ok(true)`: the lock is held by this holder (reentrant)
    /// - `Ok(false)`: still held by someone else when the timeout elapsed
    /// - `Err(LockError::BackendError)`: the backend failed
    async fn try_lock(&self, timeout: Duration) -> LockResult<bool>;

    /// Whether this holder currently owns the lock.
    async fn is_locked_by_current_holder(&self) -> LockResult<bool>;

    /// Release the lock.
    ///
    /// ## Returns
    /// - `Err(LockError::NotHeld)`: this holder does not own the lock
    async fn unlock(&self) -> LockResult<()>;

    /// Extend the lease of a held lock.
    async fn renew(&self) -> LockResult<()> {
        Ok(())
    }

    /// Lease after which an unrenewed lock is released, `None` if it never expires.
    fn lease_duration(&self) -> Option<Duration> {
        None
    }
}

/// Factory of lock handles.
pub trait LockRegistry: Send + Sync {
    /// Lock handle for `key` owned by `holder_id`.
    ///
    /// ## Returns
    /// - `Err(LockError::InvalidKey)` / `Err(LockError::InvalidHolderId)`: empty identifiers
    fn obtain(&self, key: &str, holder_id: &str) -> LockResult<Arc<dyn DistributedLock>>;
}
