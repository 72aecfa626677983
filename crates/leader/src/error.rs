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

//! Error types for leader election.

use plexflow_locks::LockError;
use thiserror::Error;

/// Result type for leader election operations.
pub type LeaderResult<T> = Result<T, LeaderError>;

/// Errors that can occur during leader election.
#[derive(Error, Debug)]
pub enum LeaderError {
    /// Settings rejected at construction or start
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The distributed lock failed
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// A candidate callback failed
    #[error("Candidate error: {0}")]
    Candidate(String),

    /// Publishing a leadership event failed
    #[error("Publisher error: {0}")]
    Publisher(String),
}
