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

//! Error types for polling sources.

use plexflow_backlog::BacklogError;
use thiserror::Error;

/// Result type for polling operations.
pub type PollResult<T> = Result<T, PollError>;

/// Errors that can occur while polling.
#[derive(Error, Debug)]
pub enum PollError {
    /// The lister could not produce a snapshot
    #[error("Lister error: {0}")]
    Lister(String),

    /// Filesystem failure while listing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backlog rejected the operation
    #[error("Backlog error: {0}")]
    Backlog(#[from] BacklogError),

    /// Settings rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PollError {
    /// Whether the next poll may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            PollError::Lister(_) | PollError::Io(_) => true,
            PollError::Backlog(e) => e.is_retryable(),
            PollError::InvalidConfiguration(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PollError::Lister("timeout".to_string()).is_retryable());
        assert!(PollError::Backlog(BacklogError::ClaimOutstanding("inbox".to_string())).is_retryable());
        assert!(!PollError::Backlog(BacklogError::UnknownClaim("01H".to_string())).is_retryable());
        assert!(!PollError::InvalidConfiguration("max_fetch_size".to_string()).is_retryable());
    }
}
