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

//! Error types for backlog operations.

use thiserror::Error;

/// Result type for backlog operations.
pub type BacklogResult<T> = Result<T, BacklogError>;

/// Errors that can occur during backlog operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BacklogError {
    /// Another claim is still in flight
    #[error("Claim outstanding on backlog: {0}")]
    ClaimOutstanding(String),

    /// The claim token does not match the outstanding claim
    #[error("Unknown or expired claim: {0}")]
    UnknownClaim(String),

    /// Invalid backlog configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl BacklogError {
    /// Whether the operation may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BacklogError::ClaimOutstanding(_))
    }
}
