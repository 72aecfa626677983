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

//! Leadership candidates.

use crate::{LeaderContext, LeaderResult};
use async_trait::async_trait;
use tracing::info;
use ulid::Ulid;

/// Participant in a leader election.
#[async_trait]
pub trait Candidate: Send + Sync {
    /// Role contended for; one leader exists per role.
    fn role(&self) -> &str;

    /// Identity of this participant.
    fn id(&self) -> &str;

    /// Leadership was granted.
    ///
    /// An error revokes the leadership that was just granted.
    async fn on_granted(&self, context: &LeaderContext) -> LeaderResult<()>;

    /// Leadership was revoked. Errors are logged only.
    async fn on_revoked(&self, context: &LeaderContext) -> LeaderResult<()>;
}

/// Candidate that only logs its transitions.
#[derive(Debug, Clone)]
pub struct DefaultCandidate {
    role: String,
    id: String,
}

impl DefaultCandidate {
    /// Default role name.
    pub const DEFAULT_ROLE: &'static str = "leader";

    /// Candidate for `role` with a generated id.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            id: Ulid::new().to_string(),
        }
    }

    /// Candidate for `role` with the given id.
    pub fn with_id(role: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            id: id.into(),
        }
    }
}

impl Default for DefaultCandidate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROLE)
    }
}

#[async_trait]
impl Candidate for DefaultCandidate {
    fn role(&self) -> &str {
        &self.role
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn on_granted(&self, context: &LeaderContext) -> LeaderResult<()> {
        info!(role = %self.role, candidate = %self.id, %context, "Leadership granted");
        Ok(())
    }

    async fn on_revoked(&self, context: &LeaderContext) -> LeaderResult<()> {
        info!(role = %self.role, candidate = %self.id, %context, "Leadership revoked");
        Ok(())
    }
}
