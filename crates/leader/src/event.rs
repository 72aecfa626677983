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

//! Leadership events.

use crate::{LeaderContext, LeaderError, LeaderResult};
use tokio::sync::broadcast;
use tracing::trace;

/// A leadership transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderEvent {
    /// Candidate became leader
    Granted {
        /// Role contended for
        role: String,
        /// Candidate id
        candidate_id: String,
        /// Leadership context; listeners may yield through it
        context: LeaderContext,
    },
    /// Candidate stopped being leader
    Revoked {
        /// Role contended for
        role: String,
        /// Candidate id
        candidate_id: String,
        /// Leadership context
        context: LeaderContext,
    },
}

impl LeaderEvent {
    /// Role of the event.
    pub fn role(&self) -> &str {
        match self {
            LeaderEvent::Granted { role, .. } | LeaderEvent::Revoked { role, .. } => role,
        }
    }

    /// Context of the candidate the event is about.
    pub fn context(&self) -> &LeaderContext {
        match self {
            LeaderEvent::Granted { context, .. } | LeaderEvent::Revoked { context, .. } => context,
        }
    }

    /// Whether this is a grant.
    pub fn is_granted(&self) -> bool {
        matches!(self, LeaderEvent::Granted { .. })
    }
}

/// Sink for leadership events.
///
/// Failures are logged by the initiator and never interrupt the election.
pub trait LeaderEventPublisher: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: LeaderEvent) -> LeaderResult<()>;
}

/// Publisher fanning events out on a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastLeaderEventPublisher {
    sender: broadcast::Sender<LeaderEvent>,
}

impl BroadcastLeaderEventPublisher {
    /// Publisher retaining up to `capacity` undelivered events per receiver.
    pub fn new(capacity: usize) -> LeaderResult<Self> {
        if capacity == 0 {
            return Err(LeaderError::InvalidConfiguration(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        let (sender, _) = broadcast::channel(capacity);
        Ok(Self { sender })
    }

    /// Receive events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LeaderEvent> {
        self.sender.subscribe()
    }
}

impl LeaderEventPublisher for BroadcastLeaderEventPublisher {
    fn publish(&self, event: LeaderEvent) -> LeaderResult<()> {
        if self.sender.receiver_count() == 0 {
            trace!(?event, "No leader event subscribers");
            return Ok(());
        }
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|e| LeaderError::Publisher(e.to_string()))
    }
}
