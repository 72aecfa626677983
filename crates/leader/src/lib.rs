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

//! # PlexFlow Leader Election
//!
//! ## Purpose
//! Keeps exactly one [`Candidate`] per role in charge across a cluster by
//! continuously contending for a [`plexflow_locks::DistributedLock`].
//!
//! ## Key Components
//! - [`Candidate`]: receives granted/revoked callbacks
//! - [`LeaderContext`]: leadership flag and voluntary yield, readable from any task
//! - [`LeaderEventPublisher`]: optional sink for [`LeaderEvent`]s
//! - [`LeaderInitiator`]: the background task driving the election
//!
//! ## States
//! ```text
//! STOPPED --start--> RUNNING (not leader) --lock acquired--> RUNNING (leader)
//!    ^                    ^                                       |
//!    |                    +------ lock lost / error / yield ------+
//!    +------------------------ stop (revokes first) --------------+
//! ```

mod candidate;
mod context;
mod error;
mod event;
mod initiator;

pub use candidate::{Candidate, DefaultCandidate};
pub use context::LeaderContext;
pub use error::{LeaderError, LeaderResult};
pub use event::{BroadcastLeaderEventPublisher, LeaderEvent, LeaderEventPublisher};
pub use initiator::LeaderInitiator;
