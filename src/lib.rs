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

//! PlexFlow: message coordination primitives
//!
//! Core pieces:
//! 1. Backlog claim/commit/rollback for polled work
//! 2. Selector chains combining predicates by vote
//! 3. Polling sources feeding listed snapshots through a backlog
//! 4. Lock-driven leader election with voluntary yield
//! 5. Reactive socket channels bridging blocking transports to async subscribers

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Independent crates - re-export them here
pub use plexflow_backlog as backlog;
pub use plexflow_channel as channel;
pub use plexflow_common as common;
pub use plexflow_leader as leader;
pub use plexflow_locks as locks;
pub use plexflow_polling as polling;
pub use plexflow_selector as selector;

// Re-export core types for convenience
pub use backlog::{Backlog, BacklogError, BacklogItem, Claim, ClaimToken};
pub use channel::{
    ChannelError, ChannelMessage, LoopbackTransport, MessageHandler, ReactiveSocketChannel,
    TransportSocket,
};
pub use common::{
    init_tracing, BacklogConfig, ChannelConfig, ChannelMode, ConfigBootstrap, LeaderConfig,
    PlexflowConfig, PollingConfig,
};
pub use leader::{Candidate, DefaultCandidate, LeaderContext, LeaderError, LeaderInitiator};
pub use locks::{DistributedLock, LockRegistry, MemoryLockRegistry};
pub use polling::{DirectoryLister, Lister, Poll, PollError, PollingSource};
pub use selector::{Selector, SelectorChain, VotingStrategy};
