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

//! Backlog items and entries.

use std::fmt::Debug;
use std::hash::Hash;

/// A unit of discovered work, such as a remote file.
///
/// ## Identity and freshness
/// `key()` identifies the item across snapshots (for files: the full path).
/// `freshness()` changes whenever upstream content changes (for files: the
/// modification time and size). An entry whose freshness is unchanged is left
/// alone by a merge; a changed one becomes NEW again.
pub trait BacklogItem: Clone + Send + Sync + 'static {
    /// Identity key
    type Key: Eq + Hash + Clone + Debug + Send + Sync;
    /// Freshness token
    type Freshness: PartialEq + Clone + Debug + Send + Sync;

    /// Identity of this item.
    fn key(&self) -> Self::Key;

    /// Freshness of this item.
    fn freshness(&self) -> Self::Freshness;
}

/// Processing state of a backlog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    /// Discovered (or rediscovered after a change) and waiting to be claimed
    New,
    /// Part of the outstanding claim
    Claimed,
    /// Committed; kept so an unchanged re-listing is not processed again
    Done,
}

/// A backlog entry: the last observed item plus its state.
#[derive(Debug, Clone)]
pub struct BacklogEntry<T: BacklogItem> {
    pub(crate) item: T,
    pub(crate) status: EntryStatus,
    pub(crate) sequence: u64,
}

impl<T: BacklogItem> BacklogEntry<T> {
    pub(crate) fn new(item: T, sequence: u64) -> Self {
        Self {
            item,
            status: EntryStatus::New,
            sequence,
        }
    }

    /// The last observed item.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Current status.
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Discovery sequence number (lower = discovered earlier).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
