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

//! # PlexFlow Polling
//!
//! ## Purpose
//! Turns an upstream that can only be listed (a directory, a remote file
//! share) into a stream of claimed deliveries with explicit acknowledgment.
//!
//! ## Poll Cycle
//! 1. **Refresh**: the [`Lister`] produces a snapshot, optionally filtered by
//!    a [`plexflow_selector::SelectorChain`], which is merged into the backlog
//! 2. **Check**: nothing NEW means [`Poll::Empty`]
//! 3. **Build**: up to `max_fetch_size` NEW entries are claimed into a [`Delivery`]
//! 4. **Outcome**: whoever processes the delivery calls
//!    [`Acknowledgment::success`] or [`Acknowledgment::failure`], possibly
//!    from another task
//!
//! A failed refresh leaves the backlog untouched.

mod directory;
mod error;
mod lister;
mod source;

pub use directory::{DirectoryLister, FileEntry, FILE_NAME_HEADER, RELATIVE_PATH_HEADER};
pub use error::{PollError, PollResult};
pub use lister::Lister;
pub use source::{Acknowledgment, Delivery, Poll, PollingSource};
