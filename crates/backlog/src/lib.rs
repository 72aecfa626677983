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

//! # PlexFlow Backlog
//!
//! ## Purpose
//! Tracks the work a polling source has discovered but not yet finished.
//! Every poll cycle reconciles a fresh snapshot from upstream against the
//! known entries, then claims a subset for in-flight processing. The claim is
//! later committed (success) or rolled back (failure), possibly from another
//! task than the one that claimed it.
//!
//! ## Entry lifecycle
//! ```text
//!   snapshot (new / changed)        claim()            processed()
//!  ──────────────────────────▶ NEW ─────────▶ CLAIMED ────────────▶ DONE
//!                               ▲                │
//!                               └────────────────┘
//!                              processing_failed() / lease expiry
//! ```
//! An entry absent from a snapshot is dropped whatever its state (except
//! while claimed, which cannot overlap a merge).
//!
//! ## Invariants
//! - At most one claim is outstanding at any time
//! - NEW entries are served in discovery order (or comparator order)
//! - A rolled-back claim returns its entries in their original relative order
//! - A snapshot merge is all-or-nothing with respect to other operations

#![warn(missing_docs)]

mod backlog;
mod error;
mod item;

pub use backlog::{Backlog, Claim, ClaimToken, SnapshotSummary};
pub use error::{BacklogError, BacklogResult};
pub use item::{BacklogEntry, BacklogItem, EntryStatus};
