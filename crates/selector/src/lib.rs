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

//! # PlexFlow Selector
//!
//! ## Purpose
//! Combines independent boolean predicates ("selectors") over an item into a
//! single accept/reject decision using a [`VotingStrategy`].
//!
//! ## Key Components
//! - [`Selector`]: a predicate; implemented for any `Fn(&T) -> bool`
//! - [`SelectorChain`]: ordered, concurrently mutable list of selectors
//! - [`VotingStrategy`]: ALL / ANY / MAJORITY / MAJORITY_OR_TIE
//!
//! ## Example
//! ```rust
//! use plexflow_selector::{SelectorChain, VotingStrategy};
//!
//! let chain = SelectorChain::with_strategy(VotingStrategy::Majority);
//! chain.add(|n: &i32| *n > 0);
//! chain.add(|n: &i32| n % 2 == 0);
//! chain.add(|n: &i32| *n < 100);
//! assert!(chain.accept(&42));
//! assert!(!chain.accept(&-3));
//! ```

#![warn(missing_docs)]

mod chain;
mod error;

pub use chain::{Selector, SelectorChain, VotingStrategy};
pub use error::{SelectorError, SelectorResult};
