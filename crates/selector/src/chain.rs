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

//! Selector chain and voting.

use crate::{SelectorError, SelectorResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A boolean predicate over an item.
pub trait Selector<T: ?Sized>: Send + Sync {
    /// Whether the item is accepted.
    fn accept(&self, item: &T) -> bool;
}

impl<T: ?Sized, F> Selector<T> for F
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn accept(&self, item: &T) -> bool {
        self(item)
    }
}

/// Rule combining the votes of a chain.
///
/// Zero accepting votes always reject, whatever the strategy, so an empty
/// chain never accepts vacuously.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotingStrategy {
    /// Every selector accepts (stops at the first rejection)
    #[default]
    All,
    /// At least one selector accepts (stops at the first acceptance)
    Any,
    /// Strictly more than half accept
    Majority,
    /// At least half accept
    MajorityOrTie,
}

impl VotingStrategy {
    fn decide(self, accepted: usize, total: usize) -> bool {
        if accepted == 0 {
            return false;
        }
        match self {
            VotingStrategy::All | VotingStrategy::Any => true,
            VotingStrategy::Majority => 2 * accepted > total,
            VotingStrategy::MajorityOrTie => 2 * accepted >= total,
        }
    }
}

type SelectorList<T> = Vec<Arc<dyn Selector<T>>>;

/// Ordered chain of selectors evaluated with one voting strategy.
///
/// ## Concurrency
/// Evaluation works on a snapshot of the list: `add` and `set_selectors`
/// swap in a new list (copy-on-write) and never disturb an evaluation in
/// progress. Bulk replacement is additionally serialized by its own lock.
pub struct SelectorChain<T: ?Sized> {
    strategy: VotingStrategy,
    selectors: RwLock<Arc<SelectorList<T>>>,
    replace_lock: Mutex<()>,
}

impl<T: ?Sized> SelectorChain<T> {
    /// Empty chain with [`VotingStrategy::All`].
    pub fn new() -> Self {
        Self::with_strategy(VotingStrategy::default())
    }

    /// Empty chain with the given strategy.
    pub fn with_strategy(strategy: VotingStrategy) -> Self {
        Self {
            strategy,
            selectors: RwLock::new(Arc::new(Vec::new())),
            replace_lock: Mutex::new(()),
        }
    }

    /// Voting strategy of this chain.
    pub fn strategy(&self) -> VotingStrategy {
        self.strategy
    }

    /// Append a selector.
    pub fn add<S>(&self, selector: S)
    where
        S: Selector<T> + 'static,
    {
        self.add_shared(Arc::new(selector));
    }

    /// Append an already shared selector.
    pub fn add_shared(&self, selector: Arc<dyn Selector<T>>) {
        let mut selectors = self.selectors.write();
        Arc::make_mut(&mut selectors).push(selector);
    }

    /// Replace every selector.
    ///
    /// ## Errors
    /// - [`SelectorError::EmptySelectors`]: `selectors` is empty
    pub fn set_selectors(&self, selectors: Vec<Arc<dyn Selector<T>>>) -> SelectorResult<()> {
        if selectors.is_empty() {
            return Err(SelectorError::EmptySelectors);
        }
        let _guard = self.replace_lock.lock();
        *self.selectors.write() = Arc::new(selectors);
        Ok(())
    }

    /// Number of selectors.
    pub fn len(&self) -> usize {
        self.selectors.read().len()
    }

    /// Whether the chain has no selectors.
    pub fn is_empty(&self) -> bool {
        self.selectors.read().is_empty()
    }

    /// Evaluate the chain against `item`.
    pub fn accept(&self, item: &T) -> bool {
        let selectors = Arc::clone(&self.selectors.read());

        let mut total = 0;
        let mut accepted = 0;
        for selector in selectors.iter() {
            total += 1;
            if selector.accept(item) {
                if self.strategy == VotingStrategy::Any {
                    return true;
                }
                accepted += 1;
            } else if self.strategy == VotingStrategy::All {
                return false;
            }
        }

        let decision = self.strategy.decide(accepted, total);
        trace!(strategy = ?self.strategy, accepted, total, decision, "Selector chain voted");
        decision
    }
}

impl<T: ?Sized> Default for SelectorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Selector<T> for SelectorChain<T> {
    fn accept(&self, item: &T) -> bool {
        SelectorChain::accept(self, item)
    }
}

impl<T: ?Sized> fmt::Debug for SelectorChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorChain")
            .field("strategy", &self.strategy)
            .field("selectors", &self.len())
            .finish()
    }
}
