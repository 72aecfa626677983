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

//! Polling source driving the backlog.

use crate::{Lister, PollError, PollResult};
use plexflow_backlog::{Backlog, BacklogItem, ClaimToken};
use plexflow_common::PollingConfig;
use plexflow_selector::SelectorChain;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

type HeaderExtractor<T> = Arc<dyn Fn(&T) -> HashMap<String, String> + Send + Sync>;

/// Outcome of one poll.
#[derive(Debug)]
pub enum Poll<T: BacklogItem> {
    /// Claimed work awaiting acknowledgment
    Item(Delivery<T>),
    /// Nothing is waiting
    Empty,
}

impl<T: BacklogItem> Poll<T> {
    /// Whether nothing was delivered.
    pub fn is_empty(&self) -> bool {
        matches!(self, Poll::Empty)
    }

    /// The delivery, if any.
    pub fn into_delivery(self) -> Option<Delivery<T>> {
        match self {
            Poll::Item(delivery) => Some(delivery),
            Poll::Empty => None,
        }
    }
}

/// Handle reporting the outcome of a delivery back to the backlog.
///
/// Clones refer to the same claim, so the handle can be moved to whichever
/// task finishes processing. The first outcome wins; later ones fail with
/// [`plexflow_backlog::BacklogError::UnknownClaim`].
pub struct Acknowledgment<T: BacklogItem> {
    backlog: Arc<Backlog<T>>,
    token: ClaimToken,
}

impl<T: BacklogItem> Clone for Acknowledgment<T> {
    fn clone(&self) -> Self {
        Self {
            backlog: self.backlog.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T: BacklogItem> Acknowledgment<T> {
    /// Claim being acknowledged.
    pub fn token(&self) -> &ClaimToken {
        &self.token
    }

    /// Processing succeeded: commit the claim.
    pub async fn success(&self) -> PollResult<()> {
        self.backlog.processed(&self.token).await?;
        Ok(())
    }

    /// Processing failed: roll the claim back for redelivery.
    pub async fn failure(&self) -> PollResult<()> {
        self.backlog.processing_failed(&self.token).await?;
        Ok(())
    }
}

impl<T: BacklogItem> fmt::Debug for Acknowledgment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acknowledgment")
            .field("backlog", &self.backlog.name())
            .field("token", &self.token)
            .finish()
    }
}

/// Items claimed by one poll.
#[derive(Debug)]
pub struct Delivery<T: BacklogItem> {
    items: Vec<T>,
    headers: HashMap<String, String>,
    acknowledgment: Acknowledgment<T>,
}

impl<T: BacklogItem> Delivery<T> {
    /// Claimed items in backlog order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// First claimed item.
    pub fn item(&self) -> Option<&T> {
        self.items.first()
    }

    /// Headers describing the delivery.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Acknowledgment handle for this delivery.
    pub fn acknowledgment(&self) -> Acknowledgment<T> {
        self.acknowledgment.clone()
    }

    /// Consume the delivery.
    pub fn into_parts(self) -> (Vec<T>, HashMap<String, String>, Acknowledgment<T>) {
        (self.items, self.headers, self.acknowledgment)
    }
}

/// Poll-driven source over a [`Lister`] and a [`Backlog`].
///
/// ## Purpose
/// Each [`receive`](PollingSource::receive) lists the upstream, merges the
/// snapshot into the backlog and claims the next NEW entries. The claim stays
/// outstanding until the delivery is acknowledged, so a receive issued while
/// a delivery is unacknowledged fails with a retryable
/// [`PollError::Backlog`] once the backlog's claim wait elapses.
///
/// ## Headers
/// A header extractor (see [`with_headers`](PollingSource::with_headers)) is
/// applied when a delivery carries exactly one item.
pub struct PollingSource<T: BacklogItem> {
    lister: Arc<dyn Lister<T>>,
    backlog: Arc<Backlog<T>>,
    filter: Option<Arc<SelectorChain<T>>>,
    headers: Option<HeaderExtractor<T>>,
    config: PollingConfig,
}

impl<T: BacklogItem> PollingSource<T> {
    /// Create a source.
    ///
    /// ## Errors
    /// - [`PollError::InvalidConfiguration`]: `max_fetch_size` is zero
    pub fn new(
        lister: Arc<dyn Lister<T>>,
        backlog: Arc<Backlog<T>>,
        config: PollingConfig,
    ) -> PollResult<Self> {
        config
            .validate()
            .map_err(|e| PollError::InvalidConfiguration(e.to_string()))?;
        Ok(Self {
            lister,
            backlog,
            filter: None,
            headers: None,
            config,
        })
    }

    /// Only merge listed items accepted by `filter`.
    pub fn with_filter(mut self, filter: Arc<SelectorChain<T>>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Derive delivery headers from a single delivered item.
    pub fn with_headers<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&T) -> HashMap<String, String> + Send + Sync + 'static,
    {
        self.headers = Some(Arc::new(extractor));
        self
    }

    /// Backlog fed by this source.
    pub fn backlog(&self) -> &Arc<Backlog<T>> {
        &self.backlog
    }

    /// Run one poll cycle.
    ///
    /// ## Returns
    /// - `Ok(Poll::Item(_))`: entries were claimed and await acknowledgment
    /// - `Ok(Poll::Empty)`: nothing is waiting
    ///
    /// ## Errors
    /// - [`PollError::Lister`] / [`PollError::Io`]: listing failed, backlog unchanged
    /// - [`PollError::Backlog`]: a previous delivery is still unacknowledged
    pub async fn receive(&self) -> PollResult<Poll<T>> {
        let mut snapshot = self.lister.list_snapshot().await?;
        if let Some(filter) = &self.filter {
            let listed = snapshot.len();
            snapshot.retain(|item| filter.accept(item));
            trace!(
                backlog = %self.backlog.name(),
                listed,
                accepted = snapshot.len(),
                "Snapshot filtered"
            );
        }

        self.backlog.process_snapshot(snapshot).await?;
        if self.backlog.is_empty().await {
            return Ok(Poll::Empty);
        }

        let Some(claim) = self.backlog.claim(self.config.max_fetch_size).await? else {
            return Ok(Poll::Empty);
        };
        let (token, items) = claim.into_parts();

        let headers = match (&self.headers, items.as_slice()) {
            (Some(extractor), [item]) => extractor(item),
            _ => HashMap::new(),
        };
        debug!(
            backlog = %self.backlog.name(),
            claim = %token,
            count = items.len(),
            "Delivery built"
        );

        Ok(Poll::Item(Delivery {
            items,
            headers,
            acknowledgment: Acknowledgment {
                backlog: self.backlog.clone(),
                token,
            },
        }))
    }
}

impl<T: BacklogItem> fmt::Debug for PollingSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingSource")
            .field("backlog", &self.backlog.name())
            .field("filtered", &self.filter.is_some())
            .field("config", &self.config)
            .finish()
    }
}
