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

//! ## Purpose
//! Logging and metrics helpers for channel traffic, shared by the send and
//! receive paths of [`crate::ReactiveSocketChannel`].
//!
//! ## Usage
//! ```rust
//! use plexflow_channel::observability::*;
//!
//! record_message_sent("orders", "01HZX", 128);
//! record_message_received("orders", "01HZX", Some("eu"));
//! ```

use tracing::{debug, trace, warn};

/// Record bytes handed to the transport.
///
/// ## Observability
/// - Logs at trace level with structured fields
/// - Increments `plexflow_channel_messages_sent_total`
pub fn record_message_sent(channel_name: &str, message_id: &str, bytes: usize) {
    trace!(
        channel = %channel_name,
        message_id = %message_id,
        bytes = bytes,
        "Channel message sent"
    );
    metrics::counter!("plexflow_channel_messages_sent_total", "channel" => channel_name.to_string())
        .increment(1);
}

/// Record a message decoded by the receive loop.
///
/// ## Observability
/// - Logs at trace level with structured fields
/// - Increments `plexflow_channel_messages_received_total`
pub fn record_message_received(channel_name: &str, message_id: &str, topic: Option<&str>) {
    trace!(
        channel = %channel_name,
        message_id = %message_id,
        topic = ?topic,
        "Channel message received"
    );
    metrics::counter!("plexflow_channel_messages_received_total", "channel" => channel_name.to_string())
        .increment(1);
}

/// Record an inbound frame that could not be decoded. The frame is dropped.
pub fn record_decode_failure(channel_name: &str, bytes: usize, error: &str) {
    warn!(
        channel = %channel_name,
        bytes = bytes,
        error = %error,
        "Dropping undecodable frame"
    );
    metrics::counter!("plexflow_channel_decode_failures_total", "channel" => channel_name.to_string())
        .increment(1);
}

/// Record a failure that is logged rather than returned.
///
/// ## Arguments
/// * `channel_name` - Name of the channel
/// * `operation` - What failed (`receive`, `handle`, `close`, ...)
/// * `error` - Error description
pub fn record_channel_error(channel_name: &str, operation: &str, error: &str) {
    warn!(
        channel = %channel_name,
        operation = %operation,
        error = %error,
        "Channel operation failed"
    );
    metrics::counter!(
        "plexflow_channel_errors_total",
        "channel" => channel_name.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a subscription change.
pub fn record_subscription_change(channel_name: &str, subscribed: bool, active: usize) {
    debug!(
        channel = %channel_name,
        subscribed = subscribed,
        active_subscriptions = active,
        "Channel subscription changed"
    );
}
