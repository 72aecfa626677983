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

//! Message envelope and codecs.

use crate::{ChannelError, ChannelResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Header carrying the transport topic a message arrived on.
pub const TOPIC_HEADER: &str = "topic";

/// Message envelope carried by a [`crate::ReactiveSocketChannel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Unique message id (ULID)
    pub id: String,
    /// Opaque payload
    pub payload: Vec<u8>,
    /// String headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Creation time, milliseconds since the epoch
    pub timestamp_millis: i64,
}

impl ChannelMessage {
    /// New message with a fresh id and the current timestamp.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            payload: payload.into(),
            headers: HashMap::new(),
            timestamp_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Route the message to `topic` on topic-aware transports.
    pub fn with_topic(self, topic: impl Into<String>) -> Self {
        self.with_header(TOPIC_HEADER, topic)
    }

    /// Header value by name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Topic header, if any.
    pub fn topic(&self) -> Option<&str> {
        self.header(TOPIC_HEADER)
    }
}

/// Converts messages to and from transport bytes.
pub trait MessageCodec: Send + Sync {
    /// Encode a message for the transport.
    fn encode(&self, message: &ChannelMessage) -> ChannelResult<Vec<u8>>;

    /// Decode transport bytes.
    ///
    /// ## Errors
    /// [`ChannelError::SerializationError`] if the bytes are not a message.
    fn decode(&self, bytes: &[u8]) -> ChannelResult<ChannelMessage>;
}

/// JSON codec (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &ChannelMessage) -> ChannelResult<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    fn decode(&self, bytes: &[u8]) -> ChannelResult<ChannelMessage> {
        if bytes.is_empty() {
            return Err(ChannelError::SerializationError("empty frame".to_string()));
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}
