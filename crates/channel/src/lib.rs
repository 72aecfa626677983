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

//! # PlexFlow Channel
//!
//! ## Purpose
//! Adapts blocking, single-threaded transport sockets (ZeroMQ-style) into an
//! async channel with any number of local subscribers, in pub/sub or
//! point-to-point mode.
//!
//! ### Component Diagram
//! ```text
//!   send(msg) ──encode──▶ [send thread] ──▶ send socket ──▶ transport
//!                                                              │
//!   transport ──▶ receive socket ──▶ [receive thread] ──decode─┘
//!                                           │
//!                     ┌─────────────────────┴───────────────────┐
//!                     ▼                                         ▼
//!        inbox per subscriber (PubSub)                 queue (PointToPoint)
//!        every subscriber, blocks when full            one subscriber per message
//! ```
//!
//! ## Key Components
//! - [`ReactiveSocketChannel`]: the channel and its two socket threads
//! - [`TransportSocket`]: blocking socket contract consumed by the channel
//! - [`MessageCodec`]: converts [`ChannelMessage`]s to transport bytes ([`JsonCodec`] by default)
//! - [`MessageHandler`]: subscriber callback
//! - [`LoopbackTransport`]: in-process transport for tests and single-process use
//! - [`observability`]: logging and metrics helpers

#![warn(missing_docs)]

mod error;
mod message;
pub mod observability;
mod reactive;
mod transport;

pub use error::{ChannelError, ChannelResult};
pub use message::{ChannelMessage, JsonCodec, MessageCodec, TOPIC_HEADER};
pub use plexflow_common::{ChannelConfig, ChannelMode};
pub use reactive::{ChannelStats, MessageHandler, ReactiveSocketChannel};
pub use transport::{LoopbackMode, LoopbackSocket, LoopbackTransport, ReceivedFrame, TransportSocket};
