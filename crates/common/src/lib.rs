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

//! # PlexFlow Common
//!
//! ## Purpose
//! Shared building blocks used by every PlexFlow crate:
//! - **Settings**: serde-deserializable configuration for backlog, polling,
//!   leader election and reactive channels
//! - **Config bootstrap**: env > `plexflow.toml` > defaults loading
//! - **Tracing setup**: `tracing-subscriber` initialization from `RUST_LOG`
//!
//! ## Dependents
//! - `plexflow-backlog`, `plexflow-polling`: [`BacklogConfig`], [`PollingConfig`]
//! - `plexflow-leader`: [`LeaderConfig`]
//! - `plexflow-channel`: [`ChannelConfig`]

#![warn(missing_docs)]

pub mod config_bootstrap;
pub mod settings;
pub mod tracing_setup;

pub use config_bootstrap::{ConfigBootstrap, ConfigError};
pub use settings::{
    BacklogConfig, ChannelConfig, ChannelMode, LeaderConfig, PlexflowConfig, PollingConfig,
};
pub use tracing_setup::init_tracing;
