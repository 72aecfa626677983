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

//! Component settings.
//!
//! Durations are carried as millisecond integers so the same structs
//! deserialize cleanly from TOML files and flat environment variables.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default heartbeat between lock attempts once leadership is held.
pub const DEFAULT_HEART_BEAT_MILLIS: u64 = 500;

/// Default pause before re-contending after a yield or a lock failure.
pub const DEFAULT_BUSY_WAIT_MILLIS: u64 = 50;

/// Default idle delay of the socket receive loop.
pub const DEFAULT_CONSUME_DELAY_MILLIS: u64 = 1_000;

/// Default claim lease (five minutes).
pub const DEFAULT_CLAIM_LEASE_MILLIS: u64 = 300_000;

/// Aggregate configuration for a PlexFlow process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexflowConfig {
    /// Backlog claim/commit settings
    pub backlog: BacklogConfig,
    /// Polling source settings
    pub polling: PollingConfig,
    /// Leader election settings
    pub leader: LeaderConfig,
    /// Reactive socket channel settings
    pub channel: ChannelConfig,
}

impl PlexflowConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backlog.validate()?;
        self.polling.validate()?;
        self.leader.validate()?;
        self.channel.validate()
    }
}

/// Backlog claim policy.
///
/// ## Claim contention
/// A snapshot merge or a claim attempted while another claim is outstanding
/// waits up to `claim_wait_millis` for it to resolve, then fails with a
/// retryable error.
///
/// ## Claim lease
/// A claim outstanding for longer than `claim_lease_millis` is rolled back
/// automatically. `0` disables the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklogConfig {
    /// Bounded wait for an outstanding claim (milliseconds)
    pub claim_wait_millis: u64,
    /// Lease after which an unresolved claim is rolled back (milliseconds, 0 = never)
    pub claim_lease_millis: u64,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            claim_wait_millis: 0,
            claim_lease_millis: DEFAULT_CLAIM_LEASE_MILLIS,
        }
    }
}

impl BacklogConfig {
    /// Bounded wait as a [`Duration`].
    pub fn claim_wait(&self) -> Duration {
        Duration::from_millis(self.claim_wait_millis)
    }

    /// Claim lease, `None` when disabled.
    pub fn claim_lease(&self) -> Option<Duration> {
        (self.claim_lease_millis > 0).then(|| Duration::from_millis(self.claim_lease_millis))
    }

    /// Validate the backlog settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.claim_lease_millis > 0 && self.claim_lease_millis <= self.claim_wait_millis {
            return Err(ConfigError::Invalid(format!(
                "backlog.claim_lease_millis ({}) must exceed backlog.claim_wait_millis ({})",
                self.claim_lease_millis, self.claim_wait_millis
            )));
        }
        Ok(())
    }
}

/// Polling source settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Maximum number of backlog entries claimed into one outbound item
    pub max_fetch_size: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { max_fetch_size: 1 }
    }
}

impl PollingConfig {
    /// Validate the polling settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fetch_size == 0 {
            return Err(ConfigError::Invalid(
                "polling.max_fetch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Leader election timing.
///
/// `heart_beat_millis` must stay below the expiry of the underlying lock,
/// otherwise another node can take the lock while the leader is waiting on
/// its heartbeat. The initiator checks this against the lock at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    /// Lock attempt / yield wait window (milliseconds)
    pub heart_beat_millis: u64,
    /// Back-off after a yield or a failure (milliseconds)
    pub busy_wait_millis: u64,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            heart_beat_millis: DEFAULT_HEART_BEAT_MILLIS,
            busy_wait_millis: DEFAULT_BUSY_WAIT_MILLIS,
        }
    }
}

impl LeaderConfig {
    /// Heartbeat as a [`Duration`].
    pub fn heart_beat(&self) -> Duration {
        Duration::from_millis(self.heart_beat_millis)
    }

    /// Busy wait as a [`Duration`].
    pub fn busy_wait(&self) -> Duration {
        Duration::from_millis(self.busy_wait_millis)
    }

    /// Validate the leader settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heart_beat_millis == 0 {
            return Err(ConfigError::Invalid(
                "leader.heart_beat_millis must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Delivery mode of a reactive socket channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Every active subscriber receives every message
    #[default]
    PubSub,
    /// Each message reaches exactly one subscriber
    PointToPoint,
}

/// Reactive socket channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel name (used in logs and metrics)
    pub name: String,
    /// Pub/sub or point-to-point delivery
    pub mode: ChannelMode,
    /// Idle delay between empty receive attempts (milliseconds)
    pub consume_delay_millis: u64,
    /// Default send acknowledgment timeout (milliseconds, 0 = wait indefinitely)
    pub send_timeout_millis: u64,
    /// Capacity of the local fan-out buffer
    pub buffer_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "plexflow-channel".to_string(),
            mode: ChannelMode::PubSub,
            consume_delay_millis: DEFAULT_CONSUME_DELAY_MILLIS,
            send_timeout_millis: 0,
            buffer_capacity: 1024,
        }
    }
}

impl ChannelConfig {
    /// Receive loop idle delay.
    pub fn consume_delay(&self) -> Duration {
        Duration::from_millis(self.consume_delay_millis)
    }

    /// Default send timeout, `None` to wait indefinitely.
    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_millis > 0).then(|| Duration::from_millis(self.send_timeout_millis))
    }

    /// Validate the channel settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("channel.name must not be empty".to_string()));
        }
        if self.consume_delay_millis == 0 {
            return Err(ConfigError::Invalid(
                "channel.consume_delay_millis must be greater than zero".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel.buffer_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlexflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.leader.heart_beat(), Duration::from_millis(500));
        assert_eq!(config.leader.busy_wait(), Duration::from_millis(50));
        assert_eq!(config.channel.consume_delay(), Duration::from_secs(1));
        assert_eq!(config.polling.max_fetch_size, 1);
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let config = LeaderConfig {
            heart_beat_millis: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_claim_lease_disabled() {
        let config = BacklogConfig {
            claim_lease_millis: 0,
            ..Default::default()
        };
        assert!(config.claim_lease().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_claim_lease_must_exceed_wait() {
        let config = BacklogConfig {
            claim_wait_millis: 1_000,
            claim_lease_millis: 500,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_mode_from_toml() {
        let config: ChannelConfig = toml::from_str(
            "name = \"orders\"\nmode = \"point_to_point\"\nconsume_delay_millis = 25\n",
        )
        .unwrap();
        assert_eq!(config.mode, ChannelMode::PointToPoint);
        assert_eq!(config.consume_delay(), Duration::from_millis(25));
        assert_eq!(config.buffer_capacity, 1024);
        assert!(config.send_timeout().is_none());
    }
}
