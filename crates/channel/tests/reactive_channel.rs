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

//! Reactive socket channel tests
//!
//! ## Purpose
//! Exercises the channel end to end over the loopback transport:
//! - Pub/sub fan-out reaches every subscriber exactly once
//! - A slow pub/sub subscriber throttles the receive loop instead of losing messages
//! - Point-to-point reaches exactly one subscriber
//! - The receive loop starts lazily and pauses without subscribers
//! - Send acknowledgment, rejection and timeout
//! - Shutdown closes both sockets and fails fast afterwards

use async_trait::async_trait;
use plexflow_channel::*;
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

struct Recorder {
    index: usize,
    delivered: mpsc::UnboundedSender<(usize, ChannelMessage)>,
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn handle(&self, message: ChannelMessage) -> ChannelResult<()> {
        let _ = self.delivered.send((self.index, message));
        Ok(())
    }
}

struct Failing {
    delivered: mpsc::UnboundedSender<(usize, ChannelMessage)>,
}

#[async_trait]
impl MessageHandler for Failing {
    async fn handle(&self, message: ChannelMessage) -> ChannelResult<()> {
        let fail = message.payload == b"poison";
        let _ = self.delivered.send((0, message));
        if fail {
            return Err(ChannelError::BackendError("poison".to_string()));
        }
        Ok(())
    }
}

/// Socket whose sends take longer than callers are willing to wait.
struct SlowSocket;

impl TransportSocket for SlowSocket {
    fn send(&mut self, _topic: Option<&str>, _payload: &[u8]) -> io::Result<bool> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(true)
    }

    fn receive_non_blocking(&mut self) -> io::Result<Option<ReceivedFrame>> {
        Ok(None)
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Socket whose sends fail.
struct BrokenSocket;

impl TransportSocket for BrokenSocket {
    fn send(&mut self, _topic: Option<&str>, _payload: &[u8]) -> io::Result<bool> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }

    fn receive_non_blocking(&mut self) -> io::Result<Option<ReceivedFrame>> {
        Ok(None)
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn config(name: &str, mode: ChannelMode) -> ChannelConfig {
    ChannelConfig {
        name: name.to_string(),
        mode,
        consume_delay_millis: 5,
        ..ChannelConfig::default()
    }
}

fn loopback_channel(transport: &LoopbackTransport, mode: ChannelMode) -> ReactiveSocketChannel {
    ReactiveSocketChannel::new(
        config("orders", mode),
        Box::new(transport.sender()),
        Box::new(transport.receiver()),
    )
    .unwrap()
}

fn recorders(
    count: usize,
) -> (
    Vec<Arc<Recorder>>,
    mpsc::UnboundedReceiver<(usize, ChannelMessage)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handlers = (0..count)
        .map(|index| {
            Arc::new(Recorder {
                index,
                delivered: tx.clone(),
            })
        })
        .collect();
    (handlers, rx)
}

async fn next(
    rx: &mut mpsc::UnboundedReceiver<(usize, ChannelMessage)>,
) -> (usize, ChannelMessage) {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("delivery timed out")
        .expect("delivery channel closed")
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<(usize, ChannelMessage)>) {
    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "unexpected extra delivery");
}

#[tokio::test]
async fn test_pubsub_fans_out_to_every_subscriber_once() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    let (handlers, mut delivered) = recorders(3);
    for handler in &handlers {
        channel.subscribe(handler.clone()).unwrap();
    }

    let message = ChannelMessage::new("order-1");
    channel.send(message.clone()).await.unwrap();

    let mut subscribers = HashSet::new();
    for _ in 0..3 {
        let (index, received) = next(&mut delivered).await;
        assert_eq!(received.id, message.id);
        assert!(subscribers.insert(index), "subscriber {} got a duplicate", index);
    }
    assert_quiet(&mut delivered).await;

    let stats = channel.stats();
    assert_eq!(stats.messages_sent, 1);
    assert_eq!(stats.messages_received, 1);
    assert_eq!(stats.active_subscriptions, 3);
    channel.shutdown().await;
}

#[tokio::test]
async fn test_point_to_point_delivers_to_exactly_one_subscriber() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PointToPoint);
    let (handlers, mut delivered) = recorders(3);
    for handler in &handlers {
        channel.subscribe(handler.clone()).unwrap();
    }

    let mut sent = HashSet::new();
    for i in 0..10 {
        let message = ChannelMessage::new(format!("job-{}", i));
        sent.insert(message.id.clone());
        channel.send(message).await.unwrap();
    }

    let mut received = HashSet::new();
    for _ in 0..10 {
        let (_, message) = next(&mut delivered).await;
        assert!(received.insert(message.id), "message delivered twice");
    }
    assert_eq!(received, sent);
    assert_quiet(&mut delivered).await;
    channel.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_senders_share_the_send_thread() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    let (handlers, mut delivered) = recorders(1);
    channel.subscribe(handlers[0].clone()).unwrap();

    let sends = (0..20).map(|i| channel.send(ChannelMessage::new(format!("m-{}", i))));
    let results = futures::future::join_all(sends).await;
    assert!(results.iter().all(Result::is_ok));

    let mut ids = HashSet::new();
    for _ in 0..20 {
        let (_, message) = next(&mut delivered).await;
        assert!(ids.insert(message.id));
    }
    assert_eq!(channel.stats().messages_sent, 20);
    channel.shutdown().await;
}

#[tokio::test]
async fn test_competing_transport_splits_messages_across_channels() {
    let transport = LoopbackTransport::new(LoopbackMode::Competing);
    let first = loopback_channel(&transport, ChannelMode::PointToPoint);
    let second = loopback_channel(&transport, ChannelMode::PointToPoint);
    let (handlers, mut delivered) = recorders(2);
    first.subscribe(handlers[0].clone()).unwrap();
    second.subscribe(handlers[1].clone()).unwrap();

    for i in 0..6 {
        first.send(ChannelMessage::new(format!("job-{}", i))).await.unwrap();
    }

    let mut ids = HashSet::new();
    for _ in 0..6 {
        let (_, message) = next(&mut delivered).await;
        assert!(ids.insert(message.id));
    }
    assert_quiet(&mut delivered).await;
    assert_eq!(
        first.stats().messages_received + second.stats().messages_received,
        6
    );
    first.shutdown().await;
    second.shutdown().await;
}

#[tokio::test]
async fn test_receive_loop_starts_on_first_subscription() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);

    channel.send(ChannelMessage::new("early")).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.pending(), 1);
    assert_eq!(channel.stats().messages_received, 0);

    let (handlers, mut delivered) = recorders(1);
    channel.subscribe(handlers[0].clone()).unwrap();
    let (_, message) = next(&mut delivered).await;
    assert_eq!(message.payload, b"early");
    assert_eq!(transport.pending(), 0);
    channel.shutdown().await;
}

#[tokio::test]
async fn test_receive_loop_pauses_without_subscribers() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    let (handlers, mut delivered) = recorders(1);

    channel.subscribe(handlers[0].clone()).unwrap();
    channel.send(ChannelMessage::new("first")).await.unwrap();
    next(&mut delivered).await;

    assert!(channel.unsubscribe(&handlers[0]));
    sleep(Duration::from_millis(50)).await;
    channel.send(ChannelMessage::new("second")).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.pending(), 1);
    assert!(delivered.try_recv().is_err());

    channel.subscribe(handlers[0].clone()).unwrap();
    let (_, message) = next(&mut delivered).await;
    assert_eq!(message.payload, b"second");
    channel.shutdown().await;
}

#[tokio::test]
async fn test_transport_topic_surfaces_as_header() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    let (handlers, mut delivered) = recorders(1);
    channel.subscribe(handlers[0].clone()).unwrap();

    let mut publisher = transport.sender();
    let bytes = JsonCodec.encode(&ChannelMessage::new("reading")).unwrap();
    assert!(publisher.send(Some("sensors"), &bytes).unwrap());

    let (_, message) = next(&mut delivered).await;
    assert_eq!(message.topic(), Some("sensors"));
    assert_eq!(message.header(TOPIC_HEADER), Some("sensors"));
    channel.shutdown().await;
}

#[tokio::test]
async fn test_topic_header_routes_outbound_frames() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let mut tap = transport.receiver();
    let channel = loopback_channel(&transport, ChannelMode::PubSub);

    channel
        .send(ChannelMessage::new("x").with_topic("eu"))
        .await
        .unwrap();
    let frame = tap.receive_non_blocking().unwrap().unwrap();
    assert_eq!(frame.topic.as_deref(), Some("eu"));
    channel.shutdown().await;
}

#[tokio::test]
async fn test_undecodable_frames_are_dropped() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    let (handlers, mut delivered) = recorders(1);
    channel.subscribe(handlers[0].clone()).unwrap();

    let mut publisher = transport.sender();
    publisher.send(None, b"garbage").unwrap();
    channel.send(ChannelMessage::new("valid")).await.unwrap();

    let (_, message) = next(&mut delivered).await;
    assert_eq!(message.payload, b"valid");
    assert_quiet(&mut delivered).await;
    assert_eq!(channel.stats().decode_failures, 1);
    assert_eq!(channel.stats().messages_received, 1);
    channel.shutdown().await;
}

#[tokio::test]
async fn test_handler_failure_keeps_subscription() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    let (tx, mut delivered) = mpsc::unbounded_channel();
    channel.subscribe(Arc::new(Failing { delivered: tx })).unwrap();

    channel.send(ChannelMessage::new("poison")).await.unwrap();
    channel.send(ChannelMessage::new("fine")).await.unwrap();

    assert_eq!(next(&mut delivered).await.1.payload, b"poison");
    assert_eq!(next(&mut delivered).await.1.payload, b"fine");
    channel.shutdown().await;
}

#[tokio::test]
async fn test_refused_send_is_rejected() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    transport.set_accepting(false);

    let result = channel.send(ChannelMessage::new("x")).await;
    assert!(matches!(result, Err(ChannelError::SendRejected(_))));
    assert_eq!(channel.stats().messages_sent, 0);

    transport.set_accepting(true);
    channel.send(ChannelMessage::new("y")).await.unwrap();
    assert_eq!(channel.stats().messages_sent, 1);
    channel.shutdown().await;
}

#[tokio::test]
async fn test_send_times_out_waiting_for_acknowledgment() {
    let transport = LoopbackTransport::default();
    let channel = ReactiveSocketChannel::new(
        config("slow", ChannelMode::PubSub),
        Box::new(SlowSocket),
        Box::new(transport.receiver()),
    )
    .unwrap();

    let result = channel
        .send_with_timeout(ChannelMessage::new("x"), Duration::from_millis(20))
        .await;
    assert!(matches!(result, Err(ChannelError::Timeout(_))));

    channel
        .send_with_timeout(ChannelMessage::new("y"), Duration::from_secs(5))
        .await
        .unwrap();
    channel.shutdown().await;
}

#[tokio::test]
async fn test_configured_send_timeout_applies_by_default() {
    let transport = LoopbackTransport::default();
    let mut settings = config("slow", ChannelMode::PubSub);
    settings.send_timeout_millis = 20;
    let channel = ReactiveSocketChannel::new(
        settings,
        Box::new(SlowSocket),
        Box::new(transport.receiver()),
    )
    .unwrap();

    let result = channel.send(ChannelMessage::new("x")).await;
    assert!(matches!(result, Err(ChannelError::Timeout(_))));
    channel.shutdown().await;
}

#[tokio::test]
async fn test_socket_failure_surfaces_as_backend_error() {
    let transport = LoopbackTransport::default();
    let channel = ReactiveSocketChannel::new(
        config("broken", ChannelMode::PubSub),
        Box::new(BrokenSocket),
        Box::new(transport.receiver()),
    )
    .unwrap();

    let result = channel.send(ChannelMessage::new("x")).await;
    assert!(matches!(result, Err(ChannelError::BackendError(_))));
    channel.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_both_sockets() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let channel = loopback_channel(&transport, ChannelMode::PubSub);
    let (handlers, _delivered) = recorders(2);
    for handler in &handlers {
        channel.subscribe(handler.clone()).unwrap();
    }
    assert_eq!(transport.open_sockets(), 2);

    channel.shutdown().await;
    assert_eq!(transport.open_sockets(), 0);
    assert_eq!(channel.stats().active_subscriptions, 0);
    assert!(matches!(
        channel.send(ChannelMessage::new("late")).await,
        Err(ChannelError::ChannelClosed(_))
    ));
    assert!(matches!(
        channel.subscribe(handlers[0].clone()),
        Err(ChannelError::ChannelClosed(_))
    ));
    assert!(!channel.unsubscribe(&handlers[0]));
}

#[tokio::test]
async fn test_shutdown_before_any_subscription_closes_both_sockets() {
    let transport = LoopbackTransport::new(LoopbackMode::Competing);
    let channel = loopback_channel(&transport, ChannelMode::PointToPoint);
    assert_eq!(transport.open_sockets(), 2);

    channel.shutdown().await;
    assert_eq!(transport.open_sockets(), 0);
}

#[tokio::test]
async fn test_point_to_point_shutdown_with_full_queue() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let mut settings = config("tight", ChannelMode::PointToPoint);
    settings.buffer_capacity = 1;
    let channel = ReactiveSocketChannel::new(
        settings,
        Box::new(transport.sender()),
        Box::new(transport.receiver()),
    )
    .unwrap();

    struct Stuck;

    #[async_trait]
    impl MessageHandler for Stuck {
        async fn handle(&self, _message: ChannelMessage) -> ChannelResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    channel.subscribe(Arc::new(Stuck)).unwrap();
    for i in 0..5 {
        channel.send(ChannelMessage::new(format!("{}", i))).await.unwrap();
    }
    sleep(Duration::from_millis(50)).await;

    timeout(Duration::from_secs(5), channel.shutdown())
        .await
        .expect("shutdown hung on a full delivery queue");
    assert_eq!(transport.open_sockets(), 0);
}

/// Handler that takes longer per message than the sender needs.
struct Sluggish {
    index: usize,
    delivered: mpsc::UnboundedSender<(usize, ChannelMessage)>,
}

#[async_trait]
impl MessageHandler for Sluggish {
    async fn handle(&self, message: ChannelMessage) -> ChannelResult<()> {
        sleep(Duration::from_millis(20)).await;
        let _ = self.delivered.send((self.index, message));
        Ok(())
    }
}

#[tokio::test]
async fn test_pubsub_slow_subscriber_receives_every_message() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let mut settings = config("slow", ChannelMode::PubSub);
    settings.buffer_capacity = 4;
    let channel = ReactiveSocketChannel::new(
        settings,
        Box::new(transport.sender()),
        Box::new(transport.receiver()),
    )
    .unwrap();

    let (tx, mut delivered) = mpsc::unbounded_channel();
    channel
        .subscribe(Arc::new(Sluggish {
            index: 0,
            delivered: tx.clone(),
        }))
        .unwrap();
    channel
        .subscribe(Arc::new(Recorder {
            index: 1,
            delivered: tx,
        }))
        .unwrap();

    let mut sent = Vec::new();
    for i in 0..20 {
        let message = ChannelMessage::new(format!("tick-{}", i));
        sent.push(message.id.clone());
        channel.send(message).await.unwrap();
    }

    let mut per_subscriber = vec![Vec::new(), Vec::new()];
    for _ in 0..40 {
        let (index, message) = next(&mut delivered).await;
        per_subscriber[index].push(message.id);
    }
    assert_eq!(per_subscriber[0], sent);
    assert_eq!(per_subscriber[1], sent);
    assert_quiet(&mut delivered).await;
    assert_eq!(channel.stats().messages_received, 20);
    channel.shutdown().await;
}

#[tokio::test]
async fn test_pubsub_shutdown_with_full_inbox() {
    let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
    let mut settings = config("tight-fanout", ChannelMode::PubSub);
    settings.buffer_capacity = 1;
    let channel = ReactiveSocketChannel::new(
        settings,
        Box::new(transport.sender()),
        Box::new(transport.receiver()),
    )
    .unwrap();

    struct Stuck;

    #[async_trait]
    impl MessageHandler for Stuck {
        async fn handle(&self, _message: ChannelMessage) -> ChannelResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    channel.subscribe(Arc::new(Stuck)).unwrap();
    for i in 0..5 {
        channel.send(ChannelMessage::new(format!("{}", i))).await.unwrap();
    }
    sleep(Duration::from_millis(50)).await;

    timeout(Duration::from_secs(5), channel.shutdown())
        .await
        .expect("shutdown hung on a full subscriber inbox");
    assert_eq!(transport.open_sockets(), 0);
}
