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

//! Reactive socket channel.

use crate::observability::{
    record_channel_error, record_decode_failure, record_message_received, record_message_sent,
    record_subscription_change,
};
use crate::{
    ChannelError, ChannelMessage, ChannelResult, JsonCodec, MessageCodec, ReceivedFrame,
    TransportSocket, TOPIC_HEADER,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use plexflow_common::{ChannelConfig, ChannelMode};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Consumer of channel messages.
///
/// A handler error is logged and the subscription keeps running.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message.
    async fn handle(&self, message: ChannelMessage) -> ChannelResult<()>;
}

/// Point-in-time channel counters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelStats {
    /// Channel name
    pub name: String,
    /// Messages acknowledged by the transport
    pub messages_sent: u64,
    /// Messages decoded by the receive loop
    pub messages_received: u64,
    /// Inbound frames dropped because they could not be decoded
    pub decode_failures: u64,
    /// Subscribed handlers
    pub active_subscriptions: usize,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    decode_failures: AtomicU64,
}

struct SendCommand {
    topic: Option<String>,
    payload: Vec<u8>,
    reply: oneshot::Sender<io::Result<bool>>,
}

enum ReceiveCommand {
    Resume,
    Pause,
    Shutdown,
}

type Subscriptions = Arc<Mutex<HashMap<usize, Subscription>>>;

enum Sink {
    /// Every subscriber's inbox, in turn.
    Fanout(Subscriptions),
    Queue(mpsc::Sender<ChannelMessage>),
}

/// Receive side: the socket until the loop starts, then the loop's handles.
struct ReceiveWorker {
    socket: Option<Box<dyn TransportSocket>>,
    commands: Option<std_mpsc::Sender<ReceiveCommand>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ReceiveWorker {
    fn command(&self, command: ReceiveCommand) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(command);
        }
    }
}

struct Subscription {
    task: JoinHandle<()>,
    /// Per-subscriber inbox, pub/sub only.
    inbox: Option<mpsc::Sender<ChannelMessage>>,
    _handler: Arc<dyn MessageHandler>,
}

/// Channel over a pair of blocking transport sockets.
///
/// ## Purpose
/// Bridges sockets that must be driven from one thread each into async
/// senders and any number of async subscribers.
///
/// ## Threads
/// - **send thread**: owns the send socket and performs every outbound
///   operation in submission order; `send` waits for its acknowledgment
/// - **receive thread**: owns the receive socket; started by the first
///   subscription, it polls without blocking and sleeps `consume_delay_millis`
///   between empty polls. It pauses when the last subscriber leaves and
///   resumes on the next subscription.
///
/// ## Delivery
/// - [`ChannelMode::PubSub`]: every active subscriber receives each message
///   exactly once through its own inbox of `buffer_capacity` messages; a full
///   inbox blocks the receive thread until that subscriber catches up
/// - [`ChannelMode::PointToPoint`]: each message reaches exactly one
///   subscriber; distribution across channel instances is the transport's
///
/// ## Example
/// ```rust,ignore
/// let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
/// let channel = ReactiveSocketChannel::new(
///     ChannelConfig::default(),
///     Box::new(transport.sender()),
///     Box::new(transport.receiver()),
/// )?;
/// channel.subscribe(Arc::new(MyHandler))?;
/// channel.send(ChannelMessage::new("hello")).await?;
/// channel.shutdown().await;
/// ```
pub struct ReactiveSocketChannel {
    config: ChannelConfig,
    codec: Arc<dyn MessageCodec>,
    runtime: Handle,
    closed: AtomicBool,
    counters: Arc<Counters>,
    outbound: Mutex<Option<std_mpsc::Sender<SendCommand>>>,
    send_thread: Mutex<Option<thread::JoinHandle<()>>>,
    receiver: Mutex<ReceiveWorker>,
    queue_tx: mpsc::Sender<ChannelMessage>,
    queue: Arc<AsyncMutex<mpsc::Receiver<ChannelMessage>>>,
    subscriptions: Subscriptions,
}

impl ReactiveSocketChannel {
    /// Create a channel and start its send thread.
    ///
    /// Must be called from within a tokio runtime; subscriptions run on it.
    ///
    /// ## Errors
    /// - [`ChannelError::InvalidConfiguration`]: invalid settings or no runtime
    /// - [`ChannelError::BackendError`]: the send thread could not be spawned
    pub fn new(
        config: ChannelConfig,
        send_socket: Box<dyn TransportSocket>,
        receive_socket: Box<dyn TransportSocket>,
    ) -> ChannelResult<Self> {
        config
            .validate()
            .map_err(|e| ChannelError::InvalidConfiguration(e.to_string()))?;
        let runtime = Handle::try_current().map_err(|e| {
            ChannelError::InvalidConfiguration(format!("channel requires a tokio runtime: {}", e))
        })?;

        let (outbound, commands) = std_mpsc::channel();
        let name = config.name.clone();
        let send_thread = thread::Builder::new()
            .name(format!("{}-send", config.name))
            .spawn(move || send_loop(name, send_socket, commands))
            .map_err(|e| ChannelError::BackendError(format!("failed to spawn send thread: {}", e)))?;

        let (queue_tx, queue) = mpsc::channel(config.buffer_capacity);

        info!(
            channel = %config.name,
            mode = ?config.mode,
            consume_delay_ms = config.consume_delay_millis,
            "Reactive socket channel created"
        );
        Ok(Self {
            config,
            codec: Arc::new(JsonCodec),
            runtime,
            closed: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
            outbound: Mutex::new(Some(outbound)),
            send_thread: Mutex::new(Some(send_thread)),
            receiver: Mutex::new(ReceiveWorker {
                socket: Some(receive_socket),
                commands: None,
                thread: None,
            }),
            queue_tx,
            queue: Arc::new(AsyncMutex::new(queue)),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Replace the default [`JsonCodec`].
    pub fn with_codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Delivery mode.
    pub fn mode(&self) -> ChannelMode {
        self.config.mode
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send with the configured default timeout.
    pub async fn send(&self, message: ChannelMessage) -> ChannelResult<()> {
        self.send_with_timeout(message, Duration::ZERO).await
    }

    /// Send and wait up to `timeout` for the transport to accept the bytes.
    ///
    /// A zero `timeout` uses `send_timeout_millis`, which waits indefinitely
    /// when itself zero. A timed-out message stays queued on the send thread.
    ///
    /// ## Errors
    /// - [`ChannelError::ChannelClosed`]: the channel is shut down
    /// - [`ChannelError::Timeout`]: no acknowledgment within the timeout
    /// - [`ChannelError::SendRejected`]: the transport refused the bytes
    /// - [`ChannelError::BackendError`]: the socket failed
    /// - [`ChannelError::SerializationError`]: the codec failed
    pub async fn send_with_timeout(
        &self,
        message: ChannelMessage,
        timeout: Duration,
    ) -> ChannelResult<()> {
        self.ensure_open()?;
        let payload = self.codec.encode(&message)?;
        let bytes = payload.len();

        let (reply, acknowledged) = oneshot::channel();
        {
            let outbound = self.outbound.lock();
            let sender = outbound.as_ref().ok_or_else(|| self.closed_error())?;
            sender
                .send(SendCommand {
                    topic: message.topic().map(str::to_string),
                    payload,
                    reply,
                })
                .map_err(|_| self.closed_error())?;
        }

        let limit = if timeout.is_zero() {
            self.config.send_timeout()
        } else {
            Some(timeout)
        };
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, acknowledged).await.map_err(|_| {
                ChannelError::Timeout(format!(
                    "channel {}: message {} not acknowledged within {:?}",
                    self.config.name, message.id, limit
                ))
            })?,
            None => acknowledged.await,
        };

        match outcome {
            Ok(Ok(true)) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                record_message_sent(&self.config.name, &message.id, bytes);
                Ok(())
            }
            Ok(Ok(false)) => Err(ChannelError::SendRejected(format!(
                "channel {}: transport refused message {}",
                self.config.name, message.id
            ))),
            Ok(Err(e)) => Err(ChannelError::BackendError(format!(
                "channel {}: {}",
                self.config.name, e
            ))),
            Err(_) => Err(self.closed_error()),
        }
    }

    /// Subscribe `handler`. Returns `false` if it is already subscribed.
    ///
    /// The first subscription starts (or resumes) the receive thread.
    ///
    /// ## Errors
    /// - [`ChannelError::ChannelClosed`]: the channel is shut down
    /// - [`ChannelError::BackendError`]: the receive thread could not be spawned
    pub fn subscribe(&self, handler: Arc<dyn MessageHandler>) -> ChannelResult<bool> {
        self.ensure_open()?;
        let key = handler_key(&handler);
        let mut subscriptions = self.subscriptions.lock();
        self.ensure_open()?;
        if subscriptions.contains_key(&key) {
            debug!(channel = %self.config.name, "Handler already subscribed");
            return Ok(false);
        }

        let name = self.config.name.clone();
        let (task, inbox) = match self.config.mode {
            ChannelMode::PubSub => {
                let (inbox, inbound) = mpsc::channel(self.config.buffer_capacity);
                let task = self
                    .runtime
                    .spawn(deliver_inbox(name, inbound, handler.clone()));
                (task, Some(inbox))
            }
            ChannelMode::PointToPoint => {
                let task = self
                    .runtime
                    .spawn(deliver_queue(name, self.queue.clone(), handler.clone()));
                (task, None)
            }
        };
        subscriptions.insert(
            key,
            Subscription {
                task,
                inbox,
                _handler: handler,
            },
        );

        if subscriptions.len() == 1 {
            if let Err(e) = self.resume_receiver() {
                if let Some(subscription) = subscriptions.remove(&key) {
                    subscription.task.abort();
                }
                return Err(e);
            }
        }
        record_subscription_change(&self.config.name, true, subscriptions.len());
        Ok(true)
    }

    /// Unsubscribe `handler`. Returns `false` if it was not subscribed.
    ///
    /// The receive thread pauses when the last subscriber leaves.
    pub fn unsubscribe<H: MessageHandler + ?Sized>(&self, handler: &Arc<H>) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let Some(subscription) = subscriptions.remove(&handler_key(handler)) else {
            return false;
        };
        subscription.task.abort();

        if subscriptions.is_empty() {
            self.receiver.lock().command(ReceiveCommand::Pause);
        }
        record_subscription_change(&self.config.name, false, subscriptions.len());
        true
    }

    /// Close both sockets and drop every subscription.
    ///
    /// Returns once both threads have exited. Idempotent.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let subscriptions: Vec<Subscription> =
            self.subscriptions.lock().drain().map(|(_, s)| s).collect();
        for subscription in &subscriptions {
            subscription.task.abort();
        }

        drop(self.outbound.lock().take());
        let (socket, receive_thread) = {
            let mut worker = self.receiver.lock();
            worker.command(ReceiveCommand::Shutdown);
            worker.commands = None;
            (worker.socket.take(), worker.thread.take())
        };
        // unblocks a receive thread waiting on a full queue
        self.queue.lock().await.close();

        if let Some(mut socket) = socket {
            if let Err(e) = socket.close() {
                record_channel_error(&self.config.name, "close", &e.to_string());
            }
        }

        let threads: Vec<_> = [self.send_thread.lock().take(), receive_thread]
            .into_iter()
            .flatten()
            .collect();
        let name = self.config.name.clone();
        let joined = tokio::task::spawn_blocking(move || {
            for handle in threads {
                if handle.join().is_err() {
                    warn!(channel = %name, "Channel thread panicked");
                }
            }
        })
        .await;
        if let Err(e) = joined {
            warn!(channel = %self.config.name, error = %e, "Failed to join channel threads");
        }

        info!(
            channel = %self.config.name,
            dropped_subscriptions = subscriptions.len(),
            "Reactive socket channel shut down"
        );
    }

    /// Current counters.
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            name: self.config.name.clone(),
            messages_sent: self.counters.sent.load(Ordering::Relaxed),
            messages_received: self.counters.received.load(Ordering::Relaxed),
            decode_failures: self.counters.decode_failures.load(Ordering::Relaxed),
            active_subscriptions: self.subscriptions.lock().len(),
        }
    }

    fn ensure_open(&self) -> ChannelResult<()> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    fn closed_error(&self) -> ChannelError {
        ChannelError::ChannelClosed(self.config.name.clone())
    }

    fn resume_receiver(&self) -> ChannelResult<()> {
        let mut worker = self.receiver.lock();
        if worker.commands.is_none() {
            let socket = worker.socket.take().ok_or_else(|| self.closed_error())?;
            let sink = match self.config.mode {
                ChannelMode::PubSub => Sink::Fanout(self.subscriptions.clone()),
                ChannelMode::PointToPoint => Sink::Queue(self.queue_tx.clone()),
            };
            let (commands, command_rx) = std_mpsc::channel();
            let receive_loop = ReceiveLoop {
                name: self.config.name.clone(),
                socket,
                commands: command_rx,
                codec: self.codec.clone(),
                sink,
                counters: self.counters.clone(),
                consume_delay: self.config.consume_delay(),
            };
            let handle = thread::Builder::new()
                .name(format!("{}-receive", self.config.name))
                .spawn(move || receive_loop.run())
                .map_err(|e| {
                    ChannelError::BackendError(format!("failed to spawn receive thread: {}", e))
                })?;

            worker.commands = Some(commands);
            worker.thread = Some(handle);
            info!(channel = %self.config.name, "Receive loop started");
        }
        worker.command(ReceiveCommand::Resume);
        Ok(())
    }
}

impl Drop for ReactiveSocketChannel {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for (_, subscription) in self.subscriptions.lock().drain() {
            subscription.task.abort();
        }
        drop(self.outbound.get_mut().take());

        let worker = self.receiver.get_mut();
        worker.command(ReceiveCommand::Shutdown);
        worker.commands = None;
        if let Some(mut socket) = worker.socket.take() {
            let _ = socket.close();
        }
        if let Ok(mut queue) = self.queue.try_lock() {
            queue.close();
        }
    }
}

impl std::fmt::Debug for ReactiveSocketChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveSocketChannel")
            .field("name", &self.config.name)
            .field("mode", &self.config.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn handler_key<H: ?Sized>(handler: &Arc<H>) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

fn send_loop(
    name: String,
    mut socket: Box<dyn TransportSocket>,
    commands: std_mpsc::Receiver<SendCommand>,
) {
    while let Ok(command) = commands.recv() {
        let result = socket.send(command.topic.as_deref(), &command.payload);
        if let Err(e) = &result {
            record_channel_error(&name, "send", &e.to_string());
        }
        let _ = command.reply.send(result);
    }

    if let Err(e) = socket.close() {
        record_channel_error(&name, "close", &e.to_string());
    }
    debug!(channel = %name, "Send loop exited");
}

struct ReceiveLoop {
    name: String,
    socket: Box<dyn TransportSocket>,
    commands: std_mpsc::Receiver<ReceiveCommand>,
    codec: Arc<dyn MessageCodec>,
    sink: Sink,
    counters: Arc<Counters>,
    consume_delay: Duration,
}

impl ReceiveLoop {
    fn run(mut self) {
        let mut active = false;
        loop {
            if !active {
                match self.commands.recv() {
                    Ok(ReceiveCommand::Resume) => active = true,
                    Ok(ReceiveCommand::Pause) => {}
                    Ok(ReceiveCommand::Shutdown) | Err(_) => break,
                }
                continue;
            }

            let received = match self.socket.receive_non_blocking() {
                Ok(Some(frame)) => {
                    self.dispatch(frame);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    record_channel_error(&self.name, "receive", &e.to_string());
                    false
                }
            };

            let command = if received {
                match self.commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv_timeout(self.consume_delay) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };
            match command {
                Some(ReceiveCommand::Pause) => {
                    debug!(channel = %self.name, "Receive loop paused");
                    active = false;
                }
                Some(ReceiveCommand::Shutdown) => break,
                Some(ReceiveCommand::Resume) | None => {}
            }
        }

        if let Err(e) = self.socket.close() {
            record_channel_error(&self.name, "close", &e.to_string());
        }
        debug!(channel = %self.name, "Receive loop exited");
    }

    fn dispatch(&self, frame: ReceivedFrame) {
        let mut message = match self.codec.decode(&frame.payload) {
            Ok(message) => message,
            Err(e) => {
                self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                record_decode_failure(&self.name, frame.payload.len(), &e.to_string());
                return;
            }
        };
        if let Some(topic) = frame.topic {
            message.headers.insert(TOPIC_HEADER.to_string(), topic);
        }
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        record_message_received(&self.name, &message.id, message.topic());

        match &self.sink {
            Sink::Fanout(subscriptions) => {
                let inboxes: Vec<mpsc::Sender<ChannelMessage>> = subscriptions
                    .lock()
                    .values()
                    .filter_map(|subscription| subscription.inbox.clone())
                    .collect();
                if inboxes.is_empty() {
                    debug!(channel = %self.name, "No active subscribers, message dropped");
                    return;
                }
                for inbox in inboxes {
                    // closed when the subscriber left after the snapshot
                    let _ = inbox.blocking_send(message.clone());
                }
            }
            Sink::Queue(queue) => {
                if queue.blocking_send(message).is_err() {
                    debug!(channel = %self.name, "Delivery queue closed, message dropped");
                }
            }
        }
    }
}

async fn deliver_inbox(
    name: String,
    mut inbound: mpsc::Receiver<ChannelMessage>,
    handler: Arc<dyn MessageHandler>,
) {
    while let Some(message) = inbound.recv().await {
        deliver(&name, handler.as_ref(), message).await;
    }
}

async fn deliver_queue(
    name: String,
    queue: Arc<AsyncMutex<mpsc::Receiver<ChannelMessage>>>,
    handler: Arc<dyn MessageHandler>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(message) = next else {
            break;
        };
        deliver(&name, handler.as_ref(), message).await;
    }
}

async fn deliver(name: &str, handler: &dyn MessageHandler, message: ChannelMessage) {
    let id = message.id.clone();
    if let Err(e) = handler.handle(message).await {
        record_channel_error(name, "handle", &format!("message {}: {}", id, e));
    }
}
