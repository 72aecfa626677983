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

//! Blocking transport sockets and the in-process loopback transport.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Topic frame, for transports that send multi-part messages
    pub topic: Option<String>,
    /// Payload frame
    pub payload: Vec<u8>,
}

/// A blocking, non-reentrant socket.
///
/// Implementations are driven from a single thread at a time and need not
/// be `Sync`.
pub trait TransportSocket: Send {
    /// Hand `payload` to the transport. `Ok(false)` means the transport
    /// refused it.
    fn send(&mut self, topic: Option<&str>, payload: &[u8]) -> io::Result<bool>;

    /// Return the next frame if one is ready, without blocking.
    fn receive_non_blocking(&mut self) -> io::Result<Option<ReceivedFrame>>;

    /// Close the socket. Further calls fail.
    fn close(&mut self) -> io::Result<()>;
}

/// How a [`LoopbackTransport`] distributes sent frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopbackMode {
    /// Every open receiving socket gets every frame
    #[default]
    Broadcast,
    /// Receiving sockets compete; each frame is taken by exactly one
    Competing,
}

#[derive(Default)]
struct Hub {
    next_id: u64,
    open: usize,
    inboxes: HashMap<u64, VecDeque<ReceivedFrame>>,
    shared: VecDeque<ReceivedFrame>,
}

/// In-process transport connecting sender and receiver sockets.
///
/// Frames sent before any receiver exists are dropped in broadcast mode
/// and queued in competing mode.
#[derive(Clone)]
pub struct LoopbackTransport {
    mode: LoopbackMode,
    accepting: Arc<AtomicBool>,
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackTransport {
    /// Transport distributing frames per `mode`.
    pub fn new(mode: LoopbackMode) -> Self {
        Self {
            mode,
            accepting: Arc::new(AtomicBool::new(true)),
            hub: Arc::new(Mutex::new(Hub::default())),
        }
    }

    /// Distribution mode.
    pub fn mode(&self) -> LoopbackMode {
        self.mode
    }

    /// Socket that only sends.
    pub fn sender(&self) -> LoopbackSocket {
        self.open_socket(false)
    }

    /// Socket that receives the frames sent by any socket of this transport.
    pub fn receiver(&self) -> LoopbackSocket {
        self.open_socket(true)
    }

    /// When `false`, sends are refused with `Ok(false)`.
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Frames sent but not yet received.
    pub fn pending(&self) -> usize {
        let hub = self.hub.lock();
        hub.shared.len() + hub.inboxes.values().map(VecDeque::len).sum::<usize>()
    }

    /// Sockets not yet closed.
    pub fn open_sockets(&self) -> usize {
        self.hub.lock().open
    }

    fn open_socket(&self, receiving: bool) -> LoopbackSocket {
        let mut hub = self.hub.lock();
        hub.next_id += 1;
        hub.open += 1;
        let id = hub.next_id;
        if receiving && self.mode == LoopbackMode::Broadcast {
            hub.inboxes.insert(id, VecDeque::new());
        }
        LoopbackSocket {
            id,
            receiving,
            closed: false,
            transport: self.clone(),
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(LoopbackMode::default())
    }
}

/// Socket of a [`LoopbackTransport`].
pub struct LoopbackSocket {
    id: u64,
    receiving: bool,
    closed: bool,
    transport: LoopbackTransport,
}

impl LoopbackSocket {
    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed"));
        }
        Ok(())
    }
}

impl TransportSocket for LoopbackSocket {
    fn send(&mut self, topic: Option<&str>, payload: &[u8]) -> io::Result<bool> {
        self.ensure_open()?;
        if !self.transport.accepting.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let frame = ReceivedFrame {
            topic: topic.map(str::to_string),
            payload: payload.to_vec(),
        };
        let mut hub = self.transport.hub.lock();
        match self.transport.mode {
            LoopbackMode::Broadcast => {
                for inbox in hub.inboxes.values_mut() {
                    inbox.push_back(frame.clone());
                }
            }
            LoopbackMode::Competing => hub.shared.push_back(frame),
        }
        Ok(true)
    }

    fn receive_non_blocking(&mut self) -> io::Result<Option<ReceivedFrame>> {
        self.ensure_open()?;
        if !self.receiving {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "sender socket cannot receive",
            ));
        }

        let mut hub = self.transport.hub.lock();
        Ok(match self.transport.mode {
            LoopbackMode::Broadcast => hub.inboxes.get_mut(&self.id).and_then(VecDeque::pop_front),
            LoopbackMode::Competing => hub.shared.pop_front(),
        })
    }

    fn close(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.closed = true;
        let mut hub = self.transport.hub.lock();
        hub.open -= 1;
        hub.inboxes.remove(&self.id);
        Ok(())
    }
}

impl Drop for LoopbackSocket {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_delivers_to_every_receiver() {
        let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
        let mut sender = transport.sender();
        let mut first = transport.receiver();
        let mut second = transport.receiver();

        assert!(sender.send(Some("alerts"), b"x").unwrap());
        let frame = first.receive_non_blocking().unwrap().unwrap();
        assert_eq!(frame.topic.as_deref(), Some("alerts"));
        assert_eq!(frame.payload, b"x");
        assert!(second.receive_non_blocking().unwrap().is_some());
        assert!(first.receive_non_blocking().unwrap().is_none());
    }

    #[test]
    fn test_competing_receivers_take_each_frame_once() {
        let transport = LoopbackTransport::new(LoopbackMode::Competing);
        let mut sender = transport.sender();
        let mut first = transport.receiver();
        let mut second = transport.receiver();

        sender.send(None, b"1").unwrap();
        sender.send(None, b"2").unwrap();
        assert_eq!(first.receive_non_blocking().unwrap().unwrap().payload, b"1");
        assert_eq!(second.receive_non_blocking().unwrap().unwrap().payload, b"2");
        assert!(first.receive_non_blocking().unwrap().is_none());
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn test_refused_send() {
        let transport = LoopbackTransport::new(LoopbackMode::Competing);
        let mut sender = transport.sender();
        transport.set_accepting(false);
        assert!(!sender.send(None, b"x").unwrap());
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn test_closed_socket_fails() {
        let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
        let mut receiver = transport.receiver();
        assert_eq!(transport.open_sockets(), 1);

        receiver.close().unwrap();
        assert_eq!(transport.open_sockets(), 0);
        assert!(receiver.receive_non_blocking().is_err());
        assert!(receiver.send(None, b"x").is_err());
        assert!(receiver.close().is_err());
    }

    #[test]
    fn test_sender_cannot_receive() {
        let transport = LoopbackTransport::default();
        let mut sender = transport.sender();
        assert!(sender.receive_non_blocking().is_err());
    }

    #[test]
    fn test_dropped_socket_is_closed() {
        let transport = LoopbackTransport::new(LoopbackMode::Broadcast);
        {
            let _receiver = transport.receiver();
            assert_eq!(transport.open_sockets(), 1);
        }
        assert_eq!(transport.open_sockets(), 0);
    }
}
