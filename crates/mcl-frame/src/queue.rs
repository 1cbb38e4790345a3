//! Outbound write queue.
//!
//! Writable parameters enqueue frames from any thread; a single drain loop
//! dequeues them in FIFO order and writes them to the write channel.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use crate::codec::Frame;
use crate::error::{FrameError, Result};

/// An entry in the write queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A frame to send.
    Frame(Frame),
    /// No-op entry that unblocks the drain loop during shutdown.
    Wake,
}

/// Producer side of the write queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: Sender<Outbound>,
}

/// Consumer side of the write queue, owned by the drain loop.
#[derive(Debug)]
pub struct WriteQueueReceiver {
    rx: Receiver<Outbound>,
}

/// Create a connected queue pair.
pub fn write_queue() -> (WriteQueue, WriteQueueReceiver) {
    let (tx, rx) = mpsc::channel();
    (WriteQueue { tx }, WriteQueueReceiver { rx })
}

impl WriteQueue {
    /// Enqueue a frame addressed to `(category, index)`.
    pub fn enqueue(&self, category: u8, index: u16, payload: impl Into<Bytes>) -> Result<()> {
        let frame = Frame::new(category, index, payload);
        trace!(category, index, len = frame.payload.len(), "frame queued");
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| FrameError::QueueClosed)
    }

    /// Enqueue the shutdown sentinel.
    pub fn wake(&self) -> Result<()> {
        self.tx
            .send(Outbound::Wake)
            .map_err(|_| FrameError::QueueClosed)
    }
}

impl WriteQueueReceiver {
    /// Block until an entry is available.
    ///
    /// Returns `None` once every producer has been dropped and the queue is empty.
    pub fn recv(&self) -> Option<Outbound> {
        self.rx.recv().ok()
    }

    /// Wait at most `timeout` for an entry.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Outbound>> {
        match self.rx.recv_timeout(timeout) {
            Ok(entry) => Ok(Some(entry)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(FrameError::QueueClosed),
        }
    }

    /// Take an entry if one is ready.
    pub fn try_recv(&self) -> Result<Option<Outbound>> {
        match self.rx.try_recv() {
            Ok(entry) => Ok(Some(entry)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FrameError::QueueClosed),
        }
    }

    /// Take every frame currently queued, skipping sentinels.
    pub fn drain_frames(&self) -> Vec<Frame> {
        self.rx
            .try_iter()
            .filter_map(|entry| match entry {
                Outbound::Frame(frame) => Some(frame),
                Outbound::Wake => None,
            })
            .collect()
    }
}
