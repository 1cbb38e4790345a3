use std::io::{ErrorKind, Read};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use mcl_frame::{
    write_queue, FrameError, FrameReader, FrameWriter, Outbound, WriteQueue, WriteQueueReceiver,
    CONFIGURATION,
};
use mcl_params::{FieldValue, ParamKey, Registry, Value};
use mcl_transport::TcpChannel;
use tracing::{debug, error, trace, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::readiness::{Coverage, Readiness};

/// Connection to one MCL system.
///
/// The registry exists from construction, so observers can be attached
/// before [`Client::connect`]. A client connects once; after
/// [`Client::disconnect`] build a new one.
pub struct Client {
    config: ClientConfig,
    registry: Arc<Registry>,
    queue: WriteQueue,
    state: State,
    shared: Arc<Shared>,
}

enum State {
    Idle(WriteQueueReceiver),
    Connected(Session),
    Closed,
}

struct Session {
    peer: IpAddr,
    read: TcpChannel,
    write: TcpChannel,
    threads: Vec<JoinHandle<()>>,
}

/// State shared between the client and its loops.
struct Shared {
    stop: AtomicBool,
    alive: AtomicBool,
    fault: Mutex<Option<String>>,
    readiness: Readiness,
    drained: Mutex<bool>,
    signal: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            alive: AtomicBool::new(false),
            fault: Mutex::new(None),
            readiness: Readiness::new(),
            drained: Mutex::new(false),
            signal: Condvar::new(),
        }
    }

    fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn request_stop(&self) {
        let _guard = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
        self.stop.store(true, Ordering::Release);
        self.signal.notify_all();
    }

    /// Sleep up to `interval`. Returns true if a stop was requested.
    fn pause(&self, interval: Duration) -> bool {
        let guard = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .signal
            .wait_timeout_while(guard, interval, |_| !self.is_stopping())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_stopping()
    }

    fn mark_drained(&self) {
        let mut drained = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
        *drained = true;
        self.signal.notify_all();
    }

    /// Wait up to `grace` for the drain loop to finish.
    fn wait_drained(&self, grace: Duration) -> bool {
        let guard = self.drained.lock().unwrap_or_else(PoisonError::into_inner);
        let (drained, _) = self
            .signal
            .wait_timeout_while(guard, grace, |drained| !*drained)
            .unwrap_or_else(PoisonError::into_inner);
        *drained
    }

    /// Record a fatal loop exit. Exits during shutdown are expected.
    fn loop_failed(&self, task: &'static str, err: ClientError) {
        if self.is_stopping() {
            debug!(task, error = %err, "loop ended during shutdown");
            return;
        }

        error!(task, error = %err, "loop failed, session is dead");
        self.alive.store(false, Ordering::Release);
        let reason = format!("{task}: {err}");
        {
            let mut fault = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
            fault.get_or_insert_with(|| reason.clone());
        }
        self.readiness.fail(reason);
    }
}

impl Client {
    /// Create a client with a fully populated registry and no connection.
    pub fn new(config: ClientConfig) -> Self {
        let (queue, receiver) = write_queue();
        let registry = Arc::new(Registry::new(queue.clone()));
        Self {
            config,
            registry,
            queue,
            state: State::Idle(receiver),
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Parameter registry of this session.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Address of the connected system.
    pub fn peer(&self) -> Option<IpAddr> {
        match &self.state {
            State::Connected(session) => Some(session.peer),
            State::Idle(_) | State::Closed => None,
        }
    }

    /// True while connected and no loop has failed.
    pub fn is_alive(&self) -> bool {
        matches!(self.state, State::Connected(_)) && self.shared.alive.load(Ordering::Acquire)
    }

    /// Reason the session died, if a loop failed.
    pub fn fault(&self) -> Option<String> {
        self.shared
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, category: u8, index: u16) -> Result<Value> {
        Ok(self.registry.get(ParamKey::new(category, index))?)
    }

    pub fn set(&self, category: u8, index: u16, value: Value) -> Result<()> {
        Ok(self.registry.set(ParamKey::new(category, index), value)?)
    }

    pub fn set_field(&self, category: u8, index: u16, field: &str, value: FieldValue) -> Result<()> {
        Ok(self
            .registry
            .set_field(ParamKey::new(category, index), field, value)?)
    }

    /// Open both channels, start the session loops, request the full
    /// configuration, and block until every configuration index has arrived.
    pub fn connect(&mut self, ip: IpAddr) -> Result<()> {
        let receiver = match std::mem::replace(&mut self.state, State::Closed) {
            State::Idle(receiver) => receiver,
            State::Connected(session) => {
                self.state = State::Connected(session);
                return Err(ClientError::AlreadyConnected);
            }
            State::Closed => {
                return Err(ClientError::Disconnected(
                    "client was disconnected; create a new one".to_string(),
                ))
            }
        };

        let (read, write) = match self.open_channels(ip) {
            Ok(channels) => channels,
            Err(err) => {
                self.state = State::Idle(receiver);
                return Err(err);
            }
        };

        self.shared.alive.store(true, Ordering::Release);
        let mut session = Session {
            peer: ip,
            read,
            write,
            threads: Vec::with_capacity(4),
        };
        let started = self.start_loops(&mut session, receiver);
        self.state = State::Connected(session);
        if let Err(err) = started.and_then(|()| self.await_ready()) {
            let _ = self.disconnect();
            return Err(err);
        }

        debug!(%ip, "system ready");
        Ok(())
    }

    fn open_channels(&self, ip: IpAddr) -> Result<(TcpChannel, TcpChannel)> {
        let open = |port: u16| {
            let addr = SocketAddr::new(ip, port);
            match self.config.connect_timeout {
                Some(timeout) => TcpChannel::connect_timeout(addr, timeout),
                None => TcpChannel::connect(addr),
            }
        };
        let read = open(self.config.base_port)?;
        let write = open(self.config.write_port())?;
        Ok((read, write))
    }

    fn start_loops(&self, session: &mut Session, receiver: WriteQueueReceiver) -> Result<()> {
        let frame_config = self.config.frame.clone();

        let keepalive = FrameWriter::with_config_tcp(session.read.try_clone()?, frame_config.clone())?;
        let interval = self.config.keepalive_interval;
        let shared = Arc::clone(&self.shared);
        session.threads.push(spawn("mcl-keepalive", move || {
            keepalive_loop(keepalive, interval, &shared)
        })?);

        let mut reader = FrameReader::with_config_tcp(session.read.try_clone()?, frame_config.clone())?;
        reader.set_chunk_size(self.config.read_chunk_size);
        let registry = Arc::clone(&self.registry);
        let count = self.config.configuration_count;
        let shared = Arc::clone(&self.shared);
        session.threads.push(spawn("mcl-consume", move || {
            consume_loop(reader, &registry, count, &shared)
        })?);

        let acks = session.write.try_clone()?;
        let shared = Arc::clone(&self.shared);
        session
            .threads
            .push(spawn("mcl-ack-sink", move || ack_sink_loop(acks, &shared))?);

        let writer = FrameWriter::with_config_tcp(session.write.try_clone()?, frame_config)?;
        let shared = Arc::clone(&self.shared);
        session.threads.push(spawn("mcl-drain", move || {
            drain_loop(writer, &receiver, &shared)
        })?);

        debug!(peer = %session.peer, "session loops started");
        Ok(())
    }

    fn await_ready(&self) -> Result<()> {
        std::thread::sleep(self.config.startup_delay);
        self.registry.general()?.request_update()?;
        debug!(
            count = self.config.configuration_count,
            "configuration requested, waiting for readiness"
        );
        self.shared.readiness.wait(self.config.readiness_timeout)
    }

    /// Stop the loops, let queued writes drain for up to the grace period,
    /// close both channels, and join every loop thread.
    ///
    /// Calling it again, or on a client that never connected, does nothing.
    pub fn disconnect(&mut self) -> Result<()> {
        let session = match std::mem::replace(&mut self.state, State::Closed) {
            State::Connected(session) => session,
            State::Idle(_) | State::Closed => return Ok(()),
        };

        debug!(peer = %session.peer, "disconnecting");
        self.shared.request_stop();
        if self.queue.wake().is_err() {
            trace!("drain loop already gone");
        }
        if !self.shared.wait_drained(self.config.shutdown_grace) {
            warn!(grace = ?self.config.shutdown_grace, "writes still queued at shutdown");
        }

        let mut result = Ok(());
        for channel in [&session.read, &session.write] {
            if let Err(err) = channel.shutdown() {
                warn!(error = %err, "channel shutdown failed");
                if result.is_ok() {
                    result = Err(err.into());
                }
            }
        }
        for handle in session.threads {
            if handle.join().is_err() {
                warn!("session loop panicked");
            }
        }

        self.shared.alive.store(false, Ordering::Release);
        debug!(peer = %session.peer, "disconnected");
        result
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(err) = self.disconnect() {
            debug!(error = %err, "disconnect on drop failed");
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.peer())
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn spawn<F>(name: &'static str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| ClientError::Spawn { name, source })
}

fn keepalive_loop(mut writer: FrameWriter<TcpChannel>, interval: Duration, shared: &Shared) {
    let mut counter: u32 = 0;
    // The first word goes out one interval after connect, not at once.
    while !shared.pause(interval) {
        if let Err(err) = writer.write_raw(&counter.to_be_bytes()) {
            shared.loop_failed("keepalive", err.into());
            return;
        }
        trace!(counter, "keepalive sent");
        counter = counter.wrapping_add(1);
    }
}

fn consume_loop(mut reader: FrameReader<TcpChannel>, registry: &Registry, count: u16, shared: &Shared) {
    let mut coverage = Coverage::new(count);
    if coverage.is_complete() {
        shared.readiness.open();
    }

    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                shared.loop_failed("consume", err.into());
                return;
            }
        };
        trace!(
            category = frame.category,
            index = frame.index,
            len = frame.payload.len(),
            "frame received"
        );

        if let Err(err) = registry.dispatch(&frame) {
            warn!(
                category = frame.category,
                index = frame.index,
                error = %err,
                "dropping undecodable frame"
            );
        }

        if frame.category == CONFIGURATION && coverage.mark(frame.index) {
            debug!(count, "configuration complete");
            shared.readiness.open();
        }
    }
}

fn ack_sink_loop(mut channel: TcpChannel, shared: &Shared) {
    let mut buf = [0u8; 64];
    loop {
        match channel.read(&mut buf) {
            Ok(0) => {
                shared.loop_failed("ack-sink", FrameError::ConnectionClosed.into());
                return;
            }
            Ok(n) => trace!(len = n, "keepalive ack"),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                shared.loop_failed("ack-sink", FrameError::Io(err).into());
                return;
            }
        }
    }
}

fn drain_loop(mut writer: FrameWriter<TcpChannel>, receiver: &WriteQueueReceiver, shared: &Shared) {
    while let Some(entry) = receiver.recv() {
        match entry {
            Outbound::Frame(frame) => {
                if let Err(err) = writer.write_frame(&frame) {
                    shared.loop_failed("drain", err.into());
                    break;
                }
                trace!(category = frame.category, index = frame.index, "frame sent");
            }
            Outbound::Wake if shared.is_stopping() => break,
            Outbound::Wake => {}
        }
    }
    shared.mark_drained();
}
