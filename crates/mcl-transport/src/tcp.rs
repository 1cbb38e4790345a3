use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Port offset of the read channel (system to client telemetry).
pub const READ_PORT: u16 = 46000;

/// Port offset of the write channel (client to system commands).
pub const WRITE_PORT: u16 = 46001;

/// A connected TCP channel to an MCL system. Implements `Read` and `Write`.
///
/// Each MCL session holds two of these: the read channel carries frames from
/// the system, the write channel carries frames to it. Clones share the same
/// socket, so [`TcpChannel::shutdown`] on any clone wakes readers blocked on
/// the others.
pub struct TcpChannel {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpChannel {
    /// Connect to a listening channel (blocking).
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let stream =
            TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected tcp channel");
        Ok(Self { stream, peer: addr })
    }

    /// Connect with an upper bound on the TCP handshake.
    pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|source| TransportError::Connect { addr, source })?;
        stream.set_nodelay(true)?;
        debug!(%addr, ?timeout, "connected tcp channel");
        Ok(Self { stream, peer: addr })
    }

    /// Wrap an already-connected stream (accepted sockets in tests and mocks).
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this channel (creates a new file descriptor for the same socket).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            stream: self.stream.try_clone()?,
            peer: self.peer,
        })
    }

    /// Close both directions of the socket.
    ///
    /// A socket that is already closed is not an error.
    pub fn shutdown(&self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => {
                debug!(peer = %self.peer, "tcp channel shut down");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for TcpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpChannel")
            .field("peer", &self.peer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, TcpListener};

    use super::*;

    #[test]
    fn connect_read_write_roundtrip() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut channel = TcpChannel::connect(addr).unwrap();
        assert_eq!(channel.peer_addr(), addr);
        channel.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        server.join().unwrap();
    }

    #[test]
    fn connect_refused_is_connect_error() {
        // Bind then drop to obtain a port with nothing listening.
        let addr = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap()
        };

        let err = TcpChannel::connect(addr).unwrap_err();
        assert!(matches!(err, TransportError::Connect { addr: a, .. } if a == addr));
    }

    #[test]
    fn shutdown_unblocks_reader_on_clone() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = std::thread::spawn(move || listener.accept().unwrap().0);

        let channel = TcpChannel::connect(addr).unwrap();
        let _server_side = accept.join().unwrap();

        let mut reader = channel.try_clone().unwrap();
        let blocked = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            reader.read(&mut buf)
        });

        std::thread::sleep(Duration::from_millis(50));
        channel.shutdown().unwrap();

        let read = blocked.join().unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[test]
    fn double_shutdown_is_ok() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = std::thread::spawn(move || listener.accept().unwrap().0);

        let channel = TcpChannel::connect(addr).unwrap();
        let _server_side = accept.join().unwrap();

        channel.shutdown().unwrap();
        channel.shutdown().unwrap();
    }
}
