//! `Socket` compound value: a thin wrapper over a TCP stream/listener
//! (spec.md §1 names "socket syscall glue" as an external collaborator,
//! but a complete crate still needs one concrete implementation of the
//! `Socket`/`Reader`/`Writer` interfaces named in spec.md §2's built-in
//! interface list).
//!
//! Grounded on the teacher's `tcp.rs`: a registry-free equivalent of its
//! listen/accept/read/write/close shape, adapted from May's
//! coroutine-yielding non-blocking I/O to plain blocking `std::net`
//! (this crate has no strand scheduler to yield to) and from a global
//! `Mutex<SocketRegistry<T>>` + integer handle to a `Compound`-backed
//! value, since sockets here are ordinary refcounted values like every
//! other compound kind rather than indices into a side table.

use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::compound::{Compound, CompoundPayload};
use crate::iter::{Reader, Writer};
use crate::registry::{self, TypeId};
use crate::status::{Status, StatusCode};

pub fn socket_type() -> TypeId {
    use std::sync::OnceLock;
    static TYPE: OnceLock<TypeId> = OnceLock::new();
    *TYPE.get_or_init(|| registry::add_type("Socket", Vec::new()))
}

enum SocketKind {
    Stream(TcpStream),
    Listener(TcpListener),
    Closed,
}

struct SocketData(SocketKind);

impl CompoundPayload for SocketData {
    fn clear_children(&mut self) {}
}

/// A handle to a shared `Socket` value. Like `SockAddr`, a socket never
/// holds other `Value`s, so it can never be part of a reference cycle.
#[derive(Clone)]
pub struct Socket(Compound);

impl Socket {
    fn wrap(kind: SocketKind) -> Self {
        Socket(Compound::new(socket_type(), Box::new(SocketData(kind))))
    }

    pub fn from_compound(c: Compound) -> Option<Self> {
        if c.type_id() == socket_type() {
            Some(Socket(c))
        } else {
            None
        }
    }

    fn with_kind<R>(&self, f: impl FnOnce(&SocketKind) -> R) -> R {
        let payload = self.0 .0.payload.borrow();
        f(&downcast(&**payload).0)
    }

    fn with_kind_mut<R>(&self, f: impl FnOnce(&mut SocketKind) -> R) -> R {
        let mut payload = self.0 .0.payload.borrow_mut();
        f(&mut downcast_mut(&mut **payload).0)
    }

    /// Bind a listening socket to `addr` (e.g. `"0.0.0.0:8080"`).
    pub fn listen(addr: impl ToSocketAddrs) -> Result<Socket, Status> {
        let listener = TcpListener::bind(addr).map_err(|e| io_status(&e))?;
        Ok(Socket::wrap(SocketKind::Listener(listener)))
    }

    /// Accept one incoming connection, blocking until one arrives.
    pub fn accept(&self) -> Result<Socket, Status> {
        self.with_kind(|kind| match kind {
            SocketKind::Listener(listener) => {
                let (stream, _peer) = listener.accept().map_err(|e| io_status(&e))?;
                Ok(Socket::wrap(SocketKind::Stream(stream)))
            }
            SocketKind::Stream(_) => Err(crate::status!(StatusCode::IncompatibleType)),
            SocketKind::Closed => Err(crate::status!(StatusCode::FileClosed)),
        })
    }

    /// Open a client connection to `addr`.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Socket, Status> {
        let stream = TcpStream::connect(addr).map_err(|e| io_status(&e))?;
        Ok(Socket::wrap(SocketKind::Stream(stream)))
    }

    pub fn close(&self) {
        self.with_kind_mut(|kind| *kind = SocketKind::Closed);
    }

    pub fn is_closed(&self) -> bool {
        self.with_kind(|kind| matches!(kind, SocketKind::Closed))
    }

    /// The local address a listener is bound to, or a stream's own endpoint.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, Status> {
        self.with_kind(|kind| match kind {
            SocketKind::Listener(l) => l.local_addr().map_err(|e| io_status(&e)),
            SocketKind::Stream(s) => s.local_addr().map_err(|e| io_status(&e)),
            SocketKind::Closed => Err(crate::status!(StatusCode::FileClosed)),
        })
    }
}

impl Reader for Socket {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Status> {
        use std::io::Read;
        self.with_kind_mut(|kind| match kind {
            SocketKind::Stream(stream) => stream.read(buf).map_err(|e| io_status(&e)),
            SocketKind::Listener(_) => Err(crate::status!(StatusCode::IncompatibleType)),
            SocketKind::Closed => Err(crate::status!(StatusCode::FileClosed)),
        })
    }
}

impl Writer for Socket {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Status> {
        use std::io::Write;
        self.with_kind_mut(|kind| match kind {
            SocketKind::Stream(stream) => stream.write(buf).map_err(|e| io_status(&e)),
            SocketKind::Listener(_) => Err(crate::status!(StatusCode::IncompatibleType)),
            SocketKind::Closed => Err(crate::status!(StatusCode::FileClosed)),
        })
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_kind(|kind| match kind {
            SocketKind::Stream(s) => write!(f, "Socket::Stream({:?})", s.peer_addr()),
            SocketKind::Listener(l) => write!(f, "Socket::Listener({:?})", l.local_addr()),
            SocketKind::Closed => write!(f, "Socket::Closed"),
        })
    }
}

fn downcast(payload: &dyn CompoundPayload) -> &SocketData {
    let ptr: *const dyn CompoundPayload = payload;
    unsafe { &*(ptr as *const SocketData) }
}

fn downcast_mut(payload: &mut dyn CompoundPayload) -> &mut SocketData {
    let ptr: *mut dyn CompoundPayload = payload;
    unsafe { &mut *(ptr as *mut SocketData) }
}

fn io_status(e: &std::io::Error) -> Status {
    crate::status!(StatusCode::ErrorErrno, errno = e.raw_os_error().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read as _, Write as _};

    #[test]
    fn listen_accept_read_write_round_trip() {
        let listener = Socket::listen("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let mut client = TcpStream::connect(addr).unwrap();
            client.write_all(b"ping").unwrap();
            let mut reply = [0u8; 4];
            client.read_exact(&mut reply).unwrap();
            reply
        });

        let mut server_side = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        let n = server_side.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        server_side.write(b"pong").unwrap();

        assert_eq!(&handle.join().unwrap(), b"pong");
    }

    #[test]
    fn closed_socket_refuses_io() {
        let listener = Socket::listen("127.0.0.1:0").unwrap();
        listener.close();
        assert!(listener.is_closed());
        assert!(listener.accept().is_err());
    }
}
