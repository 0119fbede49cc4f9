//! Blocking netlink socket operations.

use std::fs::File;
use std::ops::RangeInclusive;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{Message, MessageIter, NlMsgError, NlMsgType};
use super::transport::{Dial, Transport};

/// Receive buffer size; one datagram per read.
const RECV_BUF_SIZE: usize = 32768;

/// Netlink protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Routing/device hook
    Route,
    /// Generic netlink
    Generic,
    /// Netfilter (nfnetlink: nf_tables, conntrack)
    Netfilter,
}

impl Protocol {
    fn as_isize(self) -> isize {
        match self {
            Protocol::Route => protocols::NETLINK_ROUTE,
            Protocol::Generic => protocols::NETLINK_GENERIC,
            Protocol::Netfilter => protocols::NETLINK_NETFILTER,
        }
    }
}

/// Blocking netlink socket.
pub struct NetlinkSocket {
    /// The underlying socket.
    socket: Socket,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
    /// Protocol this socket uses.
    protocol: Protocol,
    /// Sequence numbers of the last request sent.
    pending: Option<RangeInclusive<u32>>,
}

impl NetlinkSocket {
    /// Create a new netlink socket for the given protocol.
    pub fn new(protocol: Protocol) -> Result<Self> {
        Self::create_socket(protocol)
    }

    /// Create a netlink socket that operates in a specific network namespace.
    ///
    /// The namespace is specified by an open file descriptor to a namespace file
    /// (e.g., `/proc/<pid>/ns/net` or `/var/run/netns/<name>`).
    ///
    /// This function temporarily switches to the target namespace, creates the socket,
    /// then restores the original namespace. The socket keeps operating in the target
    /// namespace.
    ///
    /// `setns()` affects the calling thread only.
    pub fn new_in_namespace(protocol: Protocol, ns_fd: RawFd) -> Result<Self> {
        // Save the current namespace so we can restore it
        let current_ns = File::open("/proc/self/ns/net")
            .map_err(|e| Error::InvalidMessage(format!("cannot open current namespace: {}", e)))?;
        let current_ns_fd = current_ns.as_raw_fd();

        // SAFETY: ns_fd is a file descriptor to a namespace file owned by the caller.
        let ret = unsafe { libc::setns(ns_fd, libc::CLONE_NEWNET) };
        if ret < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let result = Self::create_socket(protocol);

        // SAFETY: current_ns_fd was opened from /proc/self/ns/net above and is still open.
        let restore_ret = unsafe { libc::setns(current_ns_fd, libc::CLONE_NEWNET) };
        if restore_ret < 0 {
            // The socket is usable; the thread is left in the target namespace.
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "failed to restore original network namespace"
            );
        }

        result
    }

    /// Create a netlink socket in the network namespace at `ns_path`.
    pub fn new_in_namespace_path<P: AsRef<Path>>(protocol: Protocol, ns_path: P) -> Result<Self> {
        let ns_file = File::open(ns_path.as_ref()).map_err(|e| {
            Error::InvalidMessage(format!(
                "cannot open namespace '{}': {}",
                ns_path.as_ref().display(),
                e
            ))
        })?;
        Self::new_in_namespace(protocol, ns_file.as_raw_fd())
    }

    fn create_socket(protocol: Protocol) -> Result<Self> {
        let mut socket = Socket::new(protocol.as_isize())?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        // Enable extended ACK for better error messages
        socket.set_ext_ack(true).ok(); // Ignore if not supported

        tracing::debug!(?protocol, pid, "opened netlink socket");

        Ok(Self {
            socket,
            seq: AtomicU32::new(1),
            pid,
            protocol,
            pending: None,
        })
    }

    /// Get the next sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Send a framed buffer.
    pub fn send(&self, msg: &[u8]) -> Result<()> {
        self.socket.send(msg, 0)?;
        Ok(())
    }

    /// Receive one datagram, allocating a buffer.
    pub fn recv_msg(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(RECV_BUF_SIZE);
        self.socket.recv(&mut buf, 0)?;
        Ok(buf.to_vec())
    }

    fn expects(&self, seq: u32) -> bool {
        self.pending.as_ref().is_some_and(|range| range.contains(&seq))
    }
}

impl Transport for NetlinkSocket {
    fn send_messages(&mut self, messages: &[Message]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }

        let mut buf = Vec::new();
        let mut first = None;
        let mut last = 0;
        for msg in messages {
            let seq = self.next_seq();
            first.get_or_insert(seq);
            last = seq;

            let mut builder = MessageBuilder::with_header(msg.header);
            builder.append_bytes(&msg.data);
            builder.set_seq(seq);
            builder.set_pid(self.pid);
            buf.extend_from_slice(&builder.finish());
        }
        let first = first.unwrap_or(last);
        self.pending = Some(first..=last);

        tracing::trace!(count = messages.len(), bytes = buf.len(), first, last, "sending");
        self.send(&buf)?;
        Ok(messages.len())
    }

    fn receive(&mut self) -> Result<Vec<Message>> {
        let mut replies = Vec::new();

        loop {
            let data = self.recv_msg()?;
            let mut done = false;
            let mut multi = false;

            for result in MessageIter::new(&data) {
                let (header, payload) = result?;

                if !self.expects(header.nlmsg_seq) {
                    tracing::trace!(seq = header.nlmsg_seq, "skipping unrelated message");
                    continue;
                }

                if header.is_done() {
                    done = true;
                    break;
                }

                if header.nlmsg_type == NlMsgType::NOOP {
                    continue;
                }

                if header.is_error() {
                    let err = NlMsgError::from_bytes(payload)?;
                    if !err.is_ack() {
                        return Err(Error::from_errno(err.error));
                    }
                }

                multi = header.is_multi();
                replies.push(Message {
                    header,
                    data: payload.to_vec(),
                });
            }

            if done || (!multi && !replies.is_empty()) {
                return Ok(replies);
            }
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// Dials a fresh `NETLINK_NETFILTER` socket per operation.
#[derive(Debug, Clone, Default)]
pub struct NetlinkDialer {
    namespace: Option<PathBuf>,
}

impl NetlinkDialer {
    /// Dial sockets in the caller's network namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dial sockets inside the network namespace at `path`
    /// (e.g. `/var/run/netns/<name>` or `/proc/<pid>/ns/net`).
    pub fn in_namespace(path: impl Into<PathBuf>) -> Self {
        Self {
            namespace: Some(path.into()),
        }
    }

    /// Namespace path sockets are created in, if any.
    pub fn namespace(&self) -> Option<&Path> {
        self.namespace.as_deref()
    }
}

impl Dial for NetlinkDialer {
    type Transport = NetlinkSocket;

    fn dial(&self) -> Result<NetlinkSocket> {
        match &self.namespace {
            Some(path) => NetlinkSocket::new_in_namespace_path(Protocol::Netfilter, path),
            None => NetlinkSocket::new(Protocol::Netfilter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_numbers() {
        assert_eq!(Protocol::Netfilter.as_isize(), 12);
        assert_eq!(Protocol::Route.as_isize(), 0);
        assert_eq!(Protocol::Generic.as_isize(), 16);
    }

    #[test]
    fn dialer_namespace() {
        assert!(NetlinkDialer::new().namespace().is_none());
        let dialer = NetlinkDialer::in_namespace("/var/run/netns/fw");
        assert_eq!(dialer.namespace(), Some(Path::new("/var/run/netns/fw")));
    }
}
