//! Transport boundary between the object layer and a netlink socket.
//!
//! The object layer never touches a socket directly. Reads and commits
//! dial a [`Transport`] through a [`Dial`] implementation, use it for one
//! exchange, and release it through a [`TransportGuard`].

use std::ops::{Deref, DerefMut};

use super::error::Result;
use super::message::Message;

/// A connected netlink endpoint exchanging whole messages.
pub trait Transport {
    /// Frame and send `messages` as one write. Returns how many were sent.
    fn send_messages(&mut self, messages: &[Message]) -> Result<usize>;

    /// Receive the replies to the outstanding request(s).
    ///
    /// Multipart replies are collected until their terminating `DONE`
    /// message. Acknowledgements are returned as messages; kernel error
    /// replies are returned as [`Error::Kernel`](super::Error::Kernel).
    fn receive(&mut self) -> Result<Vec<Message>>;

    /// Release the endpoint. Called once by [`TransportGuard`] on drop.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens transports on demand.
pub trait Dial {
    /// The transport produced by this dialer.
    type Transport: Transport;

    /// Open a new transport.
    fn dial(&self) -> Result<Self::Transport>;
}

/// Scoped ownership of a dialed transport.
///
/// Closes the transport when dropped, whatever path the caller leaves by.
pub struct TransportGuard<T: Transport> {
    inner: T,
}

impl<T: Transport> TransportGuard<T> {
    /// Take ownership of an open transport.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Transport> Deref for TransportGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> DerefMut for TransportGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Transport> Drop for TransportGuard<T> {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            tracing::warn!(error = %e, "failed to close netlink transport");
        }
    }
}
