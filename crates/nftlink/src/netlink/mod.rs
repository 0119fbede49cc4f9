//! Netlink protocol plumbing.
//!
//! This module carries everything below the nf_tables object layer: the
//! attribute codec, message framing, error types and the socket transport.
//!
//! # Attribute streams
//!
//! ```ignore
//! use nftlink::netlink::{AttributeDecoder, AttributeEncoder, ByteOrder};
//!
//! let mut enc = AttributeEncoder::new().with_byte_order(ByteOrder::Big);
//! enc.string(1, "filter").u32(3, 1);
//! let bytes = enc.finish()?;
//!
//! let mut ad = AttributeDecoder::new(&bytes).with_byte_order(ByteOrder::Big);
//! while ad.advance() {
//!     match ad.kind() {
//!         1 => println!("table {}", ad.string()),
//!         3 => println!("type {}", ad.u32()),
//!         _ => {}
//!     }
//! }
//! ad.finish()?;
//! ```
//!
//! # Transports
//!
//! The object layer talks to the kernel through the [`Transport`] and
//! [`Dial`] traits. [`NetlinkDialer`] opens a blocking
//! `NETLINK_NETFILTER` socket per exchange, optionally inside another
//! network namespace:
//!
//! ```ignore
//! use nftlink::netlink::{Dial, NetlinkDialer};
//!
//! let dialer = NetlinkDialer::in_namespace("/var/run/netns/fw");
//! let socket = dialer.dial()?;
//! ```

pub mod attr;
mod builder;
mod error;
pub mod message;
mod socket;
mod transport;

pub use attr::{AttrIter, AttributeDecoder, ByteOrder, NlAttr};
pub use builder::{AttributeEncoder, MessageBuilder};
pub use error::{EncodeError, Error, Result};
pub use message::{Message, MessageIter, NLMSG_HDRLEN, NlMsgError, NlMsgHdr, NlMsgType};
pub use socket::{NetlinkDialer, NetlinkSocket, Protocol};
pub use transport::{Dial, Transport, TransportGuard};
