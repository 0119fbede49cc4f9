//! nf_tables stateful objects over `NETLINK_NETFILTER`.
//!
//! Every nf_tables request and reply payload starts with a 4-byte
//! [`NfGenMsg`] resource header followed by a big-endian attribute stream.
//! Objects implement [`Object`]; replies are turned back into objects by an
//! [`ObjectRegistry`]; [`Conn`] batches writes and performs dump reads.
//!
//! # Example
//!
//! ```ignore
//! use nftlink::nftables::{Conn, CounterObj, QuotaObj, Table, TableFamily};
//!
//! let table = Table::new("filter", TableFamily::Inet);
//! let mut conn = Conn::new();
//!
//! conn.add_obj(&CounterObj::new(table.clone(), "http"))?;
//! conn.add_obj(&QuotaObj::new(table.clone(), "monthly").bytes(25 << 30))?;
//! conn.flush()?;
//! ```

use std::fmt;

use zerocopy::byteorder::network_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::netlink::{Error, Result};

pub mod conn;
pub mod counter;
pub mod expr;
pub mod object;
pub mod quota;
pub mod registry;

pub use conn::Conn;
pub use counter::CounterObj;
pub use expr::{Expr, ExprParser, RawExprParser};
pub use object::{DecodeContext, Object, ObjectType};
pub use quota::QuotaObj;
pub use registry::{ObjectFactory, ObjectRegistry};

/// nfnetlink subsystem id of nf_tables.
pub const NFNL_SUBSYS_NFTABLES: u8 = 10;

/// nf_tables message codes (low byte of the netlink message type).
pub const NFT_MSG_NEWOBJ: u8 = 18;
pub const NFT_MSG_GETOBJ: u8 = 19;
pub const NFT_MSG_DELOBJ: u8 = 20;
pub const NFT_MSG_GETOBJ_RESET: u8 = 21;

/// Stateful object attributes.
pub const NFTA_OBJ_TABLE: u16 = 1;
pub const NFTA_OBJ_NAME: u16 = 2;
pub const NFTA_OBJ_TYPE: u16 = 3;
pub const NFTA_OBJ_DATA: u16 = 4;
pub const NFTA_OBJ_USE: u16 = 5;
pub const NFTA_OBJ_HANDLE: u16 = 6;
pub const NFTA_OBJ_PAD: u16 = 7;
pub const NFTA_OBJ_USERDATA: u16 = 8;

/// Longest table or object name accepted by the kernel (`NFT_NAME_MAXLEN - 1`).
pub const NFT_NAME_MAXLEN: usize = 255;

/// Build the netlink message type for an nf_tables message code.
pub const fn msg_type(code: u8) -> u16 {
    ((NFNL_SUBSYS_NFTABLES as u16) << 8) | code as u16
}

/// Address family of an nf_tables table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TableFamily {
    /// NFPROTO_UNSPEC (0)
    #[default]
    Unspecified,
    /// NFPROTO_INET (1)
    Inet,
    /// NFPROTO_IPV4 (2)
    IPv4,
    /// NFPROTO_ARP (3)
    Arp,
    /// NFPROTO_NETDEV (5)
    Netdev,
    /// NFPROTO_BRIDGE (7)
    Bridge,
    /// NFPROTO_IPV6 (10)
    IPv6,
    /// Any other family byte
    Other(u8),
}

impl TableFamily {
    /// Map a resource-header family byte.
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => Self::Unspecified,
            1 => Self::Inet,
            2 => Self::IPv4,
            3 => Self::Arp,
            5 => Self::Netdev,
            7 => Self::Bridge,
            10 => Self::IPv6,
            other => Self::Other(other),
        }
    }

    /// Family byte written into the resource header.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Inet => 1,
            Self::IPv4 => 2,
            Self::Arp => 3,
            Self::Netdev => 5,
            Self::Bridge => 7,
            Self::IPv6 => 10,
            Self::Other(n) => *n,
        }
    }

    /// Parse the keyword used by `nft` ("ip", "ip6", "inet", ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ip" => Some(Self::IPv4),
            "ip6" => Some(Self::IPv6),
            "inet" => Some(Self::Inet),
            "arp" => Some(Self::Arp),
            "bridge" => Some(Self::Bridge),
            "netdev" => Some(Self::Netdev),
            _ => None,
        }
    }
}

impl fmt::Display for TableFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspec"),
            Self::Inet => write!(f, "inet"),
            Self::IPv4 => write!(f, "ip"),
            Self::Arp => write!(f, "arp"),
            Self::Netdev => write!(f, "netdev"),
            Self::Bridge => write!(f, "bridge"),
            Self::IPv6 => write!(f, "ip6"),
            Self::Other(n) => write!(f, "family-{}", n),
        }
    }
}

/// Reference to the table owning an object.
///
/// Objects hold the table by value; creating or deleting the table itself
/// is outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Table family.
    pub family: TableFamily,
}

impl Table {
    /// Create a table reference.
    pub fn new(name: impl Into<String>, family: TableFamily) -> Self {
        Self {
            name: name.into(),
            family,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.name)
    }
}

/// nfnetlink resource header (mirrors struct nfgenmsg).
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
pub struct NfGenMsg {
    /// Address family.
    pub nfgen_family: u8,
    /// nfnetlink version (always 0).
    pub version: u8,
    /// Resource id, big-endian.
    pub res_id: U16,
}

impl NfGenMsg {
    /// Size of the header on the wire.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a header for `family` and `res_id`.
    pub fn new(family: u8, res_id: u16) -> Self {
        Self {
            nfgen_family: family,
            version: 0,
            res_id: U16::new(res_id),
        }
    }

    /// Table family of this header.
    pub fn family(&self) -> TableFamily {
        TableFamily::from_u8(self.nfgen_family)
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from the start of a payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }
}
