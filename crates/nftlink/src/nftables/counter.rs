//! Named packet/byte counters.

use std::any::Any;
use std::fmt;

use super::object::{DecodeContext, Object, ObjectType};
use super::Table;
use crate::netlink::{AttributeDecoder, AttributeEncoder, Error, Result};

/// Counter attributes (`NFTA_COUNTER_*`).
pub const NFTA_COUNTER_BYTES: u16 = 1;
pub const NFTA_COUNTER_PACKETS: u16 = 2;
pub const NFTA_COUNTER_PAD: u16 = 3;

/// A named counter object.
///
/// # Example
///
/// ```ignore
/// use nftlink::nftables::{CounterObj, Table, TableFamily};
///
/// let ctr = CounterObj::new(Table::new("filter", TableFamily::IPv4), "ctr1")
///     .packets(10)
///     .bytes(1500);
/// assert_eq!(ctr.to_string(), "counter ip filter ctr1 { packets 10 bytes 1500 }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CounterObj {
    /// Owning table.
    pub table: Table,
    /// Object name.
    pub name: String,
    /// Packets counted.
    pub packets: u64,
    /// Bytes counted.
    pub bytes: u64,
}

impl CounterObj {
    /// Create a zeroed counter.
    pub fn new(table: Table, name: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
            packets: 0,
            bytes: 0,
        }
    }

    /// Set the initial packet count.
    pub fn packets(mut self, packets: u64) -> Self {
        self.packets = packets;
        self
    }

    /// Set the initial byte count.
    pub fn bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    /// Registry factory.
    pub(crate) fn empty(table: Table, name: String) -> Box<dyn Object> {
        Box::new(Self::new(table, name))
    }
}

impl Object for CounterObj {
    fn table(&self) -> &Table {
        &self.table
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::COUNTER
    }

    fn marshal_data(&self, enc: &mut AttributeEncoder) {
        enc.u64(NFTA_COUNTER_BYTES, self.bytes)
            .u64(NFTA_COUNTER_PACKETS, self.packets);
    }

    fn unmarshal(&mut self, ad: &mut AttributeDecoder<'_>, _ctx: &DecodeContext<'_>) -> Result<()> {
        let mut bytes = None;
        let mut packets = None;

        while ad.advance() {
            match ad.kind() {
                NFTA_COUNTER_BYTES => bytes = Some(ad.u64()),
                NFTA_COUNTER_PACKETS => packets = Some(ad.u64()),
                NFTA_COUNTER_PAD => {}
                kind => tracing::trace!(kind, "ignoring counter attribute"),
            }
        }

        self.bytes = bytes.ok_or(Error::MissingAttribute("counter bytes"))?;
        self.packets = packets.ok_or(Error::MissingAttribute("counter packets"))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for CounterObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "counter {} {} {{ packets {} bytes {} }}",
            self.table, self.name, self.packets, self.bytes
        )
    }
}
