//! Named byte quotas.

use std::any::Any;
use std::fmt;

use super::object::{DecodeContext, Object, ObjectType};
use super::Table;
use crate::netlink::{AttributeDecoder, AttributeEncoder, Error, Result};

/// Quota attributes (`NFTA_QUOTA_*`).
pub const NFTA_QUOTA_BYTES: u16 = 1;
pub const NFTA_QUOTA_FLAGS: u16 = 2;
pub const NFTA_QUOTA_PAD: u16 = 3;
pub const NFTA_QUOTA_CONSUMED: u16 = 4;

/// Quota flags.
pub const NFT_QUOTA_F_INV: u32 = 1;
pub const NFT_QUOTA_F_DEPLETED: u32 = 2;

/// A named byte quota.
///
/// Matches until `bytes` have been consumed, or once they have been
/// consumed when inverted ([`over`](Self::over)).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QuotaObj {
    /// Owning table.
    pub table: Table,
    /// Object name.
    pub name: String,
    /// Quota size in bytes.
    pub bytes: u64,
    /// `NFT_QUOTA_F_*` flags.
    pub flags: u32,
    /// Bytes consumed so far.
    pub consumed: u64,
}

impl QuotaObj {
    /// Create an empty quota.
    pub fn new(table: Table, name: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
            bytes: 0,
            flags: 0,
            consumed: 0,
        }
    }

    /// Set the quota size.
    pub fn bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    /// Match once the quota is exceeded instead of until.
    pub fn over(mut self) -> Self {
        self.flags |= NFT_QUOTA_F_INV;
        self
    }

    /// Start with `consumed` bytes already used.
    pub fn consumed(mut self, consumed: u64) -> Self {
        self.consumed = consumed;
        self
    }

    /// Whether the quota matches after it is exceeded.
    pub fn is_over(&self) -> bool {
        self.flags & NFT_QUOTA_F_INV != 0
    }

    /// Whether the kernel reported the quota as depleted.
    pub fn is_depleted(&self) -> bool {
        self.flags & NFT_QUOTA_F_DEPLETED != 0
    }

    /// Registry factory.
    pub(crate) fn empty(table: Table, name: String) -> Box<dyn Object> {
        Box::new(Self::new(table, name))
    }
}

impl Object for QuotaObj {
    fn table(&self) -> &Table {
        &self.table
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::QUOTA
    }

    fn marshal_data(&self, enc: &mut AttributeEncoder) {
        // The kernel owns the depleted bit.
        enc.u64(NFTA_QUOTA_BYTES, self.bytes)
            .u32(NFTA_QUOTA_FLAGS, self.flags & NFT_QUOTA_F_INV);
        if self.consumed != 0 {
            enc.u64(NFTA_QUOTA_CONSUMED, self.consumed);
        }
    }

    fn unmarshal(&mut self, ad: &mut AttributeDecoder<'_>, _ctx: &DecodeContext<'_>) -> Result<()> {
        let mut bytes = None;

        while ad.advance() {
            match ad.kind() {
                NFTA_QUOTA_BYTES => bytes = Some(ad.u64()),
                NFTA_QUOTA_FLAGS => self.flags = ad.u32(),
                NFTA_QUOTA_CONSUMED => self.consumed = ad.u64(),
                NFTA_QUOTA_PAD => {}
                kind => tracing::trace!(kind, "ignoring quota attribute"),
            }
        }

        self.bytes = bytes.ok_or(Error::MissingAttribute("quota bytes"))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for QuotaObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quota {} {} {{ ", self.table, self.name)?;
        if self.is_over() {
            write!(f, "over ")?;
        }
        write!(f, "{} bytes used {} bytes }}", self.bytes, self.consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::{AttrIter, ByteOrder};
    use crate::nftables::{NFTA_OBJ_DATA, TableFamily};

    fn data_of(obj: &QuotaObj) -> Vec<u8> {
        let buf = obj.marshal(true).unwrap();
        AttrIter::new(&buf)
            .map(|a| a.unwrap())
            .find(|(kind, _)| *kind == NFTA_OBJ_DATA)
            .map(|(_, data)| data.to_vec())
            .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let quota = QuotaObj::new(Table::new("filter", TableFamily::Inet), "monthly")
            .bytes(25 << 30)
            .consumed(4096)
            .over();
        let data = data_of(&quota);

        let mut decoded = QuotaObj::new(quota.table.clone(), "monthly");
        let mut ad = AttributeDecoder::new(&data).with_byte_order(ByteOrder::Big);
        decoded
            .unmarshal(&mut ad, &DecodeContext::new(TableFamily::Inet))
            .unwrap();
        ad.finish().unwrap();
        assert_eq!(decoded, quota);
        assert!(decoded.is_over());
        assert!(!decoded.is_depleted());
    }

    #[test]
    fn test_depleted_flag_not_sent() {
        let mut quota = QuotaObj::new(Table::new("filter", TableFamily::Inet), "q").bytes(1);
        quota.flags = NFT_QUOTA_F_DEPLETED;
        let data = data_of(&quota);
        let flags = AttrIter::new(&data)
            .map(|a| a.unwrap())
            .find(|(kind, _)| *kind == NFTA_QUOTA_FLAGS)
            .unwrap()
            .1;
        assert_eq!(flags, &[0, 0, 0, 0]);
    }

    #[test]
    fn test_missing_bytes() {
        let mut enc = AttributeEncoder::new().with_byte_order(ByteOrder::Big);
        enc.u32(NFTA_QUOTA_FLAGS, NFT_QUOTA_F_DEPLETED);
        let data = enc.finish().unwrap();

        let mut quota = QuotaObj::default();
        let mut ad = AttributeDecoder::new(&data).with_byte_order(ByteOrder::Big);
        assert!(matches!(
            quota.unmarshal(&mut ad, &DecodeContext::new(TableFamily::IPv4)),
            Err(Error::MissingAttribute("quota bytes"))
        ));
    }

    #[test]
    fn test_display() {
        let table = Table::new("filter", TableFamily::Inet);
        let quota = QuotaObj::new(table.clone(), "monthly").bytes(1000);
        assert_eq!(
            quota.to_string(),
            "quota inet filter monthly { 1000 bytes used 0 bytes }"
        );
        let quota = QuotaObj::new(table, "cap").bytes(10).consumed(3).over();
        assert_eq!(
            quota.to_string(),
            "quota inet filter cap { over 10 bytes used 3 bytes }"
        );
    }
}
