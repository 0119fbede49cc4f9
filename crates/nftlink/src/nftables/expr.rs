//! Expression-list parsing capability.
//!
//! Some object payloads embed nf_tables expression lists. Object decoders
//! do not parse them themselves; they call the [`ExprParser`] installed on
//! the [`ObjectRegistry`](super::ObjectRegistry), reached through
//! [`DecodeContext::parse_exprs`](super::DecodeContext::parse_exprs).

use super::TableFamily;
use crate::netlink::{AttributeDecoder, ByteOrder, Error, Result};

/// List attributes (`NFTA_LIST_*`).
pub const NFTA_LIST_ELEM: u16 = 1;

/// Expression attributes (`NFTA_EXPR_*`).
pub const NFTA_EXPR_NAME: u16 = 1;
pub const NFTA_EXPR_DATA: u16 = 2;

/// A decoded expression: its kernel name and undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Expr {
    /// Expression name ("counter", "payload", "cmp", ...).
    pub name: String,
    /// Contents of `NFTA_EXPR_DATA`, big-endian attribute stream.
    pub data: Vec<u8>,
}

/// Parses an embedded expression list.
pub trait ExprParser: Send + Sync {
    /// Parse the contents of an expression-list attribute.
    fn parse_exprs(&self, family: TableFamily, data: &[u8]) -> Result<Vec<Expr>>;
}

/// Splits an expression list into named, undecoded expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawExprParser;

impl ExprParser for RawExprParser {
    fn parse_exprs(&self, _family: TableFamily, data: &[u8]) -> Result<Vec<Expr>> {
        let mut ad = AttributeDecoder::new(data).with_byte_order(ByteOrder::Big);
        let mut exprs = Vec::new();

        while ad.advance() {
            if ad.kind() != NFTA_LIST_ELEM {
                tracing::trace!(kind = ad.kind(), "ignoring expression list attribute");
                continue;
            }
            let mut name = None;
            let mut payload = Vec::new();
            ad.nested(|nd| {
                while nd.advance() {
                    match nd.kind() {
                        NFTA_EXPR_NAME => name = Some(nd.string()),
                        NFTA_EXPR_DATA => payload = nd.bytes().to_vec(),
                        _ => {}
                    }
                }
                Ok(())
            });
            if ad.err().is_some() {
                break;
            }
            let name = name.ok_or(Error::MissingAttribute("expression name"))?;
            exprs.push(Expr {
                name,
                data: payload,
            });
        }

        ad.finish()?;
        Ok(exprs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::AttributeEncoder;

    fn expr_list(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut enc = AttributeEncoder::new().with_byte_order(ByteOrder::Big);
        for (name, data) in entries {
            enc.nested(NFTA_LIST_ELEM, |enc| {
                enc.string(NFTA_EXPR_NAME, name);
                enc.nested(NFTA_EXPR_DATA, |enc| {
                    enc.bytes(1, data);
                });
            });
        }
        enc.finish().unwrap()
    }

    #[test]
    fn test_parse_list() {
        let data = expr_list(&[("payload", &[1, 2, 3, 4]), ("cmp", &[0, 0, 0, 0])]);
        let exprs = RawExprParser.parse_exprs(TableFamily::Inet, &data).unwrap();

        assert_eq!(exprs.len(), 2);
        assert_eq!(exprs[0].name, "payload");
        assert_eq!(exprs[1].name, "cmp");
        // NFTA_EXPR_DATA holds one 8-byte attribute.
        assert_eq!(exprs[0].data.len(), 8);
        assert_eq!(&exprs[0].data[4..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_missing_name() {
        let mut enc = AttributeEncoder::new().with_byte_order(ByteOrder::Big);
        enc.nested(NFTA_LIST_ELEM, |enc| {
            enc.bytes(NFTA_EXPR_DATA, &[]);
        });
        let data = enc.finish().unwrap();

        assert!(matches!(
            RawExprParser.parse_exprs(TableFamily::IPv4, &data),
            Err(Error::MissingAttribute("expression name"))
        ));
    }

    #[test]
    fn test_truncated_list() {
        let mut data = expr_list(&[("counter", &[])]);
        data.truncate(data.len() - 2);
        assert!(matches!(
            RawExprParser.parse_exprs(TableFamily::IPv4, &data),
            Err(Error::Truncated { .. })
        ));
    }
}
