//! The stateful object contract.

use std::any::Any;
use std::fmt;

use super::expr::{Expr, ExprParser};
use super::{
    NFT_NAME_MAXLEN, NFTA_OBJ_DATA, NFTA_OBJ_NAME, NFTA_OBJ_TABLE, NFTA_OBJ_TYPE, Table,
    TableFamily,
};
use crate::netlink::{AttributeDecoder, AttributeEncoder, ByteOrder, EncodeError, Error, Result};

/// Wire code of a stateful object type (`NFTA_OBJ_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectType(pub u32);

impl ObjectType {
    /// `NFT_OBJECT_COUNTER`
    pub const COUNTER: Self = Self(1);
    /// `NFT_OBJECT_QUOTA`
    pub const QUOTA: Self = Self(2);

    /// The raw wire value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Parse the keyword used by `nft` ("counter", "quota").
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "counter" => Some(Self::COUNTER),
            "quota" => Some(Self::QUOTA),
            _ => None,
        }
    }
}

impl From<u32> for ObjectType {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::COUNTER => write!(f, "counter"),
            Self::QUOTA => write!(f, "quota"),
            Self(n) => write!(f, "type {}", n),
        }
    }
}

/// Read-only context handed to [`Object::unmarshal`].
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Family taken from the reply's resource header.
    pub family: TableFamily,
    /// Expression parser installed on the registry, if any.
    pub expr_parser: Option<&'a dyn ExprParser>,
}

impl<'a> DecodeContext<'a> {
    /// Context for `family` without an expression parser.
    pub fn new(family: TableFamily) -> Self {
        Self {
            family,
            expr_parser: None,
        }
    }

    /// Attach an expression parser.
    pub fn with_expr_parser(mut self, parser: &'a dyn ExprParser) -> Self {
        self.expr_parser = Some(parser);
        self
    }

    /// Parse an embedded expression list with the installed parser.
    pub fn parse_exprs(&self, data: &[u8]) -> Result<Vec<Expr>> {
        match self.expr_parser {
            Some(parser) => parser.parse_exprs(self.family, data),
            None => Err(Error::NotSupported(
                "no expression parser installed".into(),
            )),
        }
    }
}

impl fmt::Debug for DecodeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("family", &self.family)
            .field("expr_parser", &self.expr_parser.is_some())
            .finish()
    }
}

/// A kernel-side stateful object attached to a table.
///
/// Implementors supply identity accessors plus the encoding and decoding of
/// their type-specific payload. The common attributes (table, name, type)
/// are handled by the provided [`marshal`](Self::marshal).
///
/// Adding a variant takes a new [`ObjectType`] code, a type implementing
/// this trait and an [`ObjectRegistry::register`](super::ObjectRegistry::register)
/// call.
pub trait Object: fmt::Debug + fmt::Display + Send + Sync + Any {
    /// Owning table.
    fn table(&self) -> &Table;

    /// Object name, unique within its table and family.
    fn name(&self) -> &str;

    /// Object type code.
    fn object_type(&self) -> ObjectType;

    /// Family of the owning table. Written to the resource header, never as
    /// an attribute.
    fn family(&self) -> TableFamily {
        self.table().family
    }

    /// Encode the object's attribute stream.
    ///
    /// With `data == false` only the identity attributes are written, as
    /// used by get and delete requests.
    fn marshal(&self, data: bool) -> std::result::Result<Vec<u8>, EncodeError> {
        check_name("table", &self.table().name)?;
        check_name("name", self.name())?;

        let mut enc = AttributeEncoder::new().with_byte_order(ByteOrder::Big);
        enc.string(NFTA_OBJ_TABLE, &self.table().name)
            .string(NFTA_OBJ_NAME, self.name())
            .u32(NFTA_OBJ_TYPE, self.object_type().as_u32());
        if data {
            enc.nested(NFTA_OBJ_DATA, |enc| self.marshal_data(enc));
        }
        enc.finish()
    }

    /// Encode the type-specific payload nested under `NFTA_OBJ_DATA`.
    fn marshal_data(&self, enc: &mut AttributeEncoder);

    /// Decode the type-specific payload from a big-endian decoder positioned
    /// over the contents of `NFTA_OBJ_DATA`.
    fn unmarshal(&mut self, ad: &mut AttributeDecoder<'_>, ctx: &DecodeContext<'_>) -> Result<()>;

    /// Access the concrete type for downcasting.
    fn as_any(&self) -> &dyn Any;
}

fn check_name(field: &'static str, value: &str) -> std::result::Result<(), EncodeError> {
    if value.is_empty() {
        return Err(EncodeError::MissingField(field));
    }
    if value.len() > NFT_NAME_MAXLEN {
        return Err(EncodeError::InvalidString {
            field,
            reason: format!("{} bytes exceeds limit of {}", value.len(), NFT_NAME_MAXLEN),
        });
    }
    if value.as_bytes().contains(&0) {
        return Err(EncodeError::InvalidString {
            field,
            reason: "contains a NUL byte".into(),
        });
    }
    Ok(())
}
