//! Dispatch of object replies to their concrete types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::counter::CounterObj;
use super::expr::ExprParser;
use super::object::{DecodeContext, Object, ObjectType};
use super::quota::QuotaObj;
use super::{
    NFT_MSG_NEWOBJ, NFTA_OBJ_DATA, NFTA_OBJ_NAME, NFTA_OBJ_TABLE, NFTA_OBJ_TYPE, NfGenMsg, Table,
    msg_type,
};
use crate::netlink::{AttributeDecoder, ByteOrder, Error, Message, Result};

/// Builds an empty object of one type carrying its table and name.
pub type ObjectFactory = fn(Table, String) -> Box<dyn Object>;

/// Maps object type codes to the factories decoding them.
///
/// Populated before use; decoding only takes `&self`.
///
/// # Example
///
/// ```ignore
/// use nftlink::nftables::{ObjectRegistry, ObjectType, RawExprParser};
/// use std::sync::Arc;
///
/// let mut registry = ObjectRegistry::new().with_expr_parser(Arc::new(RawExprParser));
/// registry.register(ObjectType(3), MyLimitObj::empty);
/// ```
#[derive(Clone)]
pub struct ObjectRegistry {
    factories: HashMap<ObjectType, ObjectFactory>,
    expr_parser: Option<Arc<dyn ExprParser>>,
}

impl ObjectRegistry {
    /// Registry knowing the built-in counter and quota types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(ObjectType::COUNTER, CounterObj::empty);
        registry.register(ObjectType::QUOTA, QuotaObj::empty);
        registry
    }

    /// Registry with no types registered.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            expr_parser: None,
        }
    }

    /// Register a factory for `object_type`, returning the one it replaces.
    pub fn register(
        &mut self,
        object_type: ObjectType,
        factory: ObjectFactory,
    ) -> Option<ObjectFactory> {
        self.factories.insert(object_type, factory)
    }

    /// Whether a factory is registered for `object_type`.
    pub fn contains(&self, object_type: ObjectType) -> bool {
        self.factories.contains_key(&object_type)
    }

    /// Install the parser handed to objects with embedded expressions.
    pub fn with_expr_parser(mut self, parser: Arc<dyn ExprParser>) -> Self {
        self.expr_parser = Some(parser);
        self
    }

    /// Decode one `NFT_MSG_NEWOBJ` reply into its concrete object.
    ///
    /// Attributes may arrive in any order; the payload is held until the
    /// type is known.
    pub fn decode(&self, msg: &Message) -> Result<Box<dyn Object>> {
        let want = msg_type(NFT_MSG_NEWOBJ);
        if msg.msg_type() != want {
            return Err(Error::UnexpectedHeader {
                got: msg.msg_type(),
                want,
            });
        }

        let header = NfGenMsg::from_bytes(&msg.data)?;
        let family = header.family();

        let mut table = None;
        let mut name = None;
        let mut object_type = None;
        let mut payload = None;

        let mut ad =
            AttributeDecoder::new(&msg.data[NfGenMsg::SIZE..]).with_byte_order(ByteOrder::Big);
        while ad.advance() {
            match ad.kind() {
                NFTA_OBJ_TABLE => table = Some(ad.string()),
                NFTA_OBJ_NAME => name = Some(ad.string()),
                NFTA_OBJ_TYPE => object_type = Some(ObjectType(ad.u32())),
                NFTA_OBJ_DATA => payload = Some(ad.bytes()),
                kind => tracing::trace!(kind, "ignoring object attribute"),
            }
        }
        ad.finish()?;

        let table = table.ok_or(Error::MissingAttribute("table"))?;
        let name = name.ok_or(Error::MissingAttribute("name"))?;
        let object_type = object_type.ok_or(Error::MissingAttribute("type"))?;
        let payload = payload.ok_or(Error::MissingAttribute("data"))?;

        let factory = self
            .factories
            .get(&object_type)
            .ok_or(Error::UnknownObjectType(object_type.as_u32()))?;

        let mut obj = factory(Table::new(table, family), name);
        let ctx = DecodeContext {
            family,
            expr_parser: self.expr_parser.as_deref(),
        };
        let mut ad = AttributeDecoder::new(payload).with_byte_order(ByteOrder::Big);
        let result = obj.unmarshal(&mut ad, &ctx);
        // A codec error explains any missing field, so it takes precedence.
        ad.finish()?;
        result?;

        tracing::debug!(object = %obj, "decoded object");
        Ok(obj)
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("ObjectRegistry")
            .field("types", &types)
            .field("expr_parser", &self.expr_parser.is_some())
            .finish()
    }
}
