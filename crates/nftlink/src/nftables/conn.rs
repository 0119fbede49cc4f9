//! Batched writes and dump reads of stateful objects.

use std::slice;

use super::object::Object;
use super::registry::ObjectRegistry;
use super::{
    NFNL_SUBSYS_NFTABLES, NFT_MSG_DELOBJ, NFT_MSG_GETOBJ, NFT_MSG_GETOBJ_RESET, NFT_MSG_NEWOBJ,
    NFTA_OBJ_TABLE, NfGenMsg, Table, TableFamily, msg_type,
};
use crate::netlink::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_REQUEST};
use crate::netlink::{
    AttributeEncoder, ByteOrder, Dial, EncodeError, Error, Message, NetlinkDialer, NlMsgType,
    Result, Transport, TransportGuard,
};

/// Connection to nf_tables.
///
/// Write operations ([`add_obj`](Self::add_obj), [`del_obj`](Self::del_obj))
/// only queue messages; [`flush`](Self::flush) sends the queue as one batch
/// the kernel applies atomically. Read operations dial their own transport
/// and return once the reply has been decoded.
///
/// The first encoding failure of a write is kept and reported again by the
/// next `flush`, which then sends nothing. Writes after a failure are still
/// attempted, and valid ones are queued.
///
/// A `Conn` is not synchronized; share it between threads behind a `Mutex`.
///
/// # Example
///
/// ```ignore
/// use nftlink::nftables::{Conn, CounterObj, Table, TableFamily};
///
/// let table = Table::new("filter", TableFamily::IPv4);
/// let mut conn = Conn::new();
///
/// conn.add_obj(&CounterObj::new(table.clone(), "ctr1"))?;
/// conn.add_obj(&CounterObj::new(table.clone(), "ctr2"))?;
/// conn.flush()?;
///
/// let objs = conn.get_obj(&CounterObj::new(table, "ctr1"))?;
/// ```
#[derive(Debug)]
pub struct Conn<D: Dial = NetlinkDialer> {
    dialer: D,
    registry: ObjectRegistry,
    messages: Vec<Message>,
    err: Option<EncodeError>,
}

impl Conn {
    /// Connection dialing netlink sockets in the current network namespace.
    pub fn new() -> Self {
        Self::with_dialer(NetlinkDialer::new())
    }
}

impl Default for Conn {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dial> Conn<D> {
    /// Connection opening transports through `dialer`.
    pub fn with_dialer(dialer: D) -> Self {
        Self {
            dialer,
            registry: ObjectRegistry::new(),
            messages: Vec::new(),
            err: None,
        }
    }

    /// Replace the registry used to decode replies.
    pub fn with_registry(mut self, registry: ObjectRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registry used to decode replies.
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// The dialer.
    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Queue creation of `obj`.
    pub fn add_obj(&mut self, obj: &dyn Object) -> std::result::Result<(), EncodeError> {
        self.queue(
            obj,
            NFT_MSG_NEWOBJ,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE,
            true,
        )
    }

    /// Queue deletion of `obj`.
    pub fn del_obj(&mut self, obj: &dyn Object) -> std::result::Result<(), EncodeError> {
        self.queue(obj, NFT_MSG_DELOBJ, NLM_F_REQUEST | NLM_F_ACK, false)
    }

    fn queue(
        &mut self,
        obj: &dyn Object,
        code: u8,
        flags: u16,
        data: bool,
    ) -> std::result::Result<(), EncodeError> {
        match obj.marshal(data) {
            Ok(attrs) => {
                tracing::debug!(code, object = %obj, "queued object request");
                self.messages
                    .push(request(code, flags, obj.family(), attrs));
                Ok(())
            }
            Err(e) => {
                tracing::debug!(code, error = %e, "failed to encode object");
                if self.err.is_none() {
                    self.err = Some(e.clone());
                }
                Err(e)
            }
        }
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.messages.len()
    }

    /// Queued messages, in send order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The first encoding failure since the last flush or discard.
    pub fn err(&self) -> Option<&EncodeError> {
        self.err.as_ref()
    }

    /// Drop the queue and any recorded failure.
    pub fn discard(&mut self) {
        self.messages.clear();
        self.err = None;
    }

    /// Send the queued messages as one batch and wait for the kernel to
    /// acknowledge each of them.
    ///
    /// The queue and any recorded failure are cleared whatever the outcome.
    pub fn flush(&mut self) -> Result<()> {
        let messages = std::mem::take(&mut self.messages);
        if let Some(err) = self.err.take() {
            tracing::debug!(dropped = messages.len(), error = %err, "not sending batch");
            return Err(Error::Encode(err));
        }
        if messages.is_empty() {
            return Ok(());
        }

        let expected = messages.len();
        let mut batch = Vec::with_capacity(expected + 2);
        batch.push(batch_marker(NlMsgType::NFNL_BATCH_BEGIN));
        batch.extend(messages);
        batch.push(batch_marker(NlMsgType::NFNL_BATCH_END));

        let mut transport = self.dial()?;
        transport
            .send_messages(&batch)
            .map_err(|e| Error::transport("send", e))?;
        tracing::debug!(messages = expected, "sent batch");

        let mut acked = 0;
        while acked < expected {
            let replies = transport
                .receive()
                .map_err(|e| Error::transport("receive", e.with_context("committing batch")))?;
            if replies.is_empty() {
                return Err(Error::transport(
                    "receive",
                    Error::InvalidMessage(format!(
                        "batch acknowledged {} of {} messages",
                        acked, expected
                    )),
                ));
            }
            acked += replies.iter().filter(|msg| msg.is_ack()).count();
            tracing::trace!(acked, expected, "batch acknowledgements");
        }
        Ok(())
    }

    /// Fetch `obj` without resetting it.
    ///
    /// The request is a dump filtered by the kernel on the object's table
    /// and type; every matching object is returned in receive order.
    pub fn get_obj(&self, obj: &dyn Object) -> Result<Vec<Box<dyn Object>>> {
        self.get_obj_with(obj, NFT_MSG_GETOBJ)
    }

    /// Fetch `obj` and atomically reset its state (e.g. zero a counter).
    pub fn get_obj_reset(&self, obj: &dyn Object) -> Result<Vec<Box<dyn Object>>> {
        self.get_obj_with(obj, NFT_MSG_GETOBJ_RESET)
    }

    /// Fetch every object in `table`.
    pub fn get_objs(&self, table: &Table) -> Result<Vec<Box<dyn Object>>> {
        let mut transport = self.dial()?;
        if table.name.is_empty() {
            return Err(EncodeError::MissingField("table").into());
        }
        let mut enc = AttributeEncoder::new().with_byte_order(ByteOrder::Big);
        enc.string(NFTA_OBJ_TABLE, &table.name);
        let attrs = enc.finish()?;

        let msg = request(
            NFT_MSG_GETOBJ,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_DUMP,
            table.family,
            attrs,
        );
        self.exchange(&mut transport, msg)
    }

    fn get_obj_with(&self, obj: &dyn Object, code: u8) -> Result<Vec<Box<dyn Object>>> {
        let mut transport = self.dial()?;
        let attrs = obj.marshal(false)?;

        let msg = request(
            code,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_DUMP,
            obj.family(),
            attrs,
        );
        self.exchange(&mut transport, msg)
    }

    fn dial(&self) -> Result<TransportGuard<D::Transport>> {
        let transport = self
            .dialer
            .dial()
            .map_err(|e| Error::transport("dial", e))?;
        Ok(TransportGuard::new(transport))
    }

    fn exchange(
        &self,
        transport: &mut TransportGuard<D::Transport>,
        msg: Message,
    ) -> Result<Vec<Box<dyn Object>>> {
        transport
            .send_messages(slice::from_ref(&msg))
            .map_err(|e| Error::transport("send", e))?;
        let replies = transport
            .receive()
            .map_err(|e| Error::transport("receive", e))?;
        tracing::debug!(replies = replies.len(), msg_type = msg.msg_type(), "received dump");

        replies
            .iter()
            .filter(|reply| {
                let ack = reply.is_ack();
                if ack {
                    tracing::trace!("skipping acknowledgement");
                }
                !ack
            })
            .map(|reply| self.registry.decode(reply))
            .collect()
    }
}

/// Build an nf_tables request: resource header followed by `attrs`.
fn request(code: u8, flags: u16, family: TableFamily, attrs: Vec<u8>) -> Message {
    let mut data = Vec::with_capacity(NfGenMsg::SIZE + attrs.len());
    data.extend_from_slice(NfGenMsg::new(family.as_u8(), 0).as_bytes());
    data.extend(attrs);
    Message::new(msg_type(code), flags, data)
}

/// Batch begin/end marker addressed to the nf_tables subsystem.
fn batch_marker(msg_type: u16) -> Message {
    let header = NfGenMsg::new(libc::AF_UNSPEC as u8, NFNL_SUBSYS_NFTABLES as u16);
    Message::new(msg_type, NLM_F_REQUEST, header.as_bytes().to_vec())
}
