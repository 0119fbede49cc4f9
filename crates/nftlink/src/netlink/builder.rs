//! Builders for netlink messages and attribute streams.

use super::attr::{ByteOrder, NLA_F_NESTED, NlAttr, nla_align};
use super::error::EncodeError;
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

/// Token returned when starting a nested attribute.
/// Used to finalize the nested attribute length.
#[derive(Debug, Clone, Copy)]
struct NestToken {
    /// Offset of the nested attribute header in the buffer.
    offset: usize,
}

/// Builder for framing a netlink message on the wire.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    /// Create a new message builder with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self::with_header(NlMsgHdr::new(msg_type, flags))
    }

    /// Create a builder from an existing header.
    pub fn with_header(header: NlMsgHdr) -> Self {
        let mut buf = vec![0u8; NLMSG_HDRLEN];
        buf[..std::mem::size_of::<NlMsgHdr>()].copy_from_slice(header.as_bytes());
        Self { buf }
    }

    /// Get the current message length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the message is empty (header only).
    pub fn is_empty(&self) -> bool {
        self.buf.len() == NLMSG_HDRLEN
    }

    /// Append raw bytes to the message (with alignment padding).
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        let aligned = nlmsg_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        let bytes = seq.to_ne_bytes();
        self.buf[8..12].copy_from_slice(&bytes);
    }

    /// Set the port ID.
    pub fn set_pid(&mut self, pid: u32) {
        let bytes = pid.to_ne_bytes();
        self.buf[12..16].copy_from_slice(&bytes);
    }

    /// Finalize and return the message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u32;
        let len_bytes = len.to_ne_bytes();
        self.buf[0..4].copy_from_slice(&len_bytes);
        self.buf
    }

    /// Get the current buffer for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Builder for an attribute stream (the payload after a family header).
///
/// Numeric values are written in the encoder's [`ByteOrder`]. Errors are
/// sticky: the first one is kept and returned by [`finish`](Self::finish).
#[derive(Debug, Clone, Default)]
pub struct AttributeEncoder {
    buf: Vec<u8>,
    byte_order: ByteOrder,
    err: Option<EncodeError>,
}

impl AttributeEncoder {
    /// Create an encoder writing numbers in host byte order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the byte order for numeric attributes.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Append an attribute with the given type and data.
    pub fn bytes(&mut self, attr_type: u16, data: &[u8]) -> &mut Self {
        let len = super::attr::NLA_HDRLEN + data.len();
        if len > u16::MAX as usize {
            self.fail(EncodeError::AttributeTooLarge {
                kind: attr_type,
                len,
            });
            return self;
        }
        let attr = NlAttr::new(attr_type, data.len());
        self.buf.extend_from_slice(attr.as_bytes());
        self.buf.extend_from_slice(data);
        let aligned = nla_align(self.buf.len());
        self.buf.resize(aligned, 0);
        self
    }

    /// Append a null-terminated string attribute.
    pub fn string(&mut self, attr_type: u16, value: &str) -> &mut Self {
        if value.as_bytes().contains(&0) {
            self.fail(EncodeError::InvalidString {
                field: "attribute",
                reason: format!("attribute {} contains a NUL byte", attr_type),
            });
            return self;
        }
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.bytes(attr_type, &data)
    }

    /// Append a u8 attribute.
    pub fn u8(&mut self, attr_type: u16, value: u8) -> &mut Self {
        self.bytes(attr_type, &[value])
    }

    /// Append a u16 attribute.
    pub fn u16(&mut self, attr_type: u16, value: u16) -> &mut Self {
        match self.byte_order {
            ByteOrder::Native => self.bytes(attr_type, &value.to_ne_bytes()),
            ByteOrder::Big => self.bytes(attr_type, &value.to_be_bytes()),
        }
    }

    /// Append a u32 attribute.
    pub fn u32(&mut self, attr_type: u16, value: u32) -> &mut Self {
        match self.byte_order {
            ByteOrder::Native => self.bytes(attr_type, &value.to_ne_bytes()),
            ByteOrder::Big => self.bytes(attr_type, &value.to_be_bytes()),
        }
    }

    /// Append a u64 attribute.
    pub fn u64(&mut self, attr_type: u16, value: u64) -> &mut Self {
        match self.byte_order {
            ByteOrder::Native => self.bytes(attr_type, &value.to_ne_bytes()),
            ByteOrder::Big => self.bytes(attr_type, &value.to_be_bytes()),
        }
    }

    /// Append a nested attribute whose payload is written by `f`.
    pub fn nested<F>(&mut self, attr_type: u16, f: F) -> &mut Self
    where
        F: FnOnce(&mut AttributeEncoder),
    {
        let token = self.nest_start(attr_type);
        f(self);
        self.nest_end(token, attr_type);
        self
    }

    /// Start a nested attribute. Returns a token to finalize it.
    fn nest_start(&mut self, attr_type: u16) -> NestToken {
        let offset = self.buf.len();
        // Placeholder header, length patched in nest_end
        let attr = NlAttr::new(attr_type | NLA_F_NESTED, 0);
        self.buf.extend_from_slice(attr.as_bytes());
        NestToken { offset }
    }

    /// End a nested attribute started with `nest_start`.
    fn nest_end(&mut self, token: NestToken, attr_type: u16) {
        let len = self.buf.len() - token.offset;
        if len > u16::MAX as usize {
            self.fail(EncodeError::AttributeTooLarge {
                kind: attr_type,
                len,
            });
            return;
        }
        let len_bytes = (len as u16).to_ne_bytes();
        self.buf[token.offset] = len_bytes[0];
        self.buf[token.offset + 1] = len_bytes[1];
        let aligned = nla_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Return the encoded stream, or the first recorded error.
    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        match self.err {
            Some(e) => Err(e),
            None => Ok(self.buf),
        }
    }

    fn fail(&mut self, e: EncodeError) {
        if self.err.is_none() {
            self.err = Some(e);
        }
    }
}
