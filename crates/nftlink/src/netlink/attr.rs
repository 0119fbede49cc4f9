//! Netlink attribute (nlattr) handling.
//!
//! Attributes are type-length-value records padded to four bytes. The
//! header is always in host byte order; the byte order of numeric payloads
//! depends on the subsystem. nf_tables sends every multi-byte payload
//! big-endian, so decoders for it are built with [`ByteOrder::Big`].

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Netlink attribute header (mirrors struct nlattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Check if this is a nested attribute.
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Get the payload length (total length minus header).
    pub fn payload_len(&self) -> usize {
        (self.nla_len as usize).saturating_sub(NLA_HDRLEN)
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes (no alignment requirement).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Iterator over netlink attributes in a buffer.
///
/// Unlike a lenient walker, a malformed length is reported as an error
/// instead of silently ending the stream. After the first error the
/// iterator is exhausted.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Check if there are no more attributes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// Returns (attribute type without flags, payload data).
    type Item = Result<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let attr = match NlAttr::from_bytes(self.data) {
            Ok(a) => a,
            Err(e) => {
                self.data = &[];
                return Some(Err(e));
            }
        };

        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN {
            self.data = &[];
            return Some(Err(Error::InvalidAttribute(format!(
                "attribute length {} shorter than header",
                len
            ))));
        }
        if len > self.data.len() {
            let actual = self.data.len();
            self.data = &[];
            return Some(Err(Error::Truncated {
                expected: len,
                actual,
            }));
        }

        let payload = &self.data[NLA_HDRLEN..len];
        let aligned_len = nla_align(len);

        // The final attribute may omit its padding.
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some(Ok((attr.kind(), payload)))
    }
}

/// Byte order used for numeric attribute payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Host byte order (rtnetlink, generic netlink).
    #[default]
    Native,
    /// Network byte order (nf_tables, conntrack).
    Big,
}

/// Sticky-error attribute decoder.
///
/// Accessors never fail at the call site. A wrong-length read records the
/// first error and yields a zero value, so a caller can finish one pass over
/// the stream and check [`finish`](Self::finish) once:
///
/// ```ignore
/// let mut ad = AttributeDecoder::new(payload).with_byte_order(ByteOrder::Big);
/// while ad.advance() {
///     match ad.kind() {
///         NFTA_COUNTER_BYTES => bytes = Some(ad.u64()),
///         NFTA_COUNTER_PACKETS => packets = Some(ad.u64()),
///         _ => {}
///     }
/// }
/// ad.finish()?;
/// ```
pub struct AttributeDecoder<'a> {
    iter: AttrIter<'a>,
    current: Option<(u16, &'a [u8])>,
    byte_order: ByteOrder,
    err: Option<Error>,
}

impl<'a> AttributeDecoder<'a> {
    /// Create a decoder over an attribute stream (host byte order).
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            iter: AttrIter::new(data),
            current: None,
            byte_order: ByteOrder::Native,
            err: None,
        }
    }

    /// Set the byte order used by the numeric accessors.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Byte order used by the numeric accessors.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Move to the next attribute.
    ///
    /// Returns `false` when the stream is exhausted or an error was recorded.
    pub fn advance(&mut self) -> bool {
        if self.err.is_some() {
            self.current = None;
            return false;
        }
        match self.iter.next() {
            Some(Ok(attr)) => {
                self.current = Some(attr);
                true
            }
            Some(Err(e)) => {
                self.current = None;
                self.err = Some(e);
                false
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    /// Type of the current attribute (flags stripped), 0 if none.
    pub fn kind(&self) -> u16 {
        self.current.map(|(kind, _)| kind).unwrap_or(0)
    }

    /// Raw payload of the current attribute.
    pub fn bytes(&self) -> &'a [u8] {
        self.current.map(|(_, data)| data).unwrap_or(&[])
    }

    /// Current attribute as a string.
    pub fn string(&mut self) -> String {
        match get::string(self.bytes()) {
            Ok(s) => s.to_string(),
            Err(e) => {
                self.fail(e);
                String::new()
            }
        }
    }

    /// Current attribute as a u8.
    pub fn u8(&mut self) -> u8 {
        let data = self.bytes();
        if data.len() != 1 {
            self.fail_len("u8", data.len());
            return 0;
        }
        data[0]
    }

    /// Current attribute as a u16 in the decoder's byte order.
    pub fn u16(&mut self) -> u16 {
        let data = self.bytes();
        if data.len() != 2 {
            self.fail_len("u16", data.len());
            return 0;
        }
        let value = match self.byte_order {
            ByteOrder::Native => get::u16_ne(data),
            ByteOrder::Big => get::u16_be(data),
        };
        value.unwrap_or_default()
    }

    /// Current attribute as a u32 in the decoder's byte order.
    pub fn u32(&mut self) -> u32 {
        let data = self.bytes();
        if data.len() != 4 {
            self.fail_len("u32", data.len());
            return 0;
        }
        let value = match self.byte_order {
            ByteOrder::Native => get::u32_ne(data),
            ByteOrder::Big => get::u32_be(data),
        };
        value.unwrap_or_default()
    }

    /// Current attribute as a u64 in the decoder's byte order.
    pub fn u64(&mut self) -> u64 {
        let data = self.bytes();
        if data.len() != 8 {
            self.fail_len("u64", data.len());
            return 0;
        }
        let value = match self.byte_order {
            ByteOrder::Native => get::u64_ne(data),
            ByteOrder::Big => get::u64_be(data),
        };
        value.unwrap_or_default()
    }

    /// New decoder over the current attribute's payload, same byte order.
    pub fn decoder(&self) -> AttributeDecoder<'a> {
        AttributeDecoder::new(self.bytes()).with_byte_order(self.byte_order)
    }

    /// Decode the current attribute as a nested stream.
    ///
    /// An error returned by `f`, or left unreported in the child decoder,
    /// is recorded on this decoder.
    pub fn nested<F>(&mut self, f: F)
    where
        F: FnOnce(&mut AttributeDecoder<'a>) -> Result<()>,
    {
        let mut child = self.decoder();
        let result = f(&mut child).and_then(|()| child.finish());
        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// Peek at the recorded error, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Consume the decoder, returning the first recorded error.
    pub fn finish(self) -> Result<()> {
        match self.err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&mut self, e: Error) {
        if self.err.is_none() {
            self.err = Some(e);
        }
    }

    fn fail_len(&mut self, what: &str, len: usize) {
        let kind = self.kind();
        self.fail(Error::InvalidAttribute(format!(
            "attribute {} has length {}, not valid for {}",
            kind, len, what
        )));
    }
}

/// Helper functions for extracting typed values from attribute payloads.
pub mod get {
    use super::*;

    /// Extract a u8 value.
    pub fn u8(data: &[u8]) -> Result<u8> {
        if data.is_empty() {
            return Err(Error::InvalidAttribute("empty u8 attribute".into()));
        }
        Ok(data[0])
    }

    /// Extract a u16 value (native endian).
    pub fn u16_ne(data: &[u8]) -> Result<u16> {
        if data.len() < 2 {
            return Err(Error::InvalidAttribute("truncated u16 attribute".into()));
        }
        Ok(u16::from_ne_bytes([data[0], data[1]]))
    }

    /// Extract a u32 value (native endian).
    pub fn u32_ne(data: &[u8]) -> Result<u32> {
        if data.len() < 4 {
            return Err(Error::InvalidAttribute("truncated u32 attribute".into()));
        }
        Ok(u32::from_ne_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// Extract a u64 value (native endian).
    pub fn u64_ne(data: &[u8]) -> Result<u64> {
        if data.len() < 8 {
            return Err(Error::InvalidAttribute("truncated u64 attribute".into()));
        }
        Ok(u64::from_ne_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]))
    }

    /// Extract a u16 value (big endian / network order).
    pub fn u16_be(data: &[u8]) -> Result<u16> {
        if data.len() < 2 {
            return Err(Error::InvalidAttribute("truncated u16 attribute".into()));
        }
        Ok(u16::from_be_bytes([data[0], data[1]]))
    }

    /// Extract a u32 value (big endian / network order).
    pub fn u32_be(data: &[u8]) -> Result<u32> {
        if data.len() < 4 {
            return Err(Error::InvalidAttribute("truncated u32 attribute".into()));
        }
        Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// Extract a u64 value (big endian / network order).
    pub fn u64_be(data: &[u8]) -> Result<u64> {
        if data.len() < 8 {
            return Err(Error::InvalidAttribute("truncated u64 attribute".into()));
        }
        Ok(u64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]))
    }

    /// Extract a null-terminated string.
    pub fn string(data: &[u8]) -> Result<&str> {
        // Find null terminator or use whole buffer
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..len])
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {}", e)))
    }
}
